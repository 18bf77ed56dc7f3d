//! Metal barrier lowering.
//!
//! Metal only knows encoder-wide memory barriers, so every call arrives here
//! already folded into one [`GlobalMemoryBarrier`]. Outside of an encoder
//! the next encoder boundary does the job, since Metal orders encoders of
//! one command buffer for tracked resources.

use bitflags::bitflags;

use super::{BarrierAccess, BarrierSyncStages, GlobalMemoryBarrier, PassKind};

bitflags! {
    /// `MTLBarrierScope`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MetalBarrierScope: u32 {
        const BUFFERS = 1 << 0;
        const TEXTURES = 1 << 1;
        const RENDER_TARGETS = 1 << 2;
    }
}

bitflags! {
    /// `MTLRenderStages`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MetalRenderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const TILE = 1 << 2;
        const OBJECT = 1 << 3;
        const MESH = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetalBarrier {
    None,
    /// End the current encoder; the next one observes every prior write.
    EncoderBoundary,
    /// `memoryBarrierWithScope:` (compute) or
    /// `memoryBarrierWithScope:afterStages:beforeStages:` (render).
    Memory {
        scope: MetalBarrierScope,
        after: MetalRenderStages,
        before: MetalRenderStages,
    },
}

pub fn scope_for(access: BarrierAccess) -> MetalBarrierScope {
    if access.intersects(BarrierAccess::ALL) {
        return MetalBarrierScope::all();
    }

    let buffers = BarrierAccess::VERTEX_BUFFER
        | BarrierAccess::INDEX_BUFFER
        | BarrierAccess::CONSTANT_BUFFER
        | BarrierAccess::INDIRECT_BUFFER
        | BarrierAccess::SHADER_RESOURCE
        | BarrierAccess::UNORDERED_ACCESS
        | BarrierAccess::TRANSFER_SRC
        | BarrierAccess::TRANSFER_DST
        | BarrierAccess::ACCELERATION_STRUCTURE_READ
        | BarrierAccess::ACCELERATION_STRUCTURE_WRITE;
    let textures = BarrierAccess::DEPTH_STENCIL_READ
        | BarrierAccess::SHADER_RESOURCE
        | BarrierAccess::UNORDERED_ACCESS
        | BarrierAccess::TRANSFER_SRC
        | BarrierAccess::TRANSFER_DST
        | BarrierAccess::SHADING_RATE;
    let render_targets = BarrierAccess::COLOR_ATTACHMENT
        | BarrierAccess::DEPTH_STENCIL_WRITE
        | BarrierAccess::RESOLVE_SRC
        | BarrierAccess::RESOLVE_DST;

    let mut scope = MetalBarrierScope::empty();
    if access.intersects(buffers) {
        scope |= MetalBarrierScope::BUFFERS;
    }
    if access.intersects(textures) {
        scope |= MetalBarrierScope::TEXTURES;
    }
    if access.intersects(render_targets) {
        scope |= MetalBarrierScope::RENDER_TARGETS;
    }
    scope
}

pub fn to_render_stages(stages: BarrierSyncStages) -> MetalRenderStages {
    let stages = stages.expanded();
    let mut out = MetalRenderStages::empty();
    if stages.intersects(
        BarrierSyncStages::VERTEX_SHADING
            | BarrierSyncStages::VERTEX_INPUT_ASSEMBLY
            | BarrierSyncStages::INDEX_INPUT_ASSEMBLY
            | BarrierSyncStages::EXECUTE_INDIRECT,
    ) {
        out |= MetalRenderStages::VERTEX | MetalRenderStages::OBJECT | MetalRenderStages::MESH;
    }
    if stages.intersects(
        BarrierSyncStages::FRAGMENT_SHADING
            | BarrierSyncStages::COLOR_BLENDING
            | BarrierSyncStages::DEPTH_STENCIL_TESTING
            | BarrierSyncStages::MULTI_SAMPLE_RESOLVE,
    ) {
        out |= MetalRenderStages::FRAGMENT;
    }
    out
}

pub fn translate(pass: PassKind, barrier: Option<GlobalMemoryBarrier>) -> MetalBarrier {
    let Some(barrier) = barrier else {
        return MetalBarrier::None;
    };

    match pass {
        PassKind::None => MetalBarrier::EncoderBoundary,
        PassKind::Compute => MetalBarrier::Memory {
            scope: scope_for(barrier.access_src | barrier.access_dst),
            after: MetalRenderStages::empty(),
            before: MetalRenderStages::empty(),
        },
        PassKind::Render => {
            let mut after = to_render_stages(barrier.stages_src);
            let mut before = to_render_stages(barrier.stages_dst);
            // inside a render encoder both sides need at least one stage
            if after.is_empty() {
                after = MetalRenderStages::VERTEX | MetalRenderStages::FRAGMENT;
            }
            if before.is_empty() {
                before = MetalRenderStages::VERTEX | MetalRenderStages::FRAGMENT;
            }
            MetalBarrier::Memory {
                scope: scope_for(barrier.access_src | barrier.access_dst),
                after,
                before,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_for_access() {
        assert_eq!(
            scope_for(BarrierAccess::VERTEX_BUFFER),
            MetalBarrierScope::BUFFERS
        );
        assert_eq!(
            scope_for(BarrierAccess::COLOR_ATTACHMENT),
            MetalBarrierScope::RENDER_TARGETS
        );
        assert_eq!(
            scope_for(BarrierAccess::UNORDERED_ACCESS),
            MetalBarrierScope::BUFFERS | MetalBarrierScope::TEXTURES
        );
        assert_eq!(scope_for(BarrierAccess::ALL_WRITE), MetalBarrierScope::all());
    }

    #[test]
    fn test_translate_outside_pass() {
        let barrier = GlobalMemoryBarrier::new(
            BarrierSyncStages::COMPUTE_SHADING,
            BarrierSyncStages::FRAGMENT_SHADING,
            BarrierAccess::UNORDERED_ACCESS,
            BarrierAccess::SHADER_RESOURCE,
        );
        assert_eq!(
            translate(PassKind::None, Some(barrier)),
            MetalBarrier::EncoderBoundary
        );
        assert_eq!(translate(PassKind::Render, None), MetalBarrier::None);
    }

    #[test]
    fn test_translate_in_render_pass() {
        let barrier = GlobalMemoryBarrier::new(
            BarrierSyncStages::FRAGMENT_SHADING,
            BarrierSyncStages::VERTEX_SHADING,
            BarrierAccess::UNORDERED_ACCESS,
            BarrierAccess::SHADER_RESOURCE,
        );
        let MetalBarrier::Memory { after, before, .. } = translate(PassKind::Render, Some(barrier))
        else {
            panic!("expected a memory barrier");
        };
        assert_eq!(after, MetalRenderStages::FRAGMENT);
        assert!(before.contains(MetalRenderStages::VERTEX));
    }
}
