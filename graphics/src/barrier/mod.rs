//! Unified memory barrier model and its per-API translation.
//!
//! Clients describe synchronization with one neutral vocabulary
//! ([`BarrierSyncStages`], [`BarrierAccess`], [`TextureLayout`]) and the
//! translator lowers each call to the barrier form of the API family the
//! context runs:
//!
//! | Family | Output |
//! |---|---|
//! | DX12 (v2) | enhanced barriers: sync / access / layout |
//! | DX12 (v1) | legacy resource-state transitions and UAV barriers |
//! | Vulkan | `VkMemoryBarrier2`-shaped stage / access / layout records |
//! | Metal | a single global memory barrier, or an encoder boundary |
//!
//! Barriers that cannot change anything (the destination stages are already
//! covered by the source stages, nothing is written and no layout changes)
//! are dropped before lowering on the families that take per-resource
//! barriers.
//!
//! Families without per-resource barriers get one global barrier covering
//! the union of everything that was passed; see
//! [`BarrierCaps::supports_non_global_barriers`].

pub mod dx12;
pub mod metal;
pub mod vulkan;

use bitflags::bitflags;

use crate::app_info::{Api, ApiFamily};
use crate::handles::{BufferHandle, TextureHandle};
use crate::types::{TextureLayout, TexturePlane};

bitflags! {
    /// Pipeline stages a barrier waits on or blocks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BarrierSyncStages: u32 {
        /// Top of pipe as a source, bottom of pipe as a destination.
        const NONE = 1 << 0;
        const ALL = 1 << 1;
        const EXECUTE_INDIRECT = 1 << 2;
        const INDEX_INPUT_ASSEMBLY = 1 << 3;
        const VERTEX_INPUT_ASSEMBLY = 1 << 4;
        const VERTEX_SHADING = 1 << 5;
        const FRAGMENT_SHADING = 1 << 6;
        const COLOR_BLENDING = 1 << 7;
        const DEPTH_STENCIL_TESTING = 1 << 8;
        const TRANSFER = 1 << 9;
        const MULTI_SAMPLE_RESOLVE = 1 << 10;
        const COMPUTE_SHADING = 1 << 11;
        const ALL_SHADING = 1 << 12;
        const RAYTRACING = 1 << 13;
        const ACCELERATION_STRUCTURE_BUILD = 1 << 14;
        const ACCELERATION_STRUCTURE_COPY = 1 << 15;
    }
}

impl Default for BarrierSyncStages {
    fn default() -> Self {
        Self::NONE
    }
}

impl BarrierSyncStages {
    /// Expand the aggregate stages into the concrete stages they cover.
    pub fn expanded(self) -> Self {
        if self.contains(Self::ALL) {
            return Self::all().difference(Self::NONE);
        }
        let mut expanded = self;
        if self.contains(Self::ALL_SHADING) {
            expanded |= Self::VERTEX_SHADING
                | Self::FRAGMENT_SHADING
                | Self::COMPUTE_SHADING
                | Self::RAYTRACING;
        }
        expanded
    }

    /// Whether every stage of `other` is already covered by `self`.
    pub fn covers(self, other: Self) -> bool {
        let other = other.difference(Self::NONE);
        self.expanded().contains(other.expanded())
    }
}

bitflags! {
    /// Memory access categories on either side of a barrier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BarrierAccess: u32 {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const CONSTANT_BUFFER = 1 << 2;
        const INDIRECT_BUFFER = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_READ = 1 << 5;
        const DEPTH_STENCIL_WRITE = 1 << 6;
        const SHADER_RESOURCE = 1 << 7;
        const UNORDERED_ACCESS = 1 << 8;
        const RESOLVE_SRC = 1 << 9;
        const RESOLVE_DST = 1 << 10;
        const TRANSFER_SRC = 1 << 11;
        const TRANSFER_DST = 1 << 12;
        const ACCELERATION_STRUCTURE_READ = 1 << 13;
        const ACCELERATION_STRUCTURE_WRITE = 1 << 14;
        const SHADING_RATE = 1 << 15;
        const ALL_READ = 1 << 16;
        const ALL_WRITE = 1 << 17;
        const ALL = Self::ALL_READ.bits() | Self::ALL_WRITE.bits();
        /// No access: the resource is only transitioned or discarded.
        const NONE = 1 << 18;
    }
}

impl Default for BarrierAccess {
    fn default() -> Self {
        Self::NONE
    }
}

impl BarrierAccess {
    pub const WRITES: Self = Self::COLOR_ATTACHMENT
        .union(Self::DEPTH_STENCIL_WRITE)
        .union(Self::UNORDERED_ACCESS)
        .union(Self::RESOLVE_DST)
        .union(Self::TRANSFER_DST)
        .union(Self::ACCELERATION_STRUCTURE_WRITE)
        .union(Self::ALL_WRITE);

    pub fn has_writes(self) -> bool {
        self.intersects(Self::WRITES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GlobalMemoryBarrier {
    pub stages_src: BarrierSyncStages,
    pub stages_dst: BarrierSyncStages,
    pub access_src: BarrierAccess,
    pub access_dst: BarrierAccess,
}

impl GlobalMemoryBarrier {
    pub fn new(
        stages_src: BarrierSyncStages,
        stages_dst: BarrierSyncStages,
        access_src: BarrierAccess,
        access_dst: BarrierAccess,
    ) -> Self {
        Self {
            stages_src,
            stages_dst,
            access_src,
            access_dst,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferMemoryBarrier {
    pub stages_src: BarrierSyncStages,
    pub stages_dst: BarrierSyncStages,
    pub access_src: BarrierAccess,
    pub access_dst: BarrierAccess,
    pub offset: u64,
    /// `u64::MAX` covers the rest of the buffer.
    pub size: u64,
    pub buffer: BufferHandle,
}

impl BufferMemoryBarrier {
    pub fn new(
        buffer: BufferHandle,
        stages_src: BarrierSyncStages,
        stages_dst: BarrierSyncStages,
        access_src: BarrierAccess,
        access_dst: BarrierAccess,
    ) -> Self {
        Self {
            stages_src,
            stages_dst,
            access_src,
            access_dst,
            offset: 0,
            size: u64::MAX,
            buffer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureMemoryBarrier {
    pub stages_src: BarrierSyncStages,
    pub stages_dst: BarrierSyncStages,
    pub access_src: BarrierAccess,
    pub access_dst: BarrierAccess,
    pub texture: TextureHandle,
    pub array_start: u16,
    /// `u16::MAX` covers the remaining slices.
    pub array_count: u16,
    pub layout_src: TextureLayout,
    pub layout_dst: TextureLayout,
    pub mip_start: u8,
    /// `u8::MAX` covers the remaining mips.
    pub mip_count: u8,
    pub planes: TexturePlane,
}

impl TextureMemoryBarrier {
    pub fn new(
        texture: TextureHandle,
        stages_src: BarrierSyncStages,
        stages_dst: BarrierSyncStages,
        access_src: BarrierAccess,
        access_dst: BarrierAccess,
    ) -> Self {
        Self {
            stages_src,
            stages_dst,
            access_src,
            access_dst,
            texture,
            array_start: 0,
            array_count: 1,
            layout_src: TextureLayout::Unknown,
            layout_dst: TextureLayout::Unknown,
            mip_start: 0,
            mip_count: 1,
            planes: TexturePlane::COLOR,
        }
    }

    pub fn with_layouts(mut self, layout_src: TextureLayout, layout_dst: TextureLayout) -> Self {
        self.layout_src = layout_src;
        self.layout_dst = layout_dst;
        self
    }

    pub fn with_planes(mut self, planes: TexturePlane) -> Self {
        self.planes = planes;
        self
    }

    pub fn with_mips(mut self, mip_start: u8, mip_count: u8) -> Self {
        self.mip_start = mip_start;
        self.mip_count = mip_count;
        self
    }
}

/// Whether a barrier with these parameters has no observable effect.
pub(crate) fn is_redundant(
    stages_src: BarrierSyncStages,
    stages_dst: BarrierSyncStages,
    access_src: BarrierAccess,
    access_dst: BarrierAccess,
    layouts: Option<(TextureLayout, TextureLayout)>,
) -> bool {
    if let Some((before, after)) = layouts
        && before != after
    {
        return false;
    }
    !access_src.has_writes() && !access_dst.has_writes() && stages_src.covers(stages_dst)
}

/// The encoder a barrier is recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PassKind {
    #[default]
    None,
    Render,
    Compute,
}

/// Barrier capabilities of a context, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BarrierCaps {
    pub family: ApiFamily,
    /// DX12 enhanced barriers are available.
    pub enhanced_barriers: bool,
    /// `VK_KHR_synchronization2` (or Vulkan 1.3) is available.
    pub synchronization2: bool,
}

impl BarrierCaps {
    pub fn for_api(api: Api) -> Self {
        Self {
            family: api.family(),
            enhanced_barriers: matches!(api, Api::Dx12V2),
            synchronization2: matches!(api, Api::Vulkan1_3),
        }
    }

    /// Whether buffer and texture barriers are honored individually.
    pub fn supports_non_global_barriers(&self) -> bool {
        self.family != ApiFamily::Metal
    }
}

/// Barriers lowered to the context's API family.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslatedBarriers {
    Dx12(dx12::Dx12Barriers),
    Vulkan(vulkan::VulkanBarriers),
    Metal(metal::MetalBarrier),
}

impl TranslatedBarriers {
    /// Whether lowering produced nothing to record.
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Dx12(barriers) => barriers.is_empty(),
            Self::Vulkan(barriers) => barriers.is_empty(),
            Self::Metal(barrier) => matches!(barrier, metal::MetalBarrier::None),
        }
    }
}

/// Lower one `place_memory_barriers` call.
pub fn translate(
    caps: &BarrierCaps,
    pass: PassKind,
    global: &[GlobalMemoryBarrier],
    buffers: &[BufferMemoryBarrier],
    textures: &[TextureMemoryBarrier],
) -> TranslatedBarriers {
    verglas_core::profile_function!();

    if !caps.supports_non_global_barriers() {
        let union = collapse_to_global(global, buffers, textures);
        return TranslatedBarriers::Metal(metal::translate(pass, union));
    }

    match caps.family {
        ApiFamily::Dx12 => TranslatedBarriers::Dx12(dx12::translate(
            caps.enhanced_barriers,
            global,
            buffers,
            textures,
        )),
        ApiFamily::Vulkan | ApiFamily::Metal => TranslatedBarriers::Vulkan(vulkan::translate(
            caps.synchronization2,
            global,
            buffers,
            textures,
        )),
    }
}

/// Fold every barrier into one global barrier.
///
/// Returns `None` when every input is redundant.
pub fn collapse_to_global(
    global: &[GlobalMemoryBarrier],
    buffers: &[BufferMemoryBarrier],
    textures: &[TextureMemoryBarrier],
) -> Option<GlobalMemoryBarrier> {
    let mut union: Option<GlobalMemoryBarrier> = None;
    let mut merge = |src: BarrierSyncStages,
                     dst: BarrierSyncStages,
                     access_src: BarrierAccess,
                     access_dst: BarrierAccess| {
        let entry = union.get_or_insert(GlobalMemoryBarrier::new(
            BarrierSyncStages::empty(),
            BarrierSyncStages::empty(),
            BarrierAccess::empty(),
            BarrierAccess::empty(),
        ));
        entry.stages_src |= src;
        entry.stages_dst |= dst;
        entry.access_src |= access_src;
        entry.access_dst |= access_dst;
    };

    for b in global {
        if !is_redundant(b.stages_src, b.stages_dst, b.access_src, b.access_dst, None) {
            merge(b.stages_src, b.stages_dst, b.access_src, b.access_dst);
        }
    }
    for b in buffers {
        if !is_redundant(b.stages_src, b.stages_dst, b.access_src, b.access_dst, None) {
            merge(b.stages_src, b.stages_dst, b.access_src, b.access_dst);
        }
    }
    for b in textures {
        let layouts = Some((b.layout_src, b.layout_dst));
        if !is_redundant(b.stages_src, b.stages_dst, b.access_src, b.access_dst, layouts) {
            merge(b.stages_src, b.stages_dst, b.access_src, b.access_dst);
        }
    }

    if let Some(barrier) = &union {
        log::debug!(
            "collapsed {} barrier(s) into one global barrier {:?} -> {:?}",
            global.len() + buffers.len() + textures.len(),
            barrier.stages_src,
            barrier.stages_dst
        );
    }
    union
}

#[cfg(test)]
mod tests {
    use super::*;
    use verglas_core::GenHandle;

    fn texture() -> TextureHandle {
        TextureHandle(GenHandle::new(0, 0))
    }

    #[test]
    fn test_stage_cover() {
        let s = BarrierSyncStages::ALL_SHADING;
        assert!(s.covers(BarrierSyncStages::FRAGMENT_SHADING));
        assert!(s.covers(BarrierSyncStages::NONE));
        assert!(!s.covers(BarrierSyncStages::TRANSFER));
        assert!(BarrierSyncStages::ALL.covers(BarrierSyncStages::TRANSFER));
        assert!(
            !BarrierSyncStages::FRAGMENT_SHADING.covers(BarrierSyncStages::ALL_SHADING)
        );
    }

    #[test]
    fn test_redundancy() {
        assert!(is_redundant(
            BarrierSyncStages::FRAGMENT_SHADING | BarrierSyncStages::COMPUTE_SHADING,
            BarrierSyncStages::COMPUTE_SHADING,
            BarrierAccess::SHADER_RESOURCE,
            BarrierAccess::SHADER_RESOURCE,
            None
        ));
        // writes always need a barrier
        assert!(!is_redundant(
            BarrierSyncStages::COMPUTE_SHADING,
            BarrierSyncStages::COMPUTE_SHADING,
            BarrierAccess::UNORDERED_ACCESS,
            BarrierAccess::UNORDERED_ACCESS,
            None
        ));
        // layout transitions always need a barrier
        assert!(!is_redundant(
            BarrierSyncStages::ALL,
            BarrierSyncStages::FRAGMENT_SHADING,
            BarrierAccess::SHADER_RESOURCE,
            BarrierAccess::SHADER_RESOURCE,
            Some((TextureLayout::Common, TextureLayout::ShaderResource))
        ));
    }

    #[test]
    fn test_supports_non_global_barriers() {
        assert!(BarrierCaps::for_api(Api::Dx12V2).supports_non_global_barriers());
        assert!(BarrierCaps::for_api(Api::Vulkan1_1).supports_non_global_barriers());
        assert!(!BarrierCaps::for_api(Api::Metal3).supports_non_global_barriers());
    }

    #[test]
    fn test_collapse_to_global_unions() {
        let textures = [TextureMemoryBarrier::new(
            texture(),
            BarrierSyncStages::TRANSFER,
            BarrierSyncStages::FRAGMENT_SHADING,
            BarrierAccess::TRANSFER_DST,
            BarrierAccess::SHADER_RESOURCE,
        )
        .with_layouts(TextureLayout::TransferDst, TextureLayout::ShaderResource)];
        let global = [GlobalMemoryBarrier::new(
            BarrierSyncStages::COMPUTE_SHADING,
            BarrierSyncStages::VERTEX_SHADING,
            BarrierAccess::UNORDERED_ACCESS,
            BarrierAccess::SHADER_RESOURCE,
        )];
        let union = collapse_to_global(&global, &[], &textures).unwrap();
        assert_eq!(
            union.stages_src,
            BarrierSyncStages::TRANSFER | BarrierSyncStages::COMPUTE_SHADING
        );
        assert_eq!(
            union.access_src,
            BarrierAccess::TRANSFER_DST | BarrierAccess::UNORDERED_ACCESS
        );
    }

    #[test]
    fn test_covered_read_barrier_is_noop_everywhere() {
        let global = [GlobalMemoryBarrier::new(
            BarrierSyncStages::ALL_SHADING,
            BarrierSyncStages::FRAGMENT_SHADING,
            BarrierAccess::SHADER_RESOURCE,
            BarrierAccess::SHADER_RESOURCE,
        )];
        for api in [Api::Dx12V1, Api::Dx12V2, Api::Vulkan1_1, Api::Vulkan1_3, Api::Metal3] {
            let caps = BarrierCaps::for_api(api);
            let translated = translate(&caps, PassKind::None, &global, &[], &[]);
            assert!(translated.is_noop(), "{api:?} produced {translated:?}");
        }
    }

    #[test]
    fn test_family_dispatch() {
        let global = [GlobalMemoryBarrier::new(
            BarrierSyncStages::TRANSFER,
            BarrierSyncStages::COMPUTE_SHADING,
            BarrierAccess::TRANSFER_DST,
            BarrierAccess::SHADER_RESOURCE,
        )];
        let caps = BarrierCaps::for_api(Api::Dx12V2);
        assert!(matches!(
            translate(&caps, PassKind::None, &global, &[], &[]),
            TranslatedBarriers::Dx12(_)
        ));
        let caps = BarrierCaps::for_api(Api::Vulkan1_3);
        assert!(matches!(
            translate(&caps, PassKind::None, &global, &[], &[]),
            TranslatedBarriers::Vulkan(_)
        ));
        let caps = BarrierCaps::for_api(Api::Metal3);
        assert!(matches!(
            translate(&caps, PassKind::Compute, &global, &[], &[]),
            TranslatedBarriers::Metal(metal::MetalBarrier::Memory { .. })
        ));
    }
}
