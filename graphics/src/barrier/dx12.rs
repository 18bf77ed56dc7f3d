//! DX12 barrier lowering.
//!
//! The flag types mirror the `D3D12_BARRIER_*` and `D3D12_RESOURCE_STATES`
//! values bit for bit so a Windows executor can cast them straight into the
//! API structs.

use bitflags::bitflags;

use super::{
    BarrierAccess, BarrierSyncStages, BufferMemoryBarrier, GlobalMemoryBarrier,
    TextureMemoryBarrier, is_redundant,
};
use crate::handles::{BufferHandle, TextureHandle};
use crate::types::{TextureLayout, TexturePlane};

bitflags! {
    /// `D3D12_BARRIER_SYNC`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Dx12BarrierSync: u32 {
        const NONE = 0;
        const ALL = 0x1;
        const DRAW = 0x2;
        const INDEX_INPUT = 0x4;
        const VERTEX_SHADING = 0x8;
        const PIXEL_SHADING = 0x10;
        const DEPTH_STENCIL = 0x20;
        const RENDER_TARGET = 0x40;
        const COMPUTE_SHADING = 0x80;
        const RAYTRACING = 0x100;
        const COPY = 0x200;
        const RESOLVE = 0x400;
        const EXECUTE_INDIRECT = 0x800;
        const ALL_SHADING = 0x1000;
        const NON_PIXEL_SHADING = 0x2000;
        const BUILD_RAYTRACING_ACCELERATION_STRUCTURE = 0x80_0000;
        const COPY_RAYTRACING_ACCELERATION_STRUCTURE = 0x100_0000;
    }
}

bitflags! {
    /// `D3D12_BARRIER_ACCESS`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Dx12BarrierAccess: u32 {
        const COMMON = 0;
        const VERTEX_BUFFER = 0x1;
        const CONSTANT_BUFFER = 0x2;
        const INDEX_BUFFER = 0x4;
        const RENDER_TARGET = 0x8;
        const UNORDERED_ACCESS = 0x10;
        const DEPTH_STENCIL_WRITE = 0x20;
        const DEPTH_STENCIL_READ = 0x40;
        const SHADER_RESOURCE = 0x80;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
        const RESOLVE_DEST = 0x1000;
        const RESOLVE_SOURCE = 0x2000;
        const RAYTRACING_ACCELERATION_STRUCTURE_READ = 0x4000;
        const RAYTRACING_ACCELERATION_STRUCTURE_WRITE = 0x8000;
        const SHADING_RATE_SOURCE = 0x1_0000;
        const NO_ACCESS = 0x8000_0000;
    }
}

/// `D3D12_BARRIER_LAYOUT`. `PRESENT` shares its value with `COMMON`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Dx12BarrierLayout {
    Undefined = 0xFFFF_FFFF,
    Common = 0,
    GenericRead = 1,
    RenderTarget = 2,
    UnorderedAccess = 3,
    DepthStencilWrite = 4,
    DepthStencilRead = 5,
    ShaderResource = 6,
    CopySource = 7,
    CopyDest = 8,
    ResolveSource = 9,
    ResolveDest = 10,
    ShadingRateSource = 11,
}

bitflags! {
    /// `D3D12_RESOURCE_STATES`, used without enhanced barriers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Dx12ResourceStates: u32 {
        const COMMON = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
        const RESOLVE_DEST = 0x1000;
        const RESOLVE_SOURCE = 0x2000;
        const RAYTRACING_ACCELERATION_STRUCTURE = 0x40_0000;
        const SHADING_RATE_SOURCE = 0x100_0000;
        const ALL_SHADER_RESOURCE = 0xC0;
    }
}

pub fn to_sync(stages: BarrierSyncStages) -> Dx12BarrierSync {
    if stages.contains(BarrierSyncStages::ALL) {
        return Dx12BarrierSync::ALL;
    }

    let table = [
        (BarrierSyncStages::EXECUTE_INDIRECT, Dx12BarrierSync::EXECUTE_INDIRECT),
        (
            BarrierSyncStages::INDEX_INPUT_ASSEMBLY | BarrierSyncStages::VERTEX_INPUT_ASSEMBLY,
            Dx12BarrierSync::INDEX_INPUT,
        ),
        (BarrierSyncStages::VERTEX_SHADING, Dx12BarrierSync::VERTEX_SHADING),
        (BarrierSyncStages::FRAGMENT_SHADING, Dx12BarrierSync::PIXEL_SHADING),
        (BarrierSyncStages::COLOR_BLENDING, Dx12BarrierSync::RENDER_TARGET),
        (BarrierSyncStages::DEPTH_STENCIL_TESTING, Dx12BarrierSync::DEPTH_STENCIL),
        (BarrierSyncStages::TRANSFER, Dx12BarrierSync::COPY),
        (BarrierSyncStages::MULTI_SAMPLE_RESOLVE, Dx12BarrierSync::RESOLVE),
        (BarrierSyncStages::COMPUTE_SHADING, Dx12BarrierSync::COMPUTE_SHADING),
        (BarrierSyncStages::ALL_SHADING, Dx12BarrierSync::ALL_SHADING),
        (BarrierSyncStages::RAYTRACING, Dx12BarrierSync::RAYTRACING),
        (
            BarrierSyncStages::ACCELERATION_STRUCTURE_BUILD,
            Dx12BarrierSync::BUILD_RAYTRACING_ACCELERATION_STRUCTURE,
        ),
        (
            BarrierSyncStages::ACCELERATION_STRUCTURE_COPY,
            Dx12BarrierSync::COPY_RAYTRACING_ACCELERATION_STRUCTURE,
        ),
    ];

    table
        .iter()
        .filter(|(neutral, _)| stages.intersects(*neutral))
        .fold(Dx12BarrierSync::NONE, |acc, (_, dx)| acc | *dx)
}

pub fn to_access(access: BarrierAccess) -> Dx12BarrierAccess {
    if access.is_empty() || access == BarrierAccess::NONE {
        return Dx12BarrierAccess::NO_ACCESS;
    }
    if access.intersects(BarrierAccess::ALL) {
        return Dx12BarrierAccess::COMMON;
    }

    let table = [
        (BarrierAccess::VERTEX_BUFFER, Dx12BarrierAccess::VERTEX_BUFFER),
        (BarrierAccess::INDEX_BUFFER, Dx12BarrierAccess::INDEX_BUFFER),
        (BarrierAccess::CONSTANT_BUFFER, Dx12BarrierAccess::CONSTANT_BUFFER),
        (BarrierAccess::INDIRECT_BUFFER, Dx12BarrierAccess::INDIRECT_ARGUMENT),
        (BarrierAccess::COLOR_ATTACHMENT, Dx12BarrierAccess::RENDER_TARGET),
        (BarrierAccess::DEPTH_STENCIL_READ, Dx12BarrierAccess::DEPTH_STENCIL_READ),
        (BarrierAccess::DEPTH_STENCIL_WRITE, Dx12BarrierAccess::DEPTH_STENCIL_WRITE),
        (BarrierAccess::SHADER_RESOURCE, Dx12BarrierAccess::SHADER_RESOURCE),
        (BarrierAccess::UNORDERED_ACCESS, Dx12BarrierAccess::UNORDERED_ACCESS),
        (BarrierAccess::RESOLVE_SRC, Dx12BarrierAccess::RESOLVE_SOURCE),
        (BarrierAccess::RESOLVE_DST, Dx12BarrierAccess::RESOLVE_DEST),
        (BarrierAccess::TRANSFER_SRC, Dx12BarrierAccess::COPY_SOURCE),
        (BarrierAccess::TRANSFER_DST, Dx12BarrierAccess::COPY_DEST),
        (
            BarrierAccess::ACCELERATION_STRUCTURE_READ,
            Dx12BarrierAccess::RAYTRACING_ACCELERATION_STRUCTURE_READ,
        ),
        (
            BarrierAccess::ACCELERATION_STRUCTURE_WRITE,
            Dx12BarrierAccess::RAYTRACING_ACCELERATION_STRUCTURE_WRITE,
        ),
        (BarrierAccess::SHADING_RATE, Dx12BarrierAccess::SHADING_RATE_SOURCE),
    ];

    table
        .iter()
        .filter(|(neutral, _)| access.intersects(*neutral))
        .fold(Dx12BarrierAccess::COMMON, |acc, (_, dx)| acc | *dx)
}

pub fn to_layout(layout: TextureLayout) -> Dx12BarrierLayout {
    match layout {
        TextureLayout::Unknown => Dx12BarrierLayout::Undefined,
        TextureLayout::Common | TextureLayout::Present => Dx12BarrierLayout::Common,
        TextureLayout::GenericRead => Dx12BarrierLayout::GenericRead,
        TextureLayout::ColorAttachment => Dx12BarrierLayout::RenderTarget,
        TextureLayout::DepthStencilAttachment => Dx12BarrierLayout::DepthStencilWrite,
        TextureLayout::DepthStencilReadOnly => Dx12BarrierLayout::DepthStencilRead,
        TextureLayout::UnorderedAccess => Dx12BarrierLayout::UnorderedAccess,
        TextureLayout::ShaderResource => Dx12BarrierLayout::ShaderResource,
        TextureLayout::TransferSrc => Dx12BarrierLayout::CopySource,
        TextureLayout::TransferDst => Dx12BarrierLayout::CopyDest,
        TextureLayout::ResolveSrc => Dx12BarrierLayout::ResolveSource,
        TextureLayout::ResolveDst => Dx12BarrierLayout::ResolveDest,
        TextureLayout::ShadingRate => Dx12BarrierLayout::ShadingRateSource,
    }
}

/// Legacy resource state implied by an access mask and a layout.
pub fn to_resource_state(access: BarrierAccess, layout: TextureLayout) -> Dx12ResourceStates {
    let access = to_access(access);
    if access == Dx12BarrierAccess::COMMON {
        return Dx12ResourceStates::COMMON;
    }

    let mut states = Dx12ResourceStates::COMMON;
    let mut add = |cond: bool, state: Dx12ResourceStates| {
        if cond {
            states |= state;
        }
    };

    add(
        access.intersects(Dx12BarrierAccess::VERTEX_BUFFER | Dx12BarrierAccess::CONSTANT_BUFFER),
        Dx12ResourceStates::VERTEX_AND_CONSTANT_BUFFER,
    );
    add(
        access.contains(Dx12BarrierAccess::INDEX_BUFFER),
        Dx12ResourceStates::INDEX_BUFFER,
    );
    add(
        layout == TextureLayout::ColorAttachment
            || access.contains(Dx12BarrierAccess::RENDER_TARGET),
        Dx12ResourceStates::RENDER_TARGET,
    );
    add(
        access.contains(Dx12BarrierAccess::UNORDERED_ACCESS)
            || layout == TextureLayout::UnorderedAccess,
        Dx12ResourceStates::UNORDERED_ACCESS,
    );
    add(
        layout == TextureLayout::DepthStencilAttachment
            || access.contains(Dx12BarrierAccess::DEPTH_STENCIL_WRITE),
        Dx12ResourceStates::DEPTH_WRITE,
    );
    add(
        layout == TextureLayout::DepthStencilReadOnly,
        Dx12ResourceStates::DEPTH_READ,
    );
    add(
        access.contains(Dx12BarrierAccess::SHADER_RESOURCE)
            || layout == TextureLayout::ShaderResource,
        Dx12ResourceStates::ALL_SHADER_RESOURCE,
    );
    add(
        access.contains(Dx12BarrierAccess::INDIRECT_ARGUMENT),
        Dx12ResourceStates::INDIRECT_ARGUMENT,
    );
    add(
        access.contains(Dx12BarrierAccess::COPY_SOURCE) || layout == TextureLayout::TransferSrc,
        Dx12ResourceStates::COPY_SOURCE,
    );
    add(
        access.contains(Dx12BarrierAccess::COPY_DEST) || layout == TextureLayout::TransferDst,
        Dx12ResourceStates::COPY_DEST,
    );
    add(
        access.contains(Dx12BarrierAccess::RESOLVE_SOURCE) || layout == TextureLayout::ResolveSrc,
        Dx12ResourceStates::RESOLVE_SOURCE,
    );
    add(
        access.contains(Dx12BarrierAccess::RESOLVE_DEST) || layout == TextureLayout::ResolveDst,
        Dx12ResourceStates::RESOLVE_DEST,
    );
    add(
        access.intersects(
            Dx12BarrierAccess::RAYTRACING_ACCELERATION_STRUCTURE_READ
                | Dx12BarrierAccess::RAYTRACING_ACCELERATION_STRUCTURE_WRITE,
        ),
        Dx12ResourceStates::RAYTRACING_ACCELERATION_STRUCTURE,
    );
    add(
        access.contains(Dx12BarrierAccess::SHADING_RATE_SOURCE),
        Dx12ResourceStates::SHADING_RATE_SOURCE,
    );

    states
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dx12GlobalBarrier {
    pub sync_before: Dx12BarrierSync,
    pub sync_after: Dx12BarrierSync,
    pub access_before: Dx12BarrierAccess,
    pub access_after: Dx12BarrierAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dx12BufferBarrier {
    pub sync_before: Dx12BarrierSync,
    pub sync_after: Dx12BarrierSync,
    pub access_before: Dx12BarrierAccess,
    pub access_after: Dx12BarrierAccess,
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

/// Mip, array and plane range of a texture barrier.
///
/// Counts of `u8::MAX` / `u16::MAX` mean "to the end"; the executor expands
/// them once it knows the texture's real extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dx12SubresourceRange {
    pub mip_start: u8,
    pub mip_count: u8,
    pub array_start: u16,
    pub array_count: u16,
    pub planes: TexturePlane,
}

impl Dx12SubresourceRange {
    fn of(barrier: &TextureMemoryBarrier) -> Self {
        Self {
            mip_start: barrier.mip_start,
            mip_count: barrier.mip_count,
            array_start: barrier.array_start,
            array_count: barrier.array_count,
            planes: barrier.planes,
        }
    }

    /// `D3D12CalcSubresource` for every subresource of the range.
    pub fn subresource_indices(&self, texture_mips: u8, texture_array_size: u16) -> Vec<u32> {
        let mip_end = if self.mip_count == u8::MAX {
            texture_mips
        } else {
            self.mip_start.saturating_add(self.mip_count).min(texture_mips)
        };
        let array_end = if self.array_count == u16::MAX {
            texture_array_size
        } else {
            self.array_start
                .saturating_add(self.array_count)
                .min(texture_array_size)
        };
        let plane_count = if self.planes.contains(TexturePlane::DEPTH | TexturePlane::STENCIL) {
            2
        } else {
            1
        };
        let plane_start = u32::from(self.planes == TexturePlane::STENCIL);

        let mips = u32::from(texture_mips);
        let slices = u32::from(texture_array_size);
        let mut indices = Vec::new();
        for plane in plane_start..plane_start + plane_count {
            for slice in self.array_start..array_end {
                for mip in self.mip_start..mip_end {
                    indices.push(u32::from(mip) + u32::from(slice) * mips + plane * mips * slices);
                }
            }
        }
        indices
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dx12TextureBarrier {
    pub sync_before: Dx12BarrierSync,
    pub sync_after: Dx12BarrierSync,
    pub access_before: Dx12BarrierAccess,
    pub access_after: Dx12BarrierAccess,
    pub layout_before: Dx12BarrierLayout,
    pub layout_after: Dx12BarrierLayout,
    pub texture: TextureHandle,
    pub range: Dx12SubresourceRange,
    /// Set when the source layout is unknown and the content may be thrown away.
    pub discard: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dx12ResourceRef {
    Buffer(BufferHandle),
    Texture {
        texture: TextureHandle,
        range: Dx12SubresourceRange,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dx12LegacyBarrier {
    Transition {
        resource: Dx12ResourceRef,
        before: Dx12ResourceStates,
        after: Dx12ResourceStates,
    },
    /// UAV barrier on one resource, or on every resource when `None`.
    Uav(Option<Dx12ResourceRef>),
}

/// Barrier groups ready for `ID3D12GraphicsCommandList7::Barrier`, or the
/// resource barrier list for `ResourceBarrier`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dx12Barriers {
    pub global: Vec<Dx12GlobalBarrier>,
    pub buffers: Vec<Dx12BufferBarrier>,
    pub textures: Vec<Dx12TextureBarrier>,
    pub legacy: Vec<Dx12LegacyBarrier>,
}

impl Dx12Barriers {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
            && self.buffers.is_empty()
            && self.textures.is_empty()
            && self.legacy.is_empty()
    }
}

pub fn translate(
    enhanced: bool,
    global: &[GlobalMemoryBarrier],
    buffers: &[BufferMemoryBarrier],
    textures: &[TextureMemoryBarrier],
) -> Dx12Barriers {
    if enhanced {
        translate_enhanced(global, buffers, textures)
    } else {
        translate_legacy(global, buffers, textures)
    }
}

fn translate_enhanced(
    global: &[GlobalMemoryBarrier],
    buffers: &[BufferMemoryBarrier],
    textures: &[TextureMemoryBarrier],
) -> Dx12Barriers {
    let mut out = Dx12Barriers::default();

    out.global = global
        .iter()
        .filter(|b| !is_redundant(b.stages_src, b.stages_dst, b.access_src, b.access_dst, None))
        .map(|b| Dx12GlobalBarrier {
            sync_before: to_sync(b.stages_src),
            sync_after: to_sync(b.stages_dst),
            access_before: to_access(b.access_src),
            access_after: to_access(b.access_dst),
        })
        .collect();

    out.buffers = buffers
        .iter()
        .filter(|b| !is_redundant(b.stages_src, b.stages_dst, b.access_src, b.access_dst, None))
        .map(|b| Dx12BufferBarrier {
            sync_before: to_sync(b.stages_src),
            sync_after: to_sync(b.stages_dst),
            access_before: to_access(b.access_src),
            access_after: to_access(b.access_dst),
            buffer: b.buffer,
            offset: b.offset,
            size: b.size,
        })
        .collect();

    out.textures = textures
        .iter()
        .filter(|b| {
            !is_redundant(
                b.stages_src,
                b.stages_dst,
                b.access_src,
                b.access_dst,
                Some((b.layout_src, b.layout_dst)),
            )
        })
        .map(|b| Dx12TextureBarrier {
            sync_before: to_sync(b.stages_src),
            sync_after: to_sync(b.stages_dst),
            access_before: to_access(b.access_src),
            access_after: to_access(b.access_dst),
            layout_before: to_layout(b.layout_src),
            layout_after: to_layout(b.layout_dst),
            texture: b.texture,
            range: Dx12SubresourceRange::of(b),
            discard: b.layout_src == TextureLayout::Unknown,
        })
        .collect();

    out
}

fn translate_legacy(
    global: &[GlobalMemoryBarrier],
    buffers: &[BufferMemoryBarrier],
    textures: &[TextureMemoryBarrier],
) -> Dx12Barriers {
    let mut legacy = Vec::new();
    let uav_to_uav = |src: BarrierAccess, dst: BarrierAccess| {
        src.contains(BarrierAccess::UNORDERED_ACCESS) && dst.contains(BarrierAccess::UNORDERED_ACCESS)
    };

    for b in textures {
        let resource = Dx12ResourceRef::Texture {
            texture: b.texture,
            range: Dx12SubresourceRange::of(b),
        };
        let before = to_resource_state(b.access_src, b.layout_src);
        let after = to_resource_state(b.access_dst, b.layout_dst);
        if before != after {
            legacy.push(Dx12LegacyBarrier::Transition {
                resource,
                before,
                after,
            });
        }
        if uav_to_uav(b.access_src, b.access_dst) {
            legacy.push(Dx12LegacyBarrier::Uav(Some(resource)));
        }
    }

    for b in buffers {
        let resource = Dx12ResourceRef::Buffer(b.buffer);
        let before = to_resource_state(b.access_src, TextureLayout::Common);
        let after = to_resource_state(b.access_dst, TextureLayout::Common);
        if before != after {
            legacy.push(Dx12LegacyBarrier::Transition {
                resource,
                before,
                after,
            });
        }
        if uav_to_uav(b.access_src, b.access_dst) {
            legacy.push(Dx12LegacyBarrier::Uav(Some(resource)));
        }
    }

    for b in global {
        if is_redundant(b.stages_src, b.stages_dst, b.access_src, b.access_dst, None) {
            continue;
        }
        if verglas_core::verify!(
            uav_to_uav(b.access_src, b.access_dst),
            "global memory barriers other than UAV to UAV need enhanced barriers"
        ) {
            legacy.push(Dx12LegacyBarrier::Uav(None));
        }
    }

    Dx12Barriers {
        legacy,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verglas_core::{DiagnosticCatcher, GenHandle};

    fn texture() -> TextureHandle {
        TextureHandle(GenHandle::new(3, 1))
    }

    fn buffer() -> BufferHandle {
        BufferHandle(GenHandle::new(1, 0))
    }

    #[test]
    fn test_sync_conversion() {
        assert_eq!(to_sync(BarrierSyncStages::NONE), Dx12BarrierSync::NONE);
        assert_eq!(
            to_sync(BarrierSyncStages::ALL | BarrierSyncStages::TRANSFER),
            Dx12BarrierSync::ALL
        );
        assert_eq!(
            to_sync(BarrierSyncStages::VERTEX_INPUT_ASSEMBLY | BarrierSyncStages::COLOR_BLENDING),
            Dx12BarrierSync::INDEX_INPUT | Dx12BarrierSync::RENDER_TARGET
        );
        assert_eq!(
            to_sync(BarrierSyncStages::ACCELERATION_STRUCTURE_COPY),
            Dx12BarrierSync::COPY_RAYTRACING_ACCELERATION_STRUCTURE
        );
    }

    #[test]
    fn test_access_conversion() {
        assert_eq!(to_access(BarrierAccess::NONE), Dx12BarrierAccess::NO_ACCESS);
        assert_eq!(to_access(BarrierAccess::ALL_READ), Dx12BarrierAccess::COMMON);
        assert_eq!(
            to_access(BarrierAccess::DEPTH_STENCIL_READ),
            Dx12BarrierAccess::DEPTH_STENCIL_READ
        );
        assert_eq!(
            to_access(BarrierAccess::DEPTH_STENCIL_WRITE),
            Dx12BarrierAccess::DEPTH_STENCIL_WRITE
        );
        assert_eq!(
            to_access(BarrierAccess::TRANSFER_SRC | BarrierAccess::INDIRECT_BUFFER),
            Dx12BarrierAccess::COPY_SOURCE | Dx12BarrierAccess::INDIRECT_ARGUMENT
        );
    }

    #[test]
    fn test_layout_conversion() {
        assert_eq!(to_layout(TextureLayout::Unknown), Dx12BarrierLayout::Undefined);
        assert_eq!(to_layout(TextureLayout::Present), Dx12BarrierLayout::Common);
        assert_eq!(to_layout(TextureLayout::Present) as u32, 0);
        assert_eq!(
            to_layout(TextureLayout::ShadingRate) as u32,
            Dx12BarrierLayout::ShadingRateSource as u32
        );
    }

    #[test]
    fn test_resource_state_from_layout() {
        assert_eq!(
            to_resource_state(BarrierAccess::COLOR_ATTACHMENT, TextureLayout::ColorAttachment),
            Dx12ResourceStates::RENDER_TARGET
        );
        assert_eq!(
            to_resource_state(BarrierAccess::SHADER_RESOURCE, TextureLayout::ShaderResource),
            Dx12ResourceStates::ALL_SHADER_RESOURCE
        );
        assert_eq!(
            to_resource_state(BarrierAccess::ALL_WRITE, TextureLayout::TransferDst),
            Dx12ResourceStates::COMMON
        );
    }

    #[test]
    fn test_enhanced_texture_transition() {
        let textures = [TextureMemoryBarrier::new(
            texture(),
            BarrierSyncStages::TRANSFER,
            BarrierSyncStages::FRAGMENT_SHADING,
            BarrierAccess::TRANSFER_DST,
            BarrierAccess::SHADER_RESOURCE,
        )
        .with_layouts(TextureLayout::TransferDst, TextureLayout::ShaderResource)];

        let out = translate(true, &[], &[], &textures);
        assert_eq!(out.textures.len(), 1);
        let barrier = out.textures[0];
        assert_eq!(barrier.sync_before, Dx12BarrierSync::COPY);
        assert_eq!(barrier.sync_after, Dx12BarrierSync::PIXEL_SHADING);
        assert_eq!(barrier.layout_before, Dx12BarrierLayout::CopyDest);
        assert_eq!(barrier.layout_after, Dx12BarrierLayout::ShaderResource);
        assert!(!barrier.discard);
        assert!(out.legacy.is_empty());
    }

    #[test]
    fn test_legacy_uav_barriers() {
        let buffers = [BufferMemoryBarrier::new(
            buffer(),
            BarrierSyncStages::COMPUTE_SHADING,
            BarrierSyncStages::COMPUTE_SHADING,
            BarrierAccess::UNORDERED_ACCESS,
            BarrierAccess::UNORDERED_ACCESS,
        )];
        let out = translate(false, &[], &buffers, &[]);
        // same state both sides: only the UAV barrier remains
        assert_eq!(
            out.legacy,
            vec![Dx12LegacyBarrier::Uav(Some(Dx12ResourceRef::Buffer(buffer())))]
        );
    }

    #[test]
    fn test_legacy_non_uav_global_barrier_reports() {
        let catcher = DiagnosticCatcher::new();
        let global = [GlobalMemoryBarrier::new(
            BarrierSyncStages::TRANSFER,
            BarrierSyncStages::COMPUTE_SHADING,
            BarrierAccess::TRANSFER_DST,
            BarrierAccess::SHADER_RESOURCE,
        )];
        let out = translate(false, &global, &[], &[]);
        assert!(out.is_empty());
        catcher.expect_count(1);
    }

    #[test]
    fn test_subresource_indices() {
        let range = Dx12SubresourceRange {
            mip_start: 1,
            mip_count: u8::MAX,
            array_start: 0,
            array_count: 2,
            planes: TexturePlane::COLOR,
        };
        assert_eq!(range.subresource_indices(3, 2), vec![1, 2, 4, 5]);

        let stencil = Dx12SubresourceRange {
            mip_start: 0,
            mip_count: 1,
            array_start: 0,
            array_count: 1,
            planes: TexturePlane::STENCIL,
        };
        assert_eq!(stencil.subresource_indices(1, 1), vec![1]);
    }
}
