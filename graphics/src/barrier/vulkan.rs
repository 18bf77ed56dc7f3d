//! Vulkan barrier lowering.
//!
//! Records are built with the `synchronization2` flag types. Devices without
//! `synchronization2` get the same records with stages that only exist in
//! the 64-bit flag space widened, and the executor narrows them with
//! [`to_legacy_stages`] / [`to_legacy_access`] before `vkCmdPipelineBarrier`.

use ash::vk;

use super::{
    BarrierAccess, BarrierSyncStages, BufferMemoryBarrier, GlobalMemoryBarrier,
    TextureMemoryBarrier, is_redundant,
};
use crate::handles::{BufferHandle, TextureHandle};
use crate::types::{TextureLayout, TexturePlane};

/// Which side of the barrier a stage mask belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierSide {
    Src,
    Dst,
}

pub fn to_stages(stages: BarrierSyncStages, side: BarrierSide) -> vk::PipelineStageFlags2 {
    if stages.is_empty() || stages == BarrierSyncStages::NONE {
        return match side {
            BarrierSide::Src => vk::PipelineStageFlags2::TOP_OF_PIPE,
            BarrierSide::Dst => vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        };
    }
    if stages.contains(BarrierSyncStages::ALL) {
        return vk::PipelineStageFlags2::ALL_COMMANDS;
    }

    let all_shading = stages.contains(BarrierSyncStages::ALL_SHADING);
    let mut flags = vk::PipelineStageFlags2::NONE;

    if stages.contains(BarrierSyncStages::EXECUTE_INDIRECT) {
        flags |= vk::PipelineStageFlags2::DRAW_INDIRECT;
    }
    if stages.intersects(
        BarrierSyncStages::INDEX_INPUT_ASSEMBLY | BarrierSyncStages::VERTEX_INPUT_ASSEMBLY,
    ) {
        flags |= vk::PipelineStageFlags2::VERTEX_INPUT;
    }
    if all_shading || stages.contains(BarrierSyncStages::VERTEX_SHADING) {
        flags |= vk::PipelineStageFlags2::VERTEX_SHADER
            | vk::PipelineStageFlags2::GEOMETRY_SHADER
            | vk::PipelineStageFlags2::TESSELLATION_EVALUATION_SHADER
            | vk::PipelineStageFlags2::TESSELLATION_CONTROL_SHADER
            | vk::PipelineStageFlags2::TASK_SHADER_EXT
            | vk::PipelineStageFlags2::MESH_SHADER_EXT;
    }
    if all_shading || stages.contains(BarrierSyncStages::FRAGMENT_SHADING) {
        flags |= vk::PipelineStageFlags2::FRAGMENT_SHADER;
    }
    if stages.intersects(BarrierSyncStages::COLOR_BLENDING | BarrierSyncStages::MULTI_SAMPLE_RESOLVE)
    {
        flags |= vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT;
    }
    if stages.contains(BarrierSyncStages::DEPTH_STENCIL_TESTING) {
        flags |= vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS;
    }
    if stages.contains(BarrierSyncStages::TRANSFER) {
        flags |= vk::PipelineStageFlags2::ALL_TRANSFER;
    }
    if all_shading || stages.contains(BarrierSyncStages::COMPUTE_SHADING) {
        flags |= vk::PipelineStageFlags2::COMPUTE_SHADER;
    }
    if all_shading || stages.contains(BarrierSyncStages::RAYTRACING) {
        flags |= vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR;
    }
    if stages.contains(BarrierSyncStages::ACCELERATION_STRUCTURE_BUILD) {
        flags |= vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR;
    }
    if stages.contains(BarrierSyncStages::ACCELERATION_STRUCTURE_COPY) {
        flags |= vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_COPY_KHR;
    }

    flags
}

pub fn to_access(access: BarrierAccess) -> vk::AccessFlags2 {
    if access.is_empty() || access == BarrierAccess::NONE {
        return vk::AccessFlags2::NONE;
    }

    let table = [
        (BarrierAccess::VERTEX_BUFFER, vk::AccessFlags2::VERTEX_ATTRIBUTE_READ),
        (BarrierAccess::INDEX_BUFFER, vk::AccessFlags2::INDEX_READ),
        (BarrierAccess::CONSTANT_BUFFER, vk::AccessFlags2::UNIFORM_READ),
        (BarrierAccess::INDIRECT_BUFFER, vk::AccessFlags2::INDIRECT_COMMAND_READ),
        (BarrierAccess::COLOR_ATTACHMENT, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE),
        (
            BarrierAccess::DEPTH_STENCIL_READ,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
        ),
        (
            BarrierAccess::DEPTH_STENCIL_WRITE,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        (BarrierAccess::SHADER_RESOURCE, vk::AccessFlags2::SHADER_READ),
        (BarrierAccess::UNORDERED_ACCESS, vk::AccessFlags2::SHADER_WRITE),
        (BarrierAccess::RESOLVE_SRC, vk::AccessFlags2::COLOR_ATTACHMENT_READ),
        (BarrierAccess::RESOLVE_DST, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE),
        (BarrierAccess::TRANSFER_SRC, vk::AccessFlags2::TRANSFER_READ),
        (BarrierAccess::TRANSFER_DST, vk::AccessFlags2::TRANSFER_WRITE),
        (
            BarrierAccess::ACCELERATION_STRUCTURE_READ,
            vk::AccessFlags2::ACCELERATION_STRUCTURE_READ_KHR,
        ),
        (
            BarrierAccess::ACCELERATION_STRUCTURE_WRITE,
            vk::AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR,
        ),
        (
            BarrierAccess::SHADING_RATE,
            vk::AccessFlags2::FRAGMENT_SHADING_RATE_ATTACHMENT_READ_KHR,
        ),
        (BarrierAccess::ALL_READ, vk::AccessFlags2::MEMORY_READ),
        (BarrierAccess::ALL_WRITE, vk::AccessFlags2::MEMORY_WRITE),
    ];

    table
        .iter()
        .filter(|(neutral, _)| access.intersects(*neutral))
        .fold(vk::AccessFlags2::NONE, |acc, (_, vk_access)| acc | *vk_access)
}

pub fn to_layout(layout: TextureLayout, synchronization2: bool) -> vk::ImageLayout {
    match layout {
        TextureLayout::Unknown => vk::ImageLayout::UNDEFINED,
        TextureLayout::Common | TextureLayout::UnorderedAccess => vk::ImageLayout::GENERAL,
        TextureLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        TextureLayout::GenericRead if synchronization2 => vk::ImageLayout::READ_ONLY_OPTIMAL,
        TextureLayout::GenericRead => vk::ImageLayout::GENERAL,
        TextureLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        TextureLayout::DepthStencilAttachment => {
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        }
        TextureLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        TextureLayout::ShaderResource => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        TextureLayout::TransferSrc | TextureLayout::ResolveSrc => {
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL
        }
        TextureLayout::TransferDst | TextureLayout::ResolveDst => {
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        }
        TextureLayout::ShadingRate => vk::ImageLayout::FRAGMENT_SHADING_RATE_ATTACHMENT_OPTIMAL_KHR,
    }
}

pub fn to_aspect(planes: TexturePlane) -> vk::ImageAspectFlags {
    let mut aspect = vk::ImageAspectFlags::empty();
    if planes.contains(TexturePlane::COLOR) {
        aspect |= vk::ImageAspectFlags::COLOR;
    }
    if planes.contains(TexturePlane::DEPTH) {
        aspect |= vk::ImageAspectFlags::DEPTH;
    }
    if planes.contains(TexturePlane::STENCIL) {
        aspect |= vk::ImageAspectFlags::STENCIL;
    }
    aspect
}

/// Narrow a stage mask to `VkPipelineStageFlags`.
///
/// Stages that only exist in the 64-bit space become `ALL_COMMANDS`.
pub fn to_legacy_stages(stages: vk::PipelineStageFlags2) -> vk::PipelineStageFlags {
    let raw = stages.as_raw();
    let widened = raw > u64::from(u32::MAX)
        || stages.contains(vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_COPY_KHR);
    if widened {
        log::debug!("widening stage mask {stages:?} to ALL_COMMANDS without synchronization2");
        return vk::PipelineStageFlags::ALL_COMMANDS;
    }
    vk::PipelineStageFlags::from_raw(raw as u32)
}

pub fn to_legacy_access(access: vk::AccessFlags2) -> vk::AccessFlags {
    let raw = access.as_raw();
    if raw > u64::from(u32::MAX) {
        log::debug!("widening access mask {access:?} without synchronization2");
        let mut legacy = vk::AccessFlags::empty();
        if access.intersects(vk::AccessFlags2::SHADER_SAMPLED_READ | vk::AccessFlags2::SHADER_STORAGE_READ) {
            legacy |= vk::AccessFlags::SHADER_READ;
        }
        if access.contains(vk::AccessFlags2::SHADER_STORAGE_WRITE) {
            legacy |= vk::AccessFlags::SHADER_WRITE;
        }
        return legacy | vk::AccessFlags::from_raw((raw & u64::from(u32::MAX)) as u32);
    }
    vk::AccessFlags::from_raw(raw as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanMemoryBarrier {
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanBufferBarrier {
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
    pub buffer: BufferHandle,
    pub offset: u64,
    /// `vk::WHOLE_SIZE` covers the rest of the buffer.
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanImageBarrier {
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub texture: TextureHandle,
    pub aspect: vk::ImageAspectFlags,
    pub base_mip: u32,
    /// `vk::REMAINING_MIP_LEVELS` covers the remaining mips.
    pub mip_count: u32,
    pub base_layer: u32,
    /// `vk::REMAINING_ARRAY_LAYERS` covers the remaining layers.
    pub layer_count: u32,
}

impl VulkanImageBarrier {
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: self.base_mip,
            level_count: self.mip_count,
            base_array_layer: self.base_layer,
            layer_count: self.layer_count,
        }
    }
}

/// Barriers ready for `vkCmdPipelineBarrier2`, or for `vkCmdPipelineBarrier`
/// when `synchronization2` is false.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VulkanBarriers {
    pub synchronization2: bool,
    pub memory: Vec<VulkanMemoryBarrier>,
    pub buffers: Vec<VulkanBufferBarrier>,
    pub images: Vec<VulkanImageBarrier>,
}

impl VulkanBarriers {
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty() && self.buffers.is_empty() && self.images.is_empty()
    }

    /// Union of all stage masks, for the single `vkCmdPipelineBarrier` call.
    pub fn legacy_stage_masks(&self) -> (vk::PipelineStageFlags, vk::PipelineStageFlags) {
        let mut src = vk::PipelineStageFlags2::NONE;
        let mut dst = vk::PipelineStageFlags2::NONE;
        for (s, d) in self
            .memory
            .iter()
            .map(|b| (b.src_stage, b.dst_stage))
            .chain(self.buffers.iter().map(|b| (b.src_stage, b.dst_stage)))
            .chain(self.images.iter().map(|b| (b.src_stage, b.dst_stage)))
        {
            src |= s;
            dst |= d;
        }
        if src == vk::PipelineStageFlags2::NONE {
            src = vk::PipelineStageFlags2::TOP_OF_PIPE;
        }
        if dst == vk::PipelineStageFlags2::NONE {
            dst = vk::PipelineStageFlags2::BOTTOM_OF_PIPE;
        }
        (to_legacy_stages(src), to_legacy_stages(dst))
    }
}

fn widen_for_device(stages: vk::PipelineStageFlags2, synchronization2: bool) -> vk::PipelineStageFlags2 {
    if synchronization2 {
        stages
    } else if stages.contains(vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_COPY_KHR) {
        log::debug!("acceleration structure copy stage widened to ALL_COMMANDS");
        vk::PipelineStageFlags2::ALL_COMMANDS
    } else {
        stages
    }
}

pub fn translate(
    synchronization2: bool,
    global: &[GlobalMemoryBarrier],
    buffers: &[BufferMemoryBarrier],
    textures: &[TextureMemoryBarrier],
) -> VulkanBarriers {
    let stages = |s: BarrierSyncStages, side: BarrierSide| {
        widen_for_device(to_stages(s, side), synchronization2)
    };

    let memory = global
        .iter()
        .filter(|b| !is_redundant(b.stages_src, b.stages_dst, b.access_src, b.access_dst, None))
        .map(|b| VulkanMemoryBarrier {
            src_stage: stages(b.stages_src, BarrierSide::Src),
            dst_stage: stages(b.stages_dst, BarrierSide::Dst),
            src_access: to_access(b.access_src),
            dst_access: to_access(b.access_dst),
        })
        .collect();

    let buffers = buffers
        .iter()
        .filter(|b| !is_redundant(b.stages_src, b.stages_dst, b.access_src, b.access_dst, None))
        .map(|b| VulkanBufferBarrier {
            src_stage: stages(b.stages_src, BarrierSide::Src),
            dst_stage: stages(b.stages_dst, BarrierSide::Dst),
            src_access: to_access(b.access_src),
            dst_access: to_access(b.access_dst),
            buffer: b.buffer,
            offset: b.offset,
            size: if b.size == u64::MAX { vk::WHOLE_SIZE } else { b.size },
        })
        .collect();

    let images = textures
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
        .map(|b| VulkanImageBarrier {
            src_stage: stages(b.stages_src, BarrierSide::Src),
            dst_stage: stages(b.stages_dst, BarrierSide::Dst),
            src_access: to_access(b.access_src),
            dst_access: to_access(b.access_dst),
            old_layout: to_layout(b.layout_src, synchronization2),
            new_layout: to_layout(b.layout_dst, synchronization2),
            texture: b.texture,
            aspect: to_aspect(b.planes),
            base_mip: u32::from(b.mip_start),
            mip_count: if b.mip_count == u8::MAX {
                vk::REMAINING_MIP_LEVELS
            } else {
                u32::from(b.mip_count)
            },
            base_layer: u32::from(b.array_start),
            layer_count: if b.array_count == u16::MAX {
                vk::REMAINING_ARRAY_LAYERS
            } else {
                u32::from(b.array_count)
            },
        })
        .collect();

    VulkanBarriers {
        synchronization2,
        memory,
        buffers,
        images,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verglas_core::GenHandle;

    #[test]
    fn test_none_stage_depends_on_side() {
        assert_eq!(
            to_stages(BarrierSyncStages::NONE, BarrierSide::Src),
            vk::PipelineStageFlags2::TOP_OF_PIPE
        );
        assert_eq!(
            to_stages(BarrierSyncStages::NONE, BarrierSide::Dst),
            vk::PipelineStageFlags2::BOTTOM_OF_PIPE
        );
    }

    #[test]
    fn test_stage_conversion() {
        let flags = to_stages(
            BarrierSyncStages::DEPTH_STENCIL_TESTING | BarrierSyncStages::MULTI_SAMPLE_RESOLVE,
            BarrierSide::Dst,
        );
        assert_eq!(
            flags,
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS
                | vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT
        );

        let all_shading = to_stages(BarrierSyncStages::ALL_SHADING, BarrierSide::Src);
        assert!(all_shading.contains(vk::PipelineStageFlags2::MESH_SHADER_EXT));
        assert!(all_shading.contains(vk::PipelineStageFlags2::COMPUTE_SHADER));
        assert!(all_shading.contains(vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR));
    }

    #[test]
    fn test_access_conversion() {
        assert_eq!(
            to_access(BarrierAccess::RESOLVE_SRC | BarrierAccess::TRANSFER_DST),
            vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::TRANSFER_WRITE
        );
        assert_eq!(to_access(BarrierAccess::ALL), vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE);
        assert_eq!(to_access(BarrierAccess::NONE), vk::AccessFlags2::NONE);
        assert_ne!(
            to_access(BarrierAccess::DEPTH_STENCIL_READ),
            to_access(BarrierAccess::DEPTH_STENCIL_WRITE)
        );
    }

    #[test]
    fn test_generic_read_layout() {
        assert_eq!(
            to_layout(TextureLayout::GenericRead, true),
            vk::ImageLayout::READ_ONLY_OPTIMAL
        );
        assert_eq!(to_layout(TextureLayout::GenericRead, false), vk::ImageLayout::GENERAL);
    }

    #[test]
    fn test_acceleration_structure_copy_widens_without_sync2() {
        let global = [GlobalMemoryBarrier::new(
            BarrierSyncStages::ACCELERATION_STRUCTURE_COPY,
            BarrierSyncStages::RAYTRACING,
            BarrierAccess::ACCELERATION_STRUCTURE_WRITE,
            BarrierAccess::ACCELERATION_STRUCTURE_READ,
        )];

        let modern = translate(true, &global, &[], &[]);
        assert_eq!(
            modern.memory[0].src_stage,
            vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_COPY_KHR
        );

        let legacy = translate(false, &global, &[], &[]);
        assert_eq!(legacy.memory[0].src_stage, vk::PipelineStageFlags2::ALL_COMMANDS);
        let (src, dst) = legacy.legacy_stage_masks();
        assert_eq!(src, vk::PipelineStageFlags::ALL_COMMANDS);
        assert_eq!(dst, vk::PipelineStageFlags::RAY_TRACING_SHADER_KHR);
    }

    #[test]
    fn test_image_barrier_ranges() {
        let textures = [TextureMemoryBarrier::new(
            TextureHandle(GenHandle::new(2, 0)),
            BarrierSyncStages::NONE,
            BarrierSyncStages::DEPTH_STENCIL_TESTING,
            BarrierAccess::NONE,
            BarrierAccess::DEPTH_STENCIL_WRITE,
        )
        .with_layouts(TextureLayout::Unknown, TextureLayout::DepthStencilAttachment)
        .with_planes(TexturePlane::DEPTH | TexturePlane::STENCIL)
        .with_mips(0, u8::MAX)];

        let out = translate(true, &[], &[], &textures);
        let image = out.images[0];
        assert_eq!(image.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(image.new_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert_eq!(
            image.aspect,
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(image.mip_count, vk::REMAINING_MIP_LEVELS);
        assert_eq!(image.src_stage, vk::PipelineStageFlags2::TOP_OF_PIPE);
    }

    #[test]
    fn test_buffer_whole_size() {
        let buffers = [BufferMemoryBarrier::new(
            BufferHandle(GenHandle::new(0, 0)),
            BarrierSyncStages::TRANSFER,
            BarrierSyncStages::VERTEX_INPUT_ASSEMBLY,
            BarrierAccess::TRANSFER_DST,
            BarrierAccess::VERTEX_BUFFER,
        )];
        let out = translate(true, &[], &buffers, &[]);
        assert_eq!(out.buffers[0].size, vk::WHOLE_SIZE);
        assert_eq!(out.buffers[0].dst_access, vk::AccessFlags2::VERTEX_ATTRIBUTE_READ);
    }
}
