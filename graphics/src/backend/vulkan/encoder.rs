//! Lowering of recorded command lists into a Vulkan command buffer.
//!
//! Handles are resolved through the registry while encoding; an unknown
//! handle is reported and the command skipped, the rest of the frame still
//! runs. Render passes use dynamic rendering and transition their
//! attachments from the declared initial layout and back to the final one.

use ash::vk;
use verglas_core::report_error;

use crate::barrier::TranslatedBarriers;
use crate::barrier::vulkan::{VulkanBarriers, to_aspect, to_layout, to_legacy_access};
use crate::command::{BindPoint, Command};
use crate::descriptor::{DescriptorBindingType, DescriptorData};
use crate::handles::{BufferHandle, DescriptorSetHandle, PipelineLayoutHandle, TextureHandle};
use crate::registry::Registry;
use crate::types::{RenderPassDesc, SubResourceIndexing, TextureLayout, TextureMemoryFootprint};

use super::conversion::{convert_index_format, convert_load_op, convert_store_op};
use super::device::DeviceFeatures;
use super::resources::{VulkanDescriptorSet, VulkanTextureView};

fn bind_point(point: BindPoint) -> vk::PipelineBindPoint {
    match point {
        BindPoint::Graphics => vk::PipelineBindPoint::GRAPHICS,
        BindPoint::Compute => vk::PipelineBindPoint::COMPUTE,
    }
}

/// `READ_ONLY_OPTIMAL` needs synchronization2; older devices read in `GENERAL`.
pub(super) fn device_layout(layout: vk::ImageLayout, synchronization2: bool) -> vk::ImageLayout {
    if !synchronization2 && layout == vk::ImageLayout::READ_ONLY_OPTIMAL {
        vk::ImageLayout::GENERAL
    } else {
        layout
    }
}

/// Texel row length of a staging footprint, `None` when the pitch is not a
/// whole number of texels.
pub(super) fn row_length(footprint: &TextureMemoryFootprint) -> Option<u32> {
    let bpp = footprint.format.bytes_per_pixel();
    if bpp == 0 || footprint.line_byte_aligned_size % bpp != 0 {
        return None;
    }
    Some(footprint.line_byte_aligned_size / bpp)
}

fn copy_layers(sub_resource: &SubResourceIndexing) -> vk::ImageSubresourceLayers {
    let aspect = to_aspect(sub_resource.plane_slice);
    vk::ImageSubresourceLayers {
        aspect_mask: if aspect.is_empty() {
            vk::ImageAspectFlags::COLOR
        } else {
            aspect
        },
        mip_level: u32::from(sub_resource.mip_index),
        base_array_layer: u32::from(sub_resource.array_slice),
        layer_count: 1,
    }
}

/// A layout change owed once the current render pass ends.
#[derive(Debug, Clone, Copy)]
struct PendingTransition {
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    from: vk::ImageLayout,
    to: vk::ImageLayout,
}

pub(super) struct Encoder<'a> {
    pub device: &'a ash::Device,
    pub dynamic_rendering: Option<&'a ash::khr::dynamic_rendering::Device>,
    pub features: &'a DeviceFeatures,
    pub registry: &'a Registry,
    pub command_buffer: vk::CommandBuffer,
    pub frame_index: usize,
    pub queries: Option<vk::QueryPool>,
    end_of_pass: Vec<PendingTransition>,
    in_render_pass: bool,
}

impl<'a> Encoder<'a> {
    pub fn new(
        device: &'a ash::Device,
        dynamic_rendering: Option<&'a ash::khr::dynamic_rendering::Device>,
        features: &'a DeviceFeatures,
        registry: &'a Registry,
        command_buffer: vk::CommandBuffer,
        frame_index: usize,
        queries: Option<vk::QueryPool>,
    ) -> Self {
        Self {
            device,
            dynamic_rendering,
            features,
            registry,
            command_buffer,
            frame_index,
            queries,
            end_of_pass: Vec::new(),
            in_render_pass: false,
        }
    }

    fn buffer(&self, handle: BufferHandle) -> Option<vk::Buffer> {
        let buffer = self
            .registry
            .buffer(handle)
            .and_then(|b| b.native.as_vulkan())
            .map(|b| b.buffer);
        if buffer.is_none() {
            report_error!("Submitted list refers to unknown buffer {:?}", handle);
        }
        buffer
    }

    fn image(&self, handle: TextureHandle) -> Option<vk::Image> {
        let image = self
            .registry
            .texture(handle)
            .and_then(|t| t.native.as_vulkan())
            .map(|t| t.image);
        if image.is_none() {
            report_error!("Submitted list refers to unknown texture {:?}", handle);
        }
        image
    }

    fn pipeline_layout(&self, handle: PipelineLayoutHandle) -> Option<&'a super::VulkanPipelineLayout> {
        let layout = self
            .registry
            .pipeline_layout(handle)
            .and_then(|l| l.native.as_vulkan());
        if layout.is_none() {
            report_error!("Submitted list refers to unknown pipeline layout {:?}", handle);
        }
        layout
    }

    /// Conservative full pipeline barrier for attachment layout changes.
    fn transition(&self, image: vk::Image, range: vk::ImageSubresourceRange, from: vk::ImageLayout, to: vk::ImageLayout) {
        if from == to {
            return;
        }
        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
            .old_layout(from)
            .new_layout(to)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(range);
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            )
        };
    }

    fn layout(&self, layout: TextureLayout) -> vk::ImageLayout {
        let sync2 = self.features.synchronization2;
        device_layout(to_layout(layout, sync2), sync2)
    }

    /// Layout change into `attachment_layout`, and the one owed at the end.
    fn prepare_attachment(
        &mut self,
        view: &VulkanTextureView,
        initial: TextureLayout,
        final_layout: TextureLayout,
        attachment_layout: vk::ImageLayout,
    ) {
        self.transition(view.image, view.range, self.layout(initial), attachment_layout);
        if final_layout != TextureLayout::Unknown {
            let to = self.layout(final_layout);
            self.end_of_pass.push(PendingTransition {
                image: view.image,
                range: view.range,
                from: attachment_layout,
                to,
            });
        }
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDesc) {
        self.end_of_pass.clear();
        let mut render_area = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        let mut colors = Vec::with_capacity(desc.color_attachments.len());
        for attachment in &desc.color_attachments {
            let Some(view) = self
                .registry
                .render_target_view(attachment.rtv)
                .and_then(|v| v.native.as_vulkan())
            else {
                report_error!("Render pass refers to unknown view {:?}", attachment.rtv);
                return;
            };
            let layout = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
            self.prepare_attachment(view, attachment.initial_layout, attachment.final_layout, layout);
            render_area.width = render_area.width.min(view.extent.width);
            render_area.height = render_area.height.min(view.extent.height);
            colors.push(
                vk::RenderingAttachmentInfo::default()
                    .image_view(view.view)
                    .image_layout(layout)
                    .load_op(convert_load_op(attachment.load_op))
                    .store_op(convert_store_op(attachment.store_op))
                    .clear_value(vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: attachment.clear_color,
                        },
                    }),
            );
        }

        let mut depth = None;
        let mut stencil = None;
        if let Some(attachment) = &desc.depth_stencil_attachment {
            let Some(view) = self
                .registry
                .render_target_view(attachment.rtv)
                .and_then(|v| v.native.as_vulkan())
            else {
                report_error!("Render pass refers to unknown view {:?}", attachment.rtv);
                return;
            };
            let layout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
            self.prepare_attachment(view, attachment.initial_layout, attachment.final_layout, layout);
            render_area.width = render_area.width.min(view.extent.width);
            render_area.height = render_area.height.min(view.extent.height);
            let clear = vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: attachment.clear_depth,
                    stencil: u32::from(attachment.clear_stencil),
                },
            };
            depth = Some(
                vk::RenderingAttachmentInfo::default()
                    .image_view(view.view)
                    .image_layout(layout)
                    .load_op(convert_load_op(attachment.load_op))
                    .store_op(convert_store_op(attachment.store_op))
                    .clear_value(clear),
            );
            if view.range.aspect_mask.contains(vk::ImageAspectFlags::STENCIL) {
                stencil = Some(
                    vk::RenderingAttachmentInfo::default()
                        .image_view(view.view)
                        .image_layout(layout)
                        .load_op(convert_load_op(attachment.stencil_load_op))
                        .store_op(convert_store_op(attachment.stencil_store_op))
                        .clear_value(clear),
                );
            }
        }

        if render_area.width == u32::MAX {
            render_area = vk::Extent2D::default();
        }
        let mut info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: render_area,
            })
            .layer_count(1)
            .color_attachments(&colors);
        if let Some(depth) = depth.as_ref() {
            info = info.depth_attachment(depth);
        }
        if let Some(stencil) = stencil.as_ref() {
            info = info.stencil_attachment(stencil);
        }

        unsafe {
            match self.dynamic_rendering {
                Some(khr) => khr.cmd_begin_rendering(self.command_buffer, &info),
                None => self.device.cmd_begin_rendering(self.command_buffer, &info),
            }
        }
        self.in_render_pass = true;
    }

    fn end_render_pass(&mut self) {
        if !self.in_render_pass {
            return;
        }
        unsafe {
            match self.dynamic_rendering {
                Some(khr) => khr.cmd_end_rendering(self.command_buffer),
                None => self.device.cmd_end_rendering(self.command_buffer),
            }
        }
        self.in_render_pass = false;
        for pending in std::mem::take(&mut self.end_of_pass) {
            self.transition(pending.image, pending.range, pending.from, pending.to);
        }
    }

    fn write_descriptor_set(&self, handle: DescriptorSetHandle, set: &VulkanDescriptorSet) -> Option<vk::DescriptorSet> {
        let entry = self.registry.descriptor_set(handle)?;
        let native = *set.frames.get(self.frame_index)?;
        let snapshot = entry.storage.snapshot(self.frame_index)?;
        {
            let written = set.written.lock();
            if written.get(self.frame_index).copied().flatten() == Some(snapshot.version) {
                return Some(native);
            }
        }

        enum Info {
            Buffer(vk::DescriptorBufferInfo),
            Image(vk::DescriptorImageInfo),
        }
        let mut infos: Vec<(u32, u32, vk::DescriptorType, Info)> = Vec::new();
        for (packed, native_binding) in entry.info.bindings.iter().zip(&set.layout.inner.bindings) {
            for element in 0..packed.desc.count {
                let flat = entry.info.flat_index(packed.kind, packed.offset + element);
                let Some(Some(data)) = snapshot.entries.get(flat) else {
                    continue;
                };
                let info = match *data {
                    DescriptorData::ConstantBuffer { buffer, offset, size } => {
                        let Some(buffer) = self.buffer(buffer) else {
                            continue;
                        };
                        Info::Buffer(vk::DescriptorBufferInfo { buffer, offset, range: size })
                    }
                    DescriptorData::Buffer(view) => {
                        let Some(view) = self.registry.buffer_view(view) else {
                            report_error!("Descriptor refers to unknown buffer view {:?}", view);
                            continue;
                        };
                        let Some(buffer) = self.buffer(view.buffer) else {
                            continue;
                        };
                        Info::Buffer(vk::DescriptorBufferInfo {
                            buffer,
                            offset: view.offset,
                            range: view.size,
                        })
                    }
                    DescriptorData::Texture { view, layout } => {
                        let Some(native_view) = self
                            .registry
                            .texture_view(view)
                            .and_then(|v| v.native.as_vulkan())
                        else {
                            report_error!("Descriptor refers to unknown texture view {:?}", view);
                            continue;
                        };
                        let image_layout = match packed.desc.binding_type {
                            DescriptorBindingType::StorageReadOnlyTexture
                            | DescriptorBindingType::StorageReadWriteTexture => vk::ImageLayout::GENERAL,
                            _ => match self.layout(layout) {
                                vk::ImageLayout::UNDEFINED => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                                other => other,
                            },
                        };
                        Info::Image(vk::DescriptorImageInfo {
                            sampler: vk::Sampler::null(),
                            image_view: native_view.view,
                            image_layout,
                        })
                    }
                    DescriptorData::Sampler(sampler) => {
                        let Some(native) = self
                            .registry
                            .sampler(sampler)
                            .and_then(|s| s.native.as_vulkan())
                        else {
                            report_error!("Descriptor refers to unknown sampler {:?}", sampler);
                            continue;
                        };
                        Info::Image(vk::DescriptorImageInfo {
                            sampler: native.sampler,
                            image_view: vk::ImageView::null(),
                            image_layout: vk::ImageLayout::UNDEFINED,
                        })
                    }
                };
                infos.push((
                    native_binding.binding,
                    u32::from(element),
                    native_binding.descriptor_type,
                    info,
                ));
            }
        }

        let writes: Vec<vk::WriteDescriptorSet> = infos
            .iter()
            .map(|(binding, element, descriptor_type, info)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(native)
                    .dst_binding(*binding)
                    .dst_array_element(*element)
                    .descriptor_type(*descriptor_type);
                match info {
                    Info::Buffer(info) => write.buffer_info(std::slice::from_ref(info)),
                    Info::Image(info) => write.image_info(std::slice::from_ref(info)),
                }
            })
            .collect();
        unsafe { self.device.update_descriptor_sets(&writes, &[]) };

        if let Some(slot) = set.written.lock().get_mut(self.frame_index) {
            *slot = Some(snapshot.version);
        }
        log::trace!(
            "Wrote {} descriptors of {:?} for frame context {}",
            writes.len(),
            handle,
            self.frame_index
        );
        Some(native)
    }

    fn record_barriers(&self, barriers: &VulkanBarriers) {
        if barriers.is_empty() {
            return;
        }
        let sync2 = barriers.synchronization2 && self.features.synchronization2;
        let buffers: Vec<(vk::Buffer, &_)> = barriers
            .buffers
            .iter()
            .filter_map(|b| self.buffer(b.buffer).map(|native| (native, b)))
            .collect();
        let images: Vec<(vk::Image, &_)> = barriers
            .images
            .iter()
            .filter_map(|b| self.image(b.texture).map(|native| (native, b)))
            .collect();

        if sync2 {
            let memory: Vec<vk::MemoryBarrier2> = barriers
                .memory
                .iter()
                .map(|b| {
                    vk::MemoryBarrier2::default()
                        .src_stage_mask(b.src_stage)
                        .dst_stage_mask(b.dst_stage)
                        .src_access_mask(b.src_access)
                        .dst_access_mask(b.dst_access)
                })
                .collect();
            let buffer_barriers: Vec<vk::BufferMemoryBarrier2> = buffers
                .iter()
                .map(|(native, b)| {
                    vk::BufferMemoryBarrier2::default()
                        .src_stage_mask(b.src_stage)
                        .dst_stage_mask(b.dst_stage)
                        .src_access_mask(b.src_access)
                        .dst_access_mask(b.dst_access)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .buffer(*native)
                        .offset(b.offset)
                        .size(b.size)
                })
                .collect();
            let image_barriers: Vec<vk::ImageMemoryBarrier2> = images
                .iter()
                .map(|(native, b)| {
                    vk::ImageMemoryBarrier2::default()
                        .src_stage_mask(b.src_stage)
                        .dst_stage_mask(b.dst_stage)
                        .src_access_mask(b.src_access)
                        .dst_access_mask(b.dst_access)
                        .old_layout(b.old_layout)
                        .new_layout(b.new_layout)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .image(*native)
                        .subresource_range(b.subresource_range())
                })
                .collect();
            let dependency = vk::DependencyInfo::default()
                .memory_barriers(&memory)
                .buffer_memory_barriers(&buffer_barriers)
                .image_memory_barriers(&image_barriers);
            unsafe { self.device.cmd_pipeline_barrier2(self.command_buffer, &dependency) };
            return;
        }

        let (src_stages, dst_stages) = barriers.legacy_stage_masks();
        let memory: Vec<vk::MemoryBarrier> = barriers
            .memory
            .iter()
            .map(|b| {
                vk::MemoryBarrier::default()
                    .src_access_mask(to_legacy_access(b.src_access))
                    .dst_access_mask(to_legacy_access(b.dst_access))
            })
            .collect();
        let buffer_barriers: Vec<vk::BufferMemoryBarrier> = buffers
            .iter()
            .map(|(native, b)| {
                vk::BufferMemoryBarrier::default()
                    .src_access_mask(to_legacy_access(b.src_access))
                    .dst_access_mask(to_legacy_access(b.dst_access))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(*native)
                    .offset(b.offset)
                    .size(b.size)
            })
            .collect();
        let image_barriers: Vec<vk::ImageMemoryBarrier> = images
            .iter()
            .map(|(native, b)| {
                vk::ImageMemoryBarrier::default()
                    .src_access_mask(to_legacy_access(b.src_access))
                    .dst_access_mask(to_legacy_access(b.dst_access))
                    .old_layout(device_layout(b.old_layout, false))
                    .new_layout(device_layout(b.new_layout, false))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(*native)
                    .subresource_range(b.subresource_range())
            })
            .collect();
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stages,
                dst_stages,
                vk::DependencyFlags::empty(),
                &memory,
                &buffer_barriers,
                &image_barriers,
            )
        };
    }

    fn buffer_image_copy(
        footprint: &TextureMemoryFootprint,
        sub_resource: &SubResourceIndexing,
    ) -> Option<vk::BufferImageCopy> {
        let Some(row_length) = row_length(footprint) else {
            report_error!(
                "Row pitch {} is not a whole number of {:?} texels",
                footprint.line_byte_aligned_size,
                footprint.format
            );
            return None;
        };
        Some(vk::BufferImageCopy {
            buffer_offset: footprint.offset,
            buffer_row_length: row_length,
            buffer_image_height: footprint.height,
            image_subresource: copy_layers(sub_resource),
            image_offset: vk::Offset3D::default(),
            image_extent: vk::Extent3D {
                width: footprint.width,
                height: footprint.height,
                depth: u32::from(footprint.depth),
            },
        })
    }

    pub fn encode(&mut self, list: &[Command]) {
        let cmd = self.command_buffer;
        for command in list {
            match command {
                Command::BeginRenderPass(handle) => match self.registry.render_pass(*handle) {
                    Some(desc) => self.begin_render_pass(desc),
                    None => report_error!("Submitted list refers to unknown render pass {:?}", handle),
                },
                Command::EndRenderPass => self.end_render_pass(),
                Command::BeginComputePass | Command::EndComputePass => {}
                Command::UseTextureView { .. } | Command::UseBufferView { .. } => {
                    // residency is implicit on Vulkan
                }
                Command::SetViewport(viewport) => {
                    // negative height keeps the origin top-left
                    let viewport = vk::Viewport {
                        x: viewport.top_left_x as f32,
                        y: (viewport.top_left_y + viewport.height) as f32,
                        width: viewport.width as f32,
                        height: -(viewport.height as f32),
                        min_depth: viewport.min_depth,
                        max_depth: viewport.max_depth,
                    };
                    unsafe { self.device.cmd_set_viewport(cmd, 0, &[viewport]) };
                }
                Command::SetScissor(rect) => {
                    let scissor = vk::Rect2D {
                        offset: vk::Offset2D {
                            x: rect.left as i32,
                            y: rect.top as i32,
                        },
                        extent: vk::Extent2D {
                            width: rect.width(),
                            height: rect.height(),
                        },
                    };
                    unsafe { self.device.cmd_set_scissor(cmd, 0, &[scissor]) };
                }
                Command::SetIndexBuffer { span, format } => {
                    if let Some(buffer) = self.buffer(span.buffer) {
                        unsafe {
                            self.device.cmd_bind_index_buffer(
                                cmd,
                                buffer,
                                span.offset,
                                convert_index_format(*format),
                            )
                        };
                    }
                }
                Command::SetVertexBuffers(spans) => {
                    let resolved: Option<Vec<vk::Buffer>> =
                        spans.iter().map(|span| self.buffer(span.buffer)).collect();
                    if let Some(buffers) = resolved {
                        let offsets: Vec<u64> = spans.iter().map(|span| span.offset).collect();
                        unsafe { self.device.cmd_bind_vertex_buffers(cmd, 0, &buffers, &offsets) };
                    }
                }
                Command::SetGraphicsPipeline(handle) => {
                    match self
                        .registry
                        .graphics_pipeline(*handle)
                        .and_then(|p| p.native.as_vulkan())
                    {
                        Some(pipeline) => unsafe {
                            self.device
                                .cmd_bind_pipeline(cmd, pipeline.bind_point, pipeline.pipeline)
                        },
                        None => report_error!("Submitted list refers to unknown pipeline {:?}", handle),
                    }
                }
                Command::SetComputePipeline(handle) => {
                    match self
                        .registry
                        .compute_pipeline(*handle)
                        .and_then(|p| p.native.as_vulkan())
                    {
                        Some(pipeline) => unsafe {
                            self.device
                                .cmd_bind_pipeline(cmd, pipeline.bind_point, pipeline.pipeline)
                        },
                        None => report_error!("Submitted list refers to unknown pipeline {:?}", handle),
                    }
                }
                Command::PushConstants {
                    layout,
                    index,
                    offset,
                    data,
                    ..
                } => {
                    let Some(native) = self.pipeline_layout(*layout) else {
                        continue;
                    };
                    let Some(range) = native.push_range(*index) else {
                        report_error!("Pipeline layout {:?} has no push constant range {}", layout, index);
                        continue;
                    };
                    if *offset as usize + data.len() > range.size as usize {
                        report_error!(
                            "Push of {} bytes at {} overruns range {} of {} bytes",
                            data.len(),
                            offset,
                            index,
                            range.size
                        );
                        continue;
                    }
                    unsafe {
                        self.device.cmd_push_constants(
                            cmd,
                            native.layout,
                            range.stages,
                            range.offset + offset,
                            data,
                        )
                    };
                }
                Command::BindDescriptorSet {
                    bind_point: point,
                    layout,
                    set_index,
                    set,
                } => {
                    let Some(native_layout) = self.pipeline_layout(*layout) else {
                        continue;
                    };
                    let Some(native_set) = self
                        .registry
                        .descriptor_set(*set)
                        .and_then(|s| s.native.as_vulkan())
                    else {
                        report_error!("Submitted list refers to unknown descriptor set {:?}", set);
                        continue;
                    };
                    if let Some(native) = self.write_descriptor_set(*set, native_set) {
                        unsafe {
                            self.device.cmd_bind_descriptor_sets(
                                cmd,
                                bind_point(*point),
                                native_layout.layout,
                                *set_index,
                                &[native],
                                &[],
                            )
                        };
                    }
                }
                Command::Draw(draw) => unsafe {
                    self.device.cmd_draw(
                        cmd,
                        draw.vertex_count,
                        draw.instance_count,
                        draw.vertex_offset,
                        draw.instance_offset,
                    )
                },
                Command::DrawIndexed(draw) => unsafe {
                    self.device.cmd_draw_indexed(
                        cmd,
                        draw.element_count,
                        draw.instance_count,
                        draw.index_offset,
                        draw.vertex_offset as i32,
                        draw.instance_offset,
                    )
                },
                Command::DrawIndirect {
                    buffer,
                    offset,
                    draw_count,
                    stride,
                    indexed,
                } => {
                    if let Some(buffer) = self.buffer(*buffer) {
                        unsafe {
                            if *indexed {
                                self.device
                                    .cmd_draw_indexed_indirect(cmd, buffer, *offset, *draw_count, *stride)
                            } else {
                                self.device
                                    .cmd_draw_indirect(cmd, buffer, *offset, *draw_count, *stride)
                            }
                        }
                    }
                }
                Command::Dispatch { groups, .. } => unsafe {
                    self.device.cmd_dispatch(cmd, groups.x, groups.y, groups.z)
                },
                Command::CopyBuffer(params) => {
                    if let (Some(src), Some(dst)) =
                        (self.buffer(params.buffer_src), self.buffer(params.buffer_dst))
                    {
                        let region = vk::BufferCopy {
                            src_offset: params.offset_src,
                            dst_offset: params.offset_dst,
                            size: params.copy_size,
                        };
                        unsafe { self.device.cmd_copy_buffer(cmd, src, dst, &[region]) };
                    }
                }
                Command::CopyBufferToTexture {
                    buffer,
                    footprint,
                    texture,
                    sub_resource,
                } => {
                    if let (Some(buffer), Some(image), Some(region)) = (
                        self.buffer(*buffer),
                        self.image(*texture),
                        Self::buffer_image_copy(footprint, sub_resource),
                    ) {
                        unsafe {
                            self.device.cmd_copy_buffer_to_image(
                                cmd,
                                buffer,
                                image,
                                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                                &[region],
                            )
                        };
                    }
                }
                Command::CopyTextureToBuffer {
                    texture,
                    sub_resource,
                    buffer,
                    footprint,
                } => {
                    if let (Some(image), Some(buffer), Some(region)) = (
                        self.image(*texture),
                        self.buffer(*buffer),
                        Self::buffer_image_copy(footprint, sub_resource),
                    ) {
                        unsafe {
                            self.device.cmd_copy_image_to_buffer(
                                cmd,
                                image,
                                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                                buffer,
                                &[region],
                            )
                        };
                    }
                }
                Command::CopyTexture {
                    src,
                    src_sub_resource,
                    dst,
                    dst_sub_resource,
                    extent,
                } => {
                    if let (Some(src), Some(dst)) = (self.image(*src), self.image(*dst)) {
                        let region = vk::ImageCopy {
                            src_subresource: copy_layers(src_sub_resource),
                            src_offset: vk::Offset3D::default(),
                            dst_subresource: copy_layers(dst_sub_resource),
                            dst_offset: vk::Offset3D::default(),
                            extent: vk::Extent3D {
                                width: extent.width,
                                height: extent.height,
                                depth: extent.depth,
                            },
                        };
                        unsafe {
                            self.device.cmd_copy_image(
                                cmd,
                                src,
                                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                                dst,
                                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                                &[region],
                            )
                        };
                    }
                }
                Command::Barrier(TranslatedBarriers::Vulkan(barriers)) => self.record_barriers(barriers),
                Command::Barrier(other) => {
                    log::debug!("Vulkan executor ignores foreign barrier {:?}", other);
                }
                Command::WriteTimestamp(index) => {
                    if let Some(queries) = self.queries {
                        unsafe {
                            self.device.cmd_write_timestamp(
                                cmd,
                                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                                queries,
                                *index,
                            )
                        };
                    }
                }
            }
        }
        // a list left open still has to close its rendering scope
        self.end_render_pass();
    }
}

/// Make host reads of readback memory see every write of the frame.
pub(super) fn host_visibility_barrier(device: &ash::Device, command_buffer: vk::CommandBuffer) {
    let barrier = vk::MemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
        .dst_access_mask(vk::AccessFlags::HOST_READ);
    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::PipelineStageFlags::HOST,
            vk::DependencyFlags::empty(),
            &[barrier],
            &[],
            &[],
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TextureDesc, TextureFormat, TexturePlane, compute_footprints};

    #[test]
    fn test_row_length_in_texels() {
        let desc = TextureDesc::new_2d(3, 2, TextureFormat::Rgba8Unorm);
        let footprint = compute_footprints(&desc)[0];
        assert_eq!(row_length(&footprint), Some(footprint.line_byte_aligned_size / 4));

        let mut odd = footprint;
        odd.format = TextureFormat::Rgb32Float;
        odd.line_byte_aligned_size = 256;
        assert_eq!(row_length(&odd), None);
    }

    #[test]
    fn test_read_only_layout_needs_synchronization2() {
        assert_eq!(
            device_layout(vk::ImageLayout::READ_ONLY_OPTIMAL, false),
            vk::ImageLayout::GENERAL
        );
        assert_eq!(
            device_layout(vk::ImageLayout::READ_ONLY_OPTIMAL, true),
            vk::ImageLayout::READ_ONLY_OPTIMAL
        );
    }

    #[test]
    fn test_copy_layers_default_to_color() {
        let desc = TextureDesc::new_2d(4, 4, TextureFormat::D32F);
        let mut sub = SubResourceIndexing::new(&desc, 1, 0);
        sub.plane_slice = TexturePlane::empty();
        let layers = copy_layers(&sub);
        assert_eq!(layers.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(layers.mip_level, 1);
    }
}
