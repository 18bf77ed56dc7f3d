//! Lowering of recorded command lists into a wgpu command encoder.
//!
//! wgpu scopes pipeline and binding state to a pass while command lists
//! may set it before the pass begins, so graphics and compute state is
//! tracked here and flushed into the pass right before each draw or
//! dispatch. Barriers and residency declarations are dropped, wgpu tracks
//! both itself. Dispatches outside an explicit compute pass run in an
//! implicit one that closes before the next encoder-level command.

use verglas_core::report_error;

use crate::command::{BindPoint, Command};
use crate::descriptor::DescriptorData;
use crate::frame::TIMESTAMPS_PER_FRAME;
use crate::handles::{BufferHandle, DescriptorSetHandle, TextureHandle};
use crate::registry::Registry;
use crate::types::{
    BufferSpan, IndexFormat, RenderPassDesc, ScissorRect, SubResourceIndexing,
    TextureMemoryFootprint, TexturePlane, Viewport,
};

use super::conversion::{
    convert_color_load, convert_index_format, convert_load, convert_store_op,
};
use super::resources::{
    GroupKey, WgpuDescriptorSet, WgpuPipeline, WgpuPipelineKind, WgpuTexture, WgpuTextureView,
};

/// Timestamp features the device was created with.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct TimestampSupport {
    pub in_encoders: bool,
    pub in_passes: bool,
}

/// Origin and extent of a copy touching one sub-resource.
pub(super) fn copy_region(
    dimension: wgpu::TextureDimension,
    sub_resource: &SubResourceIndexing,
    width: u32,
    height: u32,
    depth: u32,
) -> (wgpu::Origin3d, wgpu::Extent3d) {
    let volume = dimension == wgpu::TextureDimension::D3;
    let origin = wgpu::Origin3d {
        x: 0,
        y: 0,
        z: if volume {
            0
        } else {
            u32::from(sub_resource.array_slice)
        },
    };
    let extent = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: if volume { depth.max(1) } else { 1 },
    };
    (origin, extent)
}

/// Aspect a copy touches for the plane it addresses.
pub(super) fn copy_aspect(format: wgpu::TextureFormat, plane: TexturePlane) -> wgpu::TextureAspect {
    if plane.contains(TexturePlane::STENCIL) && format.has_stencil_aspect() {
        wgpu::TextureAspect::StencilOnly
    } else if format.has_stencil_aspect() {
        wgpu::TextureAspect::DepthOnly
    } else {
        wgpu::TextureAspect::All
    }
}

pub(super) fn buffer_layout(footprint: &TextureMemoryFootprint) -> wgpu::TexelCopyBufferLayout {
    wgpu::TexelCopyBufferLayout {
        offset: footprint.offset,
        bytes_per_row: Some(footprint.line_byte_aligned_size),
        rows_per_image: Some(footprint.height),
    }
}

#[derive(Default)]
struct GraphicsState<'a> {
    pipeline: Option<&'a WgpuPipeline>,
    sets: Vec<Option<DescriptorSetHandle>>,
    vertex_buffers: Vec<BufferSpan>,
    index_buffer: Option<(BufferSpan, IndexFormat)>,
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    dirty: bool,
}

#[derive(Default)]
struct ComputeState<'a> {
    pipeline: Option<&'a WgpuPipeline>,
    sets: Vec<Option<DescriptorSetHandle>>,
    dirty: bool,
}

fn bind_slot(sets: &mut Vec<Option<DescriptorSetHandle>>, set_index: u32, set: DescriptorSetHandle) {
    let index = set_index as usize;
    if sets.len() <= index {
        sets.resize(index + 1, None);
    }
    sets[index] = Some(set);
}

pub(super) struct Encoder<'a> {
    device: &'a wgpu::Device,
    registry: &'a Registry,
    frame_index: usize,
    encoder: wgpu::CommandEncoder,
    surface_texture: Option<&'a wgpu::Texture>,
    surface_view: Option<&'a wgpu::TextureView>,
    queries: Option<&'a wgpu::QuerySet>,
    timestamps: TimestampSupport,
    render_pass: Option<wgpu::RenderPass<'static>>,
    compute_pass: Option<wgpu::ComputePass<'static>>,
    graphics: GraphicsState<'a>,
    compute: ComputeState<'a>,
    /// One past the highest timestamp slot written.
    pub timestamp_count: u32,
}

impl<'a> Encoder<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        registry: &'a Registry,
        frame_index: usize,
        surface: Option<(&'a wgpu::Texture, &'a wgpu::TextureView)>,
        queries: Option<&'a wgpu::QuerySet>,
        timestamps: TimestampSupport,
    ) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame"),
        });
        Self {
            device,
            registry,
            frame_index,
            encoder,
            surface_texture: surface.map(|(texture, _)| texture),
            surface_view: surface.map(|(_, view)| view),
            queries,
            timestamps,
            render_pass: None,
            compute_pass: None,
            graphics: GraphicsState::default(),
            compute: ComputeState::default(),
            timestamp_count: 0,
        }
    }

    /// Close any open pass and hand back the encoder.
    pub fn finish(mut self) -> wgpu::CommandEncoder {
        self.render_pass = None;
        self.compute_pass = None;
        self.encoder
    }

    fn buffer(&self, handle: BufferHandle) -> Option<&'a wgpu::Buffer> {
        let buffer = self
            .registry
            .buffer(handle)
            .and_then(|b| b.native.as_wgpu())
            .map(|b| &b.buffer);
        if buffer.is_none() {
            report_error!("Submitted list refers to unknown buffer {:?}", handle);
        }
        buffer
    }

    fn texture(&self, handle: TextureHandle) -> Option<&'a wgpu::Texture> {
        let texture = match self.registry.texture(handle).and_then(|t| t.native.as_wgpu()) {
            Some(WgpuTexture::Owned { texture, .. }) => Some(texture),
            Some(WgpuTexture::Surface { .. }) => self.surface_texture,
            None => None,
        };
        if texture.is_none() {
            report_error!("Submitted list refers to unknown texture {:?}", handle);
        }
        texture
    }

    fn attachment_view(
        &self,
        handle: crate::handles::RenderTargetViewHandle,
    ) -> Option<&'a wgpu::TextureView> {
        let view = match self
            .registry
            .render_target_view(handle)
            .and_then(|v| v.native.as_wgpu())
        {
            Some(WgpuTextureView::Owned(view)) => Some(view),
            Some(WgpuTextureView::Surface) => self.surface_view,
            None => None,
        };
        if view.is_none() {
            report_error!("Render pass refers to unknown attachment {:?}", handle);
        }
        view
    }

    /// Encoder-level commands need every pass closed.
    fn close_passes(&mut self) {
        self.render_pass = None;
        self.compute_pass = None;
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDesc) {
        self.close_passes();
        let mut color_attachments = Vec::with_capacity(desc.color_attachments.len());
        for attachment in &desc.color_attachments {
            let Some(view) = self.attachment_view(attachment.rtv) else {
                return;
            };
            color_attachments.push(Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: convert_color_load(attachment.load_op, attachment.clear_color),
                    store: convert_store_op(attachment.store_op),
                },
            }));
        }
        let mut depth_stencil_attachment = None;
        if let Some(attachment) = &desc.depth_stencil_attachment {
            let Some(view) = self.attachment_view(attachment.rtv) else {
                return;
            };
            let has_stencil = self
                .registry
                .render_target_view(attachment.rtv)
                .and_then(|v| self.registry.texture(v.texture))
                .and_then(|t| t.native.as_wgpu())
                .is_some_and(|t| matches!(t, WgpuTexture::Owned { format, .. } if format.has_stencil()));
            depth_stencil_attachment = Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: convert_load(attachment.load_op, attachment.clear_depth),
                    store: convert_store_op(attachment.store_op),
                }),
                stencil_ops: has_stencil.then(|| wgpu::Operations {
                    load: convert_load(attachment.stencil_load_op, u32::from(attachment.clear_stencil)),
                    store: convert_store_op(attachment.stencil_store_op),
                }),
            });
        }

        let pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: desc.label.as_deref(),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        self.render_pass = Some(pass.forget_lifetime());
        self.graphics.dirty = true;
    }

    fn compute_pass(&mut self) -> &mut wgpu::ComputePass<'static> {
        if self.compute_pass.is_none() {
            self.render_pass = None;
            self.compute.dirty = true;
        }
        let encoder = &mut self.encoder;
        self.compute_pass.get_or_insert_with(|| {
            encoder
                .begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: None,
                    timestamp_writes: None,
                })
                .forget_lifetime()
        })
    }

    /// Bind group of `set` laid out for `pipeline`, built on first use.
    fn bind_group(
        &self,
        handle: DescriptorSetHandle,
        pipeline: &WgpuPipeline,
        set_index: u32,
    ) -> Option<wgpu::BindGroup> {
        let Some(entry) = self.registry.descriptor_set(handle) else {
            report_error!("Submitted list refers to unknown descriptor set {:?}", handle);
            return None;
        };
        let native: &WgpuDescriptorSet = entry.native.as_wgpu()?;
        let snapshot = entry.storage.snapshot(self.frame_index)?;
        let key = GroupKey {
            version: snapshot.version,
            pipeline: pipeline.id,
            set_index,
        };
        if let Some(group) = native.cached(self.frame_index, key) {
            return Some(group);
        }

        enum Resource<'r> {
            Buffer(wgpu::BufferBinding<'r>),
            View(&'r wgpu::TextureView),
            Sampler(&'r wgpu::Sampler),
        }
        let mut bindings: Vec<(u32, Vec<Resource<'a>>)> = Vec::new();
        for (packed, number) in entry.info.bindings.iter().zip(&native.layout.binding_numbers) {
            let mut elements = Vec::with_capacity(usize::from(packed.desc.count));
            for element in 0..packed.desc.count {
                let flat = entry.info.flat_index(packed.kind, packed.offset + element);
                let Some(Some(data)) = snapshot.entries.get(flat) else {
                    report_error!(
                        "Descriptor set {:?} binding {} element {} was never written",
                        handle,
                        number,
                        element
                    );
                    return None;
                };
                let resource = match *data {
                    DescriptorData::ConstantBuffer { buffer, offset, size } => {
                        Resource::Buffer(wgpu::BufferBinding {
                            buffer: self.buffer(buffer)?,
                            offset,
                            size: wgpu::BufferSize::new(size),
                        })
                    }
                    DescriptorData::Buffer(view) => {
                        let Some(view) = self.registry.buffer_view(view) else {
                            report_error!("Descriptor refers to unknown buffer view {:?}", view);
                            return None;
                        };
                        Resource::Buffer(wgpu::BufferBinding {
                            buffer: self.buffer(view.buffer)?,
                            offset: view.offset,
                            size: wgpu::BufferSize::new(view.size),
                        })
                    }
                    DescriptorData::Texture { view, .. } => {
                        match self.registry.texture_view(view).and_then(|v| v.native.as_wgpu()) {
                            Some(WgpuTextureView::Owned(native)) => Resource::View(native),
                            Some(WgpuTextureView::Surface) => Resource::View(self.surface_view?),
                            None => {
                                report_error!("Descriptor refers to unknown texture view {:?}", view);
                                return None;
                            }
                        }
                    }
                    DescriptorData::Sampler(sampler) => {
                        let Some(native) =
                            self.registry.sampler(sampler).and_then(|s| s.native.as_wgpu())
                        else {
                            report_error!("Descriptor refers to unknown sampler {:?}", sampler);
                            return None;
                        };
                        Resource::Sampler(&native.sampler)
                    }
                };
                elements.push(resource);
            }
            bindings.push((*number, elements));
        }

        // arrays are flattened into per-kind slices first so the entries can borrow them
        let mut buffer_arrays: Vec<Vec<wgpu::BufferBinding<'a>>> = Vec::new();
        let mut view_arrays: Vec<Vec<&'a wgpu::TextureView>> = Vec::new();
        let mut sampler_arrays: Vec<Vec<&'a wgpu::Sampler>> = Vec::new();
        enum Slot {
            Single(usize),
            Buffers(usize),
            Views(usize),
            Samplers(usize),
        }
        let mut slots = Vec::with_capacity(bindings.len());
        for (index, (_, elements)) in bindings.iter().enumerate() {
            if elements.len() == 1 {
                slots.push(Slot::Single(index));
                continue;
            }
            match elements.first() {
                Some(Resource::Buffer(_)) => {
                    buffer_arrays.push(
                        elements
                            .iter()
                            .filter_map(|r| match r {
                                Resource::Buffer(b) => Some(b.clone()),
                                _ => None,
                            })
                            .collect(),
                    );
                    slots.push(Slot::Buffers(buffer_arrays.len() - 1));
                }
                Some(Resource::View(_)) => {
                    view_arrays.push(
                        elements
                            .iter()
                            .filter_map(|r| match r {
                                Resource::View(v) => Some(*v),
                                _ => None,
                            })
                            .collect(),
                    );
                    slots.push(Slot::Views(view_arrays.len() - 1));
                }
                Some(Resource::Sampler(_)) => {
                    sampler_arrays.push(
                        elements
                            .iter()
                            .filter_map(|r| match r {
                                Resource::Sampler(s) => Some(*s),
                                _ => None,
                            })
                            .collect(),
                    );
                    slots.push(Slot::Samplers(sampler_arrays.len() - 1));
                }
                None => slots.push(Slot::Single(index)),
            }
        }
        let entries: Vec<wgpu::BindGroupEntry> = bindings
            .iter()
            .zip(&slots)
            .filter_map(|((binding, elements), slot)| {
                let resource = match slot {
                    Slot::Single(_) => match elements.first()? {
                        Resource::Buffer(b) => wgpu::BindingResource::Buffer(b.clone()),
                        Resource::View(v) => wgpu::BindingResource::TextureView(v),
                        Resource::Sampler(s) => wgpu::BindingResource::Sampler(s),
                    },
                    Slot::Buffers(i) => wgpu::BindingResource::BufferArray(&buffer_arrays[*i]),
                    Slot::Views(i) => wgpu::BindingResource::TextureViewArray(&view_arrays[*i]),
                    Slot::Samplers(i) => wgpu::BindingResource::SamplerArray(&sampler_arrays[*i]),
                };
                Some(wgpu::BindGroupEntry {
                    binding: *binding,
                    resource,
                })
            })
            .collect();

        let layout = pipeline.bind_group_layout(set_index);
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &layout,
            entries: &entries,
        });
        native.insert(self.frame_index, key, group.clone());
        log::trace!(
            "Built bind group of {:?} for pipeline {} in frame context {}",
            handle,
            pipeline.id,
            self.frame_index
        );
        Some(group)
    }

    fn flush_graphics(&mut self) -> bool {
        if self.render_pass.is_none() {
            report_error!("Draw recorded outside a render pass");
            return false;
        }
        let Some(pipeline) = self.graphics.pipeline else {
            report_error!("Draw recorded without a graphics pipeline");
            return false;
        };
        let WgpuPipelineKind::Render(native) = &pipeline.kind else {
            return false;
        };
        if !self.graphics.dirty {
            return true;
        }
        let groups: Vec<(u32, wgpu::BindGroup)> = self
            .graphics
            .sets
            .iter()
            .enumerate()
            .filter_map(|(index, set)| {
                let set = (*set)?;
                self.bind_group(set, pipeline, index as u32)
                    .map(|group| (index as u32, group))
            })
            .collect();
        let vertex: Vec<(&wgpu::Buffer, BufferSpan)> = self
            .graphics
            .vertex_buffers
            .iter()
            .filter_map(|span| self.buffer(span.buffer).map(|b| (b, *span)))
            .collect();
        let index = self
            .graphics
            .index_buffer
            .and_then(|(span, format)| self.buffer(span.buffer).map(|b| (b, span, format)));
        let viewport = self.graphics.viewport;
        let scissor = self.graphics.scissor;

        let Some(pass) = self.render_pass.as_mut() else {
            return false;
        };
        pass.set_pipeline(native);
        for (index, group) in &groups {
            pass.set_bind_group(*index, group, &[]);
        }
        for (slot, (buffer, span)) in vertex.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, slice(buffer, span));
        }
        if let Some((buffer, span, format)) = index {
            pass.set_index_buffer(slice(buffer, &span), convert_index_format(format));
        }
        if let Some(viewport) = viewport {
            pass.set_viewport(
                viewport.top_left_x as f32,
                viewport.top_left_y as f32,
                viewport.width as f32,
                viewport.height as f32,
                viewport.min_depth,
                viewport.max_depth,
            );
        }
        if let Some(rect) = scissor {
            pass.set_scissor_rect(rect.left, rect.top, rect.width(), rect.height());
        }
        self.graphics.dirty = false;
        true
    }

    fn flush_compute(&mut self) -> bool {
        let Some(pipeline) = self.compute.pipeline else {
            report_error!("Dispatch recorded without a compute pipeline");
            return false;
        };
        let WgpuPipelineKind::Compute(native) = &pipeline.kind else {
            return false;
        };
        self.compute_pass();
        if !self.compute.dirty {
            return true;
        }
        let groups: Vec<(u32, wgpu::BindGroup)> = self
            .compute
            .sets
            .iter()
            .enumerate()
            .filter_map(|(index, set)| {
                let set = (*set)?;
                self.bind_group(set, pipeline, index as u32)
                    .map(|group| (index as u32, group))
            })
            .collect();
        let pass = self.compute_pass();
        pass.set_pipeline(native);
        for (index, group) in &groups {
            pass.set_bind_group(*index, group, &[]);
        }
        self.compute.dirty = false;
        true
    }

    fn write_timestamp(&mut self, index: u32) {
        let Some(queries) = self.queries else {
            return;
        };
        if index >= TIMESTAMPS_PER_FRAME {
            report_error!("Timestamp slot {} is out of range", index);
            return;
        }
        if let Some(pass) = self.render_pass.as_mut() {
            if self.timestamps.in_passes {
                pass.write_timestamp(queries, index);
            }
        } else if let Some(pass) = self.compute_pass.as_mut() {
            if self.timestamps.in_passes {
                pass.write_timestamp(queries, index);
            }
        } else if self.timestamps.in_encoders {
            self.encoder.write_timestamp(queries, index);
        } else {
            return;
        }
        self.timestamp_count = self.timestamp_count.max(index + 1);
    }

    pub fn encode(&mut self, list: &[Command]) {
        for command in list {
            match command {
                Command::BeginRenderPass(handle) => match self.registry.render_pass(*handle) {
                    Some(desc) => self.begin_render_pass(desc),
                    None => report_error!("Submitted list refers to unknown render pass {:?}", handle),
                },
                Command::EndRenderPass => self.render_pass = None,
                Command::BeginComputePass => {
                    self.compute_pass();
                }
                Command::EndComputePass => self.compute_pass = None,
                Command::UseTextureView { .. }
                | Command::UseBufferView { .. }
                | Command::Barrier(_) => {}
                Command::SetViewport(viewport) => {
                    self.graphics.viewport = Some(*viewport);
                    self.graphics.dirty = true;
                }
                Command::SetScissor(rect) => {
                    self.graphics.scissor = Some(*rect);
                    self.graphics.dirty = true;
                }
                Command::SetIndexBuffer { span, format } => {
                    self.graphics.index_buffer = Some((*span, *format));
                    self.graphics.dirty = true;
                }
                Command::SetVertexBuffers(spans) => {
                    self.graphics.vertex_buffers = spans.clone();
                    self.graphics.dirty = true;
                }
                Command::SetGraphicsPipeline(handle) => {
                    match self.registry.graphics_pipeline(*handle).and_then(|p| p.native.as_wgpu()) {
                        Some(pipeline) => {
                            self.graphics.pipeline = Some(pipeline);
                            self.graphics.dirty = true;
                        }
                        None => report_error!("Submitted list refers to unknown pipeline {:?}", handle),
                    }
                }
                Command::SetComputePipeline(handle) => {
                    match self.registry.compute_pipeline(*handle).and_then(|p| p.native.as_wgpu()) {
                        Some(pipeline) => {
                            self.compute.pipeline = Some(pipeline);
                            self.compute.dirty = true;
                        }
                        None => report_error!("Submitted list refers to unknown pipeline {:?}", handle),
                    }
                }
                Command::PushConstants { layout, .. } => {
                    report_error!("Push constants are not available on wgpu (layout {:?})", layout);
                }
                Command::BindDescriptorSet {
                    bind_point,
                    set_index,
                    set,
                    ..
                } => match bind_point {
                    BindPoint::Graphics => {
                        bind_slot(&mut self.graphics.sets, *set_index, *set);
                        self.graphics.dirty = true;
                    }
                    BindPoint::Compute => {
                        bind_slot(&mut self.compute.sets, *set_index, *set);
                        self.compute.dirty = true;
                    }
                },
                Command::Draw(draw) => {
                    if self.flush_graphics()
                        && let Some(pass) = self.render_pass.as_mut()
                    {
                        pass.draw(
                            draw.vertex_offset..draw.vertex_offset + draw.vertex_count,
                            draw.instance_offset..draw.instance_offset + draw.instance_count,
                        );
                    }
                }
                Command::DrawIndexed(draw) => {
                    if self.flush_graphics()
                        && let Some(pass) = self.render_pass.as_mut()
                    {
                        pass.draw_indexed(
                            draw.index_offset..draw.index_offset + draw.element_count,
                            draw.vertex_offset as i32,
                            draw.instance_offset..draw.instance_offset + draw.instance_count,
                        );
                    }
                }
                Command::DrawIndirect {
                    buffer,
                    offset,
                    draw_count,
                    stride,
                    indexed,
                } => {
                    let Some(native) = self.buffer(*buffer) else {
                        continue;
                    };
                    if !self.flush_graphics() {
                        continue;
                    }
                    let Some(pass) = self.render_pass.as_mut() else {
                        continue;
                    };
                    for draw in 0..u64::from(*draw_count) {
                        let at = offset + draw * u64::from(*stride);
                        if *indexed {
                            pass.draw_indexed_indirect(native, at);
                        } else {
                            pass.draw_indirect(native, at);
                        }
                    }
                }
                Command::Dispatch { groups, .. } => {
                    if self.render_pass.is_some() {
                        report_error!("Dispatch recorded inside a render pass");
                        continue;
                    }
                    if self.flush_compute() {
                        self.compute_pass().dispatch_workgroups(groups.x, groups.y, groups.z);
                    }
                }
                Command::CopyBuffer(params) => {
                    self.close_passes();
                    let (Some(src), Some(dst)) =
                        (self.buffer(params.buffer_src), self.buffer(params.buffer_dst))
                    else {
                        continue;
                    };
                    self.encoder.copy_buffer_to_buffer(
                        src,
                        params.offset_src,
                        dst,
                        params.offset_dst,
                        params.copy_size,
                    );
                }
                Command::CopyBufferToTexture {
                    buffer,
                    footprint,
                    texture,
                    sub_resource,
                } => {
                    self.close_passes();
                    let (Some(buffer), Some(texture)) = (self.buffer(*buffer), self.texture(*texture))
                    else {
                        continue;
                    };
                    let (origin, extent) = copy_region(
                        texture.dimension(),
                        sub_resource,
                        footprint.width,
                        footprint.height,
                        u32::from(footprint.depth),
                    );
                    self.encoder.copy_buffer_to_texture(
                        wgpu::TexelCopyBufferInfo {
                            buffer,
                            layout: buffer_layout(footprint),
                        },
                        wgpu::TexelCopyTextureInfo {
                            texture,
                            mip_level: u32::from(sub_resource.mip_index),
                            origin,
                            aspect: copy_aspect(texture.format(), sub_resource.plane_slice),
                        },
                        extent,
                    );
                }
                Command::CopyTextureToBuffer {
                    texture,
                    sub_resource,
                    buffer,
                    footprint,
                } => {
                    self.close_passes();
                    let (Some(texture), Some(buffer)) = (self.texture(*texture), self.buffer(*buffer))
                    else {
                        continue;
                    };
                    let (origin, extent) = copy_region(
                        texture.dimension(),
                        sub_resource,
                        footprint.width,
                        footprint.height,
                        u32::from(footprint.depth),
                    );
                    self.encoder.copy_texture_to_buffer(
                        wgpu::TexelCopyTextureInfo {
                            texture,
                            mip_level: u32::from(sub_resource.mip_index),
                            origin,
                            aspect: copy_aspect(texture.format(), sub_resource.plane_slice),
                        },
                        wgpu::TexelCopyBufferInfo {
                            buffer,
                            layout: buffer_layout(footprint),
                        },
                        extent,
                    );
                }
                Command::CopyTexture {
                    src,
                    src_sub_resource,
                    dst,
                    dst_sub_resource,
                    extent,
                } => {
                    self.close_passes();
                    let (Some(src), Some(dst)) = (self.texture(*src), self.texture(*dst)) else {
                        continue;
                    };
                    let (src_origin, size) = copy_region(
                        src.dimension(),
                        src_sub_resource,
                        extent.width,
                        extent.height,
                        extent.depth,
                    );
                    let (dst_origin, _) = copy_region(
                        dst.dimension(),
                        dst_sub_resource,
                        extent.width,
                        extent.height,
                        extent.depth,
                    );
                    self.encoder.copy_texture_to_texture(
                        wgpu::TexelCopyTextureInfo {
                            texture: src,
                            mip_level: u32::from(src_sub_resource.mip_index),
                            origin: src_origin,
                            aspect: copy_aspect(src.format(), src_sub_resource.plane_slice),
                        },
                        wgpu::TexelCopyTextureInfo {
                            texture: dst,
                            mip_level: u32::from(dst_sub_resource.mip_index),
                            origin: dst_origin,
                            aspect: copy_aspect(dst.format(), dst_sub_resource.plane_slice),
                        },
                        size,
                    );
                }
                Command::WriteTimestamp(index) => self.write_timestamp(*index),
            }
        }
    }
}

fn slice<'b>(buffer: &'b wgpu::Buffer, span: &BufferSpan) -> wgpu::BufferSlice<'b> {
    if span.size == 0 {
        buffer.slice(span.offset..)
    } else {
        buffer.slice(span.offset..span.offset + span.size)
    }
}
