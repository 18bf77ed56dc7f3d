//! wgpu executor for the DX12 and Metal API families.
//!
//! Everything runs on the single wgpu queue in submission order. The frame
//! fence is emulated: each submit registers a work-done callback that
//! publishes its signal value, and waits poll the device on the matching
//! submission index. Bind group layouts are derived from the shaders, so
//! descriptor sets become bind groups lazily, once per pipeline they are
//! drawn with. wgpu has no push constants.

mod conversion;
mod encoder;
mod resources;
mod swapchain;

pub use resources::{
    WgpuBuffer, WgpuDescriptorSet, WgpuPipeline, WgpuPipelineLayout, WgpuSampler, WgpuSetLayout,
    WgpuShaderModule, WgpuTexture, WgpuTextureView,
};

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{
    BackendCapabilities, ComputePipelineInputs, GpuBackend, GpuBuffer, GpuDescriptorSet,
    GpuDescriptorSetLayout, GpuPipeline, GpuPipelineLayout, GpuSampler, GpuShaderModule,
    GpuTexture, GpuTextureView, GraphicsPipelineInputs, Submission, SwapChainDesc,
    SwapChainImages,
};
use crate::app_info::{ApiFamily, ApplicationInfo};
use crate::descriptor::DescriptorSetLayoutInfo;
use crate::error::GraphicsError;
use crate::frame::TIMESTAMPS_PER_FRAME;
use crate::swapchain::WindowHandles;
use crate::types::{
    AddressMode, BufferCreateDesc, ColorAttachmentBlendDesc, FillMode, FilterMode, MemoryPlacement,
    PushConstantDesc, RenderTargetViewDesc, SamplerDesc, SamplerReduction, ShaderStageKind,
    TextureCreateDesc, TextureType, TextureViewDesc,
};

use conversion::{
    convert_address_mode, convert_aspect, convert_blend, convert_border_color,
    convert_buffer_usage, convert_compare_op, convert_cull_mode, convert_dimension,
    convert_filter_mode, convert_front_face, convert_index_format, convert_mipmap_filter_mode,
    convert_stencil_face, convert_texture_format, convert_texture_usage, convert_topology,
    convert_vertex_format, convert_view_dimension, convert_write_mask,
};
use encoder::{Encoder, TimestampSupport};
use resources::{WgpuPipelineKind, binding_numbers};
use swapchain::WgpuSurface;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// wgpu clamps sampler LODs to this.
const MAX_LOD_CLAMP: f32 = 32.0;

fn foreign(kind: &str) -> GraphicsError {
    GraphicsError::Internal(format!("{kind} does not belong to the wgpu backend"))
}

fn is_spirv(bytecode: &[u8]) -> bool {
    bytecode.len() >= 4
        && bytecode.len() % 4 == 0
        && bytecode[..4] == SPIRV_MAGIC.to_le_bytes()
}

fn backends_for(family: ApiFamily) -> wgpu::Backends {
    match family {
        ApiFamily::Dx12 => wgpu::Backends::DX12,
        ApiFamily::Metal => wgpu::Backends::METAL,
        ApiFamily::Vulkan => wgpu::Backends::VULKAN,
    }
}

/// Optional features the executor uses when the adapter has them.
fn wanted_features() -> wgpu::Features {
    wgpu::Features::TIMESTAMP_QUERY
        | wgpu::Features::TIMESTAMP_QUERY_INSIDE_ENCODERS
        | wgpu::Features::TIMESTAMP_QUERY_INSIDE_PASSES
        | wgpu::Features::DEPTH32FLOAT_STENCIL8
        | wgpu::Features::TEXTURE_FORMAT_16BIT_NORM
        | wgpu::Features::TEXTURE_BINDING_ARRAY
        | wgpu::Features::BUFFER_BINDING_ARRAY
        | wgpu::Features::DEPTH_CLIP_CONTROL
        | wgpu::Features::POLYGON_MODE_LINE
        | wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER
        | wgpu::Features::DUAL_SOURCE_BLENDING
}

/// Timestamps of one frame context, resolved into a mappable buffer.
struct FrameQueries {
    set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    /// Slots written by the last submission of the frame context.
    written: u32,
}

impl FrameQueries {
    fn new(device: &wgpu::Device) -> Self {
        let size = u64::from(TIMESTAMPS_PER_FRAME) * 8;
        Self {
            set: device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("frame timestamps"),
                ty: wgpu::QueryType::Timestamp,
                count: TIMESTAMPS_PER_FRAME,
            }),
            resolve: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("timestamp resolve"),
                size,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            readback: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("timestamp readback"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            written: 0,
        }
    }
}

/// The frame fence on top of submission indices.
struct FrameFence {
    completed: Arc<AtomicU64>,
    submitted: AtomicU64,
    pending: Mutex<VecDeque<(u64, wgpu::SubmissionIndex)>>,
}

impl FrameFence {
    fn new() -> Self {
        Self {
            completed: Arc::new(AtomicU64::new(0)),
            submitted: AtomicU64::new(0),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn signal(&self, value: u64) {
        self.completed.fetch_max(value, Ordering::AcqRel);
        let completed = self.completed();
        self.pending.lock().retain(|(v, _)| *v > completed);
    }

    /// Submission that signals `value` or a later value.
    fn submission_for(&self, value: u64) -> Option<(u64, wgpu::SubmissionIndex)> {
        self.pending
            .lock()
            .iter()
            .find(|(v, _)| *v >= value)
            .cloned()
    }
}

/// Read a whole mappable buffer.
fn read_mapped(device: &wgpu::Device, buffer: &wgpu::Buffer, size: u64) -> Result<Vec<u8>, GraphicsError> {
    let slice = buffer.slice(0..size);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| GraphicsError::Internal(format!("Failed to poll for readback: {e}")))?;
    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(GraphicsError::Internal(format!("Failed to map buffer: {e}"))),
        Err(_) => return Err(GraphicsError::Internal("map callback never ran".into())),
    }
    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}

/// The wgpu executor.
pub struct WgpuBackend {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    features: wgpu::Features,
    timestamps: TimestampSupport,
    frames: Mutex<Vec<Option<FrameQueries>>>,
    fence: FrameFence,
    lost: Arc<AtomicBool>,
    surface: Mutex<Option<WgpuSurface>>,
}

impl fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Bring up an adapter and a device for `info`.
    ///
    /// The surface is created with the swap chain, `window` is only used to
    /// prefer an adapter that can present.
    pub fn new(info: &ApplicationInfo, window: Option<WindowHandles>) -> Result<Self, GraphicsError> {
        let mut flags = wgpu::InstanceFlags::default();
        if info.features.validation_layers {
            flags |= wgpu::InstanceFlags::VALIDATION;
            flags |= wgpu::InstanceFlags::DEBUG;
        }
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: backends_for(info.api.family()),
            flags,
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| {
            GraphicsError::InitializationFailed(format!("No compatible GPU adapter: {e}"))
        })?;
        let adapter_info = adapter.get_info();
        log::info!(
            "wgpu adapter: {} ({:?}, window {})",
            adapter_info.name,
            adapter_info.backend,
            window.is_some()
        );

        let features = adapter.features() & wanted_features();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some(info.application_name.as_str()),
            required_features: features,
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("Device creation failed: {e}")))?;

        device.on_uncaptured_error(Box::new(|e| {
            log::error!("wgpu validation: {e}");
        }));
        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("wgpu device lost ({:?}): {}", reason, message);
            lost_flag.store(true, Ordering::Release);
        });

        let timestamps = if features.contains(wgpu::Features::TIMESTAMP_QUERY) {
            TimestampSupport {
                in_encoders: features.contains(wgpu::Features::TIMESTAMP_QUERY_INSIDE_ENCODERS),
                in_passes: features.contains(wgpu::Features::TIMESTAMP_QUERY_INSIDE_PASSES),
            }
        } else {
            TimestampSupport::default()
        };
        log::debug!("wgpu features: {:?}", features);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            features,
            timestamps,
            frames: Mutex::new(Vec::new()),
            fence: FrameFence::new(),
            lost,
            surface: Mutex::new(None),
        })
    }

    pub fn features(&self) -> wgpu::Features {
        self.features
    }

    fn check_lost(&self) -> Result<(), GraphicsError> {
        if self.lost.load(Ordering::Acquire) {
            Err(GraphicsError::DeviceLost)
        } else {
            Ok(())
        }
    }

    fn poll(&self, poll: wgpu::PollType) -> Result<(), GraphicsError> {
        match self.device.poll(poll) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.check_lost()?;
                Err(GraphicsError::Internal(format!("Device poll failed: {e}")))
            }
        }
    }
}

impl Drop for WgpuBackend {
    fn drop(&mut self) {
        if let Err(e) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
            log::error!("Failed to idle the device on shutdown: {e}");
        }
        self.surface.get_mut().take();
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            timestamp_period_ns: f64::from(self.queue.get_timestamp_period()),
            timestamp_queries: self.features.contains(wgpu::Features::TIMESTAMP_QUERY),
            dedicated_transfer_queue: false,
            dedicated_compute_queue: false,
            window_presentation: true,
        }
    }

    fn configure_frames(&self, frame_count: usize) -> Result<(), GraphicsError> {
        let mut frames = self.frames.lock();
        frames.clear();
        let queries = self.features.contains(wgpu::Features::TIMESTAMP_QUERY);
        frames.extend((0..frame_count).map(|_| queries.then(|| FrameQueries::new(&self.device))));
        log::debug!("wgpu: {} frame contexts", frame_count);
        Ok(())
    }

    fn reset_frame(&self, frame_index: usize) -> Result<(), GraphicsError> {
        self.check_lost()?;
        let frames = self.frames.lock();
        if frame_index >= frames.len() {
            return Err(GraphicsError::Internal(format!("no frame context {frame_index}")));
        }
        Ok(())
    }

    fn create_buffer(&self, desc: &BufferCreateDesc) -> Result<GpuBuffer, GraphicsError> {
        if desc.size == 0 {
            return Err(GraphicsError::InvalidParameter("buffer of zero bytes".into()));
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            // copies and queue writes move whole words
            size: desc.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: convert_buffer_usage(desc.usage, desc.placement),
            mapped_at_creation: false,
        });
        log::trace!("wgpu: buffer {:?} ({} bytes)", desc.label, desc.size);
        Ok(GpuBuffer::Wgpu(WgpuBuffer {
            buffer,
            size: desc.size,
            mappable: desc.placement == MemoryPlacement::Readback,
        }))
    }

    fn create_texture(&self, desc: &TextureCreateDesc) -> Result<GpuTexture, GraphicsError> {
        let texture = &desc.desc;
        let format = convert_texture_format(texture.format).ok_or_else(|| {
            GraphicsError::FeatureNotSupported(format!("{:?} textures on wgpu", texture.format))
        })?;
        let depth_or_array_layers = if texture.texture_type == TextureType::Single3D {
            texture.dimensions.depth.max(1)
        } else {
            u32::from(texture.array_size.max(1))
        };
        // srgb and linear views of the same texels
        let counterpart = if format.is_srgb() {
            format.remove_srgb_suffix()
        } else {
            format.add_srgb_suffix()
        };
        let view_formats = [counterpart];
        let native = self.device.create_texture(&wgpu::TextureDescriptor {
            label: texture.label.as_deref(),
            size: wgpu::Extent3d {
                width: texture.dimensions.width.max(1),
                height: texture.dimensions.height.max(1),
                depth_or_array_layers,
            },
            mip_level_count: u32::from(texture.mip_count.max(1)),
            sample_count: u32::from(texture.sample_count.max(1)),
            dimension: convert_dimension(texture.texture_type),
            format,
            usage: convert_texture_usage(desc.usage),
            view_formats: if counterpart != format {
                &view_formats
            } else {
                &[]
            },
        });
        log::trace!(
            "wgpu: texture {:?} ({}x{}x{} {:?})",
            texture.label,
            texture.dimensions.width,
            texture.dimensions.height,
            depth_or_array_layers,
            format
        );
        Ok(GpuTexture::Wgpu(WgpuTexture::Owned {
            texture: native,
            format: texture.format,
        }))
    }

    fn create_texture_view(
        &self,
        texture: &GpuTexture,
        desc: &TextureViewDesc,
    ) -> Result<GpuTextureView, GraphicsError> {
        let texture = texture.as_wgpu().ok_or_else(|| foreign("texture"))?;
        let Some(native) = texture.owned() else {
            return Ok(GpuTextureView::Wgpu(WgpuTextureView::Surface));
        };
        if !desc.components.is_identity() {
            log::warn!("wgpu views ignore component swizzles ({:?})", desc.label);
        }
        let format = if desc.format.is_depth_stencil() {
            None
        } else {
            convert_texture_format(desc.format)
        };
        let view = native.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label.as_deref(),
            format,
            dimension: Some(convert_view_dimension(desc.view_type)),
            usage: None,
            aspect: convert_aspect(desc.format, desc.plane),
            base_mip_level: u32::from(desc.min_mip),
            mip_level_count: Some(u32::from(desc.max_mip.saturating_sub(desc.min_mip)) + 1),
            base_array_layer: u32::from(desc.array_start),
            array_layer_count: Some(u32::from(desc.array_range.max(1))),
        });
        Ok(GpuTextureView::Wgpu(WgpuTextureView::Owned(view)))
    }

    fn create_render_target_view(
        &self,
        texture: &GpuTexture,
        desc: &RenderTargetViewDesc,
    ) -> Result<GpuTextureView, GraphicsError> {
        let texture = texture.as_wgpu().ok_or_else(|| foreign("texture"))?;
        let Some(native) = texture.owned() else {
            return Ok(GpuTextureView::Wgpu(WgpuTextureView::Surface));
        };
        let layers = u32::from(desc.array_size.max(1));
        let view = native.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label.as_deref(),
            format: convert_texture_format(desc.format),
            dimension: Some(if layers > 1 {
                wgpu::TextureViewDimension::D2Array
            } else {
                wgpu::TextureViewDimension::D2
            }),
            usage: None,
            aspect: wgpu::TextureAspect::All,
            base_mip_level: u32::from(desc.mip_level),
            mip_level_count: Some(1),
            base_array_layer: u32::from(desc.array_start),
            array_layer_count: Some(layers),
        });
        Ok(GpuTextureView::Wgpu(WgpuTextureView::Owned(view)))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<GpuSampler, GraphicsError> {
        if desc.reduction != SamplerReduction::Blend {
            log::warn!("min/max sampler reduction unsupported for {:?}", desc.label);
        }
        let border = self
            .features
            .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
        let uses_border = border
            && [desc.address_mode_u, desc.address_mode_v, desc.address_mode_w]
                .contains(&AddressMode::Border);
        // anisotropy needs every filter linear
        let all_linear = [desc.min_filter, desc.mag_filter, desc.mip_filter]
            .iter()
            .all(|f| *f == FilterMode::Linear);
        let anisotropy_clamp = if all_linear {
            u16::from(desc.anisotropy.max(1))
        } else {
            1
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: convert_address_mode(desc.address_mode_u, border),
            address_mode_v: convert_address_mode(desc.address_mode_v, border),
            address_mode_w: convert_address_mode(desc.address_mode_w, border),
            mag_filter: convert_filter_mode(desc.mag_filter),
            min_filter: convert_filter_mode(desc.min_filter),
            mipmap_filter: convert_mipmap_filter_mode(desc.mip_filter),
            lod_min_clamp: desc.lod_min,
            lod_max_clamp: desc.lod_max.min(MAX_LOD_CLAMP),
            compare: None,
            anisotropy_clamp,
            border_color: uses_border.then(|| convert_border_color(desc.border_color)),
        });
        Ok(GpuSampler::Wgpu(WgpuSampler { sampler }))
    }

    fn create_shader_module(&self, bytecode: &[u8]) -> Result<GpuShaderModule, GraphicsError> {
        let source = if is_spirv(bytecode) {
            wgpu::util::make_spirv(bytecode)
        } else {
            let text = std::str::from_utf8(bytecode).map_err(|e| {
                GraphicsError::InvalidParameter(format!("neither SPIR-V nor WGSL: {e}"))
            })?;
            wgpu::ShaderSource::Wgsl(Cow::Borrowed(text))
        };
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: None,
                source,
            });
        Ok(GpuShaderModule::Wgpu(WgpuShaderModule { module }))
    }

    fn create_descriptor_set_layout(
        &self,
        layout: &DescriptorSetLayoutInfo,
    ) -> Result<GpuDescriptorSetLayout, GraphicsError> {
        Ok(GpuDescriptorSetLayout::Wgpu(WgpuSetLayout {
            binding_numbers: binding_numbers(layout),
        }))
    }

    fn create_descriptor_set(
        &self,
        layout: &GpuDescriptorSetLayout,
        _info: &DescriptorSetLayoutInfo,
        frame_count: usize,
    ) -> Result<GpuDescriptorSet, GraphicsError> {
        let layout = layout.as_wgpu().ok_or_else(|| foreign("descriptor set layout"))?;
        Ok(GpuDescriptorSet::Wgpu(WgpuDescriptorSet::new(
            layout.clone(),
            frame_count,
        )))
    }

    fn create_pipeline_layout(
        &self,
        sets: &[&GpuDescriptorSetLayout],
        push_constants: &[PushConstantDesc],
    ) -> Result<GpuPipelineLayout, GraphicsError> {
        if !push_constants.is_empty() {
            return Err(GraphicsError::FeatureNotSupported(
                "push constants on the wgpu backend".into(),
            ));
        }
        for set in sets {
            set.as_wgpu().ok_or_else(|| foreign("descriptor set layout"))?;
        }
        Ok(GpuPipelineLayout::Wgpu(WgpuPipelineLayout {
            set_count: sets.len(),
        }))
    }

    fn create_graphics_pipeline(
        &self,
        inputs: &GraphicsPipelineInputs<'_>,
    ) -> Result<GpuPipeline, GraphicsError> {
        let desc = inputs.desc;
        inputs.layout.as_wgpu().ok_or_else(|| foreign("pipeline layout"))?;
        let mut vertex = None;
        let mut fragment = None;
        for (module, stage) in &inputs.stages {
            let module = module.as_wgpu().ok_or_else(|| foreign("shader module"))?;
            match stage.stage {
                ShaderStageKind::Vertex => vertex = Some((module, stage.entry_point.as_str())),
                ShaderStageKind::Fragment => fragment = Some((module, stage.entry_point.as_str())),
                other => {
                    return Err(GraphicsError::FeatureNotSupported(format!(
                        "{other:?} shaders on wgpu"
                    )));
                }
            }
        }
        let (vertex_module, vertex_entry) = vertex.ok_or_else(|| {
            GraphicsError::InvalidParameter("graphics pipeline without a vertex stage".into())
        })?;

        // one layout per binding slot, gaps stay empty
        let slot_count = desc
            .vertex_input
            .bindings
            .iter()
            .map(|b| usize::from(b.binding) + 1)
            .max()
            .unwrap_or(0);
        let mut attributes: Vec<Vec<wgpu::VertexAttribute>> = vec![Vec::new(); slot_count];
        for element in &desc.vertex_input.elements {
            let format = convert_vertex_format(element.format).ok_or_else(|| {
                GraphicsError::FeatureNotSupported(format!("vertex format {:?}", element.format))
            })?;
            let Some(slot) = attributes.get_mut(usize::from(element.binding_index)) else {
                return Err(GraphicsError::InvalidParameter(format!(
                    "vertex element uses undeclared binding {}",
                    element.binding_index
                )));
            };
            slot.push(wgpu::VertexAttribute {
                format,
                offset: u64::from(element.offset),
                shader_location: u32::from(element.location),
            });
        }
        let mut strides = vec![0u64; slot_count];
        for binding in &desc.vertex_input.bindings {
            strides[usize::from(binding.binding)] = u64::from(binding.stride);
        }
        let buffers: Vec<wgpu::VertexBufferLayout> = attributes
            .iter()
            .zip(&strides)
            .map(|(attributes, stride)| wgpu::VertexBufferLayout {
                array_stride: *stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = inputs
            .color_formats
            .iter()
            .enumerate()
            .map(|(index, format)| {
                let blend = desc
                    .color_blending
                    .attachments
                    .get(index)
                    .copied()
                    .unwrap_or(ColorAttachmentBlendDesc::OPAQUE);
                convert_texture_format(*format).map(|format| wgpu::ColorTargetState {
                    format,
                    blend: convert_blend(&blend),
                    write_mask: convert_write_mask(blend.write_mask),
                })
            })
            .collect();

        let raster = &desc.raster_state;
        let depth = &desc.depth_stencil;
        let depth_stencil = match inputs.depth_format {
            Some(format) => {
                let native = convert_texture_format(format).ok_or_else(|| {
                    GraphicsError::FeatureNotSupported(format!("{format:?} depth target"))
                })?;
                Some(wgpu::DepthStencilState {
                    format: native,
                    depth_write_enabled: depth.depth_test && depth.depth_write,
                    depth_compare: if depth.depth_test {
                        convert_compare_op(depth.depth_compare)
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: if depth.stencil_test {
                        wgpu::StencilState {
                            front: convert_stencil_face(&depth.front),
                            back: convert_stencil_face(&depth.back),
                            read_mask: u32::from(depth.stencil_read_mask),
                            write_mask: u32::from(depth.stencil_write_mask),
                        }
                    } else {
                        wgpu::StencilState::default()
                    },
                    bias: if raster.depth_bias {
                        wgpu::DepthBiasState {
                            constant: raster.depth_bias_constant_factor as i32,
                            slope_scale: raster.depth_bias_slope_factor,
                            clamp: raster.depth_bias_clamp,
                        }
                    } else {
                        wgpu::DepthBiasState::default()
                    },
                })
            }
            None => None,
        };

        let strip = matches!(
            desc.input_assembly.topology,
            crate::types::PrimitiveTopology::LineStrip | crate::types::PrimitiveTopology::TriangleStrip
        );
        let polygon_mode = match raster.fill_mode {
            FillMode::Wireframe if self.features.contains(wgpu::Features::POLYGON_MODE_LINE) => {
                wgpu::PolygonMode::Line
            }
            FillMode::Wireframe => {
                log::warn!("wireframe fill unsupported, {:?} renders solid", desc.label);
                wgpu::PolygonMode::Fill
            }
            FillMode::Solid => wgpu::PolygonMode::Fill,
        };
        let unclipped_depth =
            !raster.depth_clip && self.features.contains(wgpu::Features::DEPTH_CLIP_CONTROL);

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: desc.label.as_deref(),
                layout: None,
                vertex: wgpu::VertexState {
                    module: &vertex_module.module,
                    entry_point: Some(vertex_entry),
                    buffers: &buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: fragment.map(|(module, entry)| wgpu::FragmentState {
                    module: &module.module,
                    entry_point: Some(entry),
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: convert_topology(desc.input_assembly.topology),
                    strip_index_format: (strip && desc.input_assembly.primitive_restart)
                        .then(|| convert_index_format(desc.input_assembly.index_format)),
                    front_face: convert_front_face(raster.front),
                    cull_mode: convert_cull_mode(raster.cull_mode),
                    polygon_mode,
                    unclipped_depth,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
        log::debug!("wgpu: graphics pipeline {:?}", desc.label);
        Ok(GpuPipeline::Wgpu(WgpuPipeline::new(WgpuPipelineKind::Render(
            pipeline,
        ))))
    }

    fn create_compute_pipeline(
        &self,
        inputs: &ComputePipelineInputs<'_>,
    ) -> Result<GpuPipeline, GraphicsError> {
        inputs.layout.as_wgpu().ok_or_else(|| foreign("pipeline layout"))?;
        let module = inputs.module.as_wgpu().ok_or_else(|| foreign("shader module"))?;
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: inputs.desc.label.as_deref(),
                layout: None,
                module: &module.module,
                entry_point: Some(inputs.desc.stage.entry_point.as_str()),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        log::debug!("wgpu: compute pipeline {:?}", inputs.desc.label);
        Ok(GpuPipeline::Wgpu(WgpuPipeline::new(WgpuPipelineKind::Compute(
            pipeline,
        ))))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let buffer = buffer.as_wgpu().ok_or_else(|| foreign("buffer"))?;
        if buffer.mappable {
            return Err(GraphicsError::InvalidParameter(
                "readback buffers are not host writable".into(),
            ));
        }
        if offset + data.len() as u64 > buffer.size {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at {} overruns a {} byte buffer",
                data.len(),
                offset,
                buffer.size
            )));
        }
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "wgpu buffer writes start on 4 byte boundaries, not {offset}"
            )));
        }
        let padded = (data.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT) as usize;
        if padded == data.len() {
            self.queue.write_buffer(&buffer.buffer, offset, data);
        } else {
            let mut words = data.to_vec();
            words.resize(padded, 0);
            self.queue.write_buffer(&buffer.buffer, offset, &words);
        }
        Ok(())
    }

    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64) -> Result<Vec<u8>, GraphicsError> {
        let buffer = buffer.as_wgpu().ok_or_else(|| foreign("buffer"))?;
        let end = offset + size;
        if end > buffer.size {
            return Err(GraphicsError::InvalidParameter(format!(
                "read of {} bytes at {} overruns a {} byte buffer",
                size, offset, buffer.size
            )));
        }
        let padded = buffer.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let bytes = if buffer.mappable {
            read_mapped(&self.device, &buffer.buffer, padded)?
        } else {
            // staged through a copy, every other buffer is a copy source
            let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("read staging"),
                size: padded,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("read staging"),
                });
            encoder.copy_buffer_to_buffer(&buffer.buffer, 0, &staging, 0, padded);
            self.queue.submit(std::iter::once(encoder.finish()));
            read_mapped(&self.device, &staging, padded)?
        };
        Ok(bytes[offset as usize..end as usize].to_vec())
    }

    fn submit(&self, submission: Submission<'_>) -> Result<(), GraphicsError> {
        verglas_core::profile_function!();
        self.check_lost()?;
        let mut frames = self.frames.lock();
        let frame = frames.get_mut(submission.frame_index).ok_or_else(|| {
            GraphicsError::Internal(format!("no frame context {}", submission.frame_index))
        })?;
        let mut surface = self.surface.lock();

        let acquired = surface
            .as_ref()
            .and_then(|s| s.acquired.as_ref())
            .map(|a| (&a.texture.texture, &a.view));
        let mut encoder = Encoder::new(
            &self.device,
            submission.registry,
            submission.frame_index,
            acquired,
            frame.as_ref().map(|q| &q.set),
            self.timestamps,
        );
        let mut lists = 0;
        for batch in &submission.batches {
            for list in &batch.lists {
                encoder.encode(list);
                lists += 1;
            }
        }
        let written = encoder.timestamp_count;
        let mut commands = encoder.finish();
        if let Some(queries) = frame.as_mut() {
            if written > 0 {
                commands.resolve_query_set(&queries.set, 0..written, &queries.resolve, 0);
                commands.copy_buffer_to_buffer(
                    &queries.resolve,
                    0,
                    &queries.readback,
                    0,
                    u64::from(written) * 8,
                );
            }
            queries.written = written;
        }

        let index = self.queue.submit(std::iter::once(commands.finish()));
        let value = submission.signal_value;
        self.fence.submitted.fetch_max(value, Ordering::AcqRel);
        self.fence.pending.lock().push_back((value, index));
        let completed = self.fence.completed.clone();
        self.queue.on_submitted_work_done(move || {
            completed.fetch_max(value, Ordering::AcqRel);
        });
        log::trace!("wgpu: frame {} submitted {} lists", value, lists);

        if let (Some(image), Some(chain)) = (submission.present, surface.as_mut()) {
            chain.present(image);
        }
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            log::error!("Failed to poll the frame fence: {e}");
        }
        let completed = self.fence.completed();
        self.fence.signal(completed);
        completed
    }

    fn wait_for_value(&self, value: u64) -> Result<(), GraphicsError> {
        if value > self.fence.submitted.load(Ordering::Acquire) {
            return Err(GraphicsError::Internal(format!(
                "waiting for fence value {value} that was never submitted"
            )));
        }
        if self.fence.completed() >= value {
            return Ok(());
        }
        let Some((signalled, index)) = self.fence.submission_for(value) else {
            return Ok(());
        };
        self.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout: None,
        })?;
        self.fence.signal(signalled);
        Ok(())
    }

    fn read_timestamps(&self, frame_index: usize, count: u32) -> Result<Vec<u64>, GraphicsError> {
        let frames = self.frames.lock();
        let frame = frames.get(frame_index).ok_or_else(|| {
            GraphicsError::Internal(format!("no timestamps for frame context {frame_index}"))
        })?;
        let queries = frame.as_ref().ok_or_else(|| {
            GraphicsError::FeatureNotSupported("adapter has no timestamp queries".into())
        })?;
        let count = count.min(TIMESTAMPS_PER_FRAME);
        let available = count.min(queries.written);
        let mut values = if available == 0 {
            Vec::new()
        } else {
            read_mapped(&self.device, &queries.readback, u64::from(available) * 8)?
                .chunks_exact(8)
                .map(bytemuck::pod_read_unaligned::<u64>)
                .collect()
        };
        values.resize(count as usize, 0);
        Ok(values)
    }

    fn create_swap_chain(
        &self,
        window: WindowHandles,
        desc: &SwapChainDesc,
    ) -> Result<SwapChainImages, GraphicsError> {
        let mut guard = self.surface.lock();
        guard.take();
        let chain = WgpuSurface::new(&self.instance, &self.adapter, &self.device, window, desc)?;
        let images = chain.registry_images();
        *guard = Some(chain);
        images
    }

    fn recreate_swap_chain(&self, desc: &SwapChainDesc) -> Result<SwapChainImages, GraphicsError> {
        let mut guard = self.surface.lock();
        let chain = guard
            .as_mut()
            .ok_or_else(|| GraphicsError::Internal("no window swap chain to rebuild".into()))?;
        chain.configure(&self.device, desc);
        chain.registry_images()
    }

    fn destroy_swap_chain(&self) {
        if self.surface.lock().take().is_some() {
            log::debug!("wgpu surface destroyed");
        }
    }

    fn acquire_next_image(&self) -> Result<u32, GraphicsError> {
        self.surface
            .lock()
            .as_mut()
            .ok_or_else(|| GraphicsError::Internal("no window swap chain".into()))?
            .acquire()
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        self.poll(wgpu::PollType::wait_indefinitely())?;
        self.fence
            .signal(self.fence.submitted.load(Ordering::Acquire));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_info::{Api, BackendType};

    #[test]
    fn test_spirv_detection() {
        let mut words = SPIRV_MAGIC.to_le_bytes().to_vec();
        words.extend_from_slice(&[0; 16]);
        assert!(is_spirv(&words));
        assert!(!is_spirv(b"@compute @workgroup_size(1) fn main() {}"));
        assert!(!is_spirv(&words[..3]));
    }

    #[test]
    fn test_api_family_picks_wgpu_backend() {
        assert_eq!(backends_for(ApiFamily::Dx12), wgpu::Backends::DX12);
        assert_eq!(backends_for(ApiFamily::Metal), wgpu::Backends::METAL);
    }

    #[test]
    fn test_fence_signals_are_monotonic() {
        let fence = FrameFence::new();
        fence.signal(3);
        fence.signal(2);
        assert_eq!(fence.completed(), 3);
    }

    #[test]
    fn test_backend_smoke() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut info = ApplicationInfo::new("wgpu smoke");
        info.api = Api::Dx12V1;
        info.backend = BackendType::Wgpu;
        let backend = match WgpuBackend::new(&info, None) {
            Ok(backend) => backend,
            Err(e) => {
                log::warn!("no wgpu adapter, skipping: {}", e);
                return;
            }
        };
        backend.configure_frames(2).unwrap();
        let buffer = backend
            .create_buffer(&BufferCreateDesc::new(
                16,
                MemoryPlacement::StageEveryFrame,
                crate::types::BufferUsage::CONSTANT,
            ))
            .unwrap();
        backend.write_buffer(&buffer, 0, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(backend.read_buffer(&buffer, 0, 6).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }
}
