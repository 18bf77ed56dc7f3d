//! CPU reference executor.
//!
//! Memory is plain host memory and work runs on a dedicated queue thread,
//! so fences, back-pressure and deferred release behave as they do on a
//! GPU. Copies, render pass clears, timestamps and presentation are really
//! executed; draws and dispatches are accepted and skipped since there is
//! no shader interpreter. Barriers are ignored because the queue thread
//! runs operations strictly in order.

mod queue;

pub use queue::QueueGate;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use verglas_core::report_error;

use queue::{Job, Memory, Op, QueueShared, QueueThread};

use super::{
    BackendCapabilities, ComputePipelineInputs, GpuBackend, GpuBuffer, GpuDescriptorSet,
    GpuDescriptorSetLayout, GpuPipeline, GpuPipelineLayout, GpuSampler, GpuShaderModule,
    GpuTexture, GpuTextureView, GraphicsPipelineInputs, Submission,
};
use crate::command::{BindPoint, Command};
use crate::descriptor::DescriptorSetLayoutInfo;
use crate::error::GraphicsError;
use crate::frame::TIMESTAMPS_PER_FRAME;
use crate::handles::{BufferHandle, TextureHandle};
use crate::registry::Registry;
use crate::types::{
    BufferCreateDesc, Extent3d, LoadOp, PushConstantDesc, RenderTargetViewDesc, SamplerDesc,
    TextureCreateDesc, TextureDesc, TextureFormat, TextureMemoryFootprint, TextureViewDesc,
    compute_footprints, footprints_total_size,
};

/// Host memory standing in for a texture, laid out like its staging footprints.
#[derive(Debug)]
pub(crate) struct SoftwareImage {
    desc: TextureDesc,
    footprints: Vec<TextureMemoryFootprint>,
    data: Mutex<Vec<u8>>,
}

/// Byte offsets of the rows of a footprint.
fn row_offsets(footprint: &TextureMemoryFootprint, rows: u32, depth: u32) -> impl Iterator<Item = usize> {
    let pitch = footprint.line_byte_aligned_size as usize;
    let slice = pitch * footprint.height as usize;
    let base = footprint.offset as usize;
    (0..depth as usize).flat_map(move |z| {
        (0..rows as usize).map(move |y| base + z * slice + y * pitch)
    })
}

impl SoftwareImage {
    fn new(desc: TextureDesc) -> Self {
        let footprints = compute_footprints(&desc);
        let size = footprints_total_size(&footprints) as usize;
        Self {
            desc,
            footprints,
            data: Mutex::new(vec![0; size]),
        }
    }

    fn footprint(&self, sub_resource: usize) -> Option<&TextureMemoryFootprint> {
        let footprint = self.footprints.get(sub_resource);
        if footprint.is_none() {
            report_error!(
                "Sub-resource {} out of range for {:?}",
                sub_resource,
                self.desc.label
            );
        }
        footprint
    }

    /// Copy rows laid out as `src_footprint` inside `src` into a sub-resource.
    fn write_rows(&self, sub_resource: usize, src_footprint: &TextureMemoryFootprint, src: &[u8]) {
        let Some(dst_footprint) = self.footprint(sub_resource) else {
            return;
        };
        let row = src_footprint.row_size().min(dst_footprint.row_size()) as usize;
        let rows = src_footprint.height.min(dst_footprint.height);
        let depth = u32::from(src_footprint.depth.min(dst_footprint.depth));
        let mut data = self.data.lock();
        for (s, d) in row_offsets(src_footprint, rows, depth).zip(row_offsets(dst_footprint, rows, depth)) {
            if s + row > src.len() || d + row > data.len() {
                report_error!("Texture upload overruns its source");
                return;
            }
            data[d..d + row].copy_from_slice(&src[s..s + row]);
        }
    }

    /// Copy a sub-resource into `dst`, laid out as `dst_footprint`.
    fn read_rows(&self, sub_resource: usize, dst_footprint: &TextureMemoryFootprint, dst: &mut [u8]) {
        let Some(src_footprint) = self.footprint(sub_resource) else {
            return;
        };
        let row = src_footprint.row_size().min(dst_footprint.row_size()) as usize;
        let rows = src_footprint.height.min(dst_footprint.height);
        let depth = u32::from(src_footprint.depth.min(dst_footprint.depth));
        let data = self.data.lock();
        for (s, d) in row_offsets(src_footprint, rows, depth).zip(row_offsets(dst_footprint, rows, depth)) {
            if d + row > dst.len() || s + row > data.len() {
                report_error!("Texture readback overruns its destination");
                return;
            }
            dst[d..d + row].copy_from_slice(&data[s..s + row]);
        }
    }

    fn copy(src: &Self, src_sub_resource: usize, dst: &Self, dst_sub_resource: usize, extent: Extent3d) {
        let (Some(src_footprint), Some(dst_footprint)) =
            (src.footprint(src_sub_resource), dst.footprint(dst_sub_resource))
        else {
            return;
        };
        let row = (extent.width * src_footprint.format.bytes_per_pixel())
            .min(src_footprint.row_size())
            .min(dst_footprint.row_size()) as usize;
        let rows = extent.height.min(src_footprint.height).min(dst_footprint.height);
        let depth = extent
            .depth
            .min(u32::from(src_footprint.depth))
            .min(u32::from(dst_footprint.depth));

        // Same image: snapshot the source rows first.
        let staged: Vec<Vec<u8>> = {
            let data = src.data.lock();
            row_offsets(src_footprint, rows, depth)
                .map(|s| data[s..s + row].to_vec())
                .collect()
        };
        let mut data = dst.data.lock();
        for (d, bytes) in row_offsets(dst_footprint, rows, depth).zip(staged) {
            data[d..d + row].copy_from_slice(&bytes);
        }
    }

    fn clear(&self, sub_resource: usize, texel: &[u8]) {
        let Some(footprint) = self.footprint(sub_resource) else {
            return;
        };
        let row = footprint.row_size() as usize;
        let mut data = self.data.lock();
        for offset in row_offsets(footprint, footprint.height, u32::from(footprint.depth)) {
            for pixel in data[offset..offset + row].chunks_exact_mut(texel.len()) {
                pixel.copy_from_slice(texel);
            }
        }
    }
}

/// Encode a clear value in `format`, `None` when the executor can't.
fn encode_texel(format: TextureFormat, value: [f32; 4]) -> Option<Vec<u8>> {
    let unorm = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let [r, g, b, a] = value;
    match format.storage_format() {
        TextureFormat::R8Unorm => Some(vec![unorm(r)]),
        TextureFormat::Rg8Unorm => Some(vec![unorm(r), unorm(g)]),
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8Srgb => {
            Some(vec![unorm(r), unorm(g), unorm(b), unorm(a)])
        }
        TextureFormat::Bgra8Unorm | TextureFormat::Bgra8Srgb => {
            Some(vec![unorm(b), unorm(g), unorm(r), unorm(a)])
        }
        TextureFormat::R32Float | TextureFormat::D32F => Some(r.to_le_bytes().to_vec()),
        TextureFormat::Rgba32Float => Some(bytemuck::cast_slice(&value).to_vec()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct SoftwareBuffer {
    memory: Memory,
}

#[derive(Debug, Clone)]
pub struct SoftwareTexture {
    image: Arc<SoftwareImage>,
}

#[derive(Debug, Clone)]
pub struct SoftwareTextureView {
    image: Arc<SoftwareImage>,
    sub_resource: usize,
    format: TextureFormat,
}

#[derive(Debug, Clone)]
pub struct SoftwareSampler {
    #[allow(dead_code)]
    desc: SamplerDesc,
}

#[derive(Debug, Clone)]
pub struct SoftwareShaderModule {
    #[allow(dead_code)]
    bytecode: Arc<[u8]>,
}

#[derive(Debug, Clone)]
pub struct SoftwareSetLayout {
    #[allow(dead_code)]
    descriptors: usize,
}

#[derive(Debug, Clone)]
pub struct SoftwareDescriptorSet {
    #[allow(dead_code)]
    frame_count: usize,
}

#[derive(Debug, Clone)]
pub struct SoftwarePipelineLayout {
    #[allow(dead_code)]
    set_count: usize,
    #[allow(dead_code)]
    push_constants: Vec<PushConstantDesc>,
}

#[derive(Debug, Clone)]
pub struct SoftwarePipeline {
    pub bind_point: BindPoint,
}

fn foreign(kind: &str) -> GraphicsError {
    GraphicsError::Internal(format!("{kind} does not belong to the software backend"))
}

/// The CPU executor.
#[derive(Debug)]
pub struct SoftwareBackend {
    shared: Arc<QueueShared>,
    queue: QueueThread,
    submitted: AtomicU64,
    device_lost: AtomicBool,
}

impl SoftwareBackend {
    /// Start the queue thread.
    pub fn new() -> Result<Self, GraphicsError> {
        let shared = Arc::new(QueueShared {
            fence: Default::default(),
            gate: Arc::new(QueueGate::default()),
            epoch: Instant::now(),
            timestamps: Mutex::new(Vec::new()),
            presented: Mutex::new(Vec::new()),
        });
        let (sender, receiver) = std::sync::mpsc::channel();
        let handle = queue::spawn(shared.clone(), receiver)?;
        log::info!("Software backend started");
        Ok(Self {
            shared,
            queue: QueueThread::new(sender, handle),
            submitted: AtomicU64::new(0),
            device_lost: AtomicBool::new(false),
        })
    }

    /// Gate in front of the queue thread; holding it stalls execution.
    pub fn gate(&self) -> Arc<QueueGate> {
        self.shared.gate.clone()
    }

    /// Swap chain images presented so far, in order.
    pub fn presented_images(&self) -> Vec<u32> {
        self.shared.presented.lock().clone()
    }

    /// Make every following submission fail as if the device was lost.
    pub fn simulate_device_lost(&self) {
        self.device_lost.store(true, Ordering::Release);
    }

    fn memory(registry: &Registry, handle: BufferHandle) -> Option<Memory> {
        let memory = registry
            .buffer(handle)
            .and_then(|b| b.native.as_software())
            .map(|b| b.memory.clone());
        if memory.is_none() {
            report_error!("Submitted list refers to unknown buffer {:?}", handle);
        }
        memory
    }

    fn image(registry: &Registry, handle: TextureHandle) -> Option<Arc<SoftwareImage>> {
        let image = registry
            .texture(handle)
            .and_then(|t| t.native.as_software())
            .map(|t| t.image.clone());
        if image.is_none() {
            report_error!("Submitted list refers to unknown texture {:?}", handle);
        }
        image
    }

    fn lower_render_pass_clears(registry: &Registry, command: &Command, ops: &mut Vec<Op>) {
        let Command::BeginRenderPass(handle) = command else {
            return;
        };
        let Some(desc) = registry.render_pass(*handle) else {
            report_error!("Submitted list refers to unknown render pass {:?}", handle);
            return;
        };
        let colors = desc
            .color_attachments
            .iter()
            .filter(|a| a.load_op == LoadOp::Clear)
            .map(|a| (a.rtv, a.clear_color));
        let depth = desc
            .depth_stencil_attachment
            .filter(|a| a.load_op == LoadOp::Clear)
            .map(|a| (a.rtv, [a.clear_depth, 0.0, 0.0, 0.0]));
        for (rtv, value) in colors.chain(depth) {
            let Some(view) = registry
                .render_target_view(rtv)
                .and_then(|v| v.native.as_software())
            else {
                continue;
            };
            match encode_texel(view.format, value) {
                Some(texel) => ops.push(Op::Clear {
                    image: view.image.clone(),
                    sub_resource: view.sub_resource,
                    texel,
                }),
                None => log::trace!("No software clear for {:?}", view.format),
            }
        }
    }

    fn lower(&self, submission: &Submission<'_>) -> Vec<Op> {
        verglas_core::profile_function!();
        let registry = submission.registry;
        let mut ops = Vec::new();
        for batch in &submission.batches {
            for list in &batch.lists {
                for command in list.iter() {
                    match command {
                        Command::BeginRenderPass(_) => {
                            Self::lower_render_pass_clears(registry, command, &mut ops)
                        }
                        Command::CopyBuffer(params) => {
                            if let (Some(src), Some(dst)) = (
                                Self::memory(registry, params.buffer_src),
                                Self::memory(registry, params.buffer_dst),
                            ) {
                                ops.push(Op::CopyBuffer {
                                    src,
                                    src_offset: params.offset_src,
                                    dst,
                                    dst_offset: params.offset_dst,
                                    size: params.copy_size,
                                });
                            }
                        }
                        Command::CopyBufferToTexture {
                            buffer,
                            footprint,
                            texture,
                            sub_resource,
                        } => {
                            if let (Some(buffer), Some(image)) =
                                (Self::memory(registry, *buffer), Self::image(registry, *texture))
                            {
                                ops.push(Op::BufferToTexture {
                                    buffer,
                                    footprint: *footprint,
                                    image,
                                    sub_resource: sub_resource.linear_index(),
                                });
                            }
                        }
                        Command::CopyTextureToBuffer {
                            texture,
                            sub_resource,
                            buffer,
                            footprint,
                        } => {
                            if let (Some(image), Some(buffer)) =
                                (Self::image(registry, *texture), Self::memory(registry, *buffer))
                            {
                                ops.push(Op::TextureToBuffer {
                                    image,
                                    sub_resource: sub_resource.linear_index(),
                                    buffer,
                                    footprint: *footprint,
                                });
                            }
                        }
                        Command::CopyTexture {
                            src,
                            src_sub_resource,
                            dst,
                            dst_sub_resource,
                            extent,
                        } => {
                            if let (Some(src), Some(dst)) =
                                (Self::image(registry, *src), Self::image(registry, *dst))
                            {
                                ops.push(Op::TextureToTexture {
                                    src,
                                    src_sub_resource: src_sub_resource.linear_index(),
                                    dst,
                                    dst_sub_resource: dst_sub_resource.linear_index(),
                                    extent: *extent,
                                });
                            }
                        }
                        Command::WriteTimestamp(index) => ops.push(Op::Timestamp {
                            frame_index: submission.frame_index,
                            index: *index,
                        }),
                        Command::Draw(_)
                        | Command::DrawIndexed(_)
                        | Command::DrawIndirect { .. }
                        | Command::Dispatch { .. } => {
                            log::trace!("Software backend skips {:?}", command);
                        }
                        _ => {}
                    }
                }
            }
        }
        if let Some(image) = submission.present {
            ops.push(Op::Present { image });
        }
        ops
    }
}

impl Drop for SoftwareBackend {
    fn drop(&mut self) {
        // a held gate would keep the queue thread from draining
        self.shared.gate.release();
    }
}

impl GpuBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "Software"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            timestamp_period_ns: 1.0,
            timestamp_queries: true,
            dedicated_transfer_queue: false,
            dedicated_compute_queue: false,
            window_presentation: false,
        }
    }

    fn configure_frames(&self, frame_count: usize) -> Result<(), GraphicsError> {
        *self.shared.timestamps.lock() =
            vec![vec![0; TIMESTAMPS_PER_FRAME as usize]; frame_count];
        Ok(())
    }

    fn reset_frame(&self, _frame_index: usize) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn create_buffer(&self, desc: &BufferCreateDesc) -> Result<GpuBuffer, GraphicsError> {
        log::trace!("Software: creating buffer {:?} ({} bytes)", desc.label, desc.size);
        let size = usize::try_from(desc.size).map_err(|_| GraphicsError::OutOfMemory)?;
        Ok(GpuBuffer::Software(SoftwareBuffer {
            memory: Arc::new(Mutex::new(vec![0; size])),
        }))
    }

    fn create_texture(&self, desc: &TextureCreateDesc) -> Result<GpuTexture, GraphicsError> {
        log::trace!(
            "Software: creating texture {:?} ({}x{}x{})",
            desc.desc.label,
            desc.desc.dimensions.width,
            desc.desc.dimensions.height,
            desc.desc.dimensions.depth
        );
        Ok(GpuTexture::Software(SoftwareTexture {
            image: Arc::new(SoftwareImage::new(desc.desc.clone())),
        }))
    }

    fn create_texture_view(
        &self,
        texture: &GpuTexture,
        desc: &TextureViewDesc,
    ) -> Result<GpuTextureView, GraphicsError> {
        let texture = texture.as_software().ok_or_else(|| foreign("texture"))?;
        let mip_count = usize::from(texture.image.desc.mip_count);
        Ok(GpuTextureView::Software(SoftwareTextureView {
            image: texture.image.clone(),
            sub_resource: usize::from(desc.array_start) * mip_count + usize::from(desc.min_mip),
            format: desc.format,
        }))
    }

    fn create_render_target_view(
        &self,
        texture: &GpuTexture,
        desc: &RenderTargetViewDesc,
    ) -> Result<GpuTextureView, GraphicsError> {
        let texture = texture.as_software().ok_or_else(|| foreign("texture"))?;
        let mip_count = usize::from(texture.image.desc.mip_count);
        Ok(GpuTextureView::Software(SoftwareTextureView {
            image: texture.image.clone(),
            sub_resource: usize::from(desc.array_start) * mip_count + usize::from(desc.mip_level),
            format: desc.format,
        }))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<GpuSampler, GraphicsError> {
        Ok(GpuSampler::Software(SoftwareSampler { desc: desc.clone() }))
    }

    fn create_shader_module(&self, bytecode: &[u8]) -> Result<GpuShaderModule, GraphicsError> {
        Ok(GpuShaderModule::Software(SoftwareShaderModule {
            bytecode: Arc::from(bytecode),
        }))
    }

    fn create_descriptor_set_layout(
        &self,
        layout: &DescriptorSetLayoutInfo,
    ) -> Result<GpuDescriptorSetLayout, GraphicsError> {
        Ok(GpuDescriptorSetLayout::Software(SoftwareSetLayout {
            descriptors: layout.total_descriptors(),
        }))
    }

    fn create_descriptor_set(
        &self,
        _layout: &GpuDescriptorSetLayout,
        _info: &DescriptorSetLayoutInfo,
        frame_count: usize,
    ) -> Result<GpuDescriptorSet, GraphicsError> {
        Ok(GpuDescriptorSet::Software(SoftwareDescriptorSet { frame_count }))
    }

    fn create_pipeline_layout(
        &self,
        sets: &[&GpuDescriptorSetLayout],
        push_constants: &[PushConstantDesc],
    ) -> Result<GpuPipelineLayout, GraphicsError> {
        Ok(GpuPipelineLayout::Software(SoftwarePipelineLayout {
            set_count: sets.len(),
            push_constants: push_constants.to_vec(),
        }))
    }

    fn create_graphics_pipeline(
        &self,
        inputs: &GraphicsPipelineInputs<'_>,
    ) -> Result<GpuPipeline, GraphicsError> {
        log::trace!(
            "Software: graphics pipeline {:?} with {} stages",
            inputs.desc.label,
            inputs.stages.len()
        );
        Ok(GpuPipeline::Software(SoftwarePipeline {
            bind_point: BindPoint::Graphics,
        }))
    }

    fn create_compute_pipeline(
        &self,
        inputs: &ComputePipelineInputs<'_>,
    ) -> Result<GpuPipeline, GraphicsError> {
        log::trace!("Software: compute pipeline {:?}", inputs.desc.label);
        Ok(GpuPipeline::Software(SoftwarePipeline {
            bind_point: BindPoint::Compute,
        }))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let buffer = buffer.as_software().ok_or_else(|| foreign("buffer"))?;
        let mut memory = buffer.memory.lock();
        let start = offset as usize;
        let end = start + data.len();
        if end > memory.len() {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at {} overruns a {} byte buffer",
                data.len(),
                offset,
                memory.len()
            )));
        }
        memory[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64) -> Result<Vec<u8>, GraphicsError> {
        let buffer = buffer.as_software().ok_or_else(|| foreign("buffer"))?;
        let memory = buffer.memory.lock();
        let start = offset as usize;
        let end = start + size as usize;
        memory.get(start..end).map(<[u8]>::to_vec).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "read of {} bytes at {} overruns a {} byte buffer",
                size,
                offset,
                memory.len()
            ))
        })
    }

    fn submit(&self, submission: Submission<'_>) -> Result<(), GraphicsError> {
        if self.device_lost.load(Ordering::Acquire) {
            return Err(GraphicsError::DeviceLost);
        }
        let ops = self.lower(&submission);
        log::trace!(
            "Software: frame {} submits {} operations",
            submission.signal_value,
            ops.len()
        );
        self.queue.send(Job {
            ops,
            signal_value: submission.signal_value,
        })?;
        self.submitted
            .fetch_max(submission.signal_value, Ordering::AcqRel);
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        self.shared.fence.value()
    }

    fn wait_for_value(&self, value: u64) -> Result<(), GraphicsError> {
        if value > self.submitted.load(Ordering::Acquire) {
            return Err(GraphicsError::Internal(format!(
                "waiting for fence value {value} that was never submitted"
            )));
        }
        self.shared.fence.wait(value);
        Ok(())
    }

    fn read_timestamps(&self, frame_index: usize, count: u32) -> Result<Vec<u64>, GraphicsError> {
        let timestamps = self.shared.timestamps.lock();
        let frame = timestamps
            .get(frame_index)
            .ok_or_else(|| GraphicsError::Internal(format!("no timestamps for frame context {frame_index}")))?;
        Ok(frame[..(count as usize).min(frame.len())].to_vec())
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        self.shared.fence.wait(self.submitted.load(Ordering::Acquire));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureUsage;

    fn image(width: u32, height: u32) -> SoftwareImage {
        SoftwareImage::new(TextureDesc::new_2d(width, height, TextureFormat::Rgba8Unorm))
    }

    #[test]
    fn test_image_write_then_read() {
        let image = image(2, 2);
        let footprint = compute_footprints(&image.desc)[0];
        let mut staging = vec![0u8; footprint.size() as usize];
        staging[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let pitch = footprint.line_byte_aligned_size as usize;
        staging[pitch..pitch + 8].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

        image.write_rows(0, &footprint, &staging);
        let mut readback = vec![0u8; staging.len()];
        image.read_rows(0, &footprint, &mut readback);
        assert_eq!(readback, staging);
    }

    #[test]
    fn test_clear_encodes_bgra() {
        assert_eq!(
            encode_texel(TextureFormat::Bgra8Unorm, [1.0, 0.0, 0.0, 1.0]),
            Some(vec![0, 0, 255, 255])
        );
        assert_eq!(encode_texel(TextureFormat::Rgba16Float, [0.0; 4]), None);

        let image = image(1, 1);
        image.clear(0, &[7, 7, 7, 7]);
        assert_eq!(&image.data.lock()[..4], &[7, 7, 7, 7]);
    }

    #[test]
    fn test_buffer_write_read() {
        let backend = SoftwareBackend::new().unwrap();
        let buffer = backend
            .create_buffer(&BufferCreateDesc::new(
                8,
                crate::types::MemoryPlacement::StageOnce,
                crate::types::BufferUsage::TRANSFER_SRC,
            ))
            .unwrap();
        backend.write_buffer(&buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(backend.read_buffer(&buffer, 0, 8).unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(backend.write_buffer(&buffer, 6, &[0; 4]).is_err());
    }

    #[test]
    fn test_texture_view_picks_sub_resource() {
        let backend = SoftwareBackend::new().unwrap();
        let desc = TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm)
            .with_mip_count(2)
            .with_array_size(2);
        let texture = backend
            .create_texture(&TextureCreateDesc::new(desc, TextureUsage::COLOR_TARGET))
            .unwrap();
        let mut rtv = RenderTargetViewDesc::new(TextureHandle::INVALID, TextureFormat::Rgba8Unorm);
        rtv.array_start = 1;
        rtv.mip_level = 1;
        let view = backend.create_render_target_view(&texture, &rtv).unwrap();
        assert_eq!(view.as_software().unwrap().sub_resource, 3);
    }
}
