//! The graphics context.
//!
//! [`GraphicsContext`] owns one executor, the registry of every object
//! created through it, the shader-visible descriptor heaps, the frame ring
//! and the swap chain. It is the whole client surface: resources are
//! created and destroyed here, command lists are handed out here and the
//! frame is submitted from here.
//!
//! # Failure model
//!
//! Apart from [`GraphicsContext::create`], nothing returns a `Result`. A
//! call that fails reports a diagnostic through `verglas_core::diagnostics`
//! and hands back a sentinel: an invalid handle, `false` or `None`.
//!
//! # Frame pipeline
//!
//! ```text
//!   begin_*_command_list ─► record ─► end_*_command_list     (any thread)
//!                                            │
//!                                            ▼
//!   end_frame: submit transfer, compute, graphics ─► present ─► signal f
//!              wait for f - N ─► release what frames <= completed retired
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{RwLock, RwLockReadGuard};
use verglas_core::diagnostics::Severity;
use verglas_core::{report, report_error, report_warning, verify};

use crate::app_info::{ApiFamily, ApplicationInfo};
use crate::backend::{
    BackendCapabilities, ComputePipelineInputs, GpuBackend, GpuTexture, GraphicsPipelineInputs,
    QueueBatch, Submission, SwapChainDesc, SwapChainImages, create_backend,
};
use crate::barrier::BarrierCaps;
use crate::command::{BindPoint, CommandList, QueueType};
use crate::descriptor::{
    DescriptorData, DescriptorHeaps, DescriptorSetDesc, DescriptorSetLayoutInfo,
    DescriptorSetStorage, DescriptorSetWriteInfo, HeapKind,
};
use crate::error::GraphicsError;
use crate::frame::{FrameContext, FrameRing};
use crate::handles::{
    BufferHandle, BufferViewHandle, ComputePipelineHandle, DescriptorSetHandle,
    DescriptorSetLayoutHandle, GraphicsPipelineHandle, PipelineLayoutHandle, RenderPassHandle,
    RenderTargetViewHandle, SamplerHandle, ShaderModuleHandle, TextureHandle, TextureViewHandle,
    TimestampHandle,
};
use crate::registry::validation::{
    validate_buffer, validate_buffer_view, validate_render_pass, validate_render_target_view,
    validate_sampler, validate_texture, validate_texture_view,
};
use crate::registry::{
    Buffer, BufferView, DescriptorSet, DescriptorSetLayout, Pipeline, PipelineLayout, Registry,
    RenderTargetView, Sampler, ShaderModule, Texture, TextureView,
};
use crate::swapchain::{
    PresentTarget, SwapChain, SwapChainSource, check_image_count, check_srgb,
    frame_context_count, requested_image_count,
};
use crate::types::{
    BufferCreateDesc, BufferMapping, BufferUsage, ComputePipelineDesc, Extent3d,
    GraphicsPipelineDesc, MemoryPlacement, PipelineLayoutDesc, RenderPassDesc,
    RenderTargetViewDesc, SamplerDesc, ShaderStageKind, TextureCreateDesc, TextureDesc,
    TextureFormat, TextureMemoryFootprint, TextureUsage, TextureViewDesc, BufferViewDesc,
    compute_footprints, footprints_total_size,
};

/// Bytes of push constants every executor guarantees.
pub const MAX_PUSH_CONSTANT_BYTES: u32 = 128;

/// Owner of a device and everything created on it.
pub struct GraphicsContext {
    info: ApplicationInfo,
    backend: Arc<dyn GpuBackend>,
    capabilities: BackendCapabilities,
    barrier_caps: BarrierCaps,
    registry: RwLock<Registry>,
    heaps: DescriptorHeaps,
    frames: FrameRing,
    /// The frame being recorded. Starts at 1.
    frame_id: u64,
    swap_chain: Option<SwapChain>,
    device_lost: AtomicBool,
}

static_assertions::assert_impl_all!(GraphicsContext: Send, Sync);

impl GraphicsContext {
    /// Bring up a device for `info`.
    ///
    /// With a `presentable` and presentation enabled the context owns a
    /// swap chain: a native one when the target has a window the executor
    /// can present to, otherwise a ring of offscreen images.
    pub fn create(
        info: ApplicationInfo,
        presentable: Option<&dyn PresentTarget>,
    ) -> Result<Self, GraphicsError> {
        info.validate()?;
        let window = if info.features.present {
            presentable.and_then(|target| target.window_handles())
        } else {
            None
        };
        let backend = create_backend(&info, window)?;
        Self::with_backend(info, backend, presentable)
    }

    /// Bring up a context on an executor the caller already built.
    pub fn with_backend(
        info: ApplicationInfo,
        backend: Arc<dyn GpuBackend>,
        presentable: Option<&dyn PresentTarget>,
    ) -> Result<Self, GraphicsError> {
        info.validate()?;
        let capabilities = backend.capabilities();
        let mut registry = Registry::new();
        let heaps = DescriptorHeaps::new();

        let swap_chain = match presentable {
            Some(target) if info.features.present => {
                let (width, height) = surface_size(target, &info);
                let chain = match target.window_handles() {
                    Some(window) if capabilities.window_presentation => {
                        let desc = swap_chain_desc(&info, width, height, None);
                        let images = backend.create_swap_chain(window, &desc)?;
                        let mut chain =
                            register_swap_chain(&*backend, &info, &mut registry, &heaps, images)?;
                        chain.current = backend.acquire_next_image()?;
                        chain
                    }
                    _ => create_offscreen_chain(
                        &*backend,
                        &info,
                        &mut registry,
                        &heaps,
                        width,
                        height,
                        requested_image_count(info.display_options.triple_buffering),
                    )?,
                };
                Some(chain)
            }
            _ => None,
        };

        let frame_count = frame_context_count(
            swap_chain.as_ref().map(SwapChain::image_count),
            info.display_options.triple_buffering,
        );
        backend.configure_frames(frame_count)?;

        log::info!(
            "Graphics context '{}' up: {:?} on {} with {} frame contexts{}",
            info.application_name,
            info.api,
            backend.name(),
            frame_count,
            match &swap_chain {
                Some(chain) => format!(
                    ", {:?} swap chain of {} {:?} images",
                    chain.source,
                    chain.image_count(),
                    chain.format
                ),
                None => String::new(),
            }
        );

        Ok(Self {
            barrier_caps: BarrierCaps::for_api(info.api),
            info,
            backend,
            capabilities,
            registry: RwLock::new(registry),
            heaps,
            frames: FrameRing::new(frame_count),
            frame_id: 1,
            swap_chain,
            device_lost: AtomicBool::new(false),
        })
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read()
    }

    pub(crate) fn backend(&self) -> &dyn GpuBackend {
        &*self.backend
    }

    pub(crate) fn barrier_caps(&self) -> BarrierCaps {
        self.barrier_caps
    }

    fn usable(&self, operation: &str) -> bool {
        verify!(
            !self.is_device_lost(),
            "{operation} ignored: the device is lost"
        )
    }

    /// Report a failed executor call, marking the device lost when fatal.
    fn backend_failed(&self, operation: &str, error: GraphicsError) {
        if error.is_fatal() {
            self.device_lost.store(true, Ordering::Release);
            report!(Severity::Fatal, "{operation} failed: {error}");
        } else {
            report_error!("{operation} failed: {error}");
        }
    }

    fn allocate_slots(&self, kind: HeapKind, count: u32) -> Option<u32> {
        let start = self.heaps.heap(kind).allocate(count);
        if start.is_none() {
            report!(
                Severity::Fatal,
                "{kind:?} descriptor heap exhausted ({count} slots requested, capacity {})",
                kind.capacity()
            );
        }
        start
    }

    /// Release objects and heap ranges retired during executed frames.
    fn release_completed(&self) -> u64 {
        let completed = self.backend.completed_value();
        self.registry.write().collect(completed);
        self.heaps.retire(completed);
        completed
    }

    fn prepare_frame(&self, frame: &FrameContext) -> Result<(), GraphicsError> {
        frame.prepare(
            self.frame_id,
            |previous| self.backend.wait_for_value(previous),
            |index| self.backend.reset_frame(index),
        )
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// The frame currently being recorded.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn frame_context_count(&self) -> usize {
        self.frames.len()
    }

    pub fn current_frame_context_index(&self) -> usize {
        self.frames.index_of(self.frame_id)
    }

    /// Submit everything recorded for the current frame and start the next.
    ///
    /// Lists go out in transfer, compute, graphics order, followed by the
    /// present of the current swap chain image. The frame fence is signalled
    /// with the frame id even when nothing was recorded. Before returning the
    /// call blocks until frame `f - N` has executed, then releases whatever
    /// was destroyed during executed frames. Returns the id of the ended
    /// frame.
    pub fn end_frame(&mut self) -> u64 {
        verglas_core::profile_function!();
        let frame_id = self.frame_id;
        let frame = self.frames.context_for(frame_id);

        if self.is_device_lost() {
            report_error!("frame {frame_id} dropped: the device is lost");
            for queue in QueueType::SUBMIT_ORDER {
                frame.lock_set(queue).mark_submitted();
            }
        } else {
            self.submit_frame(frame, frame_id);
        }

        verglas_core::frame_mark!();
        self.frame_id += 1;

        let frame_count = self.frames.len() as u64;
        if !self.is_device_lost() && frame_id > frame_count {
            verglas_core::profile_scope!("frame_back_pressure");
            if let Err(e) = self.backend.wait_for_value(frame_id - frame_count) {
                self.backend_failed("waiting for the frame fence", e);
            }
        }

        let completed = self.release_completed();

        if let Some(chain) = self.swap_chain.as_mut() {
            match chain.source {
                SwapChainSource::Native => match self.backend.acquire_next_image() {
                    Ok(index) => chain.current = index,
                    Err(e) => report_warning!(
                        "Acquiring the next swap chain image failed: {e}; resize the context"
                    ),
                },
                SwapChainSource::Offscreen => {
                    chain.rotate();
                }
            }
        }

        log::trace!("Frame {} ended, GPU completed {}", frame_id, completed);
        frame_id
    }

    fn submit_frame(&self, frame: &FrameContext, frame_id: u64) {
        if let Err(e) = self.prepare_frame(frame) {
            self.backend_failed("preparing the frame context", e);
        }

        let registry = self.registry.read();
        let mut sets: Vec<_> = QueueType::SUBMIT_ORDER
            .iter()
            .map(|&queue| (queue, frame.lock_set(queue)))
            .collect();
        let batches = sets
            .iter()
            .filter(|(_, set)| !set.recorded().is_empty())
            .map(|(queue, set)| QueueBatch {
                queue: *queue,
                lists: set.recorded().iter().map(Vec::as_slice).collect(),
            })
            .collect();

        let result = self.backend.submit(Submission {
            frame_index: frame.index,
            signal_value: frame_id,
            batches,
            registry: &registry,
            present: self.swap_chain.as_ref().map(|chain| chain.current),
        });
        for (_, set) in &mut sets {
            set.mark_submitted();
        }

        if let Err(e) = result {
            // The fence will never reach this frame; nothing later can be waited on.
            self.device_lost.store(true, Ordering::Release);
            report!(Severity::Fatal, "submitting frame {frame_id} failed: {e}");
        }
    }

    /// Block until frame `frame_id` has executed.
    pub fn wait_for_frame(&self, frame_id: u64) -> bool {
        if !verify!(
            frame_id < self.frame_id,
            "wait_for_frame({frame_id}): frame {} has not been submitted",
            self.frame_id
        ) || !self.usable("wait_for_frame")
        {
            return false;
        }
        match self.backend.wait_for_value(frame_id) {
            Ok(()) => {
                self.release_completed();
                true
            }
            Err(e) => {
                self.backend_failed("waiting for the frame fence", e);
                false
            }
        }
    }

    /// Block until every submitted frame has executed.
    pub fn wait_for_last_frame(&self) -> bool {
        self.frame_id == 1 || self.wait_for_frame(self.frame_id - 1)
    }

    pub fn is_frame_executed(&self, frame_id: u64) -> bool {
        self.backend.completed_value() >= frame_id
    }

    pub fn application_info(&self) -> &ApplicationInfo {
        &self.info
    }

    /// Extension of shader binaries for the context's API family.
    pub fn shader_file_extension(&self) -> &'static str {
        self.info.api.shader_file_extension()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn has_dedicated_transfer_queue(&self) -> bool {
        self.capabilities.dedicated_transfer_queue && self.info.features.transfer_queue
    }

    pub fn has_dedicated_compute_queue(&self) -> bool {
        self.capabilities.dedicated_compute_queue && self.info.features.async_compute
    }

    pub fn supports_non_global_barriers(&self) -> bool {
        self.barrier_caps.supports_non_global_barriers()
    }

    /// Whether render passes must declare the views their shaders touch.
    pub fn render_pass_needs_usage_declaration(&self) -> bool {
        self.info.api.family() == ApiFamily::Metal
    }

    pub fn compute_pass_needs_usage_declaration(&self) -> bool {
        self.info.api.family() == ApiFamily::Metal
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Acquire)
    }

    /// Rebuild the swap chain at a new size.
    ///
    /// Waits for the GPU to drain and releases the old images and views
    /// before the new ones are registered. Handles from
    /// [`present_texture`](Self::present_texture) and
    /// [`present_render_target_view`](Self::present_render_target_view) must
    /// be fetched again afterwards.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !verify!(
            width > 0 && height > 0,
            "resize to {width}x{height}: the size has an empty axis"
        ) || !self.usable("resize")
        {
            return false;
        }
        let Some(old) = self.swap_chain.take() else {
            report_error!("resize: the context has no swap chain");
            return false;
        };
        if let Err(e) = self.backend.wait_idle() {
            self.backend_failed("waiting for the GPU before resizing", e);
            self.swap_chain = Some(old);
            return false;
        }

        // same frame as any destroy recorded before the resize
        let retire_frame = self.frame_id;
        let registry = self.registry.get_mut();
        for view in &old.views {
            let slot = registry.render_target_views.get(view.0).map(|v| v.heap_slot);
            if let Some(slot) = slot {
                registry.retire_render_target_view(*view, retire_frame);
                self.heaps
                    .heap(HeapKind::RenderTargetView)
                    .free(slot, 1, retire_frame);
            }
        }
        for image in &old.images {
            registry.retire_texture(*image, retire_frame);
        }
        let completed = self.backend.completed_value();
        registry.collect(completed);
        self.heaps.retire(completed);

        let result = match old.source {
            SwapChainSource::Native => {
                let desc = swap_chain_desc(&self.info, width, height, Some(old.image_count()));
                self.backend
                    .recreate_swap_chain(&desc)
                    .and_then(|images| {
                        register_swap_chain(&*self.backend, &self.info, registry, &self.heaps, images)
                    })
                    .and_then(|mut chain| {
                        chain.current = self.backend.acquire_next_image()?;
                        Ok(chain)
                    })
            }
            SwapChainSource::Offscreen => create_offscreen_chain(
                &*self.backend,
                &self.info,
                registry,
                &self.heaps,
                width,
                height,
                old.image_count(),
            ),
        };
        match result {
            Ok(chain) => {
                if chain.image_count() != old.image_count() {
                    log::warn!(
                        "Swap chain changed from {} to {} images on resize",
                        old.image_count(),
                        chain.image_count()
                    );
                }
                log::info!("Swap chain resized to {}x{}", width, height);
                self.swap_chain = Some(chain);
                true
            }
            Err(e) => {
                self.backend_failed("resizing the swap chain", e);
                false
            }
        }
    }

    // ---------------------------------------------------------------------
    // Buffers and textures
    // ---------------------------------------------------------------------

    pub fn create_buffer(&self, desc: &BufferCreateDesc) -> BufferHandle {
        if !self.usable("create_buffer") {
            return BufferHandle::INVALID;
        }
        if let Err(e) = validate_buffer(desc) {
            report_error!("create_buffer {:?}: {}", desc.label, e);
            return BufferHandle::INVALID;
        }
        let native = match self.backend.create_buffer(desc) {
            Ok(native) => native,
            Err(e) => {
                self.backend_failed("create_buffer", e);
                return BufferHandle::INVALID;
            }
        };
        let handle = BufferHandle(self.registry.write().buffers.allocate_with_cold(
            Buffer {
                native,
                mapped: false,
            },
            desc.clone(),
        ));
        log::trace!("Created {:?} ({} bytes, {:?})", handle, desc.size, desc.placement);
        handle
    }

    /// Whether CPU data reaches `buffer` only through a staging copy.
    pub fn needs_staging_buffer(&self, buffer: BufferHandle) -> bool {
        match self.registry.read().buffers.get_cold(buffer.0) {
            Some(desc) => desc.placement == MemoryPlacement::GpuOnly,
            None => {
                report_error!("needs_staging_buffer: unknown buffer {:?}", buffer);
                false
            }
        }
    }

    /// Destroy a buffer. The memory is released once the current frame has executed.
    pub fn destroy_buffer(&self, buffer: BufferHandle) -> bool {
        let mut registry = self.registry.write();
        if let Some(entry) = registry.buffers.get(buffer.0)
            && entry.mapped
        {
            report_warning!("Destroying {:?} while it is mapped", buffer);
        }
        verify!(
            registry.retire_buffer(buffer, self.frame_id),
            "destroy_buffer: {:?} is not a live buffer",
            buffer
        )
    }

    /// Creation descriptor of a live buffer.
    pub fn buffer_desc(&self, buffer: BufferHandle) -> Option<BufferCreateDesc> {
        self.registry.read().buffers.get_cold(buffer.0).cloned()
    }

    pub fn create_texture(&self, desc: &TextureCreateDesc) -> TextureHandle {
        if !self.usable("create_texture") {
            return TextureHandle::INVALID;
        }
        if let Err(e) = validate_texture(desc) {
            report_error!("create_texture {:?}: {}", desc.desc.label, e);
            return TextureHandle::INVALID;
        }
        let mut desc = desc.clone();
        if desc.footprints.is_empty() {
            desc.footprints = compute_footprints(&desc.desc);
        }
        let native = match self.backend.create_texture(&desc) {
            Ok(native) => native,
            Err(e) => {
                self.backend_failed("create_texture", e);
                return TextureHandle::INVALID;
            }
        };
        let handle = TextureHandle(self.registry.write().textures.allocate_with_cold(
            Texture { native },
            desc,
        ));
        log::trace!("Created {:?}", handle);
        handle
    }

    /// Track a texture the context does not own.
    ///
    /// Destroying the handle frees the slot; `native` decides whether its
    /// drop releases the image.
    pub fn register_texture(&self, native: GpuTexture, desc: TextureCreateDesc) -> TextureHandle {
        TextureHandle(self.registry.write().textures.allocate_with_cold(
            Texture { native },
            desc,
        ))
    }

    /// Copy layout of every sub-resource of `desc`, slice major.
    pub fn fetch_texture_sub_resources_memory_footprints(
        &self,
        desc: &TextureDesc,
    ) -> Vec<TextureMemoryFootprint> {
        compute_footprints(desc)
    }

    /// An upload buffer large enough for `footprints`.
    pub fn create_staging_buffer(
        &self,
        desc: &TextureDesc,
        footprints: &[TextureMemoryFootprint],
    ) -> BufferHandle {
        if !verify!(
            !footprints.is_empty(),
            "create_staging_buffer {:?}: no footprints",
            desc.label
        ) {
            return BufferHandle::INVALID;
        }
        let mut staging = BufferCreateDesc::new(
            footprints_total_size(footprints),
            MemoryPlacement::StageOnce,
            BufferUsage::TRANSFER_SRC,
        );
        if let Some(label) = &desc.label {
            staging = staging.with_label(format!("{label} staging"));
        }
        self.create_buffer(&staging)
    }

    pub fn destroy_texture(&self, texture: TextureHandle) -> bool {
        if let Some(chain) = &self.swap_chain
            && chain.images.contains(&texture)
        {
            report_error!("destroy_texture: {:?} belongs to the swap chain", texture);
            return false;
        }
        let mut registry = self.registry.write();
        verify!(
            registry.retire_texture(texture, self.frame_id),
            "destroy_texture: {:?} is not a live texture",
            texture
        )
    }

    /// Creation descriptor of a live texture.
    pub fn texture_desc(&self, texture: TextureHandle) -> Option<TextureCreateDesc> {
        self.registry.read().textures.get_cold(texture.0).cloned()
    }

    // ---------------------------------------------------------------------
    // Views, samplers and render passes
    // ---------------------------------------------------------------------

    pub fn create_texture_view(&self, desc: &TextureViewDesc) -> TextureViewHandle {
        if !self.usable("create_texture_view") {
            return TextureViewHandle::INVALID;
        }
        let mut registry = self.registry.write();
        let Some((texture, parent)) = registry.textures.get_all(desc.texture.0) else {
            report_error!("create_texture_view: unknown texture {:?}", desc.texture);
            return TextureViewHandle::INVALID;
        };
        if let Err(e) = validate_texture_view(desc, parent) {
            report_error!("create_texture_view {:?}: {}", desc.label, e);
            return TextureViewHandle::INVALID;
        }
        let native = match self.backend.create_texture_view(&texture.native, desc) {
            Ok(native) => native,
            Err(e) => {
                self.backend_failed("create_texture_view", e);
                return TextureViewHandle::INVALID;
            }
        };
        let Some(heap_slot) = self.allocate_slots(HeapKind::CbvSrvUav, 1) else {
            return TextureViewHandle::INVALID;
        };
        let handle = TextureViewHandle(registry.texture_views.allocate_with_cold(
            TextureView {
                native,
                texture: desc.texture,
                heap_slot,
            },
            desc.clone(),
        ));
        if !handle.is_valid() {
            self.heaps.heap(HeapKind::CbvSrvUav).free(heap_slot, 1, 0);
        }
        handle
    }

    pub fn destroy_texture_view(&self, view: TextureViewHandle) -> bool {
        let mut registry = self.registry.write();
        let slot = registry.texture_views.get(view.0).map(|v| v.heap_slot);
        if !verify!(
            registry.retire_texture_view(view, self.frame_id),
            "destroy_texture_view: {:?} is not a live view",
            view
        ) {
            return false;
        }
        if let Some(slot) = slot {
            self.heaps
                .heap(HeapKind::CbvSrvUav)
                .free(slot, 1, self.frame_id);
        }
        true
    }

    pub fn create_buffer_view(&self, desc: &BufferViewDesc) -> BufferViewHandle {
        if !self.usable("create_buffer_view") {
            return BufferViewHandle::INVALID;
        }
        let mut registry = self.registry.write();
        let Some(parent) = registry.buffers.get_cold(desc.buffer.0) else {
            report_error!("create_buffer_view: unknown buffer {:?}", desc.buffer);
            return BufferViewHandle::INVALID;
        };
        if let Err(e) = validate_buffer_view(desc, parent) {
            report_error!("create_buffer_view {:?}: {}", desc.label, e);
            return BufferViewHandle::INVALID;
        }
        let Some(heap_slot) = self.allocate_slots(HeapKind::CbvSrvUav, 1) else {
            return BufferViewHandle::INVALID;
        };
        BufferViewHandle(registry.buffer_views.allocate_with_cold(
            BufferView {
                buffer: desc.buffer,
                offset: desc.offset,
                size: desc.size,
                heap_slot,
            },
            desc.clone(),
        ))
    }

    pub fn destroy_buffer_view(&self, view: BufferViewHandle) -> bool {
        let mut registry = self.registry.write();
        let slot = registry.buffer_views.get(view.0).map(|v| v.heap_slot);
        if !verify!(
            registry.retire_buffer_view(view, self.frame_id),
            "destroy_buffer_view: {:?} is not a live view",
            view
        ) {
            return false;
        }
        if let Some(slot) = slot {
            self.heaps
                .heap(HeapKind::CbvSrvUav)
                .free(slot, 1, self.frame_id);
        }
        true
    }

    pub fn create_render_target_view(&self, desc: &RenderTargetViewDesc) -> RenderTargetViewHandle {
        if !self.usable("create_render_target_view") {
            return RenderTargetViewHandle::INVALID;
        }
        let mut registry = self.registry.write();
        let Some((texture, parent)) = registry.textures.get_all(desc.texture.0) else {
            report_error!("create_render_target_view: unknown texture {:?}", desc.texture);
            return RenderTargetViewHandle::INVALID;
        };
        if let Err(e) = validate_render_target_view(desc, parent) {
            report_error!("create_render_target_view {:?}: {}", desc.label, e);
            return RenderTargetViewHandle::INVALID;
        }
        let native = match self.backend.create_render_target_view(&texture.native, desc) {
            Ok(native) => native,
            Err(e) => {
                self.backend_failed("create_render_target_view", e);
                return RenderTargetViewHandle::INVALID;
            }
        };
        let heap = if desc.is_depth_stencil() {
            HeapKind::DepthStencilView
        } else {
            HeapKind::RenderTargetView
        };
        let Some(heap_slot) = self.allocate_slots(heap, 1) else {
            return RenderTargetViewHandle::INVALID;
        };
        RenderTargetViewHandle(registry.render_target_views.allocate_with_cold(
            RenderTargetView {
                native,
                texture: desc.texture,
                heap,
                heap_slot,
            },
            desc.clone(),
        ))
    }

    pub fn destroy_render_target_view(&self, view: RenderTargetViewHandle) -> bool {
        if let Some(chain) = &self.swap_chain
            && chain.views.contains(&view)
        {
            report_error!(
                "destroy_render_target_view: {:?} belongs to the swap chain",
                view
            );
            return false;
        }
        let mut registry = self.registry.write();
        let slot = registry
            .render_target_views
            .get(view.0)
            .map(|v| (v.heap, v.heap_slot));
        if !verify!(
            registry.retire_render_target_view(view, self.frame_id),
            "destroy_render_target_view: {:?} is not a live view",
            view
        ) {
            return false;
        }
        if let Some((heap, slot)) = slot {
            self.heaps.heap(heap).free(slot, 1, self.frame_id);
        }
        true
    }

    pub fn create_sampler(&self, desc: &SamplerDesc) -> SamplerHandle {
        if !self.usable("create_sampler") {
            return SamplerHandle::INVALID;
        }
        if let Err(e) = validate_sampler(desc) {
            report_error!("create_sampler {:?}: {}", desc.label, e);
            return SamplerHandle::INVALID;
        }
        let native = match self.backend.create_sampler(desc) {
            Ok(native) => native,
            Err(e) => {
                self.backend_failed("create_sampler", e);
                return SamplerHandle::INVALID;
            }
        };
        let Some(heap_slot) = self.allocate_slots(HeapKind::Sampler, 1) else {
            return SamplerHandle::INVALID;
        };
        SamplerHandle(
            self.registry
                .write()
                .samplers
                .allocate_with_cold(Sampler { native, heap_slot }, desc.clone()),
        )
    }

    pub fn destroy_sampler(&self, sampler: SamplerHandle) -> bool {
        let mut registry = self.registry.write();
        let slot = registry.samplers.get(sampler.0).map(|s| s.heap_slot);
        if !verify!(
            registry.retire_sampler(sampler, self.frame_id),
            "destroy_sampler: {:?} is not a live sampler",
            sampler
        ) {
            return false;
        }
        if let Some(slot) = slot {
            self.heaps.heap(HeapKind::Sampler).free(slot, 1, self.frame_id);
        }
        true
    }

    pub fn create_render_pass(&self, desc: &RenderPassDesc) -> RenderPassHandle {
        if let Err(e) = validate_render_pass(desc) {
            report_error!("create_render_pass {:?}: {}", desc.label, e);
            return RenderPassHandle::INVALID;
        }
        let mut registry = self.registry.write();
        for attachment in &desc.color_attachments {
            let Some(rtv) = registry.render_target_views.get_cold(attachment.rtv.0) else {
                report_error!(
                    "create_render_pass {:?}: unknown color view {:?}",
                    desc.label,
                    attachment.rtv
                );
                return RenderPassHandle::INVALID;
            };
            if !verify!(
                !rtv.is_depth_stencil(),
                "create_render_pass {:?}: {:?} is a depth-stencil view",
                desc.label,
                attachment.rtv
            ) {
                return RenderPassHandle::INVALID;
            }
        }
        if let Some(attachment) = &desc.depth_stencil_attachment {
            let Some(rtv) = registry.render_target_views.get_cold(attachment.rtv.0) else {
                report_error!(
                    "create_render_pass {:?}: unknown depth view {:?}",
                    desc.label,
                    attachment.rtv
                );
                return RenderPassHandle::INVALID;
            };
            if !verify!(
                rtv.is_depth_stencil(),
                "create_render_pass {:?}: {:?} is not a depth-stencil view",
                desc.label,
                attachment.rtv
            ) {
                return RenderPassHandle::INVALID;
            }
        }
        RenderPassHandle(registry.render_passes.allocate(desc.clone()))
    }

    pub fn destroy_render_pass(&self, pass: RenderPassHandle) -> bool {
        verify!(
            self.registry.write().retire_render_pass(pass, self.frame_id),
            "destroy_render_pass: {:?} is not a live render pass",
            pass
        )
    }

    // ---------------------------------------------------------------------
    // Mapping
    // ---------------------------------------------------------------------

    /// Fill `mapping` with the current contents of its range.
    ///
    /// With `pure_write` set the range comes back zeroed instead of being
    /// read. A size of zero maps to the end of the buffer.
    pub fn map_buffer(&self, mapping: &mut BufferMapping) -> bool {
        if !self.usable("map_buffer") {
            return false;
        }
        let handle = mapping.buffer;
        let mut registry = self.registry.write();
        let Some((size, placement)) = registry
            .buffers
            .get_cold(handle.0)
            .map(|desc| (desc.size, desc.placement))
        else {
            report_error!("map_buffer: unknown buffer {:?}", handle);
            return false;
        };
        if !verify!(
            placement.is_cpu_visible(),
            "map_buffer: {:?} lives in {:?} memory; copy through a staging buffer",
            handle,
            placement
        ) {
            return false;
        }
        let len = if mapping.size == 0 {
            size.saturating_sub(mapping.offset)
        } else {
            mapping.size
        };
        if !verify!(
            len > 0 && mapping.offset.checked_add(len).is_some_and(|end| end <= size),
            "map_buffer: range {}+{} is outside the {size} bytes of {:?}",
            mapping.offset,
            len,
            handle
        ) {
            return false;
        }
        let Some(buffer) = registry.buffers.get_mut(handle.0) else {
            return false;
        };
        if !verify!(!buffer.mapped, "map_buffer: {:?} is already mapped", handle) {
            return false;
        }

        let bytes = if mapping.pure_write {
            vec![0; len as usize]
        } else {
            match self.backend.read_buffer(&buffer.native, mapping.offset, len) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.backend_failed("map_buffer", e);
                    return false;
                }
            }
        };
        buffer.mapped = true;
        mapping.size = len;
        mapping.fill(bytes);
        true
    }

    /// Release a mapping, publishing its bytes for upload placements.
    pub fn unmap_buffer(&self, mapping: &mut BufferMapping) -> bool {
        if !verify!(
            mapping.is_mapped(),
            "unmap_buffer: {:?} holds no mapping",
            mapping.buffer
        ) {
            return false;
        }
        let handle = mapping.buffer;
        let bytes = mapping.take_bytes();
        let mut registry = self.registry.write();
        let Some(placement) = registry.buffers.get_cold(handle.0).map(|desc| desc.placement)
        else {
            report_error!("unmap_buffer: unknown buffer {:?}", handle);
            return false;
        };
        let Some(buffer) = registry.buffers.get_mut(handle.0) else {
            return false;
        };
        if !verify!(buffer.mapped, "unmap_buffer: {:?} is not mapped", handle) {
            return false;
        }
        buffer.mapped = false;
        if placement.is_upload() && !self.is_device_lost() {
            if let Err(e) = self.backend.write_buffer(&buffer.native, mapping.offset, &bytes) {
                self.backend_failed("unmap_buffer", e);
                return false;
            }
        }
        true
    }

    // ---------------------------------------------------------------------
    // Presentation
    // ---------------------------------------------------------------------

    /// Render target view of swap chain image `index`.
    pub fn present_render_target_view(&self, index: u32) -> RenderTargetViewHandle {
        match &self.swap_chain {
            Some(chain) => chain
                .views
                .get(index as usize)
                .copied()
                .unwrap_or_else(|| {
                    report_error!(
                        "present_render_target_view({index}): the swap chain has {} images",
                        chain.image_count()
                    );
                    RenderTargetViewHandle::INVALID
                }),
            None => {
                report_error!("present_render_target_view: the context has no swap chain");
                RenderTargetViewHandle::INVALID
            }
        }
    }

    pub fn present_texture(&self, index: u32) -> TextureHandle {
        match &self.swap_chain {
            Some(chain) => chain
                .images
                .get(index as usize)
                .copied()
                .unwrap_or_else(|| {
                    report_error!(
                        "present_texture({index}): the swap chain has {} images",
                        chain.image_count()
                    );
                    TextureHandle::INVALID
                }),
            None => {
                report_error!("present_texture: the context has no swap chain");
                TextureHandle::INVALID
            }
        }
    }

    /// Image presented at the end of the current frame, 0 without a swap chain.
    pub fn current_present_image_index(&self) -> u32 {
        self.swap_chain.as_ref().map_or(0, |chain| chain.current)
    }

    pub fn swap_chain_image_count(&self) -> u32 {
        self.swap_chain.as_ref().map_or(0, SwapChain::image_count)
    }

    /// Format of the swap chain images, if there is a swap chain.
    pub fn swap_chain_format(&self) -> Option<TextureFormat> {
        self.swap_chain.as_ref().map(|chain| chain.format)
    }

    // ---------------------------------------------------------------------
    // Shaders, descriptors and pipelines
    // ---------------------------------------------------------------------

    pub fn register_shader_module(&self, bytecode: &[u8]) -> ShaderModuleHandle {
        if !verify!(!bytecode.is_empty(), "register_shader_module: empty bytecode")
            || !self.usable("register_shader_module")
        {
            return ShaderModuleHandle::INVALID;
        }
        match self.backend.create_shader_module(bytecode) {
            Ok(native) => ShaderModuleHandle(self.registry.write().shader_modules.allocate(
                ShaderModule {
                    native,
                    bytecode_len: bytecode.len(),
                },
            )),
            Err(e) => {
                self.backend_failed("register_shader_module", e);
                ShaderModuleHandle::INVALID
            }
        }
    }

    pub fn free_shader_module(&self, module: ShaderModuleHandle) -> bool {
        verify!(
            self.registry.write().retire_shader_module(module, self.frame_id),
            "free_shader_module: {:?} is not a live module",
            module
        )
    }

    /// Pack the bindings of `desc` into a layout.
    ///
    /// `binding_indices` receives the packed index of every binding, in
    /// declaration order: range kind in the low 16 bits, offset in the high.
    pub fn create_descriptor_set_layout(
        &self,
        desc: &DescriptorSetDesc,
        binding_indices: &mut [u32],
    ) -> DescriptorSetLayoutHandle {
        if !self.usable("create_descriptor_set_layout") {
            return DescriptorSetLayoutHandle::INVALID;
        }
        if !verify!(
            binding_indices.len() >= desc.bindings.len(),
            "create_descriptor_set_layout {:?}: room for {} indices, {} bindings",
            desc.label,
            binding_indices.len(),
            desc.bindings.len()
        ) {
            return DescriptorSetLayoutHandle::INVALID;
        }
        let info = match DescriptorSetLayoutInfo::pack(desc) {
            Ok(info) => info,
            Err(e) => {
                report_error!("create_descriptor_set_layout {:?}: {}", desc.label, e);
                return DescriptorSetLayoutHandle::INVALID;
            }
        };
        let native = match self.backend.create_descriptor_set_layout(&info) {
            Ok(native) => native,
            Err(e) => {
                self.backend_failed("create_descriptor_set_layout", e);
                return DescriptorSetLayoutHandle::INVALID;
            }
        };
        for (slot, index) in binding_indices.iter_mut().zip(info.binding_indices()) {
            *slot = index;
        }
        DescriptorSetLayoutHandle(self.registry.write().descriptor_set_layouts.allocate_with_cold(
            DescriptorSetLayout {
                native,
                info: Arc::new(info),
            },
            desc.clone(),
        ))
    }

    pub fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) -> bool {
        verify!(
            self.registry
                .write()
                .retire_descriptor_set_layout(layout, self.frame_id),
            "destroy_descriptor_set_layout: {:?} is not a live layout",
            layout
        )
    }

    /// A set of `layout` with its own ranges in the shader-visible heaps.
    pub fn create_descriptor_set(&self, layout: DescriptorSetLayoutHandle) -> DescriptorSetHandle {
        if !self.usable("create_descriptor_set") {
            return DescriptorSetHandle::INVALID;
        }
        let mut registry = self.registry.write();
        let Some(entry) = registry.descriptor_set_layouts.get(layout.0) else {
            report_error!("create_descriptor_set: unknown layout {:?}", layout);
            return DescriptorSetHandle::INVALID;
        };
        let info = entry.info.clone();
        let (views, samplers) = (info.cbv_srv_uav_count(), info.sampler_count());

        let Some(cbv_srv_uav_base) = self.allocate_slots(HeapKind::CbvSrvUav, views) else {
            return DescriptorSetHandle::INVALID;
        };
        let Some(sampler_base) = self.allocate_slots(HeapKind::Sampler, samplers) else {
            self.heaps
                .heap(HeapKind::CbvSrvUav)
                .free(cbv_srv_uav_base, views, 0);
            return DescriptorSetHandle::INVALID;
        };
        let native =
            match self
                .backend
                .create_descriptor_set(&entry.native, &info, self.frames.len())
            {
                Ok(native) => native,
                Err(e) => {
                    self.heaps
                        .heap(HeapKind::CbvSrvUav)
                        .free(cbv_srv_uav_base, views, 0);
                    self.heaps.heap(HeapKind::Sampler).free(sampler_base, samplers, 0);
                    self.backend_failed("create_descriptor_set", e);
                    return DescriptorSetHandle::INVALID;
                }
            };
        let storage =
            DescriptorSetStorage::new(&info, self.frames.len(), cbv_srv_uav_base, sampler_base);
        DescriptorSetHandle(registry.descriptor_sets.allocate(DescriptorSet {
            native,
            layout,
            info,
            storage,
        }))
    }

    pub fn destroy_descriptor_set(&self, set: DescriptorSetHandle) -> bool {
        let mut registry = self.registry.write();
        let ranges = registry.descriptor_sets.get(set.0).map(|entry| {
            (
                entry.storage.cbv_srv_uav_base,
                entry.info.cbv_srv_uav_count(),
                entry.storage.sampler_base,
                entry.info.sampler_count(),
            )
        });
        if !verify!(
            registry.retire_descriptor_set(set, self.frame_id),
            "destroy_descriptor_set: {:?} is not a live set",
            set
        ) {
            return false;
        }
        if let Some((views_base, views, samplers_base, samplers)) = ranges {
            self.heaps
                .heap(HeapKind::CbvSrvUav)
                .free(views_base, views, self.frame_id);
            self.heaps
                .heap(HeapKind::Sampler)
                .free(samplers_base, samplers, self.frame_id);
        }
        true
    }

    /// Write descriptors into `set`.
    ///
    /// The writes land in the copy of the current frame context right away
    /// and reach the other contexts the next time each of them binds the
    /// set. Nothing is written if any write is invalid.
    pub fn update_descriptor_set(
        &self,
        set: DescriptorSetHandle,
        writes: &[DescriptorSetWriteInfo],
    ) -> bool {
        let registry = self.registry.read();
        let Some(entry) = registry.descriptor_sets.get(set.0) else {
            report_error!("update_descriptor_set: unknown set {:?}", set);
            return false;
        };
        for write in writes {
            let live = match write.data {
                DescriptorData::ConstantBuffer { buffer, .. } => registry.buffers.contains(buffer.0),
                DescriptorData::Texture { view, .. } => registry.texture_views.contains(view.0),
                DescriptorData::Buffer(view) => registry.buffer_views.contains(view.0),
                DescriptorData::Sampler(sampler) => registry.samplers.contains(sampler.0),
            };
            if !verify!(
                live,
                "update_descriptor_set {:?}: {:?} references a destroyed object",
                set,
                write.data
            ) {
                return false;
            }
        }
        match entry.storage.update(
            &entry.info,
            self.current_frame_context_index(),
            writes,
        ) {
            Ok(()) => true,
            Err(e) => {
                report_error!("update_descriptor_set {:?}: {}", set, e);
                false
            }
        }
    }

    pub fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> PipelineLayoutHandle {
        if !self.usable("create_pipeline_layout") {
            return PipelineLayoutHandle::INVALID;
        }
        let push_bytes: u32 = desc
            .push_constants
            .iter()
            .map(|range| u32::from(range.size_in_bytes))
            .sum();
        if !verify!(
            push_bytes <= MAX_PUSH_CONSTANT_BYTES,
            "create_pipeline_layout: {push_bytes} bytes of push constants, at most {MAX_PUSH_CONSTANT_BYTES}"
        ) {
            return PipelineLayoutHandle::INVALID;
        }
        let mut registry = self.registry.write();
        let native = {
            let mut sets = Vec::with_capacity(desc.descriptor_sets.len());
            for layout in &desc.descriptor_sets {
                let Some(entry) = registry.descriptor_set_layouts.get(layout.0) else {
                    report_error!("create_pipeline_layout: unknown set layout {:?}", layout);
                    return PipelineLayoutHandle::INVALID;
                };
                sets.push(&entry.native);
            }
            match self.backend.create_pipeline_layout(&sets, &desc.push_constants) {
                Ok(native) => native,
                Err(e) => {
                    self.backend_failed("create_pipeline_layout", e);
                    return PipelineLayoutHandle::INVALID;
                }
            }
        };
        PipelineLayoutHandle(registry.pipeline_layouts.allocate(PipelineLayout {
            native,
            desc: desc.clone(),
        }))
    }

    pub fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) -> bool {
        verify!(
            self.registry
                .write()
                .retire_pipeline_layout(layout, self.frame_id),
            "destroy_pipeline_layout: {:?} is not a live layout",
            layout
        )
    }

    pub fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> GraphicsPipelineHandle {
        if !verify!(
            !desc.stages.is_empty(),
            "create_graphics_pipeline {:?}: no shader stages",
            desc.label
        ) || !self.usable("create_graphics_pipeline")
        {
            return GraphicsPipelineHandle::INVALID;
        }
        let mut registry = self.registry.write();
        let native = {
            let Some(layout) = registry.pipeline_layouts.get(desc.pipeline_layout.0) else {
                report_error!(
                    "create_graphics_pipeline {:?}: unknown layout {:?}",
                    desc.label,
                    desc.pipeline_layout
                );
                return GraphicsPipelineHandle::INVALID;
            };
            let Some(pass) = registry.render_passes.get(desc.render_pass.0) else {
                report_error!(
                    "create_graphics_pipeline {:?}: unknown render pass {:?}",
                    desc.label,
                    desc.render_pass
                );
                return GraphicsPipelineHandle::INVALID;
            };
            let format_of = |rtv: RenderTargetViewHandle| {
                registry
                    .render_target_views
                    .get_cold(rtv.0)
                    .map(|view| view.format)
            };
            let mut color_formats = Vec::with_capacity(pass.color_attachments.len());
            for attachment in &pass.color_attachments {
                let Some(format) = format_of(attachment.rtv) else {
                    report_error!(
                        "create_graphics_pipeline {:?}: attachment {:?} was destroyed",
                        desc.label,
                        attachment.rtv
                    );
                    return GraphicsPipelineHandle::INVALID;
                };
                color_formats.push(format);
            }
            let depth_format = pass
                .depth_stencil_attachment
                .as_ref()
                .and_then(|attachment| format_of(attachment.rtv));

            let mut stages = Vec::with_capacity(desc.stages.len());
            for stage in &desc.stages {
                let Some(module) = registry.shader_modules.get(stage.module.0) else {
                    report_error!(
                        "create_graphics_pipeline {:?}: unknown {:?} module {:?}",
                        desc.label,
                        stage.stage,
                        stage.module
                    );
                    return GraphicsPipelineHandle::INVALID;
                };
                stages.push((&module.native, stage));
            }

            let inputs = GraphicsPipelineInputs {
                desc,
                stages,
                layout: &layout.native,
                color_formats,
                depth_format,
            };
            match self.backend.create_graphics_pipeline(&inputs) {
                Ok(native) => native,
                Err(e) => {
                    self.backend_failed("create_graphics_pipeline", e);
                    return GraphicsPipelineHandle::INVALID;
                }
            }
        };
        GraphicsPipelineHandle(registry.graphics_pipelines.allocate_with_cold(
            Pipeline {
                native,
                layout: desc.pipeline_layout,
                bind_point: BindPoint::Graphics,
            },
            desc.label.clone(),
        ))
    }

    pub fn destroy_graphics_pipeline(&self, pipeline: GraphicsPipelineHandle) -> bool {
        verify!(
            self.registry
                .write()
                .retire_graphics_pipeline(pipeline, self.frame_id),
            "destroy_graphics_pipeline: {:?} is not a live pipeline",
            pipeline
        )
    }

    pub fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> ComputePipelineHandle {
        if !verify!(
            desc.stage.stage == ShaderStageKind::Compute,
            "create_compute_pipeline {:?}: {:?} is not a compute stage",
            desc.label,
            desc.stage.stage
        ) || !self.usable("create_compute_pipeline")
        {
            return ComputePipelineHandle::INVALID;
        }
        let mut registry = self.registry.write();
        let native = {
            let Some(layout) = registry.pipeline_layouts.get(desc.pipeline_layout.0) else {
                report_error!(
                    "create_compute_pipeline {:?}: unknown layout {:?}",
                    desc.label,
                    desc.pipeline_layout
                );
                return ComputePipelineHandle::INVALID;
            };
            let Some(module) = registry.shader_modules.get(desc.stage.module.0) else {
                report_error!(
                    "create_compute_pipeline {:?}: unknown module {:?}",
                    desc.label,
                    desc.stage.module
                );
                return ComputePipelineHandle::INVALID;
            };
            let inputs = ComputePipelineInputs {
                desc,
                module: &module.native,
                layout: &layout.native,
            };
            match self.backend.create_compute_pipeline(&inputs) {
                Ok(native) => native,
                Err(e) => {
                    self.backend_failed("create_compute_pipeline", e);
                    return ComputePipelineHandle::INVALID;
                }
            }
        };
        ComputePipelineHandle(registry.compute_pipelines.allocate_with_cold(
            Pipeline {
                native,
                layout: desc.pipeline_layout,
                bind_point: BindPoint::Compute,
            },
            desc.label.clone(),
        ))
    }

    pub fn destroy_compute_pipeline(&self, pipeline: ComputePipelineHandle) -> bool {
        verify!(
            self.registry
                .write()
                .retire_compute_pipeline(pipeline, self.frame_id),
            "destroy_compute_pipeline: {:?} is not a live pipeline",
            pipeline
        )
    }

    // ---------------------------------------------------------------------
    // Command lists
    // ---------------------------------------------------------------------

    fn begin_command_list(&self, queue: QueueType) -> Option<CommandList<'_>> {
        let features = &self.info.features;
        let enabled = match queue {
            QueueType::Graphics => features.graphics,
            QueueType::Compute => features.compute,
            QueueType::Transfer => features.transfer,
        };
        if !verify!(
            enabled,
            "{queue:?} command lists are disabled in the application info"
        ) || !self.usable("begin_command_list")
        {
            return None;
        }
        let frame = self.frames.context_for(self.frame_id);
        if let Err(e) = self.prepare_frame(frame) {
            self.backend_failed("preparing the frame context", e);
            return None;
        }
        Some(CommandList::new(
            self,
            frame,
            frame.lock_set(queue),
            queue,
            self.frame_id,
        ))
    }

    fn end_command_list(&self, list: CommandList<'_>, queue: QueueType) {
        verify!(
            list.queue() == queue,
            "a {:?} command list was ended as {:?}",
            list.queue(),
            queue
        );
        list.close();
    }

    /// Open a graphics list for the current frame.
    ///
    /// Blocks while another graphics list of this frame is open.
    pub fn begin_graphics_command_list(&self) -> Option<CommandList<'_>> {
        self.begin_command_list(QueueType::Graphics)
    }

    pub fn end_graphics_command_list(&self, list: CommandList<'_>) {
        self.end_command_list(list, QueueType::Graphics);
    }

    pub fn begin_compute_command_list(&self) -> Option<CommandList<'_>> {
        self.begin_command_list(QueueType::Compute)
    }

    pub fn end_compute_command_list(&self, list: CommandList<'_>) {
        self.end_command_list(list, QueueType::Compute);
    }

    pub fn begin_transfer_command_list(&self) -> Option<CommandList<'_>> {
        self.begin_command_list(QueueType::Transfer)
    }

    pub fn end_transfer_command_list(&self, list: CommandList<'_>) {
        self.end_command_list(list, QueueType::Transfer);
    }

    // ---------------------------------------------------------------------
    // Timestamps
    // ---------------------------------------------------------------------

    /// Ticks written by frame `frame_id`.
    ///
    /// `None` until the frame has executed, and again once its frame
    /// context has been reused by a later frame.
    pub fn resolved_timestamps(&self, frame_id: u64) -> Option<Vec<u64>> {
        if frame_id == 0 || frame_id >= self.frame_id || !self.is_frame_executed(frame_id) {
            return None;
        }
        let frame = self.frames.context_for(frame_id);
        if frame.frame_id() != frame_id {
            return None;
        }
        frame
            .timestamps
            .resolve(|count| self.backend.read_timestamps(frame.index, count))
            .map_err(|e| report_error!("resolving the timestamps of frame {frame_id}: {e}"))
            .ok()
    }

    /// Ticks of one timestamp, 0 while unresolved.
    pub fn resolved_timestamp(&self, timestamp: TimestampHandle) -> u64 {
        if !timestamp.is_valid() {
            return 0;
        }
        timestamp
            .recorded_frame(self.frame_id)
            .and_then(|frame_id| self.resolved_timestamps(frame_id))
            .and_then(|ticks| ticks.get(timestamp.index as usize).copied())
            .unwrap_or(0)
    }

    /// Nanoseconds per timestamp tick.
    pub fn timestamp_period_ns(&self) -> f64 {
        self.capabilities.timestamp_period_ns
    }

    /// Whether `put_timestamp` writes real ticks on this executor.
    pub fn supports_timestamps(&self) -> bool {
        self.capabilities.timestamp_queries
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    /// Live objects across the registry, swap chain images included.
    pub fn live_objects(&self) -> usize {
        self.registry.read().live_objects()
    }

    /// Destroyed objects still waiting for their frame to execute.
    pub fn pending_releases(&self) -> usize {
        self.registry.read().pending_releases()
    }
}

impl fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("application", &self.info.application_name)
            .field("api", &self.info.api)
            .field("backend", &self.backend.name())
            .field("frame_id", &self.frame_id)
            .field("frame_contexts", &self.frames.len())
            .field("device_lost", &self.is_device_lost())
            .finish_non_exhaustive()
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_idle() {
            log::error!("Waiting for the GPU on shutdown failed: {}", e);
        }
        self.registry.get_mut().clear();
        if let Some(chain) = self.swap_chain.take()
            && chain.source == SwapChainSource::Native
        {
            self.backend.destroy_swap_chain();
        }
        log::info!(
            "Graphics context '{}' destroyed after {} frames",
            self.info.application_name,
            self.frame_id - 1
        );
    }
}

fn surface_size(target: &dyn PresentTarget, info: &ApplicationInfo) -> (u32, u32) {
    match target.surface_size() {
        (0, _) | (_, 0) => (info.display_options.width, info.display_options.height),
        size => size,
    }
}

fn swap_chain_desc(
    info: &ApplicationInfo,
    width: u32,
    height: u32,
    image_count: Option<u32>,
) -> SwapChainDesc {
    let options = &info.display_options;
    SwapChainDesc {
        width,
        height,
        image_count: image_count.unwrap_or_else(|| requested_image_count(options.triple_buffering)),
        srgb: options.srgb_present != crate::app_info::SoftEnable::Disabled,
    }
}

fn swap_chain_usage() -> TextureUsage {
    TextureUsage::COLOR_TARGET | TextureUsage::TRANSFER_SRC | TextureUsage::TRANSFER_DST
}

/// Register one render target view per image.
fn register_views(
    backend: &dyn GpuBackend,
    registry: &mut Registry,
    heaps: &DescriptorHeaps,
    images: &[TextureHandle],
    format: TextureFormat,
) -> Result<Vec<RenderTargetViewHandle>, GraphicsError> {
    let mut views = Vec::with_capacity(images.len());
    for (index, &image) in images.iter().enumerate() {
        let texture = registry
            .textures
            .get(image.0)
            .ok_or(GraphicsError::InvalidHandle)?;
        let desc = RenderTargetViewDesc::new(image, format).with_label(format!("swap chain {index}"));
        let native = backend.create_render_target_view(&texture.native, &desc)?;
        let heap_slot = heaps
            .heap(HeapKind::RenderTargetView)
            .allocate(1)
            .ok_or_else(|| GraphicsError::Internal("render target view heap exhausted".into()))?;
        views.push(RenderTargetViewHandle(
            registry.render_target_views.allocate_with_cold(
                RenderTargetView {
                    native,
                    texture: image,
                    heap: HeapKind::RenderTargetView,
                    heap_slot,
                },
                desc,
            ),
        ));
    }
    Ok(views)
}

fn register_swap_chain(
    backend: &dyn GpuBackend,
    info: &ApplicationInfo,
    registry: &mut Registry,
    heaps: &DescriptorHeaps,
    images: SwapChainImages,
) -> Result<SwapChain, GraphicsError> {
    let options = &info.display_options;
    check_image_count(options.triple_buffering, images.images.len() as u32)?;
    check_srgb(options.srgb_present, images.format)?;

    let desc = TextureDesc::new_2d(images.extent.width, images.extent.height, images.format)
        .with_label("swap chain image");
    let handles: Vec<TextureHandle> = images
        .images
        .into_iter()
        .map(|native| {
            TextureHandle(registry.textures.allocate_with_cold(
                Texture { native },
                TextureCreateDesc::new(desc.clone(), swap_chain_usage()),
            ))
        })
        .collect();
    let views = register_views(backend, registry, heaps, &handles, images.format)?;
    Ok(SwapChain {
        source: SwapChainSource::Native,
        images: handles,
        views,
        current: 0,
        format: images.format,
        extent: images.extent,
    })
}

fn create_offscreen_chain(
    backend: &dyn GpuBackend,
    info: &ApplicationInfo,
    registry: &mut Registry,
    heaps: &DescriptorHeaps,
    width: u32,
    height: u32,
    image_count: u32,
) -> Result<SwapChain, GraphicsError> {
    let format = if swap_chain_desc(info, width, height, None).srgb {
        TextureFormat::Bgra8Srgb
    } else {
        TextureFormat::Bgra8Unorm
    };
    let mut images = Vec::with_capacity(image_count as usize);
    for index in 0..image_count {
        let desc = TextureDesc::new_2d(width, height, format).with_label(format!("offscreen {index}"));
        let create = TextureCreateDesc::new(desc.clone(), swap_chain_usage())
            .with_footprints(compute_footprints(&desc));
        let native = backend.create_texture(&create)?;
        images.push(TextureHandle(registry.textures.allocate_with_cold(
            Texture { native },
            create,
        )));
    }
    let views = register_views(backend, registry, heaps, &images, format)?;
    Ok(SwapChain {
        source: SwapChainSource::Offscreen,
        images,
        views,
        current: 0,
        format,
        extent: Extent3d::new_2d(width, height),
    })
}
