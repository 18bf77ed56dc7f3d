//! The command recording facade.

use bitflags::bitflags;
use parking_lot::MutexGuard;
use verglas_core::{report_error, report_warning, verify};

use super::{BindPoint, Command, QueueType};
use crate::barrier::{
    self, BufferMemoryBarrier, GlobalMemoryBarrier, PassKind, TextureMemoryBarrier,
};
use crate::context::GraphicsContext;
use crate::frame::{AllocationSet, FrameContext};
use crate::handles::{
    BufferHandle, BufferViewHandle, ComputePipelineHandle, DescriptorSetHandle,
    GraphicsPipelineHandle, PipelineLayoutHandle, RenderPassHandle, TextureHandle,
    TextureViewHandle, TimestampHandle,
};
use crate::registry::Registry;
use crate::types::{
    BufferCopyParameters, BufferSpan, DispatchSize, DrawIndexedIndirectArgs,
    DrawIndexedInstancedDesc, DrawIndirectArgs, DrawInstancedDesc, Extent3d, IndexFormat,
    ScissorRect, SubResourceIndexing, TextureMemoryFootprint, Viewport,
};

bitflags! {
    /// How a pass uses a view it declares.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PassUsage: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Descriptor sets bound at once per bind point.
const MAX_BOUND_SETS: usize = 8;

#[derive(Debug, Default)]
struct BoundSets {
    layout: Option<PipelineLayoutHandle>,
    sets: [Option<DescriptorSetHandle>; MAX_BOUND_SETS],
}

impl BoundSets {
    /// Whether `set` at `index` needs a new bind, updating the state.
    fn rebind(&mut self, layout: PipelineLayoutHandle, index: usize, set: DescriptorSetHandle) -> bool {
        if self.layout != Some(layout) {
            self.layout = Some(layout);
            self.sets = [None; MAX_BOUND_SETS];
        }
        if self.sets[index] == Some(set) {
            return false;
        }
        self.sets[index] = Some(set);
        true
    }
}

/// Whether `size` bytes from `offset` stay inside `len`. `None` is an overflowed size.
fn range_fits(offset: u64, size: Option<u64>, len: u64) -> bool {
    size.and_then(|size| offset.checked_add(size)).is_some_and(|end| end <= len)
}

/// An open command list of the current frame.
///
/// Obtained from one of the `begin_*_command_list` calls of
/// [`GraphicsContext`] and handed back to the matching `end_*` call. The
/// list holds the allocation set of its queue class for as long as it is
/// open, so a second list of the same class blocks until this one ends.
///
/// Misuse (unknown handles, nested passes, commands outside the pass they
/// need) reports a diagnostic and records nothing.
pub struct CommandList<'a> {
    context: &'a GraphicsContext,
    frame: &'a FrameContext,
    set: MutexGuard<'a, AllocationSet>,
    commands: Vec<Command>,
    queue: QueueType,
    frame_id: u64,
    pass: PassKind,
    graphics_sets: BoundSets,
    compute_sets: BoundSets,
    closed: bool,
}

impl<'a> CommandList<'a> {
    pub(crate) fn new(
        context: &'a GraphicsContext,
        frame: &'a FrameContext,
        mut set: MutexGuard<'a, AllocationSet>,
        queue: QueueType,
        frame_id: u64,
    ) -> Self {
        let commands = set.acquire();
        Self {
            context,
            frame,
            set,
            commands,
            queue,
            frame_id,
            pass: PassKind::None,
            graphics_sets: BoundSets::default(),
            compute_sets: BoundSets::default(),
            closed: false,
        }
    }

    pub fn queue(&self) -> QueueType {
        self.queue
    }

    /// The frame the list belongs to.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Commands recorded so far.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_in_render_pass(&self) -> bool {
        self.pass == PassKind::Render
    }

    pub fn is_in_compute_pass(&self) -> bool {
        self.pass == PassKind::Compute
    }

    fn registry(&self) -> parking_lot::RwLockReadGuard<'a, Registry> {
        self.context.registry()
    }

    fn can_render(&self) -> bool {
        verify!(
            self.queue == QueueType::Graphics,
            "render commands need a graphics command list, this one is {:?}",
            self.queue
        )
    }

    fn can_compute(&self) -> bool {
        verify!(
            self.queue != QueueType::Transfer,
            "compute commands need a graphics or compute command list"
        )
    }

    fn in_render_pass(&self, what: &str) -> bool {
        verify!(
            self.pass == PassKind::Render,
            "{} outside of a render pass",
            what
        )
    }

    fn outside_render_pass(&self, what: &str) -> bool {
        verify!(
            self.pass != PassKind::Render,
            "{} inside a render pass",
            what
        )
    }

    // ------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------

    pub fn begin_render_pass(&mut self, render_pass: RenderPassHandle) {
        if !self.can_render()
            || !verify!(
                self.pass == PassKind::None,
                "render pass begun while a {:?} pass is open",
                self.pass
            )
        {
            return;
        }

        let registry = self.registry();
        let Some(desc) = registry.render_passes.get(render_pass.0) else {
            report_error!("Unknown render pass {:?}", render_pass);
            return;
        };
        let attachments_live = desc
            .color_attachments
            .iter()
            .map(|a| a.rtv)
            .chain(desc.depth_stencil_attachment.map(|a| a.rtv))
            .all(|rtv| {
                registry
                    .render_target_views
                    .get(rtv.0)
                    .is_some_and(|view| registry.textures.get(view.texture.0).is_some())
            });
        drop(registry);
        if !verify!(
            attachments_live,
            "render pass {:?} refers to a destroyed attachment",
            render_pass
        ) {
            return;
        }

        self.pass = PassKind::Render;
        self.commands.push(Command::BeginRenderPass(render_pass));
    }

    pub fn end_render_pass(&mut self) {
        if !verify!(self.pass == PassKind::Render, "no render pass to end") {
            return;
        }
        self.pass = PassKind::None;
        self.commands.push(Command::EndRenderPass);
    }

    pub fn begin_compute_pass(&mut self) {
        if !self.can_compute()
            || !verify!(
                self.pass == PassKind::None,
                "compute pass begun while a {:?} pass is open",
                self.pass
            )
        {
            return;
        }
        self.pass = PassKind::Compute;
        self.commands.push(Command::BeginComputePass);
    }

    pub fn end_compute_pass(&mut self) {
        if !verify!(self.pass == PassKind::Compute, "no compute pass to end") {
            return;
        }
        self.pass = PassKind::None;
        self.commands.push(Command::EndComputePass);
    }

    /// Declare the texture views the current pass reads or writes.
    ///
    /// Only the Metal family consumes the declarations, the other families
    /// accept and ignore them.
    pub fn declare_pass_texture_view_usage(&mut self, views: &[TextureViewHandle], usage: PassUsage) {
        if !verify!(self.pass != PassKind::None, "usage declared outside of a pass") {
            return;
        }
        let registry = self.registry();
        for &view in views {
            if registry.texture_views.get(view.0).is_none() {
                report_error!("Unknown texture view {:?}", view);
                continue;
            }
            self.commands.push(Command::UseTextureView { view, usage });
        }
    }

    pub fn declare_pass_buffer_view_usage(&mut self, views: &[BufferViewHandle], usage: PassUsage) {
        if !verify!(self.pass != PassKind::None, "usage declared outside of a pass") {
            return;
        }
        let registry = self.registry();
        for &view in views {
            if registry.buffer_views.get(view.0).is_none() {
                report_error!("Unknown buffer view {:?}", view);
                continue;
            }
            self.commands.push(Command::UseBufferView { view, usage });
        }
    }

    // ------------------------------------------------------------------
    // Graphics state
    // ------------------------------------------------------------------

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.in_render_pass("set_viewport") {
            self.commands.push(Command::SetViewport(viewport));
        }
    }

    pub fn set_scissors_rect(&mut self, rect: ScissorRect) {
        if self.in_render_pass("set_scissors_rect") {
            self.commands.push(Command::SetScissor(rect));
        }
    }

    pub fn set_index_buffer(&mut self, span: BufferSpan, format: IndexFormat) {
        if !self.can_render() {
            return;
        }
        if self.registry().buffer(span.buffer).is_none() {
            report_error!("Unknown index buffer {:?}", span.buffer);
            return;
        }
        self.commands.push(Command::SetIndexBuffer { span, format });
    }

    pub fn set_vertex_buffers(&mut self, spans: &[BufferSpan]) {
        if !self.can_render() {
            return;
        }
        let registry = self.registry();
        if let Some(span) = spans.iter().find(|s| registry.buffers.get(s.buffer.0).is_none()) {
            report_error!("Unknown vertex buffer {:?}", span.buffer);
            return;
        }
        drop(registry);
        self.commands.push(Command::SetVertexBuffers(spans.to_vec()));
    }

    pub fn set_graphics_pipeline(&mut self, pipeline: GraphicsPipelineHandle) {
        if !self.can_render() {
            return;
        }
        if self.registry().graphics_pipeline(pipeline).is_none() {
            report_error!("Unknown graphics pipeline {:?}", pipeline);
            return;
        }
        self.commands.push(Command::SetGraphicsPipeline(pipeline));
    }

    pub fn set_graphics_push_constant(
        &mut self,
        layout: PipelineLayoutHandle,
        data: &[u32],
        index: u32,
        offset: u32,
    ) {
        if self.can_render() {
            self.push_constants(BindPoint::Graphics, layout, data, index, offset);
        }
    }

    /// Bind `sets` starting at set index 0.
    ///
    /// Sets already bound at the same index under the same layout are
    /// skipped, as are the indices flagged in `unchanged`.
    pub fn set_graphics_descriptor_sets(
        &mut self,
        layout: PipelineLayoutHandle,
        sets: &[DescriptorSetHandle],
        unchanged: Option<&[bool]>,
    ) {
        if self.can_render() {
            self.bind_sets(BindPoint::Graphics, layout, sets, 0, unchanged);
        }
    }

    pub fn draw_instanced(&mut self, desc: DrawInstancedDesc) {
        if self.in_render_pass("draw_instanced") {
            self.commands.push(Command::Draw(desc));
        }
    }

    pub fn draw_indexed_instanced(&mut self, desc: DrawIndexedInstancedDesc) {
        if self.in_render_pass("draw_indexed_instanced") {
            self.commands.push(Command::DrawIndexed(desc));
        }
    }

    /// Draw with arguments read from `buffer`, tightly packed from `offset`.
    pub fn draw_indirect(&mut self, buffer: BufferHandle, offset: u64, draw_count: u32, indexed: bool) {
        if !self.in_render_pass("draw_indirect") {
            return;
        }
        let stride = if indexed {
            DrawIndexedIndirectArgs::SIZE
        } else {
            DrawIndirectArgs::SIZE
        };
        let registry = self.registry();
        let Some(desc) = registry.buffers.get_cold(buffer.0) else {
            report_error!("Unknown indirect buffer {:?}", buffer);
            return;
        };
        let fits = range_fits(offset, stride.checked_mul(u64::from(draw_count)), desc.size);
        drop(registry);
        if !verify!(fits, "indirect arguments overrun {:?}", buffer) {
            return;
        }
        self.commands.push(Command::DrawIndirect {
            buffer,
            offset,
            draw_count,
            stride: stride as u32,
            indexed,
        });
    }

    // ------------------------------------------------------------------
    // Compute
    // ------------------------------------------------------------------

    pub fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        if !self.can_compute() || !self.outside_render_pass("set_compute_pipeline") {
            return;
        }
        if self.registry().compute_pipeline(pipeline).is_none() {
            report_error!("Unknown compute pipeline {:?}", pipeline);
            return;
        }
        self.commands.push(Command::SetComputePipeline(pipeline));
    }

    /// Bind `sets` starting at set index `offset`.
    pub fn set_compute_descriptor_sets(
        &mut self,
        layout: PipelineLayoutHandle,
        sets: &[DescriptorSetHandle],
        offset: u32,
    ) {
        if self.can_compute() {
            self.bind_sets(BindPoint::Compute, layout, sets, offset as usize, None);
        }
    }

    pub fn set_compute_push_constant(&mut self, layout: PipelineLayoutHandle, data: &[u32]) {
        if self.can_compute() {
            self.push_constants(BindPoint::Compute, layout, data, 0, 0);
        }
    }

    pub fn dispatch(&mut self, group_count: DispatchSize, group_size: DispatchSize) {
        if !self.can_compute() || !self.outside_render_pass("dispatch") {
            return;
        }
        self.commands.push(Command::Dispatch {
            groups: group_count,
            group_size,
        });
    }

    fn push_constants(
        &mut self,
        bind_point: BindPoint,
        layout: PipelineLayoutHandle,
        data: &[u32],
        index: u32,
        offset: u32,
    ) {
        let registry = self.registry();
        let Some(entry) = registry.pipeline_layouts.get(layout.0) else {
            report_error!("Unknown pipeline layout {:?}", layout);
            return;
        };
        let Some(range) = entry.desc.push_constants.get(index as usize) else {
            report_error!("{:?} has no push constant range {}", layout, index);
            return;
        };
        let word = size_of::<u32>() as u64;
        let fits = range_fits(
            u64::from(offset) * word,
            Some(data.len() as u64 * word),
            u64::from(range.size_in_bytes),
        );
        drop(registry);
        if !verify!(
            fits,
            "push constant write of {} words at {} overruns range {} of {:?}",
            data.len(),
            offset,
            index,
            layout
        ) {
            return;
        }
        self.commands.push(Command::PushConstants {
            bind_point,
            layout,
            index: index as u8,
            offset: offset * size_of::<u32>() as u32,
            data: bytemuck::cast_slice(data).to_vec(),
        });
    }

    fn bind_sets(
        &mut self,
        bind_point: BindPoint,
        layout: PipelineLayoutHandle,
        sets: &[DescriptorSetHandle],
        first: usize,
        unchanged: Option<&[bool]>,
    ) {
        let registry = self.registry();
        let Some(entry) = registry.pipeline_layouts.get(layout.0) else {
            report_error!("Unknown pipeline layout {:?}", layout);
            return;
        };
        let set_count = entry.desc.descriptor_sets.len();
        if !verify!(
            first + sets.len() <= set_count.min(MAX_BOUND_SETS),
            "{} sets from index {} exceed the {} sets of {:?}",
            sets.len(),
            first,
            set_count,
            layout
        ) {
            return;
        }
        if let Some(set) = sets.iter().find(|s| registry.descriptor_sets.get(s.0).is_none()) {
            report_error!("Unknown descriptor set {:?}", set);
            return;
        }
        drop(registry);

        let bound = match bind_point {
            BindPoint::Graphics => &mut self.graphics_sets,
            BindPoint::Compute => &mut self.compute_sets,
        };
        for (i, &set) in sets.iter().enumerate() {
            let index = first + i;
            if unchanged.and_then(|mask| mask.get(i)).copied().unwrap_or(false) {
                continue;
            }
            if !bound.rebind(layout, index, set) {
                continue;
            }
            self.commands.push(Command::BindDescriptorSet {
                bind_point,
                layout,
                set_index: index as u32,
                set,
            });
        }
    }

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    pub fn copy_buffer(&mut self, params: &BufferCopyParameters) {
        if !self.outside_render_pass("copy_buffer") {
            return;
        }
        let registry = self.registry();
        let (Some(src), Some(dst)) = (
            registry.buffers.get_cold(params.buffer_src.0),
            registry.buffers.get_cold(params.buffer_dst.0),
        ) else {
            report_error!(
                "Unknown buffer in copy {:?} -> {:?}",
                params.buffer_src,
                params.buffer_dst
            );
            return;
        };
        let fits = range_fits(params.offset_src, Some(params.copy_size), src.size)
            && range_fits(params.offset_dst, Some(params.copy_size), dst.size);
        drop(registry);
        if !verify!(fits, "buffer copy of {} bytes overruns a buffer", params.copy_size) {
            return;
        }
        self.commands.push(Command::CopyBuffer(*params));
    }

    /// Upload `data` through `staging` into one sub-resource of `texture`.
    ///
    /// `data` holds tightly packed rows; it is written into the staging
    /// buffer at the footprint's row pitch. An empty `data` records the
    /// copy of whatever the staging buffer already holds.
    pub fn set_texture_data(
        &mut self,
        staging: BufferHandle,
        texture: TextureHandle,
        footprint: &TextureMemoryFootprint,
        sub_resource: &SubResourceIndexing,
        data: &[u8],
    ) {
        if !self.outside_render_pass("set_texture_data") {
            return;
        }
        let registry = self.registry();
        let Some((buffer, buffer_desc)) = registry.buffers.get_all(staging.0) else {
            report_error!("Unknown staging buffer {:?}", staging);
            return;
        };
        if registry.textures.get(texture.0).is_none() {
            report_error!("Unknown texture {:?}", texture);
            return;
        }
        if !verify!(
            range_fits(footprint.offset, Some(footprint.size()), buffer_desc.size),
            "footprint overruns staging buffer {:?}",
            staging
        ) {
            return;
        }

        if !data.is_empty() {
            if !verify!(
                buffer_desc.placement.is_upload(),
                "staging buffer {:?} is not CPU writable",
                staging
            ) {
                return;
            }
            let row = footprint.row_size() as usize;
            let rows = footprint.height as usize * footprint.depth as usize;
            if !verify!(
                data.len() >= row * rows,
                "{} bytes of texture data, {} expected",
                data.len(),
                row * rows
            ) {
                return;
            }
            let pitch = footprint.line_byte_aligned_size as usize;
            let mut staged = vec![0u8; pitch * rows];
            for (dst, src) in staged.chunks_exact_mut(pitch).zip(data.chunks_exact(row)) {
                dst[..row].copy_from_slice(src);
            }
            if let Err(e) = self
                .context
                .backend()
                .write_buffer(&buffer.native, footprint.offset, &staged)
            {
                report_error!("Failed to fill staging buffer {:?}: {}", staging, e);
                return;
            }
        }
        drop(registry);

        self.commands.push(Command::CopyBufferToTexture {
            buffer: staging,
            footprint: *footprint,
            texture,
            sub_resource: *sub_resource,
        });
    }

    pub fn copy_texture_to_buffer(
        &mut self,
        texture: TextureHandle,
        sub_resource: &SubResourceIndexing,
        buffer: BufferHandle,
        footprint: &TextureMemoryFootprint,
    ) {
        if !self.outside_render_pass("copy_texture_to_buffer") {
            return;
        }
        let registry = self.registry();
        let Some(buffer_desc) = registry.buffers.get_cold(buffer.0) else {
            report_error!("Unknown buffer {:?}", buffer);
            return;
        };
        let fits = range_fits(footprint.offset, Some(footprint.size()), buffer_desc.size);
        let texture_live = registry.textures.get(texture.0).is_some();
        drop(registry);
        if !verify!(texture_live, "Unknown texture {:?}", texture)
            || !verify!(fits, "footprint overruns buffer {:?}", buffer)
        {
            return;
        }
        self.commands.push(Command::CopyTextureToBuffer {
            texture,
            sub_resource: *sub_resource,
            buffer,
            footprint: *footprint,
        });
    }

    pub fn copy_texture(
        &mut self,
        src: TextureHandle,
        src_sub_resource: &SubResourceIndexing,
        dst: TextureHandle,
        dst_sub_resource: &SubResourceIndexing,
        extent: Extent3d,
    ) {
        if !self.outside_render_pass("copy_texture") {
            return;
        }
        let registry = self.registry();
        let live = registry.textures.get(src.0).is_some() && registry.textures.get(dst.0).is_some();
        drop(registry);
        if !verify!(live, "Unknown texture in copy {:?} -> {:?}", src, dst) {
            return;
        }
        self.commands.push(Command::CopyTexture {
            src,
            src_sub_resource: *src_sub_resource,
            dst,
            dst_sub_resource: *dst_sub_resource,
            extent,
        });
    }

    // ------------------------------------------------------------------
    // Synchronization and queries
    // ------------------------------------------------------------------

    /// Record barriers, lowered to the context's API family.
    ///
    /// Without non-global barrier support everything collapses into one
    /// global barrier. Barriers that lower to nothing record nothing.
    pub fn place_memory_barriers(
        &mut self,
        global: &[GlobalMemoryBarrier],
        buffers: &[BufferMemoryBarrier],
        textures: &[TextureMemoryBarrier],
    ) {
        let registry = self.registry();
        if let Some(b) = buffers.iter().find(|b| registry.buffers.get(b.buffer.0).is_none()) {
            report_error!("Barrier on unknown buffer {:?}", b.buffer);
            return;
        }
        if let Some(t) = textures.iter().find(|t| registry.textures.get(t.texture.0).is_none()) {
            report_error!("Barrier on unknown texture {:?}", t.texture);
            return;
        }
        drop(registry);

        let translated = barrier::translate(
            &self.context.barrier_caps(),
            self.pass,
            global,
            buffers,
            textures,
        );
        if translated.is_noop() {
            log::trace!("Barrier batch lowered to nothing");
            return;
        }
        self.commands.push(Command::Barrier(translated));
    }

    /// Write a GPU timestamp, readable once the frame has executed.
    pub fn put_timestamp(&mut self) -> TimestampHandle {
        let Some(index) = self.frame.timestamps.reserve() else {
            report_error!(
                "Frame {} ran out of timestamp slots",
                self.frame_id
            );
            return TimestampHandle::INVALID;
        };
        self.commands.push(Command::WriteTimestamp(index));
        TimestampHandle {
            index,
            // low bits; widened again when resolving
            frame_id: self.frame_id as u32,
        }
    }

    /// Close the list, handing its commands to the frame.
    pub(crate) fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.pass {
            PassKind::Render => {
                report_warning!("Command list closed inside a render pass");
                self.commands.push(Command::EndRenderPass);
            }
            PassKind::Compute => {
                report_warning!("Command list closed inside a compute pass");
                self.commands.push(Command::EndComputePass);
            }
            PassKind::None => {}
        }
        self.pass = PassKind::None;
        let commands = std::mem::take(&mut self.commands);
        log::trace!(
            "Closed {:?} list of frame {} with {} commands",
            self.queue,
            self.frame_id,
            commands.len()
        );
        self.set.close(commands);
    }
}

impl Drop for CommandList<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for CommandList<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandList")
            .field("queue", &self.queue)
            .field("frame_id", &self.frame_id)
            .field("pass", &self.pass)
            .field("commands", &self.commands.len())
            .finish()
    }
}
