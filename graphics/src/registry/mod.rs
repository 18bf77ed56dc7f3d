//! Storage for every object a context creates.
//!
//! One [`GenerationalPool`] per object kind. The hot row holds the native
//! object and what the recording path needs; the cold row keeps the
//! creation descriptor for validation and debugging.

mod deferred;
pub mod validation;

use std::sync::Arc;

use verglas_core::GenerationalPool;

pub(crate) use deferred::{DeferredReleases, Retired};

use crate::backend::{
    GpuBuffer, GpuDescriptorSet, GpuDescriptorSetLayout, GpuPipeline, GpuPipelineLayout,
    GpuSampler, GpuShaderModule, GpuTexture, GpuTextureView,
};
use crate::command::BindPoint;
use crate::descriptor::{DescriptorSetDesc, DescriptorSetLayoutInfo, DescriptorSetStorage, HeapKind};
use crate::handles::{
    BufferHandle, BufferViewHandle, ComputePipelineHandle, DescriptorSetHandle,
    DescriptorSetLayoutHandle, GraphicsPipelineHandle, PipelineLayoutHandle, RenderPassHandle,
    RenderTargetViewHandle, SamplerHandle, ShaderModuleHandle, TextureHandle, TextureViewHandle,
};
use crate::types::{
    BufferCreateDesc, BufferViewDesc, PipelineLayoutDesc, RenderPassDesc, RenderTargetViewDesc,
    SamplerDesc, TextureCreateDesc, TextureViewDesc,
};

#[derive(Debug)]
pub(crate) struct Buffer {
    pub native: GpuBuffer,
    pub mapped: bool,
}

#[derive(Debug)]
pub(crate) struct Texture {
    /// Dropping releases the image only when the native owns it.
    pub native: GpuTexture,
}

#[derive(Debug)]
pub(crate) struct TextureView {
    pub native: GpuTextureView,
    pub texture: TextureHandle,
    pub heap_slot: u32,
}

#[derive(Debug)]
pub(crate) struct BufferView {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
    pub heap_slot: u32,
}

#[derive(Debug)]
pub(crate) struct RenderTargetView {
    pub native: GpuTextureView,
    pub texture: TextureHandle,
    pub heap: HeapKind,
    pub heap_slot: u32,
}

#[derive(Debug)]
pub(crate) struct Sampler {
    pub native: GpuSampler,
    pub heap_slot: u32,
}

#[derive(Debug)]
pub(crate) struct ShaderModule {
    pub native: GpuShaderModule,
    pub bytecode_len: usize,
}

#[derive(Debug)]
pub(crate) struct DescriptorSetLayout {
    pub native: GpuDescriptorSetLayout,
    pub info: Arc<DescriptorSetLayoutInfo>,
}

#[derive(Debug)]
pub(crate) struct DescriptorSet {
    pub native: GpuDescriptorSet,
    pub layout: DescriptorSetLayoutHandle,
    /// Kept alive past the layout's destruction.
    pub info: Arc<DescriptorSetLayoutInfo>,
    pub storage: DescriptorSetStorage,
}

#[derive(Debug)]
pub(crate) struct PipelineLayout {
    pub native: GpuPipelineLayout,
    pub desc: PipelineLayoutDesc,
}

#[derive(Debug)]
pub(crate) struct Pipeline {
    pub native: GpuPipeline,
    pub layout: PipelineLayoutHandle,
    pub bind_point: BindPoint,
}

/// Every object a context owns, addressed by typed handles.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) buffers: GenerationalPool<Buffer, BufferCreateDesc>,
    pub(crate) textures: GenerationalPool<Texture, TextureCreateDesc>,
    pub(crate) texture_views: GenerationalPool<TextureView, TextureViewDesc>,
    pub(crate) buffer_views: GenerationalPool<BufferView, BufferViewDesc>,
    pub(crate) render_target_views: GenerationalPool<RenderTargetView, RenderTargetViewDesc>,
    pub(crate) samplers: GenerationalPool<Sampler, SamplerDesc>,
    pub(crate) render_passes: GenerationalPool<RenderPassDesc>,
    pub(crate) shader_modules: GenerationalPool<ShaderModule>,
    pub(crate) descriptor_set_layouts: GenerationalPool<DescriptorSetLayout, DescriptorSetDesc>,
    pub(crate) descriptor_sets: GenerationalPool<DescriptorSet>,
    pub(crate) pipeline_layouts: GenerationalPool<PipelineLayout>,
    pub(crate) graphics_pipelines: GenerationalPool<Pipeline, Option<String>>,
    pub(crate) compute_pipelines: GenerationalPool<Pipeline, Option<String>>,
    pub(crate) deferred: DeferredReleases,
}

macro_rules! registry_kind {
    ($lookup:ident, $retire:ident, $pool:ident, $handle:ty, $entry:ty, $variant:ident) => {
        /// Live entry, or one destroyed during a frame that has not executed yet.
        pub(crate) fn $lookup(&self, handle: $handle) -> Option<&$entry> {
            self.$pool.get(handle.0).or_else(|| {
                self.deferred.iter().find_map(|retired| match retired {
                    Retired::$variant(h, entry) if *h == handle => Some(entry),
                    _ => None,
                })
            })
        }

        /// Invalidate `handle` and queue its entry for release after `frame_id`.
        pub(crate) fn $retire(&mut self, handle: $handle, frame_id: u64) -> bool {
            match self.$pool.retire(handle.0) {
                Some((entry, _)) => {
                    log::trace!("Retiring {:?} after frame {}", handle, frame_id);
                    self.deferred.push(frame_id, Retired::$variant(handle, entry));
                    true
                }
                None => false,
            }
        }
    };
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    registry_kind!(buffer, retire_buffer, buffers, BufferHandle, Buffer, Buffer);
    registry_kind!(texture, retire_texture, textures, TextureHandle, Texture, Texture);
    registry_kind!(
        texture_view,
        retire_texture_view,
        texture_views,
        TextureViewHandle,
        TextureView,
        TextureView
    );
    registry_kind!(
        buffer_view,
        retire_buffer_view,
        buffer_views,
        BufferViewHandle,
        BufferView,
        BufferView
    );
    registry_kind!(
        render_target_view,
        retire_render_target_view,
        render_target_views,
        RenderTargetViewHandle,
        RenderTargetView,
        RenderTargetView
    );
    registry_kind!(sampler, retire_sampler, samplers, SamplerHandle, Sampler, Sampler);
    registry_kind!(
        render_pass,
        retire_render_pass,
        render_passes,
        RenderPassHandle,
        RenderPassDesc,
        RenderPass
    );
    registry_kind!(
        shader_module,
        retire_shader_module,
        shader_modules,
        ShaderModuleHandle,
        ShaderModule,
        ShaderModule
    );
    registry_kind!(
        descriptor_set_layout,
        retire_descriptor_set_layout,
        descriptor_set_layouts,
        DescriptorSetLayoutHandle,
        DescriptorSetLayout,
        DescriptorSetLayout
    );
    registry_kind!(
        descriptor_set,
        retire_descriptor_set,
        descriptor_sets,
        DescriptorSetHandle,
        DescriptorSet,
        DescriptorSet
    );
    registry_kind!(
        pipeline_layout,
        retire_pipeline_layout,
        pipeline_layouts,
        PipelineLayoutHandle,
        PipelineLayout,
        PipelineLayout
    );
    registry_kind!(
        graphics_pipeline,
        retire_graphics_pipeline,
        graphics_pipelines,
        GraphicsPipelineHandle,
        Pipeline,
        GraphicsPipeline
    );
    registry_kind!(
        compute_pipeline,
        retire_compute_pipeline,
        compute_pipelines,
        ComputePipelineHandle,
        Pipeline,
        ComputePipeline
    );

    /// Release everything retired during frames up to `completed_frame`.
    ///
    /// Returns the number of released entries.
    pub(crate) fn collect(&mut self, completed_frame: u64) -> usize {
        let done = self.deferred.pop_completed(completed_frame);
        let count = done.len();
        for retired in done {
            self.recycle(retired);
        }
        if count > 0 {
            log::trace!("Released {} objects up to frame {}", count, completed_frame);
        }
        count
    }

    fn recycle(&mut self, retired: Retired) {
        match retired {
            Retired::Buffer(h, _) => self.buffers.recycle(h.0.index),
            Retired::Texture(h, _) => self.textures.recycle(h.0.index),
            Retired::TextureView(h, _) => self.texture_views.recycle(h.0.index),
            Retired::BufferView(h, _) => self.buffer_views.recycle(h.0.index),
            Retired::RenderTargetView(h, _) => self.render_target_views.recycle(h.0.index),
            Retired::Sampler(h, _) => self.samplers.recycle(h.0.index),
            Retired::RenderPass(h, _) => self.render_passes.recycle(h.0.index),
            Retired::ShaderModule(h, _) => self.shader_modules.recycle(h.0.index),
            Retired::DescriptorSetLayout(h, _) => self.descriptor_set_layouts.recycle(h.0.index),
            Retired::DescriptorSet(h, _) => self.descriptor_sets.recycle(h.0.index),
            Retired::PipelineLayout(h, _) => self.pipeline_layouts.recycle(h.0.index),
            Retired::GraphicsPipeline(h, _) => self.graphics_pipelines.recycle(h.0.index),
            Retired::ComputePipeline(h, _) => self.compute_pipelines.recycle(h.0.index),
        }
    }

    /// Drop every object, live or retired. The GPU must be idle.
    pub(crate) fn clear(&mut self) {
        // views before the resources they point into
        drop(self.deferred.drain_all());
        drop(self.graphics_pipelines.drain());
        drop(self.compute_pipelines.drain());
        drop(self.pipeline_layouts.drain());
        drop(self.descriptor_sets.drain());
        drop(self.descriptor_set_layouts.drain());
        drop(self.shader_modules.drain());
        drop(self.render_passes.drain());
        drop(self.samplers.drain());
        drop(self.render_target_views.drain());
        drop(self.buffer_views.drain());
        drop(self.texture_views.drain());
        drop(self.textures.drain());
        drop(self.buffers.drain());
    }

    /// Entries waiting for their frame to execute.
    pub fn pending_releases(&self) -> usize {
        self.deferred.len()
    }

    /// Live objects across every pool.
    pub fn live_objects(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.texture_views.len()
            + self.buffer_views.len()
            + self.render_target_views.len()
            + self.samplers.len()
            + self.render_passes.len()
            + self.shader_modules.len()
            + self.descriptor_set_layouts.len()
            + self.descriptor_sets.len()
            + self.pipeline_layouts.len()
            + self.graphics_pipelines.len()
            + self.compute_pipelines.len()
    }
}
