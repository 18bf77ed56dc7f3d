//! Native objects of the wgpu executor.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::descriptor::DescriptorSetLayoutInfo;
use crate::types::TextureFormat;

static NEXT_PIPELINE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct WgpuBuffer {
    pub(super) buffer: wgpu::Buffer,
    /// Size requested by the client, the native buffer may be padded.
    pub(super) size: u64,
    pub(super) mappable: bool,
}

/// A texture, or one image of the window swap chain.
///
/// Swap chain images only exist while acquired, so they are resolved
/// against the current surface texture at submission.
#[derive(Debug)]
pub enum WgpuTexture {
    Owned {
        texture: wgpu::Texture,
        format: TextureFormat,
    },
    Surface {
        image: u32,
    },
}

impl WgpuTexture {
    pub(super) fn owned(&self) -> Option<&wgpu::Texture> {
        match self {
            Self::Owned { texture, .. } => Some(texture),
            Self::Surface { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum WgpuTextureView {
    Owned(wgpu::TextureView),
    /// Attachment view of the acquired swap chain image.
    Surface,
}

#[derive(Debug)]
pub struct WgpuSampler {
    pub(super) sampler: wgpu::Sampler,
}

#[derive(Debug)]
pub struct WgpuShaderModule {
    pub(super) module: wgpu::ShaderModule,
}

/// Native binding number of every packed binding.
#[derive(Debug, Clone)]
pub struct WgpuSetLayout {
    pub(super) binding_numbers: Vec<u32>,
}

/// Same numbering the Vulkan executor uses: the explicit index or the position.
pub(super) fn binding_numbers(info: &DescriptorSetLayoutInfo) -> Vec<u32> {
    info.bindings
        .iter()
        .enumerate()
        .map(|(position, b)| u32::from(b.desc.binding_index.unwrap_or(position as u16)))
        .collect()
}

/// Key of a bind group built for one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct GroupKey {
    pub version: u64,
    pub pipeline: u64,
    pub set_index: u32,
}

/// Bind groups are tied to a layout, and layouts come from the pipelines,
/// so each frame context caches one group per pipeline it was used with.
pub struct WgpuDescriptorSet {
    pub(super) layout: WgpuSetLayout,
    pub(super) frames: Mutex<Vec<Vec<(GroupKey, wgpu::BindGroup)>>>,
}

impl WgpuDescriptorSet {
    pub(super) fn new(layout: WgpuSetLayout, frame_count: usize) -> Self {
        Self {
            layout,
            frames: Mutex::new((0..frame_count).map(|_| Vec::new()).collect()),
        }
    }

    pub(super) fn cached(&self, frame_index: usize, key: GroupKey) -> Option<wgpu::BindGroup> {
        let frames = self.frames.lock();
        frames
            .get(frame_index)?
            .iter()
            .find(|(cached, _)| *cached == key)
            .map(|(_, group)| group.clone())
    }

    /// Store `group`, dropping groups built from older contents.
    pub(super) fn insert(&self, frame_index: usize, key: GroupKey, group: wgpu::BindGroup) {
        let mut frames = self.frames.lock();
        if let Some(groups) = frames.get_mut(frame_index) {
            groups.retain(|(cached, _)| cached.version == key.version);
            groups.push((key, group));
        }
    }
}

impl fmt::Debug for WgpuDescriptorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuDescriptorSet")
            .field("layout", &self.layout)
            .field("frames", &self.frames.lock().len())
            .finish()
    }
}

/// Pipelines derive their bind group layouts from the shaders.
#[derive(Debug)]
pub struct WgpuPipelineLayout {
    pub(super) set_count: usize,
}

#[derive(Debug)]
pub enum WgpuPipelineKind {
    Render(wgpu::RenderPipeline),
    Compute(wgpu::ComputePipeline),
}

#[derive(Debug)]
pub struct WgpuPipeline {
    pub(super) id: u64,
    pub(super) kind: WgpuPipelineKind,
}

impl WgpuPipeline {
    pub(super) fn new(kind: WgpuPipelineKind) -> Self {
        Self {
            id: NEXT_PIPELINE_ID.fetch_add(1, Ordering::Relaxed),
            kind,
        }
    }

    pub(super) fn bind_group_layout(&self, set_index: u32) -> wgpu::BindGroupLayout {
        match &self.kind {
            WgpuPipelineKind::Render(pipeline) => pipeline.get_bind_group_layout(set_index),
            WgpuPipelineKind::Compute(pipeline) => pipeline.get_bind_group_layout(set_index),
        }
    }
}
