//! Objects destroyed by the client but possibly still in flight.
//!
//! Destroying an object invalidates its handle right away. The entry itself
//! moves here, tagged with the frame that was being recorded, and is only
//! dropped (releasing the native object) and its slot index recycled once
//! that frame has executed.

use std::collections::VecDeque;

use super::{Buffer, BufferView, DescriptorSet, DescriptorSetLayout, Pipeline, PipelineLayout};
use super::{RenderTargetView, Sampler, ShaderModule, Texture, TextureView};
use crate::handles::{
    BufferHandle, BufferViewHandle, ComputePipelineHandle, DescriptorSetHandle,
    DescriptorSetLayoutHandle, GraphicsPipelineHandle, PipelineLayoutHandle, RenderPassHandle,
    RenderTargetViewHandle, SamplerHandle, ShaderModuleHandle, TextureHandle, TextureViewHandle,
};
use crate::types::RenderPassDesc;

/// A destroyed registry entry together with the handle it lived under.
#[derive(Debug)]
pub(crate) enum Retired {
    Buffer(BufferHandle, Buffer),
    Texture(TextureHandle, Texture),
    TextureView(TextureViewHandle, TextureView),
    BufferView(BufferViewHandle, BufferView),
    RenderTargetView(RenderTargetViewHandle, RenderTargetView),
    Sampler(SamplerHandle, Sampler),
    RenderPass(RenderPassHandle, RenderPassDesc),
    ShaderModule(ShaderModuleHandle, ShaderModule),
    DescriptorSetLayout(DescriptorSetLayoutHandle, DescriptorSetLayout),
    DescriptorSet(DescriptorSetHandle, DescriptorSet),
    PipelineLayout(PipelineLayoutHandle, PipelineLayout),
    GraphicsPipeline(GraphicsPipelineHandle, Pipeline),
    ComputePipeline(ComputePipelineHandle, Pipeline),
}

/// FIFO of retired entries, ordered by frame id.
#[derive(Debug, Default)]
pub(crate) struct DeferredReleases {
    queue: VecDeque<(u64, Retired)>,
}

impl DeferredReleases {
    /// Queue `retired` behind every entry of the same or an earlier frame.
    pub fn push(&mut self, frame_id: u64, retired: Retired) {
        let at = self.queue.partition_point(|(last, _)| *last <= frame_id);
        self.queue.insert(at, (frame_id, retired));
    }

    /// Take every entry retired during a frame up to `completed_frame`.
    pub fn pop_completed(&mut self, completed_frame: u64) -> Vec<Retired> {
        let mut done = Vec::new();
        while let Some((frame_id, _)) = self.queue.front() {
            if *frame_id > completed_frame {
                break;
            }
            if let Some((_, retired)) = self.queue.pop_front() {
                done.push(retired);
            }
        }
        done
    }

    pub fn drain_all(&mut self) -> Vec<Retired> {
        self.queue.drain(..).map(|(_, retired)| retired).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Retired> {
        self.queue.iter().map(|(_, retired)| retired)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
