//! Command recording.
//!
//! A [`CommandList`] records API-neutral [`Command`]s into a list owned by
//! the current frame context. Barriers are lowered to the native form of
//! the selected API family while recording; everything else is lowered by
//! the backend when the frame is submitted.

mod list;

pub use list::{CommandList, PassUsage};

use crate::barrier::TranslatedBarriers;
use crate::handles::{
    BufferHandle, BufferViewHandle, ComputePipelineHandle, DescriptorSetHandle,
    GraphicsPipelineHandle, PipelineLayoutHandle, RenderPassHandle, TextureHandle,
    TextureViewHandle,
};
use crate::types::{
    BufferCopyParameters, BufferSpan, DispatchSize, DrawIndexedInstancedDesc, DrawInstancedDesc,
    Extent3d, IndexFormat, ScissorRect, SubResourceIndexing, TextureMemoryFootprint, Viewport,
};

/// The queue class a command list is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    Graphics,
    Compute,
    Transfer,
}

impl QueueType {
    /// Submission order inside a frame.
    pub const SUBMIT_ORDER: [Self; 3] = [Self::Transfer, Self::Compute, Self::Graphics];

    pub(crate) fn slot(self) -> usize {
        match self {
            Self::Graphics => 0,
            Self::Compute => 1,
            Self::Transfer => 2,
        }
    }
}

/// Pipeline a push constant or descriptor set is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindPoint {
    Graphics,
    Compute,
}

/// One recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginRenderPass(RenderPassHandle),
    EndRenderPass,
    BeginComputePass,
    EndComputePass,
    UseTextureView {
        view: TextureViewHandle,
        usage: PassUsage,
    },
    UseBufferView {
        view: BufferViewHandle,
        usage: PassUsage,
    },
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    SetIndexBuffer {
        span: BufferSpan,
        format: IndexFormat,
    },
    SetVertexBuffers(Vec<BufferSpan>),
    SetGraphicsPipeline(GraphicsPipelineHandle),
    SetComputePipeline(ComputePipelineHandle),
    PushConstants {
        bind_point: BindPoint,
        layout: PipelineLayoutHandle,
        index: u8,
        offset: u32,
        data: Vec<u8>,
    },
    BindDescriptorSet {
        bind_point: BindPoint,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    },
    Draw(DrawInstancedDesc),
    DrawIndexed(DrawIndexedInstancedDesc),
    DrawIndirect {
        buffer: BufferHandle,
        offset: u64,
        draw_count: u32,
        stride: u32,
        indexed: bool,
    },
    Dispatch {
        groups: DispatchSize,
        group_size: DispatchSize,
    },
    CopyBuffer(BufferCopyParameters),
    CopyBufferToTexture {
        buffer: BufferHandle,
        footprint: TextureMemoryFootprint,
        texture: TextureHandle,
        sub_resource: SubResourceIndexing,
    },
    CopyTextureToBuffer {
        texture: TextureHandle,
        sub_resource: SubResourceIndexing,
        buffer: BufferHandle,
        footprint: TextureMemoryFootprint,
    },
    CopyTexture {
        src: TextureHandle,
        src_sub_resource: SubResourceIndexing,
        dst: TextureHandle,
        dst_sub_resource: SubResourceIndexing,
        extent: Extent3d,
    },
    Barrier(TranslatedBarriers),
    WriteTimestamp(u32),
}

impl Command {
    /// Whether the command may only appear inside a render pass.
    pub fn needs_render_pass(&self) -> bool {
        matches!(
            self,
            Self::SetViewport(_)
                | Self::SetScissor(_)
                | Self::Draw(_)
                | Self::DrawIndexed(_)
                | Self::DrawIndirect { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_order() {
        assert_eq!(
            QueueType::SUBMIT_ORDER,
            [QueueType::Transfer, QueueType::Compute, QueueType::Graphics]
        );
        let slots: Vec<usize> = QueueType::SUBMIT_ORDER.iter().map(|q| q.slot()).collect();
        assert_eq!(slots, vec![2, 1, 0]);
    }

    #[test]
    fn test_render_pass_only_commands() {
        assert!(Command::Draw(DrawInstancedDesc::new(3)).needs_render_pass());
        assert!(!Command::EndRenderPass.needs_render_pass());
        assert!(!Command::WriteTimestamp(0).needs_render_pass());
    }
}
