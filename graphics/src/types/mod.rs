//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! shared by every backend.

mod buffer;
mod common;
mod pipeline;
mod render_pass;
mod sampler;
mod texture;
mod view;

pub use buffer::{
    BufferCopyParameters, BufferCreateDesc, BufferMapping, BufferSpan, BufferUsage,
    BufferViewAccess, BufferViewDesc, DrawIndexedIndirectArgs, DrawIndirectArgs, IndexFormat,
    MemoryPlacement,
};
pub use common::{
    DispatchSize, DrawIndexedInstancedDesc, DrawInstancedDesc, ScissorRect, Viewport,
};
pub use pipeline::{
    BlendFactor, BlendOp, ColorAttachmentBlendDesc, ColorBlendingDesc, ColorWriteMask,
    CompareOp, ComputePipelineDesc, CullMode, DepthStencilStateDesc, FillMode, FrontFace,
    GraphicsPipelineDesc, InputAssemblyDesc, LogicOp, PipelineLayoutDesc, PrimitiveTopology,
    PushConstantDesc, RasterStateDesc, ShaderStage, ShaderStageKind, ShaderVisibility,
    StencilOp, StencilOpState, VertexBindingDesc, VertexInputDesc, VertexLayoutElement,
    VertexSemantic,
};
pub use render_pass::{ColorAttachment, DepthStencilAttachment, LoadOp, RenderPassDesc, StoreOp};
pub use sampler::{AddressMode, FilterMode, SamplerDesc, SamplerReduction};
pub use texture::{
    Extent3d, SubResourceIndexing, TextureCreateDesc, TextureDesc, TextureFormat,
    TextureLayout, TextureMemoryFootprint, TexturePlane, TextureType, TextureUsage,
    compute_footprints, footprints_total_size,
};
pub use view::{
    ComponentMapping, ComponentSwizzle, RenderTargetViewDesc, TextureViewAccess,
    TextureViewDesc,
};
