//! Pipeline state descriptors.

use bitflags::bitflags;

use super::TextureFormat;
use crate::handles::{
    DescriptorSetLayoutHandle, PipelineLayoutHandle, RenderPassHandle, ShaderModuleHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStageKind {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
    Mesh,
    Task,
}

impl ShaderStageKind {
    pub fn visibility(self) -> ShaderVisibility {
        match self {
            Self::Vertex => ShaderVisibility::VERTEX,
            Self::TessellationControl => ShaderVisibility::TESSELLATION_CONTROL,
            Self::TessellationEvaluation => ShaderVisibility::TESSELLATION_EVALUATION,
            Self::Geometry => ShaderVisibility::GEOMETRY,
            Self::Fragment => ShaderVisibility::FRAGMENT,
            Self::Compute => ShaderVisibility::COMPUTE,
            Self::Mesh => ShaderVisibility::MESH,
            Self::Task => ShaderVisibility::TASK,
        }
    }
}

/// One programmable stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderStage {
    pub module: ShaderModuleHandle,
    pub stage: ShaderStageKind,
    pub entry_point: String,
}

impl ShaderStage {
    pub fn new(module: ShaderModuleHandle, stage: ShaderStageKind) -> Self {
        Self {
            module,
            stage,
            entry_point: "main".to_string(),
        }
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }
}

bitflags! {
    /// Shader stages a binding or push constant range is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderVisibility: u8 {
        const VERTEX = 1 << 0;
        const TESSELLATION_CONTROL = 1 << 1;
        const TESSELLATION_EVALUATION = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const COMPUTE = 1 << 5;
        const TASK = 1 << 6;
        const MESH = 1 << 7;
        const ALL = 0xFF;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexSemantic {
    #[default]
    Position,
    Normal,
    Uv,
    Color,
    Tangent,
    BiTangent,
    BoneIndices,
    BoneWeights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLayoutElement {
    pub semantic: VertexSemantic,
    pub semantic_index: u8,
    pub binding_index: u8,
    pub format: TextureFormat,
    pub offset: u16,
    pub location: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexBindingDesc {
    pub stride: u16,
    pub binding: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexInputDesc {
    pub elements: Vec<VertexLayoutElement>,
    pub bindings: Vec<VertexBindingDesc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputAssemblyDesc {
    pub topology: PrimitiveTopology,
    pub index_format: super::IndexFormat,
    pub primitive_restart: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    Wireframe,
    #[default]
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    Clockwise,
    #[default]
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterStateDesc {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front: FrontFace,
    pub depth_clip: bool,
    pub depth_bias: bool,
    pub depth_bias_constant_factor: f32,
    pub depth_bias_slope_factor: f32,
    pub depth_bias_clamp: f32,
}

impl Default for RasterStateDesc {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front: FrontFace::CounterClockwise,
            depth_clip: true,
            depth_bias: false,
            depth_bias_constant_factor: 0.0,
            depth_bias_slope_factor: 0.0,
            depth_bias_clamp: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstColor,
    InvDstColor,
    DstAlpha,
    InvDstAlpha,
    SrcAlphaSaturate,
    FactorColor,
    InvFactorColor,
    FactorAlpha,
    InvFactorAlpha,
    Src1Color,
    InvSrc1Color,
    Src1Alpha,
    InvSrc1Alpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = 0xF;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorAttachmentBlendDesc {
    pub blend_enable: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
    pub write_mask: ColorWriteMask,
}

impl ColorAttachmentBlendDesc {
    pub const OPAQUE: Self = Self {
        blend_enable: false,
        src_color: BlendFactor::One,
        dst_color: BlendFactor::Zero,
        color_op: BlendOp::Add,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::Zero,
        alpha_op: BlendOp::Add,
        write_mask: ColorWriteMask::ALL,
    };

    /// Premultiplied-free alpha blending.
    pub const ALPHA_BLEND: Self = Self {
        blend_enable: true,
        src_color: BlendFactor::SrcAlpha,
        dst_color: BlendFactor::InvSrcAlpha,
        color_op: BlendOp::Add,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::InvSrcAlpha,
        alpha_op: BlendOp::Add,
        write_mask: ColorWriteMask::ALL,
    };
}

impl Default for ColorAttachmentBlendDesc {
    fn default() -> Self {
        Self::OPAQUE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogicOp {
    #[default]
    None,
    Clear,
    Set,
    Copy,
    CopyInverted,
    NoOp,
    Invert,
    And,
    NAnd,
    Or,
    NOr,
    XOr,
    Equiv,
    AndReverse,
    AndInverted,
    OrReverse,
    OrInverted,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorBlendingDesc {
    pub attachments: Vec<ColorAttachmentBlendDesc>,
    pub blend_factor: [f32; 4],
    pub logic_op: LogicOp,
    pub dynamic_blend_factor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareOp {
    #[default]
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StencilOpState {
    pub pass_op: StencilOp,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDesc {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    pub stencil_test: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub stencil_ref: u8,
    pub dynamic_stencil_ref: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
}

impl Default for DepthStencilStateDesc {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_compare: CompareOp::Less,
            stencil_test: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            stencil_ref: 0xFF,
            dynamic_stencil_ref: false,
            front: StencilOpState::default(),
            back: StencilOpState::default(),
        }
    }
}

impl DepthStencilStateDesc {
    pub fn disabled() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            depth_compare: CompareOp::Always,
            ..Default::default()
        }
    }
}

/// A push constant range of a pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantDesc {
    pub size_in_bytes: u8,
    pub offset: u8,
    pub index: u8,
    pub visibility: ShaderVisibility,
}

impl PushConstantDesc {
    pub fn new(size_in_bytes: u8, visibility: ShaderVisibility) -> Self {
        Self {
            size_in_bytes,
            offset: 0,
            index: 0,
            visibility,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineLayoutDesc {
    pub descriptor_sets: Vec<DescriptorSetLayoutHandle>,
    pub push_constants: Vec<PushConstantDesc>,
    pub use_vertex_layout: bool,
}

impl Default for PipelineLayoutDesc {
    fn default() -> Self {
        Self {
            descriptor_sets: Vec::new(),
            push_constants: Vec::new(),
            use_vertex_layout: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphicsPipelineDesc {
    pub label: Option<String>,
    pub stages: Vec<ShaderStage>,
    pub vertex_input: VertexInputDesc,
    pub input_assembly: InputAssemblyDesc,
    pub raster_state: RasterStateDesc,
    pub color_blending: ColorBlendingDesc,
    pub depth_stencil: DepthStencilStateDesc,
    pub render_pass: RenderPassHandle,
    pub pipeline_layout: PipelineLayoutHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputePipelineDesc {
    pub label: Option<String>,
    pub stage: ShaderStage,
    pub pipeline_layout: PipelineLayoutHandle,
}
