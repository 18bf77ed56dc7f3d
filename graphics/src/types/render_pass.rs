//! Render pass descriptors.

use super::TextureLayout;
use crate::handles::RenderTargetViewHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    Load,
    Clear,
    #[default]
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    Store,
    Resolve,
    #[default]
    DontCare,
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub initial_layout: TextureLayout,
    pub final_layout: TextureLayout,
    pub rtv: RenderTargetViewHandle,
    pub clear_color: [f32; 4],
}

impl ColorAttachment {
    pub fn new(rtv: RenderTargetViewHandle) -> Self {
        Self {
            load_op: LoadOp::DontCare,
            store_op: StoreOp::Store,
            initial_layout: TextureLayout::Unknown,
            final_layout: TextureLayout::ColorAttachment,
            rtv,
            clear_color: [0.0; 4],
        }
    }

    pub fn with_clear(mut self, color: [f32; 4]) -> Self {
        self.load_op = LoadOp::Clear;
        self.clear_color = color;
        self
    }

    pub fn with_ops(mut self, load_op: LoadOp, store_op: StoreOp) -> Self {
        self.load_op = load_op;
        self.store_op = store_op;
        self
    }

    pub fn with_layouts(mut self, initial: TextureLayout, final_layout: TextureLayout) -> Self {
        self.initial_layout = initial;
        self.final_layout = final_layout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilAttachment {
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: TextureLayout,
    pub final_layout: TextureLayout,
    pub rtv: RenderTargetViewHandle,
    pub clear_depth: f32,
    pub clear_stencil: u8,
}

impl DepthStencilAttachment {
    pub fn new(rtv: RenderTargetViewHandle) -> Self {
        Self {
            load_op: LoadOp::Clear,
            store_op: StoreOp::DontCare,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: TextureLayout::Unknown,
            final_layout: TextureLayout::DepthStencilAttachment,
            rtv,
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPassDesc {
    pub label: Option<String>,
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_stencil_attachment: Option<DepthStencilAttachment>,
}

impl RenderPassDesc {
    pub const MAX_COLOR_ATTACHMENTS: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    pub fn with_depth_stencil(mut self, attachment: DepthStencilAttachment) -> Self {
        self.depth_stencil_attachment = Some(attachment);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn attachment_count(&self) -> usize {
        self.color_attachments.len() + usize::from(self.depth_stencil_attachment.is_some())
    }
}
