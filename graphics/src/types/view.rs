//! Texture view and render target view descriptors.

use bitflags::bitflags;

use super::{TextureFormat, TexturePlane, TextureType};
use crate::handles::TextureHandle;

/// Source of one component of a texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentSwizzle {
    Red,
    Green,
    Blue,
    Alpha,
    Zero,
    One,
}

/// RGBA component remapping of a texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentMapping(pub [ComponentSwizzle; 4]);

impl ComponentMapping {
    pub const IDENTITY: Self = Self([
        ComponentSwizzle::Red,
        ComponentSwizzle::Green,
        ComponentSwizzle::Blue,
        ComponentSwizzle::Alpha,
    ]);

    pub fn is_identity(self) -> bool {
        self == Self::IDENTITY
    }
}

impl Default for ComponentMapping {
    fn default() -> Self {
        Self::IDENTITY
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureViewAccess: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl Default for TextureViewAccess {
    fn default() -> Self {
        Self::READ
    }
}

/// Descriptor for a shader-visible texture view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureViewDesc {
    pub label: Option<String>,
    pub texture: TextureHandle,
    pub components: ComponentMapping,
    pub array_start: u16,
    pub array_range: u16,
    pub format: TextureFormat,
    pub view_type: TextureType,
    pub min_mip: u8,
    pub max_mip: u8,
    pub plane: TexturePlane,
    pub access: TextureViewAccess,
}

impl TextureViewDesc {
    pub fn new(texture: TextureHandle, format: TextureFormat) -> Self {
        Self {
            label: None,
            texture,
            components: ComponentMapping::IDENTITY,
            array_start: 0,
            array_range: 1,
            format,
            view_type: TextureType::Single2D,
            min_mip: 0,
            max_mip: 0,
            plane: TexturePlane::COLOR,
            access: TextureViewAccess::READ,
        }
    }

    pub fn with_access(mut self, access: TextureViewAccess) -> Self {
        self.access = access;
        self
    }

    pub fn with_components(mut self, components: ComponentMapping) -> Self {
        self.components = components;
        self
    }

    pub fn with_mips(mut self, min_mip: u8, max_mip: u8) -> Self {
        self.min_mip = min_mip;
        self.max_mip = max_mip;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Descriptor for a color or depth-stencil attachment view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetViewDesc {
    pub label: Option<String>,
    pub texture: TextureHandle,
    pub format: TextureFormat,
    pub view_type: TextureType,
    pub plane: TexturePlane,
    /// First array slice, or first depth slice for 3D textures.
    pub array_start: u16,
    pub array_size: u16,
    pub mip_level: u8,
}

impl RenderTargetViewDesc {
    pub fn new(texture: TextureHandle, format: TextureFormat) -> Self {
        Self {
            label: None,
            texture,
            format,
            view_type: TextureType::Single2D,
            plane: if format.is_depth_stencil() {
                TexturePlane::DEPTH
            } else {
                TexturePlane::COLOR
            },
            array_start: 0,
            array_size: 1,
            mip_level: 0,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn is_depth_stencil(&self) -> bool {
        self.format.is_depth_stencil()
    }
}
