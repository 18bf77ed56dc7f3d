//! Descriptor checks shared by every backend.
//!
//! Each check returns the first violation as a [`GraphicsError`]; the
//! context turns it into a diagnostic and a sentinel handle.

use crate::error::GraphicsError;
use crate::types::{
    BufferCreateDesc, BufferUsage, BufferViewAccess, BufferViewDesc, MemoryPlacement,
    RenderPassDesc, RenderTargetViewDesc, SamplerDesc, TextureCreateDesc, TextureDesc,
    TextureFormat, TextureUsage, TextureViewAccess, TextureViewDesc,
};

fn invalid(msg: impl Into<String>) -> GraphicsError {
    GraphicsError::InvalidParameter(msg.into())
}

pub fn validate_buffer(desc: &BufferCreateDesc) -> Result<(), GraphicsError> {
    if desc.size == 0 {
        return Err(invalid("buffer size must not be zero"));
    }
    if desc.usage.is_empty() {
        return Err(invalid("buffer usage must not be empty"));
    }
    let forbidden = desc.usage & BufferUsage::forbidden_for(desc.placement);
    if !forbidden.is_empty() {
        return Err(invalid(format!(
            "usage {forbidden:?} is not allowed with {:?} placement",
            desc.placement
        )));
    }
    Ok(())
}

fn validate_texture_shape(desc: &TextureDesc) -> Result<(), GraphicsError> {
    let dims = desc.dimensions;
    if dims.width == 0 || dims.height == 0 || dims.depth == 0 {
        return Err(invalid(format!(
            "texture extent {}x{}x{} has a zero axis",
            dims.width, dims.height, dims.depth
        )));
    }
    if desc.mip_count == 0 {
        return Err(invalid("texture mip count must not be zero"));
    }
    if desc.array_size == 0 {
        return Err(invalid("texture array size must not be zero"));
    }
    if desc.sample_count == 0 {
        return Err(invalid("texture sample count must not be zero"));
    }
    if desc.format == TextureFormat::NoFormat {
        return Err(invalid("texture format must be set"));
    }
    if desc.texture_type.is_cube() && desc.array_size % 6 != 0 {
        return Err(invalid(format!(
            "cube textures need a multiple of 6 slices, got {}",
            desc.array_size
        )));
    }
    let max_mips = 32 - dims.width.max(dims.height).max(dims.depth).leading_zeros();
    if u32::from(desc.mip_count) > max_mips {
        return Err(invalid(format!(
            "{} mips requested, the extent only has {max_mips}",
            desc.mip_count
        )));
    }
    Ok(())
}

pub fn validate_texture(desc: &TextureCreateDesc) -> Result<(), GraphicsError> {
    validate_texture_shape(&desc.desc)?;
    if desc.placement != MemoryPlacement::GpuOnly {
        return Err(invalid(format!(
            "textures live in GpuOnly memory, got {:?}; upload through a staging buffer",
            desc.placement
        )));
    }
    if desc.usage.is_empty() {
        return Err(invalid("texture usage must not be empty"));
    }
    let depth_usage = desc.usage.contains(TextureUsage::DEPTH_STENCIL_TARGET);
    if depth_usage != desc.desc.format.is_depth_stencil() {
        return Err(invalid(format!(
            "depth-stencil usage and format {:?} disagree",
            desc.desc.format
        )));
    }
    if depth_usage && desc.usage.contains(TextureUsage::COLOR_TARGET) {
        return Err(invalid("a texture cannot be both color and depth target"));
    }
    Ok(())
}

pub fn validate_texture_view(
    desc: &TextureViewDesc,
    parent: &TextureCreateDesc,
) -> Result<(), GraphicsError> {
    if desc.access.contains(TextureViewAccess::WRITE) {
        if !desc.components.is_identity() {
            return Err(invalid("write-access views cannot remap components"));
        }
        if !parent.usage.contains(TextureUsage::WRITE) {
            return Err(invalid("write-access view of a texture without WRITE usage"));
        }
    } else if !parent
        .usage
        .intersects(TextureUsage::SAMPLED | TextureUsage::READ)
    {
        return Err(invalid("read view of a texture without SAMPLED or READ usage"));
    }
    if desc.min_mip > desc.max_mip || desc.max_mip >= parent.desc.mip_count {
        return Err(invalid(format!(
            "mip range {}..={} is outside the {} mips of the texture",
            desc.min_mip, desc.max_mip, parent.desc.mip_count
        )));
    }
    let end = u32::from(desc.array_start) + u32::from(desc.array_range);
    if desc.array_range == 0 || end > u32::from(parent.desc.array_size) {
        return Err(invalid(format!(
            "array range {}+{} is outside the {} slices of the texture",
            desc.array_start, desc.array_range, parent.desc.array_size
        )));
    }
    if desc.format.is_depth_stencil() != parent.desc.format.is_depth_stencil() {
        return Err(invalid(format!(
            "view format {:?} is incompatible with {:?}",
            desc.format, parent.desc.format
        )));
    }
    Ok(())
}

pub fn validate_render_target_view(
    desc: &RenderTargetViewDesc,
    parent: &TextureCreateDesc,
) -> Result<(), GraphicsError> {
    let wanted = if desc.is_depth_stencil() {
        TextureUsage::DEPTH_STENCIL_TARGET
    } else {
        TextureUsage::COLOR_TARGET
    };
    if !parent.usage.contains(wanted) {
        return Err(invalid(format!(
            "render target view needs {wanted:?} usage on the texture"
        )));
    }
    if desc.mip_level >= parent.desc.mip_count {
        return Err(invalid(format!(
            "mip {} is outside the {} mips of the texture",
            desc.mip_level, parent.desc.mip_count
        )));
    }
    let end = u32::from(desc.array_start) + u32::from(desc.array_size);
    let slices = u32::from(parent.desc.array_size).max(parent.desc.dimensions.depth);
    if desc.array_size == 0 || end > slices {
        return Err(invalid(format!(
            "slice range {}+{} is outside the {slices} slices of the texture",
            desc.array_start, desc.array_size
        )));
    }
    Ok(())
}

pub fn validate_buffer_view(
    desc: &BufferViewDesc,
    parent: &BufferCreateDesc,
) -> Result<(), GraphicsError> {
    if desc.size == 0 || desc.stride == 0 {
        return Err(invalid("buffer views need a non-zero size and stride"));
    }
    let fits = desc
        .offset
        .checked_add(desc.size)
        .is_some_and(|end| end <= parent.size);
    if !fits {
        return Err(invalid(format!(
            "view {}+{} does not fit in a buffer of {} bytes",
            desc.offset, desc.size, parent.size
        )));
    }
    let needed = if desc.access.contains(BufferViewAccess::CONSTANT) {
        BufferUsage::CONSTANT
    } else if desc.access.contains(BufferViewAccess::WRITE) {
        BufferUsage::WRITE
    } else {
        BufferUsage::READ
    };
    if !parent.usage.intersects(needed) {
        return Err(invalid(format!(
            "buffer view with {:?} access needs {needed:?} usage",
            desc.access
        )));
    }
    Ok(())
}

pub fn validate_sampler(desc: &SamplerDesc) -> Result<(), GraphicsError> {
    if desc.anisotropy > 16 {
        return Err(invalid(format!(
            "anisotropy {} exceeds 16",
            desc.anisotropy
        )));
    }
    if desc.lod_min > desc.lod_max {
        return Err(invalid(format!(
            "lod range {}..{} is inverted",
            desc.lod_min, desc.lod_max
        )));
    }
    Ok(())
}

pub fn validate_render_pass(desc: &RenderPassDesc) -> Result<(), GraphicsError> {
    if desc.color_attachments.len() > RenderPassDesc::MAX_COLOR_ATTACHMENTS {
        return Err(invalid(format!(
            "{} color attachments, at most {} are supported",
            desc.color_attachments.len(),
            RenderPassDesc::MAX_COLOR_ATTACHMENTS
        )));
    }
    if desc.attachment_count() == 0 {
        return Err(invalid("a render pass needs at least one attachment"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::{BufferHandle, RenderTargetViewHandle, TextureHandle};
    use crate::types::{ColorAttachment, ComponentMapping, ComponentSwizzle, DepthStencilAttachment};

    fn color_texture(usage: TextureUsage) -> TextureCreateDesc {
        TextureCreateDesc::new(
            TextureDesc::new_2d(64, 64, TextureFormat::Rgba8Unorm).with_mip_count(3),
            usage,
        )
    }

    #[test]
    fn test_buffer_rules() {
        let ok = BufferCreateDesc::new(16, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);
        assert!(validate_buffer(&ok).is_ok());

        let zero = BufferCreateDesc::new(0, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);
        assert!(validate_buffer(&zero).is_err());

        let no_usage = BufferCreateDesc::new(16, MemoryPlacement::GpuOnly, BufferUsage::empty());
        assert!(validate_buffer(&no_usage).is_err());

        let conflict = BufferCreateDesc::new(16, MemoryPlacement::Readback, BufferUsage::VERTEX);
        assert!(validate_buffer(&conflict).is_err());

        let upload_write =
            BufferCreateDesc::new(16, MemoryPlacement::StageOnce, BufferUsage::WRITE);
        assert!(validate_buffer(&upload_write).is_err());
    }

    #[test]
    fn test_texture_rules() {
        assert!(validate_texture(&color_texture(TextureUsage::SAMPLED)).is_ok());
        assert!(validate_texture(&color_texture(TextureUsage::empty())).is_err());

        let staged = color_texture(TextureUsage::SAMPLED).with_placement(MemoryPlacement::StageOnce);
        assert!(validate_texture(&staged).is_err());

        let mut zero_mips = color_texture(TextureUsage::SAMPLED);
        zero_mips.desc.mip_count = 0;
        assert!(validate_texture(&zero_mips).is_err());

        let mut zero_extent = color_texture(TextureUsage::SAMPLED);
        zero_extent.desc.dimensions.width = 0;
        assert!(validate_texture(&zero_extent).is_err());

        let mut zero_layers = color_texture(TextureUsage::SAMPLED);
        zero_layers.desc.array_size = 0;
        assert!(validate_texture(&zero_layers).is_err());

        let too_many_mips = TextureCreateDesc::new(
            TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm).with_mip_count(4),
            TextureUsage::SAMPLED,
        );
        assert!(validate_texture(&too_many_mips).is_err());
    }

    #[test]
    fn test_depth_usage_requires_depth_format() {
        let color_as_depth = color_texture(TextureUsage::DEPTH_STENCIL_TARGET);
        assert!(validate_texture(&color_as_depth).is_err());

        let depth = TextureCreateDesc::new(
            TextureDesc::new_2d(64, 64, TextureFormat::D32F),
            TextureUsage::DEPTH_STENCIL_TARGET | TextureUsage::SAMPLED,
        );
        assert!(validate_texture(&depth).is_ok());

        let depth_without_usage = TextureCreateDesc::new(
            TextureDesc::new_2d(64, 64, TextureFormat::D24S8),
            TextureUsage::SAMPLED,
        );
        assert!(validate_texture(&depth_without_usage).is_err());
    }

    #[test]
    fn test_write_view_cannot_swizzle() {
        let parent = color_texture(TextureUsage::SAMPLED | TextureUsage::WRITE);
        let swizzled = ComponentMapping([
            ComponentSwizzle::Blue,
            ComponentSwizzle::Green,
            ComponentSwizzle::Red,
            ComponentSwizzle::Alpha,
        ]);
        let view = TextureViewDesc::new(TextureHandle::INVALID, TextureFormat::Rgba8Unorm)
            .with_components(swizzled);
        assert!(validate_texture_view(&view, &parent).is_ok());
        assert!(
            validate_texture_view(&view.with_access(TextureViewAccess::WRITE), &parent).is_err()
        );
    }

    #[test]
    fn test_view_ranges() {
        let parent = color_texture(TextureUsage::SAMPLED);
        let view = TextureViewDesc::new(TextureHandle::INVALID, TextureFormat::Rgba8Unorm);
        assert!(validate_texture_view(&view.clone().with_mips(0, 2), &parent).is_ok());
        assert!(validate_texture_view(&view.clone().with_mips(0, 3), &parent).is_err());
        assert!(validate_texture_view(&view.with_mips(2, 1), &parent).is_err());

        let rtv = RenderTargetViewDesc::new(TextureHandle::INVALID, TextureFormat::Rgba8Unorm);
        assert!(validate_render_target_view(&rtv, &parent).is_err());
        let target = color_texture(TextureUsage::COLOR_TARGET);
        assert!(validate_render_target_view(&rtv, &target).is_ok());
    }

    #[test]
    fn test_buffer_view_must_fit() {
        let parent = BufferCreateDesc::new(256, MemoryPlacement::GpuOnly, BufferUsage::READ);
        let view = BufferViewDesc::new(BufferHandle::INVALID, 128, 16, BufferViewAccess::READ);
        assert!(validate_buffer_view(&view, &parent).is_ok());
        assert!(validate_buffer_view(&view.clone().with_offset(192), &parent).is_err());

        let no_stride = BufferViewDesc::new(BufferHandle::INVALID, 128, 0, BufferViewAccess::READ);
        assert!(validate_buffer_view(&no_stride, &parent).is_err());

        let write = BufferViewDesc::new(BufferHandle::INVALID, 128, 16, BufferViewAccess::WRITE);
        assert!(validate_buffer_view(&write, &parent).is_err());
    }

    #[test]
    fn test_render_pass_attachments() {
        assert!(validate_render_pass(&RenderPassDesc::new()).is_err());

        let depth_only = RenderPassDesc::new()
            .with_depth_stencil(DepthStencilAttachment::new(RenderTargetViewHandle::INVALID));
        assert!(validate_render_pass(&depth_only).is_ok());

        let mut too_many = RenderPassDesc::new();
        for _ in 0..9 {
            too_many = too_many.with_color(ColorAttachment::new(RenderTargetViewHandle::INVALID));
        }
        assert!(validate_render_pass(&too_many).is_err());
    }

    #[test]
    fn test_sampler_rules() {
        assert!(validate_sampler(&SamplerDesc::default()).is_ok());
        assert!(validate_sampler(&SamplerDesc::default().with_anisotropy(32)).is_err());
        let mut inverted = SamplerDesc::default();
        inverted.lod_min = 4.0;
        inverted.lod_max = 1.0;
        assert!(validate_sampler(&inverted).is_err());
    }
}
