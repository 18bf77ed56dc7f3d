//! Conversions from the API-neutral types to wgpu types.

use crate::types::{
    AddressMode, BlendFactor, BlendOp, BufferUsage, ColorAttachmentBlendDesc, ColorWriteMask,
    CompareOp, CullMode, FilterMode, FrontFace, IndexFormat, LoadOp, MemoryPlacement,
    PrimitiveTopology, StencilOp, StencilOpState, StoreOp, TextureFormat, TexturePlane,
    TextureType, TextureUsage,
};

/// Usages of a buffer in `placement`.
///
/// Readback buffers may only be copied into, wgpu does not allow a
/// mappable buffer to be used any other way.
pub fn convert_buffer_usage(usage: BufferUsage, placement: MemoryPlacement) -> wgpu::BufferUsages {
    if placement == MemoryPlacement::Readback {
        return wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST;
    }
    let table = [
        (BufferUsage::TRANSFER_SRC, wgpu::BufferUsages::COPY_SRC),
        (BufferUsage::TRANSFER_DST, wgpu::BufferUsages::COPY_DST),
        (BufferUsage::CONSTANT, wgpu::BufferUsages::UNIFORM),
        (BufferUsage::READ, wgpu::BufferUsages::STORAGE),
        (BufferUsage::WRITE, wgpu::BufferUsages::STORAGE),
        (BufferUsage::INDEX, wgpu::BufferUsages::INDEX),
        (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
        (BufferUsage::INDIRECT, wgpu::BufferUsages::INDIRECT),
    ];
    // host writes go through the queue and host reads through a staging copy
    table
        .iter()
        .filter(|(neutral, _)| usage.contains(*neutral))
        .fold(
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            |acc, (_, flags)| acc | *flags,
        )
}

pub fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
    let table = [
        (TextureUsage::TRANSFER_SRC, wgpu::TextureUsages::COPY_SRC),
        (TextureUsage::TRANSFER_DST, wgpu::TextureUsages::COPY_DST),
        (TextureUsage::SAMPLED, wgpu::TextureUsages::TEXTURE_BINDING),
        (TextureUsage::READ, wgpu::TextureUsages::STORAGE_BINDING),
        (TextureUsage::WRITE, wgpu::TextureUsages::STORAGE_BINDING),
        (TextureUsage::COLOR_TARGET, wgpu::TextureUsages::RENDER_ATTACHMENT),
        (
            TextureUsage::DEPTH_STENCIL_TARGET,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        ),
    ];
    table
        .iter()
        .filter(|(neutral, _)| usage.contains(*neutral))
        .fold(wgpu::TextureUsages::empty(), |acc, (_, flags)| acc | *flags)
}

/// `None` for formats wgpu cannot store.
pub fn convert_texture_format(format: TextureFormat) -> Option<wgpu::TextureFormat> {
    use wgpu::TextureFormat as W;
    Some(match format.storage_format() {
        TextureFormat::NoFormat | TextureFormat::Rgb32Float => return None,
        TextureFormat::R8Unorm => W::R8Unorm,
        TextureFormat::Rg8Unorm => W::Rg8Unorm,
        TextureFormat::Rgba8Unorm | TextureFormat::Rgb8Unorm => W::Rgba8Unorm,
        TextureFormat::Rgba8Srgb | TextureFormat::Rgb8Srgb => W::Rgba8UnormSrgb,
        TextureFormat::Bgra8Unorm => W::Bgra8Unorm,
        TextureFormat::Bgra8Srgb => W::Bgra8UnormSrgb,
        TextureFormat::R8Snorm => W::R8Snorm,
        TextureFormat::Rg8Snorm => W::Rg8Snorm,
        TextureFormat::Rgba8Snorm | TextureFormat::Rgb8Snorm => W::Rgba8Snorm,
        TextureFormat::R16Unorm => W::R16Unorm,
        TextureFormat::Rg16Unorm => W::Rg16Unorm,
        TextureFormat::Rgba16Unorm => W::Rgba16Unorm,
        TextureFormat::R16Float => W::R16Float,
        TextureFormat::Rg16Float => W::Rg16Float,
        TextureFormat::Rgba16Float => W::Rgba16Float,
        TextureFormat::R32Float => W::R32Float,
        TextureFormat::Rg32Float => W::Rg32Float,
        TextureFormat::Rgba32Float => W::Rgba32Float,
        TextureFormat::R32Uint => W::R32Uint,
        TextureFormat::D16 => W::Depth16Unorm,
        TextureFormat::D24 => W::Depth24Plus,
        TextureFormat::D24S8 => W::Depth24PlusStencil8,
        TextureFormat::D32F => W::Depth32Float,
        TextureFormat::D32FS8 => W::Depth32FloatStencil8,
    })
}

/// Surface formats the context understands.
pub fn surface_format_to_texture_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    match format {
        wgpu::TextureFormat::Bgra8Unorm => Some(TextureFormat::Bgra8Unorm),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(TextureFormat::Bgra8Srgb),
        wgpu::TextureFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(TextureFormat::Rgba8Srgb),
        wgpu::TextureFormat::Rgba16Float => Some(TextureFormat::Rgba16Float),
        _ => None,
    }
}

pub fn convert_vertex_format(format: TextureFormat) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as V;
    Some(match format {
        TextureFormat::R8Unorm => V::Unorm8,
        TextureFormat::Rg8Unorm => V::Unorm8x2,
        TextureFormat::Rgba8Unorm | TextureFormat::Bgra8Unorm => V::Unorm8x4,
        TextureFormat::R8Snorm => V::Snorm8,
        TextureFormat::Rg8Snorm => V::Snorm8x2,
        TextureFormat::Rgba8Snorm => V::Snorm8x4,
        TextureFormat::R16Unorm => V::Unorm16,
        TextureFormat::Rg16Unorm => V::Unorm16x2,
        TextureFormat::Rgba16Unorm => V::Unorm16x4,
        TextureFormat::R16Float => V::Float16,
        TextureFormat::Rg16Float => V::Float16x2,
        TextureFormat::Rgba16Float => V::Float16x4,
        TextureFormat::R32Float => V::Float32,
        TextureFormat::Rg32Float => V::Float32x2,
        TextureFormat::Rgb32Float => V::Float32x3,
        TextureFormat::Rgba32Float => V::Float32x4,
        TextureFormat::R32Uint => V::Uint32,
        _ => return None,
    })
}

/// Texture dimension and layer count of a texture.
pub fn convert_dimension(texture_type: TextureType) -> wgpu::TextureDimension {
    match texture_type {
        TextureType::Single1D | TextureType::Array1D => wgpu::TextureDimension::D1,
        TextureType::Single3D => wgpu::TextureDimension::D3,
        TextureType::Single2D
        | TextureType::Array2D
        | TextureType::SingleCube
        | TextureType::ArrayCube => wgpu::TextureDimension::D2,
    }
}

/// wgpu has no 1D arrays; they are viewed one layer at a time.
pub fn convert_view_dimension(texture_type: TextureType) -> wgpu::TextureViewDimension {
    match texture_type {
        TextureType::Single1D | TextureType::Array1D => wgpu::TextureViewDimension::D1,
        TextureType::Single2D => wgpu::TextureViewDimension::D2,
        TextureType::Array2D => wgpu::TextureViewDimension::D2Array,
        TextureType::Single3D => wgpu::TextureViewDimension::D3,
        TextureType::SingleCube => wgpu::TextureViewDimension::Cube,
        TextureType::ArrayCube => wgpu::TextureViewDimension::CubeArray,
    }
}

/// Aspect of a single-plane access to a texture of `format`.
pub fn convert_aspect(format: TextureFormat, plane: TexturePlane) -> wgpu::TextureAspect {
    if !format.is_depth_stencil() {
        return wgpu::TextureAspect::All;
    }
    if plane.contains(TexturePlane::STENCIL) && !plane.contains(TexturePlane::DEPTH) {
        wgpu::TextureAspect::StencilOnly
    } else if format.has_stencil() {
        wgpu::TextureAspect::DepthOnly
    } else {
        wgpu::TextureAspect::All
    }
}

pub fn convert_filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Point => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

pub fn convert_mipmap_filter_mode(mode: FilterMode) -> wgpu::MipmapFilterMode {
    match mode {
        FilterMode::Point => wgpu::MipmapFilterMode::Nearest,
        FilterMode::Linear => wgpu::MipmapFilterMode::Linear,
    }
}

/// Border addressing needs `ADDRESS_MODE_CLAMP_TO_BORDER`; without it the
/// sampler clamps to the edge.
pub fn convert_address_mode(mode: AddressMode, border_supported: bool) -> wgpu::AddressMode {
    match mode {
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        AddressMode::Border if border_supported => wgpu::AddressMode::ClampToBorder,
        AddressMode::Border => wgpu::AddressMode::ClampToEdge,
    }
}

/// Closest of the three border colors wgpu offers.
pub fn convert_border_color(color: [f32; 4]) -> wgpu::SamplerBorderColor {
    match color {
        [r, g, b, _] if r >= 0.5 && g >= 0.5 && b >= 0.5 => wgpu::SamplerBorderColor::OpaqueWhite,
        [_, _, _, a] if a >= 0.5 => wgpu::SamplerBorderColor::OpaqueBlack,
        _ => wgpu::SamplerBorderColor::TransparentBlack,
    }
}

pub fn convert_compare_op(op: CompareOp) -> wgpu::CompareFunction {
    match op {
        CompareOp::Never => wgpu::CompareFunction::Never,
        CompareOp::Less => wgpu::CompareFunction::Less,
        CompareOp::Equal => wgpu::CompareFunction::Equal,
        CompareOp::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareOp::Greater => wgpu::CompareFunction::Greater,
        CompareOp::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareOp::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareOp::Always => wgpu::CompareFunction::Always,
    }
}

fn convert_stencil_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::IncrementAndClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOp::DecrementAndClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
        StencilOp::IncrementAndWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOp::DecrementAndWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

pub fn convert_stencil_face(state: &StencilOpState) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: convert_compare_op(state.compare_op),
        fail_op: convert_stencil_op(state.fail_op),
        depth_fail_op: convert_stencil_op(state.depth_fail_op),
        pass_op: convert_stencil_op(state.pass_op),
    }
}

fn convert_blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::InvDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InvDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
        BlendFactor::FactorColor | BlendFactor::FactorAlpha => wgpu::BlendFactor::Constant,
        BlendFactor::InvFactorColor | BlendFactor::InvFactorAlpha => {
            wgpu::BlendFactor::OneMinusConstant
        }
        BlendFactor::Src1Color => wgpu::BlendFactor::Src1,
        BlendFactor::InvSrc1Color => wgpu::BlendFactor::OneMinusSrc1,
        BlendFactor::Src1Alpha => wgpu::BlendFactor::Src1Alpha,
        BlendFactor::InvSrc1Alpha => wgpu::BlendFactor::OneMinusSrc1Alpha,
    }
}

fn convert_blend_op(op: BlendOp) -> wgpu::BlendOperation {
    match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        BlendOp::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOp::Min => wgpu::BlendOperation::Min,
        BlendOp::Max => wgpu::BlendOperation::Max,
    }
}

/// `None` when blending is off for the attachment.
pub fn convert_blend(desc: &ColorAttachmentBlendDesc) -> Option<wgpu::BlendState> {
    desc.blend_enable.then(|| wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: convert_blend_factor(desc.src_color),
            dst_factor: convert_blend_factor(desc.dst_color),
            operation: convert_blend_op(desc.color_op),
        },
        alpha: wgpu::BlendComponent {
            src_factor: convert_blend_factor(desc.src_alpha),
            dst_factor: convert_blend_factor(desc.dst_alpha),
            operation: convert_blend_op(desc.alpha_op),
        },
    })
}

pub fn convert_write_mask(mask: ColorWriteMask) -> wgpu::ColorWrites {
    wgpu::ColorWrites::from_bits_truncate(u32::from(mask.bits()))
}

pub fn convert_topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
        PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
        PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

pub fn convert_cull_mode(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

pub fn convert_front_face(front: FrontFace) -> wgpu::FrontFace {
    match front {
        FrontFace::Clockwise => wgpu::FrontFace::Cw,
        FrontFace::CounterClockwise => wgpu::FrontFace::Ccw,
    }
}

pub fn convert_index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::U16 => wgpu::IndexFormat::Uint16,
        IndexFormat::U32 => wgpu::IndexFormat::Uint32,
    }
}

/// wgpu has no "don't care" load, the previous contents are kept instead.
pub fn convert_color_load(op: LoadOp, clear: [f32; 4]) -> wgpu::LoadOp<wgpu::Color> {
    match op {
        LoadOp::Clear => wgpu::LoadOp::Clear(wgpu::Color {
            r: f64::from(clear[0]),
            g: f64::from(clear[1]),
            b: f64::from(clear[2]),
            a: f64::from(clear[3]),
        }),
        LoadOp::Load | LoadOp::DontCare => wgpu::LoadOp::Load,
    }
}

pub fn convert_load<V>(op: LoadOp, clear: V) -> wgpu::LoadOp<V> {
    match op {
        LoadOp::Clear => wgpu::LoadOp::Clear(clear),
        LoadOp::Load | LoadOp::DontCare => wgpu::LoadOp::Load,
    }
}

/// Resolves are recorded as copies by the caller, the attachment itself is stored.
pub fn convert_store_op(op: StoreOp) -> wgpu::StoreOp {
    match op {
        StoreOp::Store | StoreOp::Resolve => wgpu::StoreOp::Store,
        StoreOp::DontCare => wgpu::StoreOp::Discard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readback_buffers_are_copy_targets_only() {
        let usage = convert_buffer_usage(BufferUsage::READ_WRITE, MemoryPlacement::Readback);
        assert_eq!(usage, wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST);

        let usage = convert_buffer_usage(BufferUsage::CONSTANT, MemoryPlacement::StageEveryFrame);
        assert!(usage.contains(wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST));
        assert!(!usage.contains(wgpu::BufferUsages::MAP_READ));
    }

    #[test]
    fn test_three_channel_formats_widen() {
        assert_eq!(
            convert_texture_format(TextureFormat::Rgb8Srgb),
            Some(wgpu::TextureFormat::Rgba8UnormSrgb)
        );
        assert_eq!(convert_texture_format(TextureFormat::Rgb32Float), None);
        assert_eq!(
            convert_vertex_format(TextureFormat::Rgb32Float),
            Some(wgpu::VertexFormat::Float32x3)
        );
    }

    #[test]
    fn test_depth_views_pick_one_aspect() {
        assert_eq!(
            convert_aspect(TextureFormat::D24S8, TexturePlane::DEPTH),
            wgpu::TextureAspect::DepthOnly
        );
        assert_eq!(
            convert_aspect(TextureFormat::D32FS8, TexturePlane::STENCIL),
            wgpu::TextureAspect::StencilOnly
        );
        assert_eq!(
            convert_aspect(TextureFormat::D32F, TexturePlane::DEPTH),
            wgpu::TextureAspect::All
        );
        assert_eq!(
            convert_aspect(TextureFormat::Rgba8Unorm, TexturePlane::COLOR),
            wgpu::TextureAspect::All
        );
    }

    #[test]
    fn test_border_needs_feature() {
        assert_eq!(
            convert_address_mode(AddressMode::Border, false),
            wgpu::AddressMode::ClampToEdge
        );
        assert_eq!(
            convert_address_mode(AddressMode::Border, true),
            wgpu::AddressMode::ClampToBorder
        );
        assert_eq!(
            convert_border_color([1.0, 1.0, 1.0, 1.0]),
            wgpu::SamplerBorderColor::OpaqueWhite
        );
        assert_eq!(
            convert_border_color([0.0, 0.0, 0.0, 0.0]),
            wgpu::SamplerBorderColor::TransparentBlack
        );
    }

    #[test]
    fn test_blend_disabled_is_none() {
        assert!(convert_blend(&ColorAttachmentBlendDesc::OPAQUE).is_none());
        let blend = convert_blend(&ColorAttachmentBlendDesc::ALPHA_BLEND);
        assert_eq!(
            blend.map(|b| b.color.src_factor),
            Some(wgpu::BlendFactor::SrcAlpha)
        );
    }
}
