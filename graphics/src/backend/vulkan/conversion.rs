//! Conversions from the API-neutral types to Vulkan enums and flags.

use ash::vk;

use crate::descriptor::DescriptorBindingType;
use crate::types::{
    AddressMode, BlendFactor, BlendOp, BufferUsage, ColorWriteMask, CompareOp, ComponentSwizzle,
    CullMode, FillMode, FilterMode, FrontFace, IndexFormat, LoadOp, LogicOp, PrimitiveTopology,
    SamplerReduction, ShaderStageKind, ShaderVisibility, StencilOp, StencilOpState, StoreOp,
    TextureFormat, TexturePlane, TextureType, TextureUsage,
};

pub fn convert_buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let table = [
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
        (BufferUsage::CONSTANT, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::READ, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::WRITE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
        (BufferUsage::INDIRECT, vk::BufferUsageFlags::INDIRECT_BUFFER),
        (
            BufferUsage::ACCELERATION_STRUCTURE,
            vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR,
        ),
    ];
    table
        .iter()
        .filter(|(neutral, _)| usage.contains(*neutral))
        .fold(vk::BufferUsageFlags::empty(), |acc, (_, flags)| acc | *flags)
}

pub fn convert_texture_usage(usage: TextureUsage) -> vk::ImageUsageFlags {
    let table = [
        (TextureUsage::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
        (TextureUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
        (TextureUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (TextureUsage::READ, vk::ImageUsageFlags::STORAGE),
        (TextureUsage::WRITE, vk::ImageUsageFlags::STORAGE),
        (TextureUsage::COLOR_TARGET, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (
            TextureUsage::DEPTH_STENCIL_TARGET,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        ),
    ];
    table
        .iter()
        .filter(|(neutral, _)| usage.contains(*neutral))
        .fold(vk::ImageUsageFlags::empty(), |acc, (_, flags)| acc | *flags)
}

/// Format a texture is stored in. Three channel 8-bit formats widen to four.
pub fn convert_texture_format(format: TextureFormat) -> vk::Format {
    match format.storage_format() {
        TextureFormat::NoFormat => vk::Format::UNDEFINED,
        TextureFormat::R8Unorm => vk::Format::R8_UNORM,
        TextureFormat::Rg8Unorm => vk::Format::R8G8_UNORM,
        TextureFormat::Rgba8Unorm | TextureFormat::Rgb8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8Srgb | TextureFormat::Rgb8Srgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::R8Snorm => vk::Format::R8_SNORM,
        TextureFormat::Rg8Snorm => vk::Format::R8G8_SNORM,
        TextureFormat::Rgba8Snorm | TextureFormat::Rgb8Snorm => vk::Format::R8G8B8A8_SNORM,
        TextureFormat::R16Unorm => vk::Format::R16_UNORM,
        TextureFormat::Rg16Unorm => vk::Format::R16G16_UNORM,
        TextureFormat::Rgba16Unorm => vk::Format::R16G16B16A16_UNORM,
        TextureFormat::R16Float => vk::Format::R16_SFLOAT,
        TextureFormat::Rg16Float => vk::Format::R16G16_SFLOAT,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32Float => vk::Format::R32_SFLOAT,
        TextureFormat::Rg32Float => vk::Format::R32G32_SFLOAT,
        TextureFormat::Rgb32Float => vk::Format::R32G32B32_SFLOAT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::R32Uint => vk::Format::R32_UINT,
        TextureFormat::D16 => vk::Format::D16_UNORM,
        TextureFormat::D24 => vk::Format::X8_D24_UNORM_PACK32,
        TextureFormat::D24S8 => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::D32F => vk::Format::D32_SFLOAT,
        TextureFormat::D32FS8 => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Vertex attributes keep their channel count.
pub fn convert_vertex_format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::Rgb8Unorm => vk::Format::R8G8B8_UNORM,
        TextureFormat::Rgb8Snorm => vk::Format::R8G8B8_SNORM,
        TextureFormat::Rgb8Srgb => vk::Format::R8G8B8_SRGB,
        other => convert_texture_format(other),
    }
}

/// Swap chain surface formats the context understands.
pub fn surface_format_to_texture_format(format: vk::Format) -> Option<TextureFormat> {
    match format {
        vk::Format::B8G8R8A8_UNORM => Some(TextureFormat::Bgra8Unorm),
        vk::Format::B8G8R8A8_SRGB => Some(TextureFormat::Bgra8Srgb),
        vk::Format::R8G8B8A8_UNORM => Some(TextureFormat::Rgba8Unorm),
        vk::Format::R8G8B8A8_SRGB => Some(TextureFormat::Rgba8Srgb),
        _ => None,
    }
}

pub fn convert_aspect(planes: TexturePlane) -> vk::ImageAspectFlags {
    crate::barrier::vulkan::to_aspect(planes)
}

/// Aspect mask covering every plane of `format`.
pub fn format_aspect(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth_stencil() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

pub fn convert_image_type(texture_type: TextureType) -> vk::ImageType {
    match texture_type {
        TextureType::Single1D | TextureType::Array1D => vk::ImageType::TYPE_1D,
        TextureType::Single3D => vk::ImageType::TYPE_3D,
        TextureType::Single2D
        | TextureType::Array2D
        | TextureType::SingleCube
        | TextureType::ArrayCube => vk::ImageType::TYPE_2D,
    }
}

pub fn convert_view_type(texture_type: TextureType) -> vk::ImageViewType {
    match texture_type {
        TextureType::Single1D => vk::ImageViewType::TYPE_1D,
        TextureType::Array1D => vk::ImageViewType::TYPE_1D_ARRAY,
        TextureType::Single2D => vk::ImageViewType::TYPE_2D,
        TextureType::Array2D => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureType::Single3D => vk::ImageViewType::TYPE_3D,
        TextureType::SingleCube => vk::ImageViewType::CUBE,
        TextureType::ArrayCube => vk::ImageViewType::CUBE_ARRAY,
    }
}

pub fn convert_swizzle(swizzle: ComponentSwizzle) -> vk::ComponentSwizzle {
    match swizzle {
        ComponentSwizzle::Red => vk::ComponentSwizzle::R,
        ComponentSwizzle::Green => vk::ComponentSwizzle::G,
        ComponentSwizzle::Blue => vk::ComponentSwizzle::B,
        ComponentSwizzle::Alpha => vk::ComponentSwizzle::A,
        ComponentSwizzle::Zero => vk::ComponentSwizzle::ZERO,
        ComponentSwizzle::One => vk::ComponentSwizzle::ONE,
    }
}

pub fn convert_filter_mode(mode: FilterMode) -> vk::Filter {
    match mode {
        FilterMode::Point => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

pub fn convert_mipmap_filter_mode(mode: FilterMode) -> vk::SamplerMipmapMode {
    match mode {
        FilterMode::Point => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn convert_address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::Border => vk::SamplerAddressMode::CLAMP_TO_BORDER,
        AddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
    }
}

pub fn convert_reduction(reduction: SamplerReduction) -> vk::SamplerReductionMode {
    match reduction {
        SamplerReduction::Blend => vk::SamplerReductionMode::WEIGHTED_AVERAGE,
        SamplerReduction::Minimum => vk::SamplerReductionMode::MIN,
        SamplerReduction::Maximum => vk::SamplerReductionMode::MAX,
    }
}

/// Vulkan only has three fixed border colors; anything else goes opaque black.
pub fn convert_border_color(color: [f32; 4]) -> vk::BorderColor {
    match color {
        [0.0, 0.0, 0.0, 0.0] => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        [1.0, 1.0, 1.0, 1.0] => vk::BorderColor::FLOAT_OPAQUE_WHITE,
        [0.0, 0.0, 0.0, 1.0] => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        other => {
            log::debug!("Border color {:?} approximated with opaque black", other);
            vk::BorderColor::FLOAT_OPAQUE_BLACK
        }
    }
}

pub fn convert_compare_op(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

fn convert_stencil_op(op: StencilOp) -> vk::StencilOp {
    match op {
        StencilOp::Keep => vk::StencilOp::KEEP,
        StencilOp::Zero => vk::StencilOp::ZERO,
        StencilOp::Replace => vk::StencilOp::REPLACE,
        StencilOp::IncrementAndClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOp::DecrementAndClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOp::Invert => vk::StencilOp::INVERT,
        StencilOp::IncrementAndWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOp::DecrementAndWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

pub fn convert_stencil_state(
    state: &StencilOpState,
    read_mask: u8,
    write_mask: u8,
    reference: u8,
) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: convert_stencil_op(state.fail_op),
        pass_op: convert_stencil_op(state.pass_op),
        depth_fail_op: convert_stencil_op(state.depth_fail_op),
        compare_op: convert_compare_op(state.compare_op),
        compare_mask: u32::from(read_mask),
        write_mask: u32::from(write_mask),
        reference: u32::from(reference),
    }
}

pub fn convert_blend_factor(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::InvSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::InvSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::InvDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::InvDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcAlphaSaturate => vk::BlendFactor::SRC_ALPHA_SATURATE,
        BlendFactor::FactorColor => vk::BlendFactor::CONSTANT_COLOR,
        BlendFactor::InvFactorColor => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
        BlendFactor::FactorAlpha => vk::BlendFactor::CONSTANT_ALPHA,
        BlendFactor::InvFactorAlpha => vk::BlendFactor::ONE_MINUS_CONSTANT_ALPHA,
        BlendFactor::Src1Color => vk::BlendFactor::SRC1_COLOR,
        BlendFactor::InvSrc1Color => vk::BlendFactor::ONE_MINUS_SRC1_COLOR,
        BlendFactor::Src1Alpha => vk::BlendFactor::SRC1_ALPHA,
        BlendFactor::InvSrc1Alpha => vk::BlendFactor::ONE_MINUS_SRC1_ALPHA,
    }
}

pub fn convert_blend_op(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub fn convert_write_mask(mask: ColorWriteMask) -> vk::ColorComponentFlags {
    let mut flags = vk::ColorComponentFlags::empty();
    if mask.contains(ColorWriteMask::RED) {
        flags |= vk::ColorComponentFlags::R;
    }
    if mask.contains(ColorWriteMask::GREEN) {
        flags |= vk::ColorComponentFlags::G;
    }
    if mask.contains(ColorWriteMask::BLUE) {
        flags |= vk::ColorComponentFlags::B;
    }
    if mask.contains(ColorWriteMask::ALPHA) {
        flags |= vk::ColorComponentFlags::A;
    }
    flags
}

/// `None` disables the logic op.
pub fn convert_logic_op(op: LogicOp) -> Option<vk::LogicOp> {
    Some(match op {
        LogicOp::None => return None,
        LogicOp::Clear => vk::LogicOp::CLEAR,
        LogicOp::Set => vk::LogicOp::SET,
        LogicOp::Copy => vk::LogicOp::COPY,
        LogicOp::CopyInverted => vk::LogicOp::COPY_INVERTED,
        LogicOp::NoOp => vk::LogicOp::NO_OP,
        LogicOp::Invert => vk::LogicOp::INVERT,
        LogicOp::And => vk::LogicOp::AND,
        LogicOp::NAnd => vk::LogicOp::NAND,
        LogicOp::Or => vk::LogicOp::OR,
        LogicOp::NOr => vk::LogicOp::NOR,
        LogicOp::XOr => vk::LogicOp::XOR,
        LogicOp::Equiv => vk::LogicOp::EQUIVALENT,
        LogicOp::AndReverse => vk::LogicOp::AND_REVERSE,
        LogicOp::AndInverted => vk::LogicOp::AND_INVERTED,
        LogicOp::OrReverse => vk::LogicOp::OR_REVERSE,
        LogicOp::OrInverted => vk::LogicOp::OR_INVERTED,
    })
}

pub fn convert_topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub fn convert_fill_mode(mode: FillMode) -> vk::PolygonMode {
    match mode {
        FillMode::Wireframe => vk::PolygonMode::LINE,
        FillMode::Solid => vk::PolygonMode::FILL,
    }
}

pub fn convert_cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub fn convert_front_face(front: FrontFace) -> vk::FrontFace {
    match front {
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
    }
}

pub fn convert_index_format(format: IndexFormat) -> vk::IndexType {
    match format {
        IndexFormat::U16 => vk::IndexType::UINT16,
        IndexFormat::U32 => vk::IndexType::UINT32,
    }
}

pub fn convert_shader_stage(stage: ShaderStageKind) -> vk::ShaderStageFlags {
    match stage {
        ShaderStageKind::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStageKind::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ShaderStageKind::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ShaderStageKind::Geometry => vk::ShaderStageFlags::GEOMETRY,
        ShaderStageKind::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderStageKind::Compute => vk::ShaderStageFlags::COMPUTE,
        ShaderStageKind::Mesh => vk::ShaderStageFlags::MESH_EXT,
        ShaderStageKind::Task => vk::ShaderStageFlags::TASK_EXT,
    }
}

pub fn convert_visibility(visibility: ShaderVisibility) -> vk::ShaderStageFlags {
    if visibility == ShaderVisibility::ALL {
        return vk::ShaderStageFlags::ALL;
    }
    let table = [
        (ShaderVisibility::VERTEX, vk::ShaderStageFlags::VERTEX),
        (
            ShaderVisibility::TESSELLATION_CONTROL,
            vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ),
        (
            ShaderVisibility::TESSELLATION_EVALUATION,
            vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ),
        (ShaderVisibility::GEOMETRY, vk::ShaderStageFlags::GEOMETRY),
        (ShaderVisibility::FRAGMENT, vk::ShaderStageFlags::FRAGMENT),
        (ShaderVisibility::COMPUTE, vk::ShaderStageFlags::COMPUTE),
        (ShaderVisibility::TASK, vk::ShaderStageFlags::TASK_EXT),
        (ShaderVisibility::MESH, vk::ShaderStageFlags::MESH_EXT),
    ];
    table
        .iter()
        .filter(|(neutral, _)| visibility.contains(*neutral))
        .fold(vk::ShaderStageFlags::empty(), |acc, (_, flags)| acc | *flags)
}

pub fn convert_descriptor_type(binding_type: DescriptorBindingType) -> vk::DescriptorType {
    match binding_type {
        DescriptorBindingType::ConstantBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorBindingType::SampledTexture => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorBindingType::StorageReadOnlyTexture
        | DescriptorBindingType::StorageReadWriteTexture => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorBindingType::StorageReadOnlyBuffer
        | DescriptorBindingType::StorageReadWriteBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorBindingType::Sampler => vk::DescriptorType::SAMPLER,
    }
}

pub fn convert_load_op(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

/// Resolve attachments are not wired up; a resolve store keeps the samples.
pub fn convert_store_op(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store | StoreOp::Resolve => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

/// Map a Vulkan error into the graphics error taxonomy.
pub fn convert_result(what: &str, result: vk::Result) -> crate::error::GraphicsError {
    use crate::error::GraphicsError;
    match result {
        vk::Result::ERROR_DEVICE_LOST => GraphicsError::DeviceLost,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            GraphicsError::OutOfMemory
        }
        vk::Result::ERROR_OUT_OF_DATE_KHR => GraphicsError::SurfaceOutdated,
        vk::Result::ERROR_SURFACE_LOST_KHR => GraphicsError::SurfaceLost,
        other => GraphicsError::Internal(format!("{what}: {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_channel_formats_widen() {
        assert_eq!(
            convert_texture_format(TextureFormat::Rgb8Unorm),
            vk::Format::R8G8B8A8_UNORM
        );
        assert_eq!(
            convert_vertex_format(TextureFormat::Rgb8Unorm),
            vk::Format::R8G8B8_UNORM
        );
        assert_eq!(
            convert_vertex_format(TextureFormat::Rgb32Float),
            vk::Format::R32G32B32_SFLOAT
        );
    }

    #[test]
    fn test_surface_formats_round_trip() {
        for format in [TextureFormat::Bgra8Unorm, TextureFormat::Bgra8Srgb] {
            assert_eq!(
                surface_format_to_texture_format(convert_texture_format(format)),
                Some(format)
            );
        }
        assert_eq!(surface_format_to_texture_format(vk::Format::R16_SFLOAT), None);
    }

    #[test]
    fn test_storage_usage_from_read_or_write() {
        assert_eq!(
            convert_texture_usage(TextureUsage::READ),
            vk::ImageUsageFlags::STORAGE
        );
        assert_eq!(
            convert_buffer_usage(BufferUsage::READ_WRITE | BufferUsage::TRANSFER_DST),
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
        );
    }

    #[test]
    fn test_visibility_all_maps_to_all() {
        assert_eq!(
            convert_visibility(ShaderVisibility::ALL),
            vk::ShaderStageFlags::ALL
        );
        assert_eq!(
            convert_visibility(ShaderVisibility::VERTEX | ShaderVisibility::FRAGMENT),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_device_lost_is_kept() {
        assert_eq!(
            convert_result("submit", vk::Result::ERROR_DEVICE_LOST),
            crate::error::GraphicsError::DeviceLost
        );
    }
}
