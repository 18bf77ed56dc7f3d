//! Texture types and descriptors.

use bitflags::bitflags;

use super::MemoryPlacement;

/// Texture format enumeration.
///
/// Three-channel 8-bit formats have no native equivalent on most devices;
/// they are stored as their four-channel counterpart, see
/// [`storage_format`](Self::storage_format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    NoFormat,

    R8Unorm,
    Rg8Unorm,
    Rgb8Unorm,
    Rgba8Unorm,

    Rgb8Srgb,
    Rgba8Srgb,

    // Swap chain formats
    Bgra8Unorm,
    Bgra8Srgb,

    R8Snorm,
    Rg8Snorm,
    Rgb8Snorm,
    Rgba8Snorm,

    R16Unorm,
    Rg16Unorm,
    Rgba16Unorm,
    R16Float,
    Rg16Float,
    Rgba16Float,

    R32Float,
    Rg32Float,
    Rgb32Float,
    Rgba32Float,
    R32Uint,

    // Depth/stencil formats
    D16,
    D24,
    D24S8,
    D32F,
    D32FS8,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(self) -> bool {
        matches!(
            self,
            Self::D16 | Self::D24 | Self::D24S8 | Self::D32F | Self::D32FS8
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D24S8 | Self::D32FS8)
    }

    pub fn is_srgb(self) -> bool {
        matches!(self, Self::Rgb8Srgb | Self::Rgba8Srgb | Self::Bgra8Srgb)
    }

    /// The format the texture is actually stored in.
    pub fn storage_format(self) -> Self {
        match self {
            Self::Rgb8Unorm => Self::Rgba8Unorm,
            Self::Rgb8Srgb => Self::Rgba8Srgb,
            Self::Rgb8Snorm => Self::Rgba8Snorm,
            other => other,
        }
    }

    /// sRGB counterpart of a linear 8-bit color format.
    pub fn to_srgb(self) -> Self {
        match self {
            Self::Rgba8Unorm => Self::Rgba8Srgb,
            Self::Bgra8Unorm => Self::Bgra8Srgb,
            Self::Rgb8Unorm => Self::Rgb8Srgb,
            other => other,
        }
    }

    /// Size in bytes of one texel of the storage format.
    pub fn bytes_per_pixel(self) -> u32 {
        match self.storage_format() {
            Self::NoFormat => 0,
            Self::R8Unorm | Self::R8Snorm => 1,
            Self::Rg8Unorm | Self::Rg8Snorm | Self::R16Unorm | Self::R16Float | Self::D16 => 2,
            Self::Rgba8Unorm
            | Self::Rgba8Srgb
            | Self::Rgba8Snorm
            | Self::Bgra8Unorm
            | Self::Bgra8Srgb
            | Self::Rg16Unorm
            | Self::Rg16Float
            | Self::R32Float
            | Self::R32Uint
            | Self::D24
            | Self::D24S8
            | Self::D32F => 4,
            Self::Rgba16Unorm | Self::Rgba16Float | Self::Rg32Float | Self::D32FS8 => 8,
            Self::Rgb32Float => 12,
            Self::Rgba32Float => 16,
            Self::Rgb8Unorm | Self::Rgb8Srgb | Self::Rgb8Snorm => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    Single1D,
    #[default]
    Single2D,
    Single3D,
    Array1D,
    Array2D,
    SingleCube,
    ArrayCube,
}

impl TextureType {
    pub fn is_cube(self) -> bool {
        matches!(self, Self::SingleCube | Self::ArrayCube)
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        /// Sampled in a shader.
        const SAMPLED = 1 << 2;
        /// Read-only storage image.
        const READ = 1 << 3;
        /// Writable storage image.
        const WRITE = 1 << 4;
        const COLOR_TARGET = 1 << 5;
        const DEPTH_STENCIL_TARGET = 1 << 6;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Aspect planes of a texture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TexturePlane: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

impl Default for TexturePlane {
    fn default() -> Self {
        Self::COLOR
    }
}

/// Closed set of texture layouts tracked by barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureLayout {
    #[default]
    Unknown,
    Common,
    Present,
    GenericRead,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    UnorderedAccess,
    ShaderResource,
    TransferSrc,
    TransferDst,
    ResolveSrc,
    ResolveDst,
    ShadingRate,
}

/// 3D extent for textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    /// Depth in texels (1 for 1D/2D textures).
    pub depth: u32,
}

impl Extent3d {
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Extent of `mip`, every axis clamped to 1.
    pub fn mip(self, mip: u32) -> Self {
        Self {
            width: (self.width >> mip).max(1),
            height: (self.height >> mip).max(1),
            depth: (self.depth >> mip).max(1),
        }
    }
}

/// Shape and format of a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub label: Option<String>,
    pub dimensions: Extent3d,
    pub format: TextureFormat,
    pub array_size: u16,
    pub texture_type: TextureType,
    pub mip_count: u8,
    pub sample_count: u8,
    pub planes: TexturePlane,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            label: None,
            dimensions: Extent3d::default(),
            format: TextureFormat::NoFormat,
            array_size: 1,
            texture_type: TextureType::Single2D,
            mip_count: 1,
            sample_count: 1,
            planes: TexturePlane::COLOR,
        }
    }
}

impl TextureDesc {
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        let planes = if format.has_stencil() {
            TexturePlane::DEPTH | TexturePlane::STENCIL
        } else if format.is_depth_stencil() {
            TexturePlane::DEPTH
        } else {
            TexturePlane::COLOR
        };
        Self {
            dimensions: Extent3d::new_2d(width, height),
            format,
            planes,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mip_count(mut self, count: u8) -> Self {
        self.mip_count = count;
        self
    }

    pub fn with_array_size(mut self, size: u16) -> Self {
        self.array_size = size;
        self
    }

    pub fn with_type(mut self, texture_type: TextureType) -> Self {
        self.texture_type = texture_type;
        self
    }

    /// Number of (array slice, mip) pairs.
    pub fn sub_resource_count(&self) -> u32 {
        self.array_size as u32 * self.mip_count as u32
    }
}

/// Layout of one sub-resource inside a linear (staging) buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureMemoryFootprint {
    pub offset: u64,
    pub width: u32,
    pub height: u32,
    /// Row pitch in bytes, aligned to [`ROW_PITCH_ALIGNMENT`](Self::ROW_PITCH_ALIGNMENT).
    pub line_byte_aligned_size: u32,
    pub depth: u16,
    pub format: TextureFormat,
}

impl TextureMemoryFootprint {
    pub const ROW_PITCH_ALIGNMENT: u32 = 256;
    pub const OFFSET_ALIGNMENT: u64 = 512;

    pub fn size(&self) -> u64 {
        (self.line_byte_aligned_size as u64)
            .saturating_mul(self.height as u64)
            .saturating_mul(self.depth as u64)
    }

    /// Tightly packed row size in bytes.
    pub fn row_size(&self) -> u32 {
        self.width * self.format.bytes_per_pixel()
    }
}

/// Compute one footprint per (array slice, mip), slice-major.
pub fn compute_footprints(desc: &TextureDesc) -> Vec<TextureMemoryFootprint> {
    let bpp = desc.format.bytes_per_pixel();
    let mut footprints = Vec::with_capacity(desc.sub_resource_count() as usize);
    let mut offset = 0u64;
    for _slice in 0..desc.array_size {
        for mip in 0..desc.mip_count as u32 {
            let extent = desc.dimensions.mip(mip);
            offset = offset.next_multiple_of(TextureMemoryFootprint::OFFSET_ALIGNMENT);
            let footprint = TextureMemoryFootprint {
                offset,
                width: extent.width,
                height: extent.height,
                line_byte_aligned_size: (extent.width * bpp)
                    .next_multiple_of(TextureMemoryFootprint::ROW_PITCH_ALIGNMENT),
                depth: extent.depth.min(u16::MAX as u32) as u16,
                format: desc.format,
            };
            offset += footprint.size();
            footprints.push(footprint);
        }
    }
    footprints
}

/// Total bytes a staging buffer needs to hold every footprint.
pub fn footprints_total_size(footprints: &[TextureMemoryFootprint]) -> u64 {
    footprints
        .iter()
        .map(|f| f.offset + f.size())
        .max()
        .unwrap_or(0)
}

/// Addresses one sub-resource of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubResourceIndexing {
    pub array_size: u16,
    pub array_slice: u16,
    pub mip_count: u8,
    pub mip_index: u8,
    pub planes: TexturePlane,
    pub plane_slice: TexturePlane,
}

impl SubResourceIndexing {
    pub fn new(desc: &TextureDesc, mip_index: u8, array_slice: u16) -> Self {
        Self {
            array_size: desc.array_size,
            array_slice,
            mip_count: desc.mip_count,
            mip_index,
            planes: desc.planes,
            plane_slice: if desc.planes.contains(TexturePlane::COLOR) {
                TexturePlane::COLOR
            } else {
                TexturePlane::DEPTH
            },
        }
    }

    /// Linear index into the footprint list returned by [`compute_footprints`].
    pub fn linear_index(&self) -> usize {
        self.array_slice as usize * self.mip_count as usize + self.mip_index as usize
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureCreateDesc {
    pub desc: TextureDesc,
    /// Footprints the texture will be filled from, if any.
    pub footprints: Vec<TextureMemoryFootprint>,
    pub placement: MemoryPlacement,
    pub usage: TextureUsage,
}

impl TextureCreateDesc {
    pub fn new(desc: TextureDesc, usage: TextureUsage) -> Self {
        Self {
            desc,
            footprints: Vec::new(),
            placement: MemoryPlacement::GpuOnly,
            usage,
        }
    }

    pub fn with_footprints(mut self, footprints: Vec<TextureMemoryFootprint>) -> Self {
        self.footprints = footprints;
        self
    }

    pub fn with_placement(mut self, placement: MemoryPlacement) -> Self {
        self.placement = placement;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_format_queries() {
        assert!(TextureFormat::D24S8.is_depth_stencil());
        assert!(TextureFormat::D24S8.has_stencil());
        assert!(!TextureFormat::D32F.has_stencil());
        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
    }

    #[test]
    fn test_rgb8_is_stored_as_rgba8() {
        assert_eq!(
            TextureFormat::Rgb8Unorm.storage_format(),
            TextureFormat::Rgba8Unorm
        );
        assert_eq!(TextureFormat::Rgb8Srgb.bytes_per_pixel(), 4);
        assert_eq!(TextureFormat::Rgb32Float.bytes_per_pixel(), 12);
    }

    #[test]
    fn test_footprints_alignment() {
        let desc = TextureDesc::new_2d(100, 10, TextureFormat::Rgba8Unorm)
            .with_mip_count(3)
            .with_array_size(2);
        let footprints = compute_footprints(&desc);
        assert_eq!(footprints.len(), 6);

        // 100 * 4 = 400 bytes, padded to 512
        assert_eq!(footprints[0].line_byte_aligned_size, 512);
        assert_eq!(footprints[0].offset, 0);
        assert_eq!(footprints[1].width, 50);
        assert_eq!(footprints[1].height, 5);
        assert_eq!(footprints[2].width, 25);
        assert_eq!(footprints[2].height, 2);
        for footprint in &footprints {
            assert_eq!(footprint.offset % 512, 0);
            assert_eq!(footprint.line_byte_aligned_size % 256, 0);
        }
        // second slice starts after the first slice's mips
        assert!(footprints[3].offset >= footprints[2].offset + footprints[2].size());
        assert_eq!(footprints[3].width, 100);
    }

    #[test]
    fn test_footprints_3d_depth_halves() {
        let desc = TextureDesc::new_2d(8, 8, TextureFormat::R8Unorm)
            .with_type(TextureType::Single3D)
            .with_mip_count(4);
        let desc = TextureDesc {
            dimensions: Extent3d::new_3d(8, 8, 8),
            ..desc
        };
        let depths: Vec<u16> = compute_footprints(&desc).iter().map(|f| f.depth).collect();
        assert_eq!(depths, vec![8, 4, 2, 1]);
    }

    #[test]
    fn test_total_size() {
        let desc = TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm);
        let footprints = compute_footprints(&desc);
        assert_eq!(footprints_total_size(&footprints), 256 * 4);
        assert_eq!(footprints_total_size(&[]), 0);
    }

    #[test]
    fn test_sub_resource_linear_index() {
        let desc = TextureDesc::new_2d(16, 16, TextureFormat::Rgba8Unorm)
            .with_mip_count(5)
            .with_array_size(3);
        assert_eq!(SubResourceIndexing::new(&desc, 2, 1).linear_index(), 7);
    }
}
