//! Sampler types and descriptors.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Point,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    Border,
    Clamp,
}

/// How filtered texels are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerReduction {
    #[default]
    Blend,
    Minimum,
    Maximum,
}

/// Descriptor for creating a sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub label: Option<String>,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub reduction: SamplerReduction,
    /// Maximum anisotropy, 0 disables anisotropic filtering.
    pub anisotropy: u8,
    pub border_color: [f32; 4],
    pub lod_bias: f32,
    pub lod_min: f32,
    pub lod_max: f32,
}

impl SamplerDesc {
    pub const NO_MAX_LOD: f32 = 1024.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Create a nearest neighbor filtering sampler.
    pub fn point() -> Self {
        Self {
            min_filter: FilterMode::Point,
            mag_filter: FilterMode::Point,
            mip_filter: FilterMode::Point,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set address mode for all coordinates.
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self.address_mode_w = mode;
        self
    }

    pub fn with_anisotropy(mut self, level: u8) -> Self {
        self.anisotropy = level;
        self
    }
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            label: None,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: FilterMode::Linear,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            reduction: SamplerReduction::Blend,
            anisotropy: 0,
            border_color: [0.0, 0.0, 0.0, 1.0],
            lod_bias: 0.0,
            lod_min: 0.0,
            lod_max: Self::NO_MAX_LOD,
        }
    }
}
