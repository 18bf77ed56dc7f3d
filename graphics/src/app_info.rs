//! Application-level configuration.
//!
//! [`ApplicationInfo`] selects the API family, the queues and features to
//! bring up, the display options and which executor backs the API.
//!
//! ```
//! use verglas_graphics::{Api, ApplicationInfo, BackendType, DisplayOptions, SoftEnable};
//!
//! let info = ApplicationInfo::new("viewer")
//!     .with_api(Api::Vulkan1_3)
//!     .with_backend(BackendType::Software)
//!     .with_display_options(DisplayOptions::default().with_triple_buffering(SoftEnable::ForceEnable));
//! assert!(info.validate().is_ok());
//! ```

use crate::error::GraphicsError;

/// Target graphics API and minimum version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    /// Direct3D 12, legacy resource-state barriers.
    Dx12V1,
    /// Direct3D 12 with enhanced barriers.
    Dx12V2,
    Vulkan1_1,
    Vulkan1_2,
    Vulkan1_3,
    Metal3,
}

/// The three API families the layer lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiFamily {
    Dx12,
    Vulkan,
    Metal,
}

impl Api {
    pub fn family(self) -> ApiFamily {
        match self {
            Self::Dx12V1 | Self::Dx12V2 => ApiFamily::Dx12,
            Self::Vulkan1_1 | Self::Vulkan1_2 | Self::Vulkan1_3 => ApiFamily::Vulkan,
            Self::Metal3 => ApiFamily::Metal,
        }
    }

    /// File extension of the shader blobs this API consumes.
    pub fn shader_file_extension(self) -> &'static str {
        match self.family() {
            ApiFamily::Dx12 => "cso",
            ApiFamily::Vulkan => "spv",
            ApiFamily::Metal => "metallib",
        }
    }

    /// Encoded Vulkan API version, `None` outside the Vulkan family.
    pub fn vulkan_version(self) -> Option<(u32, u32)> {
        match self {
            Self::Vulkan1_1 => Some((1, 1)),
            Self::Vulkan1_2 => Some((1, 2)),
            Self::Vulkan1_3 => Some((1, 3)),
            _ => None,
        }
    }
}

impl Default for Api {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            Self::Dx12V2
        } else if cfg!(any(target_os = "macos", target_os = "ios")) {
            Self::Metal3
        } else {
            Self::Vulkan1_3
        }
    }
}

/// Tri-state request for optional display behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoftEnable {
    Disabled,
    /// Use it when available, silently fall back otherwise.
    #[default]
    TryEnable,
    /// Fail loudly when unavailable.
    ForceEnable,
}

/// Which executor runs the selected API family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// Native executor for the family when available, software otherwise.
    #[default]
    Auto,
    /// CPU reference executor.
    Software,
    /// Native Vulkan through `ash`.
    Vulkan,
    /// DX12 or Metal through `wgpu`.
    Wgpu,
}

/// Queue and feature switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Features {
    pub graphics: bool,
    pub compute: bool,
    pub transfer: bool,
    pub present: bool,
    pub async_compute: bool,
    pub transfer_queue: bool,
    pub validation_layers: bool,
    pub concurrent_queues: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            graphics: true,
            compute: true,
            transfer: true,
            present: true,
            async_compute: false,
            transfer_queue: false,
            validation_layers: cfg!(debug_assertions),
            concurrent_queues: false,
        }
    }
}

impl Features {
    pub fn with_present(mut self, present: bool) -> Self {
        self.present = present;
        self
    }

    pub fn with_validation_layers(mut self, enabled: bool) -> Self {
        self.validation_layers = enabled;
        self
    }

    pub fn with_async_compute(mut self, enabled: bool) -> Self {
        self.async_compute = enabled;
        self
    }

    pub fn with_transfer_queue(mut self, enabled: bool) -> Self {
        self.transfer_queue = enabled;
        self
    }
}

/// Presentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayOptions {
    pub width: u32,
    pub height: u32,
    pub triple_buffering: SoftEnable,
    pub srgb_present: SoftEnable,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            triple_buffering: SoftEnable::TryEnable,
            srgb_present: SoftEnable::TryEnable,
        }
    }
}

impl DisplayOptions {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_triple_buffering(mut self, triple_buffering: SoftEnable) -> Self {
        self.triple_buffering = triple_buffering;
        self
    }

    pub fn with_srgb_present(mut self, srgb_present: SoftEnable) -> Self {
        self.srgb_present = srgb_present;
        self
    }
}

/// Everything needed to bring up a [`GraphicsContext`](crate::GraphicsContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    pub application_name: String,
    pub application_version: (u16, u16, u16),
    pub api: Api,
    pub features: Features,
    pub display_options: DisplayOptions,
    pub backend: BackendType,
}

impl Default for ApplicationInfo {
    fn default() -> Self {
        Self::new("verglas application")
    }
}

impl ApplicationInfo {
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            application_version: (0, 1, 0),
            api: Api::default(),
            features: Features::default(),
            display_options: DisplayOptions::default(),
            backend: BackendType::default(),
        }
    }

    pub fn with_version(mut self, major: u16, minor: u16, patch: u16) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    pub fn with_api(mut self, api: Api) -> Self {
        self.api = api;
        self
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_display_options(mut self, display_options: DisplayOptions) -> Self {
        self.display_options = display_options;
        self
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Reject contradictory settings.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.features.present && !self.features.graphics {
            return Err(GraphicsError::InvalidParameter(
                "presentation requires the graphics queue".into(),
            ));
        }
        if self.features.present
            && (self.display_options.width == 0 || self.display_options.height == 0)
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "display size {}x{} is empty",
                self.display_options.width, self.display_options.height
            )));
        }
        if !(self.features.graphics || self.features.compute || self.features.transfer) {
            return Err(GraphicsError::InvalidParameter(
                "at least one queue class must be enabled".into(),
            ));
        }
        match (self.backend, self.api.family()) {
            (BackendType::Vulkan, family) if family != ApiFamily::Vulkan => {
                Err(GraphicsError::InvalidParameter(format!(
                    "the Vulkan executor cannot run the {family:?} family"
                )))
            }
            (BackendType::Wgpu, ApiFamily::Vulkan) => Err(GraphicsError::InvalidParameter(
                "the wgpu executor runs the DX12 and Metal families only".into(),
            )),
            _ => Ok(()),
        }
    }
}
