//! GPU backend abstraction layer.
//!
//! Every executor implements the [`GpuBackend`] trait. The context talks to
//! it through an `Arc<dyn GpuBackend>` and never sees native objects
//! directly: they live in the registry wrapped in the `Gpu*` enums below,
//! one variant per compiled-in executor.
//!
//! # Available Backends
//!
//! - `software` (default): CPU executor with a real queue thread, used by
//!   the test-suite and as the fallback of [`BackendType::Auto`]
//! - `vulkan-backend` (default): native Vulkan through `ash`
//! - `wgpu-backend`: DX12 and Metal through `wgpu`

#[cfg(feature = "software")]
pub mod software;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

use std::fmt;
use std::sync::Arc;

use crate::app_info::{ApiFamily, ApplicationInfo, BackendType};
use crate::command::{Command, QueueType};
use crate::descriptor::DescriptorSetLayoutInfo;
use crate::error::GraphicsError;
use crate::registry::Registry;
use crate::swapchain::WindowHandles;
use crate::types::{
    BufferCreateDesc, Extent3d, GraphicsPipelineDesc, PushConstantDesc, RenderTargetViewDesc,
    SamplerDesc, ShaderStage, TextureCreateDesc, TextureFormat, TextureViewDesc,
    ComputePipelineDesc,
};

macro_rules! native_object {
    ($(#[$meta:meta])* $name:ident {
        software: $software:ty,
        vulkan: $vulkan:ty,
        wgpu: $wgpu:ty $(,)?
    }) => {
        $(#[$meta])*
        #[allow(clippy::large_enum_variant)]
        pub enum $name {
            #[cfg(feature = "software")]
            Software($software),
            #[cfg(feature = "vulkan-backend")]
            Vulkan($vulkan),
            #[cfg(feature = "wgpu-backend")]
            Wgpu($wgpu),
        }

        #[allow(dead_code, unreachable_patterns)]
        impl $name {
            #[cfg(feature = "software")]
            pub(crate) fn as_software(&self) -> Option<&$software> {
                match self {
                    Self::Software(inner) => Some(inner),
                    _ => None,
                }
            }

            #[cfg(feature = "vulkan-backend")]
            pub(crate) fn as_vulkan(&self) -> Option<&$vulkan> {
                match self {
                    Self::Vulkan(inner) => Some(inner),
                    _ => None,
                }
            }

            #[cfg(feature = "wgpu-backend")]
            pub(crate) fn as_wgpu(&self) -> Option<&$wgpu> {
                match self {
                    Self::Wgpu(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    #[cfg(feature = "software")]
                    Self::Software(inner) => f
                        .debug_tuple(concat!(stringify!($name), "::Software"))
                        .field(inner)
                        .finish(),
                    #[cfg(feature = "vulkan-backend")]
                    Self::Vulkan(inner) => f
                        .debug_tuple(concat!(stringify!($name), "::Vulkan"))
                        .field(inner)
                        .finish(),
                    #[cfg(feature = "wgpu-backend")]
                    Self::Wgpu(inner) => f
                        .debug_tuple(concat!(stringify!($name), "::Wgpu"))
                        .field(inner)
                        .finish(),
                }
            }
        }
    };
}

native_object!(
    /// A GPU buffer.
    GpuBuffer {
        software: software::SoftwareBuffer,
        vulkan: vulkan::VulkanBuffer,
        wgpu: wgpu_backend::WgpuBuffer,
    }
);

native_object!(
    /// A GPU texture, owned or borrowed from a swap chain.
    GpuTexture {
        software: software::SoftwareTexture,
        vulkan: vulkan::VulkanTexture,
        wgpu: wgpu_backend::WgpuTexture,
    }
);

native_object!(
    /// A shader resource view or an attachment view of a texture.
    GpuTextureView {
        software: software::SoftwareTextureView,
        vulkan: vulkan::VulkanTextureView,
        wgpu: wgpu_backend::WgpuTextureView,
    }
);

native_object!(GpuSampler {
    software: software::SoftwareSampler,
    vulkan: vulkan::VulkanSampler,
    wgpu: wgpu_backend::WgpuSampler,
});

native_object!(GpuShaderModule {
    software: software::SoftwareShaderModule,
    vulkan: vulkan::VulkanShaderModule,
    wgpu: wgpu_backend::WgpuShaderModule,
});

native_object!(GpuDescriptorSetLayout {
    software: software::SoftwareSetLayout,
    vulkan: vulkan::VulkanSetLayout,
    wgpu: wgpu_backend::WgpuSetLayout,
});

native_object!(
    /// Backend side of a descriptor set, refreshed lazily per frame context.
    GpuDescriptorSet {
        software: software::SoftwareDescriptorSet,
        vulkan: vulkan::VulkanDescriptorSet,
        wgpu: wgpu_backend::WgpuDescriptorSet,
    }
);

native_object!(GpuPipelineLayout {
    software: software::SoftwarePipelineLayout,
    vulkan: vulkan::VulkanPipelineLayout,
    wgpu: wgpu_backend::WgpuPipelineLayout,
});

native_object!(
    /// A compiled graphics or compute pipeline.
    GpuPipeline {
        software: software::SoftwarePipeline,
        vulkan: vulkan::VulkanPipeline,
        wgpu: wgpu_backend::WgpuPipeline,
    }
);

/// Fixed properties of an executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendCapabilities {
    /// Nanoseconds per timestamp tick.
    pub timestamp_period_ns: f64,
    /// Command lists can write timestamps.
    pub timestamp_queries: bool,
    pub dedicated_transfer_queue: bool,
    pub dedicated_compute_queue: bool,
    /// Can present to a native window surface.
    pub window_presentation: bool,
}

/// Requested shape of a window swap chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub image_count: u32,
    pub srgb: bool,
}

/// Images handed out by a native swap chain.
#[derive(Debug)]
pub struct SwapChainImages {
    pub images: Vec<GpuTexture>,
    pub format: TextureFormat,
    pub extent: Extent3d,
}

/// Everything needed to build a graphics pipeline.
pub struct GraphicsPipelineInputs<'a> {
    pub desc: &'a GraphicsPipelineDesc,
    pub stages: Vec<(&'a GpuShaderModule, &'a ShaderStage)>,
    pub layout: &'a GpuPipelineLayout,
    pub color_formats: Vec<TextureFormat>,
    pub depth_format: Option<TextureFormat>,
}

pub struct ComputePipelineInputs<'a> {
    pub desc: &'a ComputePipelineDesc,
    pub module: &'a GpuShaderModule,
    pub layout: &'a GpuPipelineLayout,
}

/// The lists of one queue class, in recording order.
#[derive(Debug)]
pub struct QueueBatch<'a> {
    pub queue: QueueType,
    pub lists: Vec<&'a [Command]>,
}

/// One frame's worth of work.
///
/// Batches arrive in [`QueueType::SUBMIT_ORDER`]. `signal_value` is written
/// to the frame fence once every batch has executed, even when there are
/// no batches.
pub struct Submission<'a> {
    pub frame_index: usize,
    pub signal_value: u64,
    pub batches: Vec<QueueBatch<'a>>,
    pub registry: &'a Registry,
    /// Swap chain image to present after the batches.
    pub present: Option<u32>,
}

/// GPU backend trait for abstracting different GPU APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Allocate per-frame-context state for `frame_count` contexts.
    fn configure_frames(&self, frame_count: usize) -> Result<(), GraphicsError>;

    /// Recycle the per-frame state of `frame_index`.
    ///
    /// Only called once everything previously submitted for that frame
    /// context has executed.
    fn reset_frame(&self, frame_index: usize) -> Result<(), GraphicsError>;

    fn create_buffer(&self, desc: &BufferCreateDesc) -> Result<GpuBuffer, GraphicsError>;

    fn create_texture(&self, desc: &TextureCreateDesc) -> Result<GpuTexture, GraphicsError>;

    fn create_texture_view(
        &self,
        texture: &GpuTexture,
        desc: &TextureViewDesc,
    ) -> Result<GpuTextureView, GraphicsError>;

    fn create_render_target_view(
        &self,
        texture: &GpuTexture,
        desc: &RenderTargetViewDesc,
    ) -> Result<GpuTextureView, GraphicsError>;

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<GpuSampler, GraphicsError>;

    fn create_shader_module(&self, bytecode: &[u8]) -> Result<GpuShaderModule, GraphicsError>;

    fn create_descriptor_set_layout(
        &self,
        layout: &DescriptorSetLayoutInfo,
    ) -> Result<GpuDescriptorSetLayout, GraphicsError>;

    /// One backend set per frame context.
    fn create_descriptor_set(
        &self,
        layout: &GpuDescriptorSetLayout,
        info: &DescriptorSetLayoutInfo,
        frame_count: usize,
    ) -> Result<GpuDescriptorSet, GraphicsError>;

    fn create_pipeline_layout(
        &self,
        sets: &[&GpuDescriptorSetLayout],
        push_constants: &[PushConstantDesc],
    ) -> Result<GpuPipelineLayout, GraphicsError>;

    fn create_graphics_pipeline(
        &self,
        inputs: &GraphicsPipelineInputs<'_>,
    ) -> Result<GpuPipeline, GraphicsError>;

    fn create_compute_pipeline(
        &self,
        inputs: &ComputePipelineInputs<'_>,
    ) -> Result<GpuPipeline, GraphicsError>;

    /// Write CPU data into a host-visible buffer.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8])
    -> Result<(), GraphicsError>;

    /// Read back a host-visible buffer.
    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64)
    -> Result<Vec<u8>, GraphicsError>;

    /// Lower and submit one frame.
    fn submit(&self, submission: Submission<'_>) -> Result<(), GraphicsError>;

    /// Highest fence value the GPU has signalled.
    fn completed_value(&self) -> u64;

    /// Block until the fence reaches `value`.
    fn wait_for_value(&self, value: u64) -> Result<(), GraphicsError>;

    /// First `count` timestamps written by the last execution of `frame_index`.
    fn read_timestamps(&self, frame_index: usize, count: u32) -> Result<Vec<u64>, GraphicsError>;

    /// Build a swap chain for a native window.
    fn create_swap_chain(
        &self,
        _window: WindowHandles,
        _desc: &SwapChainDesc,
    ) -> Result<SwapChainImages, GraphicsError> {
        Err(GraphicsError::FeatureNotSupported(format!(
            "{} cannot present to a window",
            self.name()
        )))
    }

    /// Rebuild the window swap chain at a new size, reusing its surface.
    fn recreate_swap_chain(&self, _desc: &SwapChainDesc) -> Result<SwapChainImages, GraphicsError> {
        Err(GraphicsError::FeatureNotSupported(format!(
            "{} has no window swap chain",
            self.name()
        )))
    }

    fn destroy_swap_chain(&self) {}

    /// Index of the next image of the window swap chain.
    fn acquire_next_image(&self) -> Result<u32, GraphicsError> {
        Err(GraphicsError::FeatureNotSupported(format!(
            "{} has no window swap chain",
            self.name()
        )))
    }

    /// Wait for every queue to drain.
    fn wait_idle(&self) -> Result<(), GraphicsError>;
}

/// Pick an executor for `info`.
///
/// [`BackendType::Auto`] tries the native executor of the API family first
/// and falls back to the software executor.
pub fn create_backend(
    info: &ApplicationInfo,
    window: Option<WindowHandles>,
) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    match info.backend {
        BackendType::Software => create_software(info),
        BackendType::Vulkan => create_vulkan(info, window),
        BackendType::Wgpu => create_wgpu(info, window),
        BackendType::Auto => {
            let native = match info.api.family() {
                ApiFamily::Vulkan => create_vulkan(info, window),
                ApiFamily::Dx12 | ApiFamily::Metal => create_wgpu(info, window),
            };
            match native {
                Ok(backend) => Ok(backend),
                Err(e) => {
                    log::warn!(
                        "No native executor for {:?}: {}; falling back to software",
                        info.api,
                        e
                    );
                    create_software(info)
                }
            }
        }
    }
}

fn create_software(info: &ApplicationInfo) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    #[cfg(feature = "software")]
    {
        log::info!("Using software backend for {:?}", info.api);
        Ok(Arc::new(software::SoftwareBackend::new()?))
    }
    #[cfg(not(feature = "software"))]
    {
        let _ = info;
        Err(GraphicsError::FeatureNotSupported(
            "built without the software feature".into(),
        ))
    }
}

fn create_vulkan(
    info: &ApplicationInfo,
    window: Option<WindowHandles>,
) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    #[cfg(feature = "vulkan-backend")]
    {
        let backend = vulkan::VulkanBackend::new(info, window)?;
        log::info!("Using Vulkan backend (ash)");
        Ok(Arc::new(backend))
    }
    #[cfg(not(feature = "vulkan-backend"))]
    {
        let _ = (info, window);
        Err(GraphicsError::FeatureNotSupported(
            "built without the vulkan-backend feature".into(),
        ))
    }
}

fn create_wgpu(
    info: &ApplicationInfo,
    window: Option<WindowHandles>,
) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    #[cfg(feature = "wgpu-backend")]
    {
        let backend = wgpu_backend::WgpuBackend::new(info, window)?;
        log::info!("Using wgpu backend for {:?}", info.api.family());
        Ok(Arc::new(backend))
    }
    #[cfg(not(feature = "wgpu-backend"))]
    {
        let _ = (info, window);
        Err(GraphicsError::FeatureNotSupported(
            "built without the wgpu-backend feature".into(),
        ))
    }
}

/// Check if a real GPU backend is available.
pub fn has_gpu_backend() -> bool {
    cfg!(any(feature = "vulkan-backend", feature = "wgpu-backend"))
}
