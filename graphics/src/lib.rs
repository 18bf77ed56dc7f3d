//! # Verglas Graphics
//!
//! A thin cross-API layer over DX12-class, Vulkan-class and Metal-class
//! GPU execution.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsContext`] - device bring-up, resource lifetime, the frame ring
//! - [`CommandList`] - API-neutral command recording with native barriers
//! - [`descriptor`] - packed binding indices and shader-visible heaps
//! - [`barrier`] - one barrier vocabulary lowered to every API family
//! - Multiple executors: software (reference), Vulkan and wgpu
//!
//! ## Example
//!
//! ```ignore
//! use verglas_graphics::*;
//!
//! let info = ApplicationInfo::new("demo").with_backend(BackendType::Software);
//! let mut context = GraphicsContext::create(info, None)?;
//! let buffer = context.create_buffer(&BufferCreateDesc::new(
//!     256,
//!     MemoryPlacement::GpuOnly,
//!     BufferUsage::TRANSFER_DST,
//! ));
//! let mut list = context.begin_graphics_command_list().unwrap();
//! let stamp = list.put_timestamp();
//! context.end_graphics_command_list(list);
//! let frame = context.end_frame();
//! context.wait_for_frame(frame);
//! let ticks = context.resolved_timestamp(stamp);
//! ```

#[cfg(not(any(feature = "software", feature = "vulkan-backend", feature = "wgpu-backend")))]
compile_error!("enable at least one of the software, vulkan-backend or wgpu-backend features");

pub mod app_info;
pub mod backend;
pub mod barrier;
pub mod command;
mod context;
pub mod descriptor;
pub mod error;
mod frame;
pub mod handles;
pub mod registry;
pub mod swapchain;
pub mod types;

// Re-export main types for convenience
pub use app_info::{
    Api, ApiFamily, ApplicationInfo, BackendType, DisplayOptions, Features, SoftEnable,
};
pub use backend::{BackendCapabilities, GpuBackend, create_backend, has_gpu_backend};
#[cfg(feature = "software")]
pub use backend::software::{QueueGate, SoftwareBackend};
pub use barrier::{
    BarrierAccess, BarrierCaps, BarrierSyncStages, BufferMemoryBarrier, GlobalMemoryBarrier,
    TextureMemoryBarrier, TranslatedBarriers,
};
pub use command::{BindPoint, Command, CommandList, PassUsage, QueueType};
pub use context::{GraphicsContext, MAX_PUSH_CONSTANT_BYTES};
pub use descriptor::{
    DescriptorBindingDesc, DescriptorBindingType, DescriptorData, DescriptorSetDesc,
    DescriptorSetWriteInfo, HeapKind, RangeKind,
};
pub use error::GraphicsError;
pub use frame::TIMESTAMPS_PER_FRAME;
pub use handles::*;
pub use swapchain::{HeadlessTarget, PresentTarget, WindowHandles};
pub use types::*;

pub use verglas_core::diagnostics::{DiagnosticCatcher, Severity};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_software_context_without_presentable() {
        let info = ApplicationInfo::new("lib").with_backend(BackendType::Software);
        let context = GraphicsContext::create(info, None).unwrap();
        assert_eq!(context.frame_id(), 1);
        assert_eq!(context.frame_context_count(), 2);
        assert_eq!(context.swap_chain_image_count(), 0);
        assert_eq!(context.backend_name(), "Software");
    }
}
