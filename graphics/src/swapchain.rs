//! Swap chain and presentation targets.
//!
//! The host hands the context a [`PresentTarget`]. When the target exposes
//! native window handles and the executor can present to them, the images
//! come from a native swap chain. Otherwise the context rotates through
//! offscreen images of the same shape, which keeps the frame pipeline
//! identical for headless runs.
//!
//! Either way the images are registered as texture handles that the swap
//! chain owns, with one render target view per image.

use raw_window_handle::{
    HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};

use crate::app_info::SoftEnable;
use crate::error::GraphicsError;
use crate::handles::{RenderTargetViewHandle, TextureHandle};
use crate::types::{Extent3d, TextureFormat};

/// Raw handles of a native window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHandles {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
}

/// Something frames can be presented to.
pub trait PresentTarget {
    /// Current drawable size in pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Native handles, `None` for targets without a window.
    fn window_handles(&self) -> Option<WindowHandles> {
        None
    }
}

impl PresentTarget for winit::window::Window {
    fn surface_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }

    fn window_handles(&self) -> Option<WindowHandles> {
        let display = self.display_handle().ok()?.as_raw();
        let window = self.window_handle().ok()?.as_raw();
        Some(WindowHandles { display, window })
    }
}

/// A window-less target: presentation only rotates the images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessTarget {
    pub width: u32,
    pub height: u32,
}

impl HeadlessTarget {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl PresentTarget for HeadlessTarget {
    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Images to ask the swap chain for.
pub(crate) fn requested_image_count(triple_buffering: SoftEnable) -> u32 {
    match triple_buffering {
        SoftEnable::Disabled => 2,
        SoftEnable::TryEnable | SoftEnable::ForceEnable => 3,
    }
}

/// Check what the swap chain granted against the triple buffering request.
pub(crate) fn check_image_count(
    triple_buffering: SoftEnable,
    granted: u32,
) -> Result<u32, GraphicsError> {
    match triple_buffering {
        SoftEnable::ForceEnable if granted < 3 => Err(GraphicsError::InitializationFailed(
            format!("triple buffering was forced but the swap chain has {granted} images"),
        )),
        SoftEnable::TryEnable if granted < 3 => {
            log::warn!("Triple buffering unavailable, using {granted} images");
            Ok(granted)
        }
        _ => Ok(granted),
    }
}

/// Check the presentation format against the sRGB request.
pub(crate) fn check_srgb(srgb_present: SoftEnable, format: TextureFormat) -> Result<(), GraphicsError> {
    match srgb_present {
        SoftEnable::ForceEnable if !format.is_srgb() => Err(GraphicsError::InitializationFailed(
            format!("sRGB presentation was forced but the surface uses {format:?}"),
        )),
        SoftEnable::TryEnable if !format.is_srgb() => {
            log::warn!("sRGB presentation unavailable, presenting {format:?}");
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Frame contexts for a context with `swap_chain_images` images, if any.
pub(crate) fn frame_context_count(
    swap_chain_images: Option<u32>,
    triple_buffering: SoftEnable,
) -> usize {
    match swap_chain_images {
        Some(images) => images as usize,
        None if triple_buffering == SoftEnable::ForceEnable => 3,
        None => 2,
    }
}

/// Where the images of a swap chain come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwapChainSource {
    /// Owned by the executor's native swap chain.
    Native,
    /// Plain textures rotated by the context.
    Offscreen,
}

/// Presentation state of a context.
#[derive(Debug)]
pub(crate) struct SwapChain {
    pub source: SwapChainSource,
    pub images: Vec<TextureHandle>,
    pub views: Vec<RenderTargetViewHandle>,
    pub current: u32,
    pub format: TextureFormat,
    pub extent: Extent3d,
}

impl SwapChain {
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Next image of an offscreen swap chain.
    pub fn rotate(&mut self) -> u32 {
        if !self.images.is_empty() {
            self.current = (self.current + 1) % self.image_count();
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_context_count() {
        assert_eq!(frame_context_count(None, SoftEnable::ForceEnable), 3);
        assert_eq!(frame_context_count(None, SoftEnable::TryEnable), 2);
        assert_eq!(frame_context_count(None, SoftEnable::Disabled), 2);
        assert_eq!(frame_context_count(Some(3), SoftEnable::Disabled), 3);
    }

    #[test]
    fn test_image_count_policy() {
        assert_eq!(requested_image_count(SoftEnable::Disabled), 2);
        assert_eq!(requested_image_count(SoftEnable::TryEnable), 3);
        assert_eq!(check_image_count(SoftEnable::TryEnable, 2), Ok(2));
        assert!(check_image_count(SoftEnable::ForceEnable, 2).is_err());
        assert_eq!(check_image_count(SoftEnable::ForceEnable, 3), Ok(3));
    }

    #[test]
    fn test_srgb_policy() {
        assert!(check_srgb(SoftEnable::ForceEnable, TextureFormat::Bgra8Unorm).is_err());
        assert!(check_srgb(SoftEnable::TryEnable, TextureFormat::Bgra8Unorm).is_ok());
        assert!(check_srgb(SoftEnable::ForceEnable, TextureFormat::Bgra8Srgb).is_ok());
    }

    #[test]
    fn test_offscreen_rotation() {
        let mut chain = SwapChain {
            source: SwapChainSource::Offscreen,
            images: vec![TextureHandle::INVALID; 3],
            views: vec![RenderTargetViewHandle::INVALID; 3],
            current: 0,
            format: TextureFormat::Bgra8Unorm,
            extent: Extent3d::new_2d(4, 4),
        };
        assert_eq!(chain.rotate(), 1);
        assert_eq!(chain.rotate(), 2);
        assert_eq!(chain.rotate(), 0);
    }

    #[test]
    fn test_headless_target_has_no_window() {
        let target = HeadlessTarget::new(640, 480);
        assert_eq!(target.surface_size(), (640, 480));
        assert!(target.window_handles().is_none());
    }
}
