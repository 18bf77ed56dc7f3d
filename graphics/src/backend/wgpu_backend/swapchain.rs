//! Window surface of the wgpu executor.
//!
//! wgpu hands out one surface texture at a time, so the registry sees
//! `image_count` placeholder textures and every one of them resolves to
//! whichever texture is currently acquired.

use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};

use crate::backend::{GpuTexture, SwapChainDesc, SwapChainImages};
use crate::error::GraphicsError;
use crate::swapchain::WindowHandles;
use crate::types::Extent3d;

use super::conversion::surface_format_to_texture_format;
use super::resources::WgpuTexture;

/// Borrowed view of raw handles for surface creation.
struct RawWindow(WindowHandles);

impl HasWindowHandle for RawWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        // the caller of create_swap_chain guarantees the window outlives the surface
        Ok(unsafe { WindowHandle::borrow_raw(self.0.window) })
    }
}

impl HasDisplayHandle for RawWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        Ok(unsafe { DisplayHandle::borrow_raw(self.0.display) })
    }
}

/// Pick the BGRA format matching `srgb`, or any format the context can describe.
pub(super) fn choose_surface_format(
    formats: &[wgpu::TextureFormat],
    srgb: bool,
) -> Option<wgpu::TextureFormat> {
    let wanted = if srgb {
        wgpu::TextureFormat::Bgra8UnormSrgb
    } else {
        wgpu::TextureFormat::Bgra8Unorm
    };
    formats
        .iter()
        .find(|f| **f == wanted)
        .or_else(|| {
            formats
                .iter()
                .find(|f| surface_format_to_texture_format(**f).is_some())
        })
        .copied()
}

/// The acquired image, its view and the index it is known by.
pub(super) struct AcquiredImage {
    pub index: u32,
    pub texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

pub(super) struct WgpuSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    image_count: u32,
    next_image: u32,
    pub acquired: Option<AcquiredImage>,
}

impl WgpuSurface {
    pub fn new(
        instance: &wgpu::Instance,
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        window: WindowHandles,
        desc: &SwapChainDesc,
    ) -> Result<Self, GraphicsError> {
        let target = unsafe { wgpu::SurfaceTargetUnsafe::from_window(&RawWindow(window)) }
            .map_err(|e| GraphicsError::InvalidParameter(format!("Bad window handles: {e}")))?;
        let surface = unsafe { instance.create_surface_unsafe(target) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create surface: {e}"))
        })?;
        let capabilities = surface.get_capabilities(adapter);
        let format = choose_surface_format(&capabilities.formats, desc.srgb).ok_or_else(|| {
            GraphicsError::FeatureNotSupported("surface offers no usable color format".into())
        })?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            format,
            width: desc.width.max(1),
            height: desc.height.max(1),
            // FIFO is the one mode every surface supports
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: desc.image_count.saturating_sub(1).max(1),
        };
        let mut chain = Self {
            surface,
            config,
            image_count: desc.image_count.max(2),
            next_image: 0,
            acquired: None,
        };
        chain.configure(device, desc);
        Ok(chain)
    }

    pub fn configure(&mut self, device: &wgpu::Device, desc: &SwapChainDesc) {
        self.acquired = None;
        self.config.width = desc.width.max(1);
        self.config.height = desc.height.max(1);
        self.image_count = desc.image_count.max(2);
        self.surface.configure(device, &self.config);
        log::info!(
            "wgpu surface {}x{} ({:?})",
            self.config.width,
            self.config.height,
            self.config.format
        );
    }

    pub fn registry_images(&self) -> Result<SwapChainImages, GraphicsError> {
        let format = surface_format_to_texture_format(self.config.format).ok_or_else(|| {
            GraphicsError::Internal(format!("unmapped surface format {:?}", self.config.format))
        })?;
        Ok(SwapChainImages {
            images: (0..self.image_count)
                .map(|image| GpuTexture::Wgpu(WgpuTexture::Surface { image }))
                .collect(),
            format,
            extent: Extent3d::new_2d(self.config.width, self.config.height),
        })
    }

    pub fn acquire(&mut self) -> Result<u32, GraphicsError> {
        if let Some(acquired) = &self.acquired {
            return Ok(acquired.index);
        }
        let texture = self.surface.get_current_texture().map_err(|e| match e {
            wgpu::SurfaceError::Outdated => GraphicsError::SurfaceOutdated,
            wgpu::SurfaceError::Lost => GraphicsError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => GraphicsError::OutOfMemory,
            other => GraphicsError::Internal(format!("Failed to acquire surface texture: {other}")),
        })?;
        if texture.suboptimal {
            log::debug!("Surface is suboptimal, resize to rebuild it");
        }
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        self.acquired = Some(AcquiredImage {
            index,
            texture,
            view,
        });
        Ok(index)
    }

    /// Present the acquired image if it is `image`.
    pub fn present(&mut self, image: u32) {
        match self.acquired.take() {
            Some(acquired) if acquired.index == image => acquired.texture.present(),
            Some(other) => {
                log::debug!("Image {} was not acquired, frame is not presented", image);
                self.acquired = Some(other);
            }
            None => log::debug!("Image {} was not acquired, frame is not presented", image),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_format_prefers_matching_encoding() {
        let formats = [
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb,
        ];
        assert_eq!(
            choose_surface_format(&formats, true),
            Some(wgpu::TextureFormat::Bgra8UnormSrgb)
        );
        assert_eq!(
            choose_surface_format(&formats, false),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
        assert_eq!(
            choose_surface_format(&[wgpu::TextureFormat::Rgba16Float], true),
            Some(wgpu::TextureFormat::Rgba16Float)
        );
        assert!(choose_surface_format(&[wgpu::TextureFormat::R8Unorm], false).is_none());
    }
}
