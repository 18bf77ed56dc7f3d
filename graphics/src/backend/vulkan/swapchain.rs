//! Window surface and swap chain.
//!
//! The swap chain images are handed to the context as non-owning textures.
//! Acquisition signals a binary semaphore from a small ring; the frame
//! submission that presents the image waits on it and signals the image's
//! own render-finished semaphore for the present call.

use std::sync::Arc;

use ash::vk;

use crate::backend::{GpuTexture, SwapChainDesc, SwapChainImages};
use crate::error::GraphicsError;
use crate::types::Extent3d;

use super::conversion::{convert_result, surface_format_to_texture_format};
use super::resources::{DeviceShared, VulkanTexture};

const SWAPCHAIN_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw()
        | vk::ImageUsageFlags::TRANSFER_SRC.as_raw()
        | vk::ImageUsageFlags::TRANSFER_DST.as_raw(),
);

/// Pick the BGRA surface format matching `srgb`, or any format the
/// context can describe.
pub(super) fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    srgb: bool,
) -> Option<vk::SurfaceFormatKHR> {
    let wanted = if srgb {
        vk::Format::B8G8R8A8_SRGB
    } else {
        vk::Format::B8G8R8A8_UNORM
    };
    formats
        .iter()
        .find(|f| f.format == wanted)
        .or_else(|| {
            formats
                .iter()
                .find(|f| surface_format_to_texture_format(f.format).is_some())
        })
        .copied()
}

/// Clamp the requested image count to what the surface allows.
pub(super) fn clamp_image_count(requested: u32, capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let max = if capabilities.max_image_count == 0 {
        u32::MAX
    } else {
        capabilities.max_image_count
    };
    requested.max(capabilities.min_image_count).min(max)
}

fn choose_extent(desc: &SwapChainDesc, capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: desc.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desc.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

pub(super) struct VulkanSwapchain {
    pub surface: vk::SurfaceKHR,
    pub swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::Format,
    extent: vk::Extent2D,
    /// One more than the image count, so a semaphore is never reused while
    /// an acquire may still be pending on it.
    acquire_semaphores: Vec<vk::Semaphore>,
    next_acquire: usize,
    /// Per image.
    render_finished: Vec<vk::Semaphore>,
    /// Image acquired but not yet consumed by a submission.
    pending: Option<(u32, vk::Semaphore)>,
}

impl VulkanSwapchain {
    pub fn new(
        shared: &DeviceShared,
        surface_loader: &ash::khr::surface::Instance,
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        desc: &SwapChainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self, GraphicsError> {
        let pd = shared.physical_device;
        let capabilities =
            unsafe { surface_loader.get_physical_device_surface_capabilities(pd, surface) }
                .map_err(|e| convert_result("surface capabilities", e))?;
        let formats = unsafe { surface_loader.get_physical_device_surface_formats(pd, surface) }
            .map_err(|e| convert_result("surface formats", e))?;
        let surface_format = choose_surface_format(&formats, desc.srgb).ok_or_else(|| {
            GraphicsError::FeatureNotSupported("surface offers no usable color format".into())
        })?;
        if !capabilities.supported_usage_flags.contains(SWAPCHAIN_USAGE) {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "surface images lack usage {:?}",
                SWAPCHAIN_USAGE
            )));
        }

        let extent = choose_extent(desc, &capabilities);
        let image_count = clamp_image_count(desc.image_count, &capabilities);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(SWAPCHAIN_USAGE)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            // FIFO is the one mode every surface supports
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| convert_result("create swapchain", e))?;
        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(convert_result("swapchain images", e));
            }
        };

        let device = &shared.device;
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let mut semaphores = Vec::with_capacity(images.len() * 2 + 1);
        for _ in 0..images.len() * 2 + 1 {
            match unsafe { device.create_semaphore(&semaphore_info, None) } {
                Ok(semaphore) => semaphores.push(semaphore),
                Err(e) => {
                    unsafe {
                        for semaphore in semaphores {
                            device.destroy_semaphore(semaphore, None);
                        }
                        swapchain_loader.destroy_swapchain(swapchain, None);
                    }
                    return Err(convert_result("swapchain semaphore", e));
                }
            }
        }
        let render_finished = semaphores.split_off(images.len() + 1);

        log::info!(
            "Vulkan swapchain {}x{} with {} images ({:?})",
            extent.width,
            extent.height,
            images.len(),
            surface_format.format
        );

        Ok(Self {
            surface,
            swapchain,
            images,
            format: surface_format.format,
            extent,
            acquire_semaphores: semaphores,
            next_acquire: 0,
            render_finished,
            pending: None,
        })
    }

    /// Non-owning textures for the registry.
    pub fn registry_images(&self, shared: &Arc<DeviceShared>) -> Result<SwapChainImages, GraphicsError> {
        let format = surface_format_to_texture_format(self.format).ok_or_else(|| {
            GraphicsError::Internal(format!("unmapped surface format {:?}", self.format))
        })?;
        let extent = vk::Extent3D {
            width: self.extent.width,
            height: self.extent.height,
            depth: 1,
        };
        let images = self
            .images
            .iter()
            .map(|&image| {
                GpuTexture::Vulkan(VulkanTexture {
                    shared: shared.clone(),
                    image,
                    format: self.format,
                    extent,
                    allocation: parking_lot::Mutex::new(None),
                    owned: false,
                })
            })
            .collect();
        Ok(SwapChainImages {
            images,
            format,
            extent: Extent3d::new_2d(self.extent.width, self.extent.height),
        })
    }

    pub fn acquire(&mut self, loader: &ash::khr::swapchain::Device) -> Result<u32, GraphicsError> {
        if let Some((image, _)) = self.pending {
            return Ok(image);
        }
        let semaphore = self.acquire_semaphores[self.next_acquire];
        let (image, suboptimal) = unsafe {
            loader.acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
        .map_err(|e| convert_result("acquire swapchain image", e))?;
        if suboptimal {
            log::debug!("Swapchain is suboptimal for its surface");
        }
        self.next_acquire = (self.next_acquire + 1) % self.acquire_semaphores.len();
        self.pending = Some((image, semaphore));
        Ok(image)
    }

    /// Acquire semaphore to wait on and render-finished semaphore to signal
    /// before presenting `image`.
    pub fn take_present_semaphores(&mut self, image: u32) -> Option<(vk::Semaphore, vk::Semaphore)> {
        match self.pending {
            Some((pending, acquire)) if pending == image => {
                self.pending = None;
                let finished = *self.render_finished.get(image as usize)?;
                Some((acquire, finished))
            }
            _ => None,
        }
    }

    /// Destroy everything but the surface.
    pub fn destroy(&mut self, device: &ash::Device, loader: &ash::khr::swapchain::Device) {
        unsafe {
            for semaphore in self.acquire_semaphores.drain(..).chain(self.render_finished.drain(..)) {
                device.destroy_semaphore(semaphore, None);
            }
            loader.destroy_swapchain(self.swapchain, None);
        }
        self.swapchain = vk::SwapchainKHR::null();
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_surface_format_prefers_matching_encoding() {
        let formats = [
            format(vk::Format::B8G8R8A8_UNORM),
            format(vk::Format::B8G8R8A8_SRGB),
        ];
        assert_eq!(
            choose_surface_format(&formats, true).map(|f| f.format),
            Some(vk::Format::B8G8R8A8_SRGB)
        );
        assert_eq!(
            choose_surface_format(&formats, false).map(|f| f.format),
            Some(vk::Format::B8G8R8A8_UNORM)
        );
        assert!(choose_surface_format(&[format(vk::Format::R16_SFLOAT)], false).is_none());
    }

    #[test]
    fn test_image_count_clamped() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(clamp_image_count(1, &capabilities), 2);
        assert_eq!(clamp_image_count(8, &capabilities), 3);

        let unbounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(clamp_image_count(8, &unbounded), 8);
    }
}
