//! Native Vulkan objects held by the registry.
//!
//! Every object keeps the [`DeviceShared`] alive and destroys its handle on
//! drop. The registry only drops an entry once the frames that used it have
//! executed, so no extra deferral happens here.

use std::fmt;
use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, Allocator};
use parking_lot::Mutex;

use crate::descriptor::DescriptorSetLayoutInfo;

/// Device level state shared by the backend and every native object.
pub struct DeviceShared {
    pub(super) entry: ash::Entry,
    pub(super) instance: ash::Instance,
    pub(super) debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    pub(super) physical_device: vk::PhysicalDevice,
    pub(super) device: ash::Device,
    /// `None` only while the device is being torn down.
    pub(super) allocator: Mutex<Option<Allocator>>,
    pub(super) descriptor_pool: Mutex<vk::DescriptorPool>,
}

impl fmt::Debug for DeviceShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceShared")
            .field("physical_device", &self.physical_device)
            .finish_non_exhaustive()
    }
}

impl DeviceShared {
    pub(super) fn free(&self, allocation: Allocation) {
        if let Some(allocator) = self.allocator.lock().as_mut()
            && let Err(e) = allocator.free(allocation)
        {
            log::error!("Failed to free GPU memory: {}", e);
        }
    }
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device
                .destroy_descriptor_pool(*self.descriptor_pool.get_mut(), None);
            // allocator before the device it allocates from
            drop(self.allocator.get_mut().take());
            self.device.destroy_device(None);
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::info!("Vulkan device destroyed");
    }
}

#[derive(Debug)]
pub struct VulkanBuffer {
    pub(super) shared: Arc<DeviceShared>,
    pub(super) buffer: vk::Buffer,
    pub(super) size: u64,
    pub(super) allocation: Mutex<Option<Allocation>>,
}

impl VulkanBuffer {
    /// Host pointer of a mapped buffer.
    pub(super) fn with_mapped<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let guard = self.allocation.lock();
        let allocation = guard.as_ref()?;
        let ptr = allocation.mapped_ptr()?;
        // SAFETY: gpu-allocator keeps host visible memory persistently mapped
        // for the lifetime of the allocation, which the guard pins.
        let bytes = unsafe {
            std::slice::from_raw_parts_mut(ptr.as_ptr().cast::<u8>(), self.size as usize)
        };
        Some(f(bytes))
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe { self.shared.device.destroy_buffer(self.buffer, None) };
        if let Some(allocation) = self.allocation.get_mut().take() {
            self.shared.free(allocation);
        }
    }
}

#[derive(Debug)]
pub struct VulkanTexture {
    pub(super) shared: Arc<DeviceShared>,
    pub(super) image: vk::Image,
    pub(super) format: vk::Format,
    pub(super) extent: vk::Extent3D,
    /// `None` for swap chain images, which the swap chain owns.
    pub(super) allocation: Mutex<Option<Allocation>>,
    pub(super) owned: bool,
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        unsafe { self.shared.device.destroy_image(self.image, None) };
        if let Some(allocation) = self.allocation.get_mut().take() {
            self.shared.free(allocation);
        }
    }
}

/// Shader resource view or attachment view.
#[derive(Debug)]
pub struct VulkanTextureView {
    pub(super) shared: Arc<DeviceShared>,
    pub(super) view: vk::ImageView,
    pub(super) image: vk::Image,
    pub(super) range: vk::ImageSubresourceRange,
    /// Extent of the first mip of the view.
    pub(super) extent: vk::Extent2D,
}

impl Drop for VulkanTextureView {
    fn drop(&mut self) {
        unsafe { self.shared.device.destroy_image_view(self.view, None) };
    }
}

#[derive(Debug)]
pub struct VulkanSampler {
    pub(super) shared: Arc<DeviceShared>,
    pub(super) sampler: vk::Sampler,
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe { self.shared.device.destroy_sampler(self.sampler, None) };
    }
}

#[derive(Debug)]
pub struct VulkanShaderModule {
    pub(super) shared: Arc<DeviceShared>,
    pub(super) module: vk::ShaderModule,
}

impl Drop for VulkanShaderModule {
    fn drop(&mut self) {
        unsafe { self.shared.device.destroy_shader_module(self.module, None) };
    }
}

/// One Vulkan binding of a set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct NativeBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
}

#[derive(Debug)]
pub(super) struct SetLayoutInner {
    shared: Arc<DeviceShared>,
    pub layout: vk::DescriptorSetLayout,
    /// Parallel to `DescriptorSetLayoutInfo::bindings`.
    pub bindings: Vec<NativeBinding>,
}

impl Drop for SetLayoutInner {
    fn drop(&mut self) {
        unsafe {
            self.shared
                .device
                .destroy_descriptor_set_layout(self.layout, None)
        };
    }
}

/// Sets and pipeline layouts keep their set layouts alive.
#[derive(Debug, Clone)]
pub struct VulkanSetLayout {
    pub(super) inner: Arc<SetLayoutInner>,
}

impl VulkanSetLayout {
    pub(super) fn new(
        shared: Arc<DeviceShared>,
        layout: vk::DescriptorSetLayout,
        bindings: Vec<NativeBinding>,
    ) -> Self {
        Self {
            inner: Arc::new(SetLayoutInner {
                shared,
                layout,
                bindings,
            }),
        }
    }
}

/// Native binding numbers: explicit indices first, declaration order otherwise.
pub(super) fn native_binding_numbers(info: &DescriptorSetLayoutInfo) -> Vec<u32> {
    info.bindings
        .iter()
        .enumerate()
        .map(|(position, b)| u32::from(b.desc.binding_index.unwrap_or(position as u16)))
        .collect()
}

/// One native set per frame context.
#[derive(Debug)]
pub struct VulkanDescriptorSet {
    pub(super) shared: Arc<DeviceShared>,
    pub(super) layout: VulkanSetLayout,
    pub(super) frames: Vec<vk::DescriptorSet>,
    /// Snapshot version last written into each frame's set.
    pub(super) written: Mutex<Vec<Option<u64>>>,
}

impl Drop for VulkanDescriptorSet {
    fn drop(&mut self) {
        let pool = self.shared.descriptor_pool.lock();
        if let Err(e) = unsafe { self.shared.device.free_descriptor_sets(*pool, &self.frames) } {
            log::error!("Failed to free descriptor sets: {:?}", e);
        }
    }
}

/// A push constant range, addressed by its declared index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct PushRange {
    pub index: u8,
    pub offset: u32,
    pub size: u32,
    pub stages: vk::ShaderStageFlags,
}

#[derive(Debug)]
pub struct VulkanPipelineLayout {
    pub(super) shared: Arc<DeviceShared>,
    pub(super) layout: vk::PipelineLayout,
    pub(super) push_constants: Vec<PushRange>,
    pub(super) _sets: Vec<VulkanSetLayout>,
}

impl VulkanPipelineLayout {
    pub(super) fn push_range(&self, index: u8) -> Option<&PushRange> {
        self.push_constants.iter().find(|range| range.index == index)
    }
}

impl Drop for VulkanPipelineLayout {
    fn drop(&mut self) {
        unsafe { self.shared.device.destroy_pipeline_layout(self.layout, None) };
    }
}

#[derive(Debug)]
pub struct VulkanPipeline {
    pub(super) shared: Arc<DeviceShared>,
    pub(super) pipeline: vk::Pipeline,
    pub(super) bind_point: vk::PipelineBindPoint,
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe { self.shared.device.destroy_pipeline(self.pipeline, None) };
    }
}
