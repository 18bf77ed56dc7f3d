//! Vulkan executor.
//!
//! One universal queue runs every batch of a frame in submission order. The
//! frame fence is a timeline semaphore, which is why Vulkan 1.2 is the
//! floor. Rendering uses dynamic rendering (core on 1.3, the KHR extension
//! on 1.2) and barriers go through `vkCmdPipelineBarrier2` when the device
//! has synchronization2.

mod allocator;
mod command;
pub(crate) mod conversion;
mod debug;
mod device;
mod encoder;
mod instance;
mod pipeline;
mod resources;
mod swapchain;
mod sync;

pub use resources::{
    DeviceShared, VulkanBuffer, VulkanDescriptorSet, VulkanPipeline, VulkanPipelineLayout,
    VulkanSampler, VulkanSetLayout, VulkanShaderModule, VulkanTexture, VulkanTextureView,
};

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme};
use parking_lot::Mutex;

use super::{
    BackendCapabilities, ComputePipelineInputs, GpuBackend, GpuBuffer, GpuDescriptorSet,
    GpuDescriptorSetLayout, GpuPipeline, GpuPipelineLayout, GpuSampler, GpuShaderModule,
    GpuTexture, GpuTextureView, GraphicsPipelineInputs, Submission, SwapChainDesc,
    SwapChainImages,
};
use crate::app_info::ApplicationInfo;
use crate::descriptor::DescriptorSetLayoutInfo;
use crate::error::GraphicsError;
use crate::frame::TIMESTAMPS_PER_FRAME;
use crate::swapchain::WindowHandles;
use crate::types::{
    BufferCreateDesc, PushConstantDesc, RenderTargetViewDesc, SamplerDesc, SamplerReduction,
    TextureCreateDesc, TextureFormat, TexturePlane, TextureViewDesc,
};

use allocator::{allocation_error, memory_location};
use command::FrameResources;
use conversion::{
    convert_address_mode, convert_aspect, convert_border_color, convert_buffer_usage, convert_descriptor_type,
    convert_filter_mode, convert_image_type, convert_mipmap_filter_mode, convert_reduction,
    convert_result, convert_swizzle, convert_texture_format, convert_texture_usage,
    convert_view_type, convert_visibility, format_aspect,
};
pub use device::DeviceFeatures;
use encoder::{Encoder, host_visibility_barrier};
use resources::{NativeBinding, PushRange, native_binding_numbers};
use swapchain::VulkanSwapchain;
use sync::FrameTimeline;

const DESCRIPTOR_POOL_SETS: u32 = 4096;

fn foreign(kind: &str) -> GraphicsError {
    GraphicsError::Internal(format!("{kind} does not belong to the Vulkan backend"))
}

/// Aspect of a shader resource view: a single plane, depth for depth formats.
fn view_aspect(format: TextureFormat, plane: TexturePlane) -> vk::ImageAspectFlags {
    if format.is_depth_stencil() {
        if plane.contains(TexturePlane::STENCIL) && !plane.contains(TexturePlane::DEPTH) {
            vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        let aspect = convert_aspect(plane);
        if aspect.is_empty() {
            vk::ImageAspectFlags::COLOR
        } else {
            aspect
        }
    }
}

fn sample_count(samples: u8) -> vk::SampleCountFlags {
    match samples {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

/// Vulkan ranges are laid out back to back in declaration order, 4-byte aligned.
fn pack_push_ranges(push_constants: &[PushConstantDesc]) -> Vec<PushRange> {
    let mut offset = 0u32;
    push_constants
        .iter()
        .map(|desc| {
            let size = u32::from(desc.size_in_bytes).next_multiple_of(4);
            let range = PushRange {
                index: desc.index,
                offset,
                size,
                stages: convert_visibility(desc.visibility),
            };
            offset += size;
            range
        })
        .collect()
}

fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool, GraphicsError> {
    let sizes = [
        (vk::DescriptorType::UNIFORM_BUFFER, 4096),
        (vk::DescriptorType::SAMPLED_IMAGE, 4096),
        (vk::DescriptorType::STORAGE_IMAGE, 1024),
        (vk::DescriptorType::STORAGE_BUFFER, 2048),
        (vk::DescriptorType::SAMPLER, 1024),
    ]
    .map(|(ty, descriptor_count)| vk::DescriptorPoolSize {
        ty,
        descriptor_count,
    });
    let info = vk::DescriptorPoolCreateInfo::default()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .max_sets(DESCRIPTOR_POOL_SETS)
        .pool_sizes(&sizes);
    unsafe { device.create_descriptor_pool(&info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create descriptor pool: {:?}", e))
    })
}

/// The Vulkan executor.
pub struct VulkanBackend {
    shared: Arc<DeviceShared>,
    features: DeviceFeatures,
    queue_family: u32,
    queue: Mutex<vk::Queue>,
    timeline: FrameTimeline,
    frames: Mutex<Vec<FrameResources>>,
    /// Loaded on Vulkan 1.2 devices only.
    dynamic_rendering: Option<ash::khr::dynamic_rendering::Device>,
    surface_loader: Option<ash::khr::surface::Instance>,
    swapchain_loader: Option<ash::khr::swapchain::Device>,
    swapchain: Mutex<Option<VulkanSwapchain>>,
}

impl fmt::Debug for VulkanBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanBackend")
            .field("features", &self.features)
            .field("queue_family", &self.queue_family)
            .finish_non_exhaustive()
    }
}

impl VulkanBackend {
    /// Bring up an instance and a device for `info`.
    ///
    /// `window` only decides whether surface extensions are enabled; the
    /// surface itself is created with the swap chain.
    pub fn new(info: &ApplicationInfo, window: Option<WindowHandles>) -> Result<Self, GraphicsError> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to load Vulkan: {}", e))
        })?;
        let bundle = instance::create_instance(&entry, info, window.as_ref())?;

        let destroy_instance = |bundle: &instance::InstanceBundle| unsafe {
            if let Some((debug_utils, messenger)) = &bundle.debug {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            bundle.instance.destroy_instance(None);
        };

        let selected = device::select_physical_device(&bundle.instance).and_then(|pd| {
            device::find_graphics_queue_family(&bundle.instance, pd).map(|family| (pd, family))
        });
        let (physical_device, queue_family) = match selected {
            Ok(selected) => selected,
            Err(e) => {
                destroy_instance(&bundle);
                return Err(e);
            }
        };

        let device_extensions =
            unsafe { bundle.instance.enumerate_device_extension_properties(physical_device) }
                .unwrap_or_default();
        let want_swapchain = bundle.surface_support
            && device::has_extension(&device_extensions, ash::khr::swapchain::NAME);
        let want_synchronization2 = crate::barrier::BarrierCaps::for_api(info.api).synchronization2;

        let (device, features) = match device::create_logical_device(
            &bundle.instance,
            physical_device,
            queue_family,
            bundle.api_version,
            want_synchronization2,
            want_swapchain,
        ) {
            Ok(created) => created,
            Err(e) => {
                destroy_instance(&bundle);
                return Err(e);
            }
        };

        let instance::InstanceBundle {
            instance,
            debug,
            surface_support,
            ..
        } = bundle;
        // from here on dropping `shared` tears everything down
        let shared = Arc::new(DeviceShared {
            entry,
            instance,
            debug,
            physical_device,
            device,
            allocator: Mutex::new(None),
            descriptor_pool: Mutex::new(vk::DescriptorPool::null()),
        });
        *shared.descriptor_pool.lock() = create_descriptor_pool(&shared.device)?;
        *shared.allocator.lock() = Some(allocator::create_allocator(
            &shared.instance,
            physical_device,
            shared.device.clone(),
        )?);

        let queue = unsafe { shared.device.get_device_queue(queue_family, 0) };
        let timeline = FrameTimeline::new(&shared.device)?;

        let dynamic_rendering = features
            .dynamic_rendering_khr
            .then(|| ash::khr::dynamic_rendering::Device::new(&shared.instance, &shared.device));
        let (surface_loader, swapchain_loader) = if surface_support && want_swapchain {
            (
                Some(ash::khr::surface::Instance::new(&shared.entry, &shared.instance)),
                Some(ash::khr::swapchain::Device::new(&shared.instance, &shared.device)),
            )
        } else {
            (None, None)
        };

        let properties = unsafe { shared.instance.get_physical_device_properties(physical_device) };
        log::info!(
            "Vulkan backend on {}",
            properties
                .device_name_as_c_str()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );

        Ok(Self {
            shared,
            features,
            queue_family,
            queue: Mutex::new(queue),
            timeline,
            frames: Mutex::new(Vec::new()),
            dynamic_rendering,
            surface_loader,
            swapchain_loader,
            swapchain: Mutex::new(None),
        })
    }

    pub fn features(&self) -> &DeviceFeatures {
        &self.features
    }

    fn device(&self) -> &ash::Device {
        &self.shared.device
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        placement: crate::types::MemoryPlacement,
        linear: bool,
    ) -> Result<gpu_allocator::vulkan::Allocation, GraphicsError> {
        let mut guard = self.shared.allocator.lock();
        let allocator = guard
            .as_mut()
            .ok_or_else(|| GraphicsError::Internal("allocator already destroyed".into()))?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: memory_location(placement),
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| allocation_error(name, e))
    }

    fn destroy_swapchain_locked(&self, chain: &mut Option<VulkanSwapchain>) {
        let (Some(mut chain), Some(surface_loader), Some(swapchain_loader)) =
            (chain.take(), &self.surface_loader, &self.swapchain_loader)
        else {
            return;
        };
        chain.destroy(self.device(), swapchain_loader);
        unsafe { surface_loader.destroy_surface(chain.surface, None) };
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        let device = &self.shared.device;
        if let Err(e) = unsafe { device.device_wait_idle() } {
            log::error!("Failed to idle the device on shutdown: {:?}", e);
        }
        let mut chain = self.swapchain.lock().take();
        self.destroy_swapchain_locked(&mut chain);
        for frame in self.frames.get_mut().drain(..) {
            frame.destroy(device);
        }
        self.timeline.destroy(device);
    }
}

impl GpuBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            timestamp_period_ns: self.features.timestamp_period_ns,
            timestamp_queries: self.features.timestamp_period_ns > 0.0,
            dedicated_transfer_queue: false,
            dedicated_compute_queue: false,
            window_presentation: self.swapchain_loader.is_some(),
        }
    }

    fn configure_frames(&self, frame_count: usize) -> Result<(), GraphicsError> {
        let device = self.device();
        let mut frames = self.frames.lock();
        if !frames.is_empty() {
            unsafe { device.device_wait_idle() }.map_err(|e| convert_result("wait idle", e))?;
            for frame in frames.drain(..) {
                frame.destroy(device);
            }
        }
        for _ in 0..frame_count {
            frames.push(FrameResources::new(
                device,
                self.queue_family,
                self.features.timestamps,
            )?);
        }
        log::debug!("Vulkan: {} frame contexts", frame_count);
        Ok(())
    }

    fn reset_frame(&self, frame_index: usize) -> Result<(), GraphicsError> {
        let frames = self.frames.lock();
        let frame = frames.get(frame_index).ok_or_else(|| {
            GraphicsError::Internal(format!("no frame context {frame_index}"))
        })?;
        frame.reset(self.device())
    }

    fn create_buffer(&self, desc: &BufferCreateDesc) -> Result<GpuBuffer, GraphicsError> {
        if desc.size == 0 {
            return Err(GraphicsError::InvalidParameter("buffer of zero bytes".into()));
        }
        let device = self.device();
        let info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(convert_buffer_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&info, None) }
            .map_err(|e| convert_result("create buffer", e))?;
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let name = desc.label.as_deref().unwrap_or("buffer");
        let allocation = match self.allocate(name, requirements, desc.placement, true) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };
        let native = VulkanBuffer {
            shared: self.shared.clone(),
            buffer,
            size: desc.size,
            allocation: Mutex::new(None),
        };
        let bound =
            unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) };
        // from here the buffer frees its allocation on drop
        *native.allocation.lock() = Some(allocation);
        bound.map_err(|e| convert_result("bind buffer memory", e))?;
        log::trace!("Vulkan: buffer {:?} ({} bytes)", desc.label, desc.size);
        Ok(GpuBuffer::Vulkan(native))
    }

    fn create_texture(&self, desc: &TextureCreateDesc) -> Result<GpuTexture, GraphicsError> {
        let device = self.device();
        let texture = &desc.desc;
        let format = convert_texture_format(texture.format);
        let extent = vk::Extent3D {
            width: texture.dimensions.width.max(1),
            height: texture.dimensions.height.max(1),
            depth: texture.dimensions.depth.max(1),
        };
        let flags = if texture.texture_type.is_cube() {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };
        let info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(convert_image_type(texture.texture_type))
            .format(format)
            .extent(extent)
            .mip_levels(u32::from(texture.mip_count.max(1)))
            .array_layers(u32::from(texture.array_size.max(1)))
            .samples(sample_count(texture.sample_count))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert_texture_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { device.create_image(&info, None) }
            .map_err(|e| convert_result("create image", e))?;
        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let name = texture.label.as_deref().unwrap_or("texture");
        let allocation = match self.allocate(name, requirements, desc.placement, false) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };
        let native = VulkanTexture {
            shared: self.shared.clone(),
            image,
            format,
            extent,
            allocation: Mutex::new(None),
            owned: true,
        };
        let bound =
            unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) };
        *native.allocation.lock() = Some(allocation);
        bound.map_err(|e| convert_result("bind image memory", e))?;
        log::trace!(
            "Vulkan: texture {:?} ({}x{}x{} {:?})",
            texture.label,
            extent.width,
            extent.height,
            extent.depth,
            format
        );
        Ok(GpuTexture::Vulkan(native))
    }

    fn create_texture_view(
        &self,
        texture: &GpuTexture,
        desc: &TextureViewDesc,
    ) -> Result<GpuTextureView, GraphicsError> {
        let texture = texture.as_vulkan().ok_or_else(|| foreign("texture"))?;
        let range = vk::ImageSubresourceRange {
            aspect_mask: view_aspect(desc.format, desc.plane),
            base_mip_level: u32::from(desc.min_mip),
            level_count: u32::from(desc.max_mip.saturating_sub(desc.min_mip)) + 1,
            base_array_layer: u32::from(desc.array_start),
            layer_count: u32::from(desc.array_range.max(1)),
        };
        let [r, g, b, a] = desc.components.0.map(convert_swizzle);
        let info = vk::ImageViewCreateInfo::default()
            .image(texture.image)
            .view_type(convert_view_type(desc.view_type))
            .format(convert_texture_format(desc.format))
            .components(vk::ComponentMapping { r, g, b, a })
            .subresource_range(range);
        let view = unsafe { self.device().create_image_view(&info, None) }
            .map_err(|e| convert_result("create image view", e))?;
        Ok(GpuTextureView::Vulkan(VulkanTextureView {
            shared: self.shared.clone(),
            view,
            image: texture.image,
            range,
            extent: vk::Extent2D {
                width: (texture.extent.width >> desc.min_mip).max(1),
                height: (texture.extent.height >> desc.min_mip).max(1),
            },
        }))
    }

    fn create_render_target_view(
        &self,
        texture: &GpuTexture,
        desc: &RenderTargetViewDesc,
    ) -> Result<GpuTextureView, GraphicsError> {
        let texture = texture.as_vulkan().ok_or_else(|| foreign("texture"))?;
        let layers = u32::from(desc.array_size.max(1));
        let range = vk::ImageSubresourceRange {
            aspect_mask: format_aspect(desc.format),
            base_mip_level: u32::from(desc.mip_level),
            level_count: 1,
            base_array_layer: u32::from(desc.array_start),
            layer_count: layers,
        };
        let view_type = if layers > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        };
        let info = vk::ImageViewCreateInfo::default()
            .image(texture.image)
            .view_type(view_type)
            .format(convert_texture_format(desc.format))
            .subresource_range(range);
        let view = unsafe { self.device().create_image_view(&info, None) }
            .map_err(|e| convert_result("create attachment view", e))?;
        Ok(GpuTextureView::Vulkan(VulkanTextureView {
            shared: self.shared.clone(),
            view,
            image: texture.image,
            range,
            extent: vk::Extent2D {
                width: (texture.extent.width >> desc.mip_level).max(1),
                height: (texture.extent.height >> desc.mip_level).max(1),
            },
        }))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<GpuSampler, GraphicsError> {
        let anisotropy = desc.anisotropy > 1 && self.features.sampler_anisotropy;
        let max_lod = if desc.lod_max >= SamplerDesc::NO_MAX_LOD {
            vk::LOD_CLAMP_NONE
        } else {
            desc.lod_max
        };
        let mut reduction = vk::SamplerReductionModeCreateInfo::default()
            .reduction_mode(convert_reduction(desc.reduction));
        let mut info = vk::SamplerCreateInfo::default()
            .mag_filter(convert_filter_mode(desc.mag_filter))
            .min_filter(convert_filter_mode(desc.min_filter))
            .mipmap_mode(convert_mipmap_filter_mode(desc.mip_filter))
            .address_mode_u(convert_address_mode(desc.address_mode_u))
            .address_mode_v(convert_address_mode(desc.address_mode_v))
            .address_mode_w(convert_address_mode(desc.address_mode_w))
            .mip_lod_bias(desc.lod_bias)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(f32::from(desc.anisotropy.max(1)))
            .min_lod(desc.lod_min)
            .max_lod(max_lod)
            .border_color(convert_border_color(desc.border_color));
        if desc.reduction != SamplerReduction::Blend {
            if self.features.sampler_filter_minmax {
                info = info.push_next(&mut reduction);
            } else {
                log::warn!("min/max sampler reduction unsupported for {:?}", desc.label);
            }
        }
        let sampler = unsafe { self.device().create_sampler(&info, None) }
            .map_err(|e| convert_result("create sampler", e))?;
        Ok(GpuSampler::Vulkan(VulkanSampler {
            shared: self.shared.clone(),
            sampler,
        }))
    }

    fn create_shader_module(&self, bytecode: &[u8]) -> Result<GpuShaderModule, GraphicsError> {
        let words = ash::util::read_spv(&mut Cursor::new(bytecode))
            .map_err(|e| GraphicsError::InvalidParameter(format!("not SPIR-V: {}", e)))?;
        let info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe { self.device().create_shader_module(&info, None) }
            .map_err(|e| convert_result("create shader module", e))?;
        Ok(GpuShaderModule::Vulkan(VulkanShaderModule {
            shared: self.shared.clone(),
            module,
        }))
    }

    fn create_descriptor_set_layout(
        &self,
        layout: &DescriptorSetLayoutInfo,
    ) -> Result<GpuDescriptorSetLayout, GraphicsError> {
        let bindings: Vec<NativeBinding> = layout
            .bindings
            .iter()
            .zip(native_binding_numbers(layout))
            .map(|(packed, binding)| NativeBinding {
                binding,
                descriptor_type: convert_descriptor_type(packed.desc.binding_type),
                count: u32::from(packed.desc.count),
            })
            .collect();
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = layout
            .bindings
            .iter()
            .zip(&bindings)
            .map(|(packed, native)| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(native.binding)
                    .descriptor_type(native.descriptor_type)
                    .descriptor_count(native.count)
                    .stage_flags(convert_visibility(packed.desc.visibility))
            })
            .collect();
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let native = unsafe { self.device().create_descriptor_set_layout(&info, None) }
            .map_err(|e| convert_result("create descriptor set layout", e))?;
        Ok(GpuDescriptorSetLayout::Vulkan(VulkanSetLayout::new(
            self.shared.clone(),
            native,
            bindings,
        )))
    }

    fn create_descriptor_set(
        &self,
        layout: &GpuDescriptorSetLayout,
        _info: &DescriptorSetLayoutInfo,
        frame_count: usize,
    ) -> Result<GpuDescriptorSet, GraphicsError> {
        let layout = layout.as_vulkan().ok_or_else(|| foreign("descriptor set layout"))?;
        let layouts = vec![layout.inner.layout; frame_count];
        let frames = {
            let pool = self.shared.descriptor_pool.lock();
            let info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(*pool)
                .set_layouts(&layouts);
            unsafe { self.device().allocate_descriptor_sets(&info) }.map_err(|e| match e {
                vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                    GraphicsError::ResourceCreationFailed(format!(
                        "descriptor pool exhausted ({:?})",
                        e
                    ))
                }
                other => convert_result("allocate descriptor sets", other),
            })?
        };
        Ok(GpuDescriptorSet::Vulkan(VulkanDescriptorSet {
            shared: self.shared.clone(),
            layout: layout.clone(),
            frames,
            written: Mutex::new(vec![None; frame_count]),
        }))
    }

    fn create_pipeline_layout(
        &self,
        sets: &[&GpuDescriptorSetLayout],
        push_constants: &[PushConstantDesc],
    ) -> Result<GpuPipelineLayout, GraphicsError> {
        let sets: Vec<VulkanSetLayout> = sets
            .iter()
            .map(|set| set.as_vulkan().cloned().ok_or_else(|| foreign("descriptor set layout")))
            .collect::<Result<_, _>>()?;
        let set_layouts: Vec<vk::DescriptorSetLayout> =
            sets.iter().map(|set| set.inner.layout).collect();
        let ranges = pack_push_ranges(push_constants);
        let vk_ranges: Vec<vk::PushConstantRange> = ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: range.stages,
                offset: range.offset,
                size: range.size,
            })
            .collect();
        let info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&vk_ranges);
        let layout = unsafe { self.device().create_pipeline_layout(&info, None) }
            .map_err(|e| convert_result("create pipeline layout", e))?;
        Ok(GpuPipelineLayout::Vulkan(VulkanPipelineLayout {
            shared: self.shared.clone(),
            layout,
            push_constants: ranges,
            _sets: sets,
        }))
    }

    fn create_graphics_pipeline(
        &self,
        inputs: &GraphicsPipelineInputs<'_>,
    ) -> Result<GpuPipeline, GraphicsError> {
        let layout = inputs.layout.as_vulkan().ok_or_else(|| foreign("pipeline layout"))?;
        let modules: Vec<&VulkanShaderModule> = inputs
            .stages
            .iter()
            .map(|(module, _)| module.as_vulkan().ok_or_else(|| foreign("shader module")))
            .collect::<Result<_, _>>()?;
        let pipeline =
            pipeline::create_graphics_pipeline(self.device(), &self.features, inputs, &modules, layout)?;
        log::debug!("Vulkan: graphics pipeline {:?}", inputs.desc.label);
        Ok(GpuPipeline::Vulkan(VulkanPipeline {
            shared: self.shared.clone(),
            pipeline,
            bind_point: vk::PipelineBindPoint::GRAPHICS,
        }))
    }

    fn create_compute_pipeline(
        &self,
        inputs: &ComputePipelineInputs<'_>,
    ) -> Result<GpuPipeline, GraphicsError> {
        let layout = inputs.layout.as_vulkan().ok_or_else(|| foreign("pipeline layout"))?;
        let module = inputs.module.as_vulkan().ok_or_else(|| foreign("shader module"))?;
        let pipeline = pipeline::create_compute_pipeline(self.device(), inputs, module, layout)?;
        log::debug!("Vulkan: compute pipeline {:?}", inputs.desc.label);
        Ok(GpuPipeline::Vulkan(VulkanPipeline {
            shared: self.shared.clone(),
            pipeline,
            bind_point: vk::PipelineBindPoint::COMPUTE,
        }))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let buffer = buffer.as_vulkan().ok_or_else(|| foreign("buffer"))?;
        let start = offset as usize;
        let end = start + data.len();
        buffer
            .with_mapped(|bytes| {
                let len = bytes.len();
                bytes.get_mut(start..end).map(|dst| dst.copy_from_slice(data)).ok_or_else(|| {
                    GraphicsError::InvalidParameter(format!(
                        "write of {} bytes at {} overruns a {} byte buffer",
                        data.len(),
                        offset,
                        len
                    ))
                })
            })
            .ok_or_else(|| GraphicsError::InvalidParameter("buffer is not host visible".into()))?
    }

    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64) -> Result<Vec<u8>, GraphicsError> {
        let buffer = buffer.as_vulkan().ok_or_else(|| foreign("buffer"))?;
        let start = offset as usize;
        let end = start + size as usize;
        buffer
            .with_mapped(|bytes| {
                bytes.get(start..end).map(<[u8]>::to_vec).ok_or_else(|| {
                    GraphicsError::InvalidParameter(format!(
                        "read of {} bytes at {} overruns a {} byte buffer",
                        size,
                        offset,
                        bytes.len()
                    ))
                })
            })
            .ok_or_else(|| GraphicsError::InvalidParameter("buffer is not host visible".into()))?
    }

    fn submit(&self, submission: Submission<'_>) -> Result<(), GraphicsError> {
        verglas_core::profile_function!();
        let device = self.device();
        let frames = self.frames.lock();
        let frame = frames.get(submission.frame_index).ok_or_else(|| {
            GraphicsError::Internal(format!("no frame context {}", submission.frame_index))
        })?;
        let cmd = frame.command_buffer;

        let begin = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(cmd, &begin) }
            .map_err(|e| convert_result("begin command buffer", e))?;
        if let Some(queries) = frame.queries {
            unsafe { device.cmd_reset_query_pool(cmd, queries, 0, TIMESTAMPS_PER_FRAME) };
        }

        let mut encoder = Encoder::new(
            device,
            self.dynamic_rendering.as_ref(),
            &self.features,
            submission.registry,
            cmd,
            submission.frame_index,
            frame.queries,
        );
        let mut lists = 0;
        for batch in &submission.batches {
            for list in &batch.lists {
                encoder.encode(list);
                lists += 1;
            }
        }
        host_visibility_barrier(device, cmd);
        unsafe { device.end_command_buffer(cmd) }
            .map_err(|e| convert_result("end command buffer", e))?;

        let mut chain = self.swapchain.lock();
        let present = submission.present.and_then(|image| {
            let semaphores = chain
                .as_mut()
                .and_then(|chain| chain.take_present_semaphores(image));
            if semaphores.is_none() {
                log::debug!("Image {} was not acquired, frame is not presented", image);
            }
            semaphores.map(|semaphores| (image, semaphores))
        });

        let mut waits = Vec::new();
        let mut wait_values = Vec::new();
        let mut wait_stages = Vec::new();
        let mut signals = vec![self.timeline.semaphore];
        let mut signal_values = vec![submission.signal_value];
        if let Some((_, (acquired, finished))) = present {
            waits.push(acquired);
            wait_values.push(0);
            wait_stages.push(vk::PipelineStageFlags::ALL_COMMANDS);
            signals.push(finished);
            signal_values.push(0);
        }
        let command_buffers = [cmd];
        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default()
            .wait_semaphore_values(&wait_values)
            .signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&waits)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signals)
            .push_next(&mut timeline_info);

        let queue = self.queue.lock();
        unsafe { device.queue_submit(*queue, &[submit_info], vk::Fence::null()) }
            .map_err(|e| convert_result("queue submit", e))?;
        self.timeline.mark_submitted(submission.signal_value);
        log::trace!(
            "Vulkan: frame {} submitted {} lists",
            submission.signal_value,
            lists
        );

        if let (Some((image, (_, finished))), Some(chain), Some(loader)) =
            (present, chain.as_ref(), &self.swapchain_loader)
        {
            let swapchains = [chain.swapchain];
            let images = [image];
            let wait = [finished];
            let present_info = vk::PresentInfoKHR::default()
                .wait_semaphores(&wait)
                .swapchains(&swapchains)
                .image_indices(&images);
            match unsafe { loader.queue_present(*queue, &present_info) } {
                Ok(false) => {}
                Ok(true) => log::debug!("Swapchain is suboptimal, resize to rebuild it"),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    log::warn!("Swapchain out of date, resize to rebuild it")
                }
                Err(vk::Result::ERROR_DEVICE_LOST) => return Err(GraphicsError::DeviceLost),
                Err(e) => log::error!("Present failed: {:?}", e),
            }
        }
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        self.timeline.completed(self.device())
    }

    fn wait_for_value(&self, value: u64) -> Result<(), GraphicsError> {
        self.timeline.wait(self.device(), value)
    }

    fn read_timestamps(&self, frame_index: usize, count: u32) -> Result<Vec<u64>, GraphicsError> {
        let frames = self.frames.lock();
        let frame = frames.get(frame_index).ok_or_else(|| {
            GraphicsError::Internal(format!("no timestamps for frame context {frame_index}"))
        })?;
        let queries = frame.queries.ok_or_else(|| {
            GraphicsError::FeatureNotSupported("queue family has no timestamps".into())
        })?;
        let count = count.min(TIMESTAMPS_PER_FRAME) as usize;
        if count == 0 {
            return Ok(Vec::new());
        }
        // value and availability per query
        let mut results = vec![[0u64; 2]; count];
        match unsafe {
            self.device().get_query_pool_results(
                queries,
                0,
                &mut results,
                vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WITH_AVAILABILITY,
            )
        } {
            Ok(()) | Err(vk::Result::NOT_READY) => {}
            Err(e) => return Err(convert_result("read timestamps", e)),
        }
        let mask = match self.features.timestamp_valid_bits {
            bits if bits >= 64 => u64::MAX,
            bits => (1u64 << bits) - 1,
        };
        Ok(results
            .into_iter()
            .map(|[value, available]| if available != 0 { value & mask } else { 0 })
            .collect())
    }

    fn create_swap_chain(
        &self,
        window: WindowHandles,
        desc: &SwapChainDesc,
    ) -> Result<SwapChainImages, GraphicsError> {
        let (Some(surface_loader), Some(swapchain_loader)) =
            (&self.surface_loader, &self.swapchain_loader)
        else {
            return Err(GraphicsError::FeatureNotSupported(
                "device was created without surface support".into(),
            ));
        };
        let mut guard = self.swapchain.lock();
        self.destroy_swapchain_locked(&mut guard);

        let surface = unsafe {
            ash_window::create_surface(
                &self.shared.entry,
                &self.shared.instance,
                window.display,
                window.window,
                None,
            )
        }
        .map_err(|e| convert_result("create surface", e))?;
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(
                self.shared.physical_device,
                self.queue_family,
                surface,
            )
        }
        .unwrap_or(false);
        if !supported {
            unsafe { surface_loader.destroy_surface(surface, None) };
            return Err(GraphicsError::FeatureNotSupported(
                "queue family cannot present to this window".into(),
            ));
        }

        let chain = match VulkanSwapchain::new(
            &self.shared,
            surface_loader,
            swapchain_loader,
            surface,
            desc,
            vk::SwapchainKHR::null(),
        ) {
            Ok(chain) => chain,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };
        let images = chain.registry_images(&self.shared);
        *guard = Some(chain);
        images
    }

    fn recreate_swap_chain(&self, desc: &SwapChainDesc) -> Result<SwapChainImages, GraphicsError> {
        let (Some(surface_loader), Some(swapchain_loader)) =
            (&self.surface_loader, &self.swapchain_loader)
        else {
            return Err(GraphicsError::FeatureNotSupported("no window swap chain".into()));
        };
        let mut guard = self.swapchain.lock();
        let mut old = guard
            .take()
            .ok_or_else(|| GraphicsError::Internal("no window swap chain to rebuild".into()))?;
        match VulkanSwapchain::new(
            &self.shared,
            surface_loader,
            swapchain_loader,
            old.surface,
            desc,
            old.swapchain,
        ) {
            Ok(chain) => {
                old.destroy(self.device(), swapchain_loader);
                let images = chain.registry_images(&self.shared);
                *guard = Some(chain);
                images
            }
            Err(e) => {
                *guard = Some(old);
                Err(e)
            }
        }
    }

    fn destroy_swap_chain(&self) {
        let mut guard = self.swapchain.lock();
        if guard.is_some() {
            if let Err(e) = unsafe { self.device().device_wait_idle() } {
                log::error!("Failed to idle before destroying the swapchain: {:?}", e);
            }
            self.destroy_swapchain_locked(&mut guard);
        }
    }

    fn acquire_next_image(&self) -> Result<u32, GraphicsError> {
        let loader = self
            .swapchain_loader
            .as_ref()
            .ok_or_else(|| GraphicsError::FeatureNotSupported("no window swap chain".into()))?;
        let mut guard = self.swapchain.lock();
        let chain = guard
            .as_mut()
            .ok_or_else(|| GraphicsError::Internal("no window swap chain".into()))?;
        chain.acquire(loader)
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        let _queue = self.queue.lock();
        unsafe { self.device().device_wait_idle() }.map_err(|e| convert_result("wait idle", e))
    }
}
