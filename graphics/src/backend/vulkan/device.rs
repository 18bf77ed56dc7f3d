//! Vulkan physical and logical device management.

use ash::vk;

use crate::error::GraphicsError;

/// What the selected device turned on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceFeatures {
    /// Device API version, clamped to what the instance asked for.
    pub api_version: u32,
    pub synchronization2: bool,
    /// Dynamic rendering comes from the KHR extension instead of core 1.3.
    pub dynamic_rendering_khr: bool,
    pub sampler_anisotropy: bool,
    pub depth_clamp: bool,
    pub logic_op: bool,
    pub sampler_filter_minmax: bool,
    /// Queue family writes timestamps.
    pub timestamps: bool,
    pub timestamp_valid_bits: u32,
    pub timestamp_period_ns: f64,
}

impl DeviceFeatures {
    pub fn is_vulkan13(&self) -> bool {
        self.api_version >= vk::API_VERSION_1_3
    }
}

pub(super) fn has_extension(extensions: &[vk::ExtensionProperties], name: &std::ffi::CStr) -> bool {
    extensions
        .iter()
        .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == name))
}

/// Select the best physical device for rendering.
///
/// Devices below Vulkan 1.2, or 1.2 devices without dynamic rendering, are
/// skipped. Discrete GPUs win over integrated ones.
pub fn select_physical_device(
    instance: &ash::Instance,
) -> Result<vk::PhysicalDevice, GraphicsError> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        GraphicsError::InitializationFailed(format!(
            "Failed to enumerate physical devices: {:?}",
            e
        ))
    })?;

    let mut best: Option<(u32, vk::PhysicalDevice)> = None;
    for device in devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let name = properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if properties.api_version < vk::API_VERSION_1_2 {
            log::info!("Skipping GPU {}: Vulkan 1.2 required", name);
            continue;
        }
        if properties.api_version < vk::API_VERSION_1_3 {
            let extensions =
                unsafe { instance.enumerate_device_extension_properties(device) }.unwrap_or_default();
            if !has_extension(&extensions, ash::khr::dynamic_rendering::NAME) {
                log::info!("Skipping GPU {}: no dynamic rendering", name);
                continue;
            }
        }
        if find_graphics_queue_family(instance, device).is_err() {
            continue;
        }

        let mut score = match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            _ => 1,
        };
        score += properties.limits.max_image_dimension2_d / 1024;
        log::info!(
            "Found GPU: {} (type: {:?}, score: {})",
            name,
            properties.device_type,
            score
        );

        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, device));
        }
    }

    best.map(|(_, device)| device)
        .ok_or_else(|| GraphicsError::InitializationFailed("No suitable GPU found".to_string()))
}

/// Find a queue family that supports graphics operations.
pub fn find_graphics_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<u32, GraphicsError> {
    let queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    queue_families
        .iter()
        .position(|family| {
            family
                .queue_flags
                .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
        })
        .map(|index| index as u32)
        .ok_or_else(|| {
            GraphicsError::InitializationFailed("No graphics queue family found".to_string())
        })
}

/// Create the logical device with one universal queue.
///
/// `synchronization2` is only enabled when asked for and supported.
pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
    instance_api_version: u32,
    want_synchronization2: bool,
    want_swapchain: bool,
) -> Result<(ash::Device, DeviceFeatures), GraphicsError> {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let api_version = properties.api_version.min(instance_api_version);
    let vulkan13 = api_version >= vk::API_VERSION_1_3;

    let mut supported12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut supported13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut supported = vk::PhysicalDeviceFeatures2::default().push_next(&mut supported12);
    if vulkan13 {
        supported = supported.push_next(&mut supported13);
    }
    unsafe { instance.get_physical_device_features2(physical_device, &mut supported) };
    let base = supported.features;

    if supported12.timeline_semaphore == vk::FALSE {
        return Err(GraphicsError::InitializationFailed(
            "device has no timeline semaphores".into(),
        ));
    }

    let queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    let timestamp_valid_bits = queue_families
        .get(queue_family as usize)
        .map_or(0, |family| family.timestamp_valid_bits);

    let features = DeviceFeatures {
        api_version,
        synchronization2: want_synchronization2 && vulkan13 && supported13.synchronization2 == vk::TRUE,
        dynamic_rendering_khr: !vulkan13,
        sampler_anisotropy: base.sampler_anisotropy == vk::TRUE,
        depth_clamp: base.depth_clamp == vk::TRUE,
        logic_op: base.logic_op == vk::TRUE,
        sampler_filter_minmax: supported12.sampler_filter_minmax == vk::TRUE,
        timestamps: timestamp_valid_bits > 0 && properties.limits.timestamp_period > 0.0,
        timestamp_valid_bits,
        timestamp_period_ns: f64::from(properties.limits.timestamp_period),
    };

    let queue_priorities = [1.0f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family)
        .queue_priorities(&queue_priorities)];

    let mut device_extensions = Vec::new();
    if want_swapchain {
        device_extensions.push(ash::khr::swapchain::NAME.as_ptr());
    }
    if features.dynamic_rendering_khr {
        device_extensions.push(ash::khr::dynamic_rendering::NAME.as_ptr());
    }
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    device_extensions.push(ash::khr::portability_subset::NAME.as_ptr());

    let enabled = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(features.sampler_anisotropy)
        .depth_clamp(features.depth_clamp)
        .logic_op(features.logic_op);
    let mut enabled12 = vk::PhysicalDeviceVulkan12Features::default()
        .timeline_semaphore(true)
        .sampler_filter_minmax(features.sampler_filter_minmax);
    let mut enabled13 = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(features.synchronization2);
    let mut dynamic_rendering_khr =
        vk::PhysicalDeviceDynamicRenderingFeaturesKHR::default().dynamic_rendering(true);

    let mut create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&device_extensions)
        .enabled_features(&enabled)
        .push_next(&mut enabled12);
    create_info = if vulkan13 {
        create_info.push_next(&mut enabled13)
    } else {
        create_info.push_next(&mut dynamic_rendering_khr)
    };

    let device =
        unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to create logical device: {:?}", e))
        })?;

    log::info!(
        "Vulkan device {}.{} (synchronization2: {}, timestamps: {})",
        vk::api_version_major(api_version),
        vk::api_version_minor(api_version),
        features.synchronization2,
        features.timestamps
    );
    Ok((device, features))
}
