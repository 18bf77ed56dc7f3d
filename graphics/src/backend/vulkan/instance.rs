//! Vulkan instance creation and configuration.

use std::ffi::{CStr, CString, c_char};

use ash::vk;

use crate::app_info::ApplicationInfo;
use crate::error::GraphicsError;
use crate::swapchain::WindowHandles;

use super::debug;

/// Oldest API the executor runs on: timeline semaphores are core from 1.2.
const MIN_API_VERSION: (u32, u32) = (1, 2);

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

const ENGINE_NAME: &CStr = c"verglas";

/// A created instance and its optional debug messenger.
pub struct InstanceBundle {
    pub instance: ash::Instance,
    pub api_version: u32,
    pub debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    /// Surface extensions were enabled, windows can be presented to.
    pub surface_support: bool,
}

/// API version requested from the loader for `info`.
pub fn requested_api_version(info: &ApplicationInfo) -> u32 {
    let (major, minor) = info
        .api
        .vulkan_version()
        .map(|version| version.max(MIN_API_VERSION))
        .unwrap_or((1, 3));
    vk::make_api_version(0, major, minor, 0)
}

/// Create an instance for `info`.
///
/// Surface extensions are only requested when a window is supplied; a
/// headless device never needs them.
pub fn create_instance(
    entry: &ash::Entry,
    info: &ApplicationInfo,
    window: Option<&WindowHandles>,
) -> Result<InstanceBundle, GraphicsError> {
    let validation_requested = info.features.validation_layers;
    let validation_available = validation_requested && check_validation_layer_support(entry);
    if validation_requested && !validation_available {
        log::warn!("Validation layers requested but not available");
    }

    let app_name = CString::new(info.application_name.as_str()).map_err(|_| {
        GraphicsError::InvalidParameter("application name contains a NUL byte".into())
    })?;
    let (major, minor, patch) = info.application_version;
    let api_version = requested_api_version(info);

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(
            0,
            u32::from(major),
            u32::from(minor),
            u32::from(patch),
        ))
        .engine_name(ENGINE_NAME)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(api_version);

    let mut extensions: Vec<*const c_char> = Vec::new();
    let surface_support = match window {
        Some(window) => match ash_window::enumerate_required_extensions(window.display) {
            Ok(required) => {
                extensions.extend_from_slice(required);
                true
            }
            Err(e) => {
                log::warn!("No surface extensions for this display: {:?}", e);
                false
            }
        },
        None => false,
    };
    if validation_available {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    #[allow(unused_mut)]
    let mut create_flags = vk::InstanceCreateFlags::empty();
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
        create_flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let layer_names: Vec<*const c_char> = if validation_available {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        vec![]
    };

    let create_info = vk::InstanceCreateInfo::default()
        .flags(create_flags)
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names);

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create Vulkan instance: {:?}", e))
    })?;

    let debug = if validation_available {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, &instance);
        match debug::create_debug_messenger(&debug_utils) {
            Ok(messenger) => Some((debug_utils, messenger)),
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        }
    } else {
        None
    };

    Ok(InstanceBundle {
        instance,
        api_version,
        debug,
        surface_support,
    })
}

fn check_validation_layer_support(entry: &ash::Entry) -> bool {
    let Ok(available_layers) = (unsafe { entry.enumerate_instance_layer_properties() }) else {
        return false;
    };
    available_layers.iter().any(|layer| {
        layer
            .layer_name_as_c_str()
            .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_info::Api;

    #[test]
    fn test_api_version_never_below_timeline_semaphores() {
        let info = ApplicationInfo::new("version").with_api(Api::Vulkan1_1);
        assert_eq!(requested_api_version(&info), vk::make_api_version(0, 1, 2, 0));

        let info = ApplicationInfo::new("version").with_api(Api::Vulkan1_3);
        assert_eq!(requested_api_version(&info), vk::make_api_version(0, 1, 3, 0));
    }
}
