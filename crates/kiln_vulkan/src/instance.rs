use ash::{extensions::ext::DebugUtils, vk};
use raw_window_handle::HasRawWindowHandle;
use std::{ffi::CString, os::raw::c_char};

use crate::{
    constants::{APPLICATION_NAME, ENABLE_VALIDATION_LAYERS, VALIDATION_LAYERS},
    utils, VulkanError,
};

#[derive(thiserror::Error, Debug)]
pub enum InstanceError {
    #[error(transparent)]
    LoadLibraryError(#[from] ash::LoadingError),
    #[error("Failed to query the instance extensions the window needs: {0}")]
    WindowExtensions(VulkanError),
    #[error("Creating instance failed: {0}")]
    CreateError(VulkanError),
    #[error("Missing required extensions: {0:?}")]
    MissingExtensions(Vec<String>),
    #[error("Missing required validation layers: {0:?}")]
    MissingValidationLayers(Vec<String>),
    #[error(transparent)]
    Other(VulkanError),
}

/// Loaded Vulkan library together with the instance created from it
pub struct Instance {
    handle: ash::Instance,
    entry: ash::Entry,
}

impl Instance {
    /// Creates an instance with every extension needed to present to `window`.
    ///
    /// With validation enabled the debug utils extension and the validation layers are
    /// required as well.
    pub fn new(window: &dyn HasRawWindowHandle) -> Result<Instance, InstanceError> {
        let entry = unsafe { ash::Entry::load()? };

        let enabled_extension_names = Instance::required_extension_names(window)?;
        Instance::check_required_extensions(&entry, &enabled_extension_names)?;

        let layer_names = if ENABLE_VALIDATION_LAYERS {
            Instance::check_validation_layers(&entry)?;
            utils::to_cstrings(&VALIDATION_LAYERS)
        } else {
            Vec::new()
        };
        let enabled_layer_names: Vec<*const c_char> =
            layer_names.iter().map(|layer| layer.as_ptr()).collect();

        let app_name = CString::new(APPLICATION_NAME).unwrap_or_default();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&app_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_extension_names)
            .enabled_layer_names(&enabled_layer_names);

        let handle = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(|err| InstanceError::CreateError(err.into()))?
        };
        log::info!(
            "Created Vulkan instance (validation {})",
            if ENABLE_VALIDATION_LAYERS { "on" } else { "off" }
        );

        Ok(Instance { entry, handle })
    }

    fn required_extension_names(
        window: &dyn HasRawWindowHandle,
    ) -> Result<Vec<*const c_char>, InstanceError> {
        let mut names: Vec<*const c_char> = ash_window::enumerate_required_extensions(window)
            .map_err(|err| InstanceError::WindowExtensions(err.into()))?
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        if ENABLE_VALIDATION_LAYERS {
            names.push(DebugUtils::name().as_ptr());
        }

        Ok(names)
    }

    fn check_required_extensions(
        entry: &ash::Entry,
        required: &[*const c_char],
    ) -> Result<(), InstanceError> {
        let supported_extensions = entry
            .enumerate_instance_extension_properties(None)
            .map_err(|err| InstanceError::Other(err.into()))?;

        let supported_names: Vec<String> = supported_extensions
            .iter()
            .map(|extension| utils::char_array_to_string(&extension.extension_name))
            .collect();
        log::trace!("Supported instance extensions: {:?}", supported_names);

        let missing = utils::missing_required(
            &supported_names,
            &required
                .iter()
                .map(|&extension| utils::char_ptr_to_string(extension))
                .collect::<Vec<String>>(),
        );

        if missing.is_empty() {
            Ok(())
        } else {
            log::error!("Your device is missing required extensions: {:?}", missing);
            Err(InstanceError::MissingExtensions(missing))
        }
    }

    fn check_validation_layers(entry: &ash::Entry) -> Result<(), InstanceError> {
        let supported_layers = entry
            .enumerate_instance_layer_properties()
            .map_err(|err| InstanceError::Other(err.into()))?;

        let supported_names: Vec<String> = supported_layers
            .iter()
            .map(|layer| utils::char_array_to_string(&layer.layer_name))
            .collect();
        log::trace!("Supported instance layers: {:?}", supported_names);

        let missing = utils::missing_required(
            &supported_names,
            &VALIDATION_LAYERS
                .iter()
                .map(|&layer| layer.to_string())
                .collect::<Vec<String>>(),
        );

        if missing.is_empty() {
            Ok(())
        } else {
            log::error!("Your device is missing required layers: {:?}", missing);
            Err(InstanceError::MissingValidationLayers(missing))
        }
    }
}

impl Instance {
    pub(crate) fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub(crate) fn vk_handle(&self) -> &ash::Instance {
        &self.handle
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            self.handle.destroy_instance(None);
        }
        log::trace!("Destroyed Vulkan instance");
    }
}
