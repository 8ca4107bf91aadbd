use ash::vk;

use super::selection::{self, DeviceCandidate, QueueFamilyCandidate, QueueFamilyIndices};
use crate::{
    constants::DEVICE_EXTENSIONS, instance::Instance, surface::Surface, surface::SurfaceError,
    utils, VulkanError,
};

/// Errors that the physical device can throw
#[derive(thiserror::Error, Debug)]
pub enum PhysicalDeviceError {
    #[error("There are no Vulkan capable devices on your machine")]
    NoPhysicalDevices,
    #[error("Failed to find a physical device that matched the requirements")]
    NoSuitableDevice,
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Other(#[from] VulkanError),
}

/// GPU picked to render with, along with the queue families that will be used on it
pub struct PhysicalDevice {
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue_families: QueueFamilyIndices,

    handle: vk::PhysicalDevice,
}

impl PhysicalDevice {
    /// Picks the best physical device that can present to `surface`.
    ///
    /// Every device the driver exposes is scored, see [`selection::score_device`].
    pub fn select(instance: &Instance, surface: &Surface) -> Result<PhysicalDevice, PhysicalDeviceError> {
        let handles = unsafe {
            instance
                .vk_handle()
                .enumerate_physical_devices()
                .map_err(VulkanError::from)?
        };

        let mut candidates = Vec::with_capacity(handles.len());
        for &handle in handles.iter() {
            let candidate = PhysicalDevice::describe(instance, surface, handle)?;
            log::debug!(
                "Found {} ({})",
                candidate.name,
                device_type_name(candidate.device_type)
            );
            candidates.push(candidate);
        }

        let index = selection::pick_device(&candidates, &DEVICE_EXTENSIONS)?;
        let candidate = &candidates[index];
        let queue_families = selection::select_queue_families(&candidate.queue_families)
            .ok_or(PhysicalDeviceError::NoSuitableDevice)?;
        let handle = handles[index];

        let properties = unsafe { instance.vk_handle().get_physical_device_properties(handle) };
        let memory_properties = unsafe {
            instance
                .vk_handle()
                .get_physical_device_memory_properties(handle)
        };

        log::info!(
            "Using {} ({})",
            utils::char_array_to_string(&properties.device_name),
            device_type_name(properties.device_type)
        );
        log::debug!(
            "Graphics queue family {}, present queue family {}",
            queue_families.graphics,
            queue_families.present
        );

        Ok(PhysicalDevice {
            properties,
            memory_properties,
            queue_families,
            handle,
        })
    }

    /// Gathers what the selection rules need to know about a single device
    fn describe(
        instance: &Instance,
        surface: &Surface,
        handle: vk::PhysicalDevice,
    ) -> Result<DeviceCandidate, PhysicalDeviceError> {
        let properties = unsafe { instance.vk_handle().get_physical_device_properties(handle) };
        let features = unsafe { instance.vk_handle().get_physical_device_features(handle) };
        let family_properties = unsafe {
            instance
                .vk_handle()
                .get_physical_device_queue_family_properties(handle)
        };

        let mut queue_families = Vec::with_capacity(family_properties.len());
        for (index, family) in family_properties.iter().enumerate() {
            queue_families.push(QueueFamilyCandidate {
                flags: family.queue_flags,
                queue_count: family.queue_count,
                present_support: surface.supports_queue_family(handle, index as u32)?,
            });
        }

        let extensions = unsafe {
            instance
                .vk_handle()
                .enumerate_device_extension_properties(handle)
                .map_err(VulkanError::from)?
        };

        Ok(DeviceCandidate {
            name: utils::char_array_to_string(&properties.device_name),
            device_type: properties.device_type,
            max_image_dimension_2d: properties.limits.max_image_dimension2_d,
            geometry_shader: features.geometry_shader == vk::TRUE,
            extensions: extensions
                .iter()
                .map(|extension| utils::char_array_to_string(&extension.extension_name))
                .collect(),
            queue_families,
            has_surface_formats: !surface.formats(handle)?.is_empty(),
            has_present_modes: !surface.present_modes(handle)?.is_empty(),
        })
    }
}

impl PhysicalDevice {
    pub(crate) fn vk_handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub fn name(&self) -> String {
        utils::char_array_to_string(&self.properties.device_name)
    }
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::CPU => "Cpu",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        _ => "Unknown",
    }
}
