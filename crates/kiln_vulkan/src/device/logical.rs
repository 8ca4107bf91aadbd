use ash::vk;
use std::{os::raw::c_char, rc::Rc};

use super::{PhysicalDevice, QueueFamilyIndices};
use crate::{
    buffer,
    constants::{DEVICE_EXTENSIONS, ENABLE_VALIDATION_LAYERS, VALIDATION_LAYERS},
    instance::Instance,
    utils, VulkanError,
};

#[derive(thiserror::Error, Debug)]
pub enum LogicalDeviceError {
    #[error("Failed to create a logical device: {0}")]
    CantCreate(VulkanError),
}

/// Logical device with one queue for graphics and one for presentation.
///
/// Both queues are the same queue when the physical device presents from its graphics family.
pub struct LogicalDevice {
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,

    physical_device: PhysicalDevice,
    handle: ash::Device,
    _instance: Rc<Instance>,
}

impl LogicalDevice {
    pub fn new(
        instance: Rc<Instance>,
        physical_device: PhysicalDevice,
    ) -> Result<LogicalDevice, LogicalDeviceError> {
        let queue_families = physical_device.queue_families();

        let queue_priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique()
            .iter()
            .map(|&queue_index| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(queue_index)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        let layer_names = if ENABLE_VALIDATION_LAYERS {
            utils::to_cstrings(&VALIDATION_LAYERS)
        } else {
            Vec::new()
        };
        let enabled_layer_names: Vec<*const c_char> =
            layer_names.iter().map(|layer| layer.as_ptr()).collect();

        let extension_names = utils::to_cstrings(&DEVICE_EXTENSIONS);
        let enabled_extension_names: Vec<*const c_char> = extension_names
            .iter()
            .map(|extension| extension.as_ptr())
            .collect();

        let enabled_features = vk::PhysicalDeviceFeatures::builder().geometry_shader(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_features(&enabled_features)
            .enabled_layer_names(&enabled_layer_names)
            .enabled_extension_names(&enabled_extension_names);

        let handle = unsafe {
            instance
                .vk_handle()
                .create_device(physical_device.vk_handle(), &create_info, None)
                .map_err(|err| LogicalDeviceError::CantCreate(err.into()))?
        };

        let graphics_queue = unsafe { handle.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { handle.get_device_queue(queue_families.present, 0) };
        log::debug!("Created logical device on {}", physical_device.name());

        Ok(LogicalDevice {
            graphics_queue,
            present_queue,
            physical_device,
            handle,
            _instance: instance,
        })
    }
}

impl LogicalDevice {
    pub(crate) fn vk_handle(&self) -> &ash::Device {
        &self.handle
    }

    pub(crate) fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub(crate) fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.physical_device.queue_families()
    }

    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.physical_device
    }

    /// Index of a memory type allowed by `type_bits` with every flag in `required`
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        buffer::find_memory_type(self.physical_device.memory_properties(), type_bits, required)
    }

    /// Blocks until every queue on the device is idle
    pub fn wait_idle(&self) -> Result<(), VulkanError> {
        unsafe { self.handle.device_wait_idle().map_err(VulkanError::from) }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            self.handle.destroy_device(None);
        };
        log::trace!("Destroyed logical device");
    }
}
