use ash::vk;
use raw_window_handle::HasRawWindowHandle;
use std::rc::Rc;

use crate::{instance::Instance, VulkanError};

#[derive(Debug, Clone, Copy)]
pub enum SurfaceQueryType {
    SurfaceSupport,
    Capabilities,
    Formats,
    PresentModes,
}

impl std::fmt::Display for SurfaceQueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceQueryType::SurfaceSupport => write!(f, "surface support"),
            SurfaceQueryType::Capabilities => write!(f, "capabilities"),
            SurfaceQueryType::Formats => write!(f, "formats"),
            SurfaceQueryType::PresentModes => write!(f, "present modes"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SurfaceError {
    #[error("Failed to create a Vulkan surface for the window: {0}")]
    CantCreate(VulkanError),
    #[error("Failed to query the surface {0}: {1}")]
    FailedQuery(SurfaceQueryType, VulkanError),
}

/// Presentation target created for a window
pub struct Surface {
    /// Vulkan surface extension
    surface: ash::extensions::khr::Surface,
    /// Opaque handle to the Vulkan surface
    handle: vk::SurfaceKHR,
    /// Instance the surface belongs to
    instance: Rc<Instance>,
}

impl Surface {
    /// Creates a surface for `window` on the platform the window runs on
    pub fn new(
        instance: Rc<Instance>,
        window: &dyn HasRawWindowHandle,
    ) -> Result<Surface, SurfaceError> {
        let handle = unsafe {
            ash_window::create_surface(instance.entry(), instance.vk_handle(), window, None)
                .map_err(|err| SurfaceError::CantCreate(err.into()))?
        };
        let surface = ash::extensions::khr::Surface::new(instance.entry(), instance.vk_handle());
        log::debug!("Created window surface");

        Ok(Surface {
            surface,
            handle,
            instance,
        })
    }
}

impl Surface {
    /// Returns the vulkan handle to the Vulkan surface
    pub(crate) fn vk_handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub(crate) fn instance(&self) -> &Rc<Instance> {
        &self.instance
    }

    /// Whether the queue family at `queue_family_index` can present to this surface
    pub(crate) fn supports_queue_family(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool, SurfaceError> {
        unsafe {
            self.surface
                .get_physical_device_surface_support(
                    physical_device,
                    queue_family_index,
                    self.handle,
                )
                .map_err(|err| SurfaceError::FailedQuery(SurfaceQueryType::SurfaceSupport, err.into()))
        }
    }

    pub(crate) fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR, SurfaceError> {
        unsafe {
            self.surface
                .get_physical_device_surface_capabilities(physical_device, self.handle)
                .map_err(|err| SurfaceError::FailedQuery(SurfaceQueryType::Capabilities, err.into()))
        }
    }

    pub(crate) fn formats(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, SurfaceError> {
        unsafe {
            self.surface
                .get_physical_device_surface_formats(physical_device, self.handle)
                .map_err(|err| SurfaceError::FailedQuery(SurfaceQueryType::Formats, err.into()))
        }
    }

    pub(crate) fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::PresentModeKHR>, SurfaceError> {
        unsafe {
            self.surface
                .get_physical_device_surface_present_modes(physical_device, self.handle)
                .map_err(|err| SurfaceError::FailedQuery(SurfaceQueryType::PresentModes, err.into()))
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.surface.destroy_surface(self.handle, None);
        };
    }
}
