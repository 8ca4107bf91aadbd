use ash::vk;
use std::rc::Rc;

use crate::{device::LogicalDevice, VulkanError};

/// What a frame slot uses one of its semaphores for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreRole {
    /// Signaled by the swapchain once the acquired image can be rendered to
    ImageAvailable,
    /// Signaled by the queue once rendering finished, waited on before presenting
    RenderFinished,
}

impl std::fmt::Display for SemaphoreRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemaphoreRole::ImageAvailable => write!(f, "image available"),
            SemaphoreRole::RenderFinished => write!(f, "render finished"),
        }
    }
}

/// Failures while creating the synchronization objects of a frame slot
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SyncError {
    #[error("Failed to create the {role} semaphore of frame slot {slot}: {source}")]
    CreateSemaphore {
        slot: usize,
        role: SemaphoreRole,
        source: VulkanError,
    },
    #[error("Failed to create the in-flight fence of frame slot {slot}: {source}")]
    CreateFence { slot: usize, source: VulkanError },
    #[error("Failed to allocate the command buffer of frame slot {slot}: {source}")]
    AllocateCommandBuffer { slot: usize, source: VulkanError },
}

pub struct Semaphore {
    device: Rc<LogicalDevice>,
    handle: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Rc<LogicalDevice>) -> Result<Semaphore, VulkanError> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let handle = unsafe {
            device
                .vk_handle()
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::from)?
        };

        Ok(Semaphore { device, handle })
    }

    pub(crate) fn vk_handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.vk_handle().destroy_semaphore(self.handle, None);
        };
    }
}

pub struct Fence {
    device: Rc<LogicalDevice>,
    handle: vk::Fence,
}

impl Fence {
    /// Creates a fence, already signaled when `signaled` is set
    pub fn new(device: Rc<LogicalDevice>, signaled: bool) -> Result<Fence, VulkanError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let handle = unsafe {
            device
                .vk_handle()
                .create_fence(&create_info, None)
                .map_err(VulkanError::from)?
        };

        Ok(Fence { device, handle })
    }

    pub(crate) fn vk_handle(&self) -> vk::Fence {
        self.handle
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.vk_handle().destroy_fence(self.handle, None);
        };
    }
}
