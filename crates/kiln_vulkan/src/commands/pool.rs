use ash::vk;
use std::rc::Rc;

use super::buffer::{CommandBuffer, CommandBufferError, CommandBufferLevel};
use crate::{device::LogicalDevice, VulkanError};

/// Pool whose command buffers can be reset one by one.
///
/// Destroying the pool frees every buffer allocated from it. The family has to be one the
/// logical device was created with.
pub struct CommandPool {
    /// First queue of the pool's family, one-time buffers run on it
    queue: vk::Queue,
    handle: vk::CommandPool,
    device: Rc<LogicalDevice>,
}

impl CommandPool {
    pub fn new(
        device: Rc<LogicalDevice>,
        queue_family_index: u32,
    ) -> Result<CommandPool, CommandBufferError> {
        CommandPool::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
    }

    /// Pool for short lived buffers that upload data, on the graphics family
    pub fn transfer(device: Rc<LogicalDevice>) -> Result<CommandPool, CommandBufferError> {
        let family = device.queue_families().graphics;
        CommandPool::with_flags(device, family, vk::CommandPoolCreateFlags::TRANSIENT)
    }

    fn with_flags(
        device: Rc<LogicalDevice>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<CommandPool, CommandBufferError> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(queue_family_index);

        let handle = unsafe {
            device
                .vk_handle()
                .create_command_pool(&create_info, None)
                .map_err(|err| CommandBufferError::CantCreatePool(err.into()))?
        };
        let queue = unsafe { device.vk_handle().get_device_queue(queue_family_index, 0) };

        Ok(CommandPool {
            queue,
            handle,
            device,
        })
    }
}

impl CommandPool {
    pub fn allocate_buffer(&mut self, level: CommandBufferLevel) -> Result<CommandBuffer, VulkanError> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_buffer_count(1)
            .command_pool(self.handle)
            .level(level.into());

        let handles = unsafe {
            self.device
                .vk_handle()
                .allocate_command_buffers(&allocate_info)
                .map_err(VulkanError::from)?
        };
        let handle = handles
            .first()
            .copied()
            .ok_or(VulkanError::Other(vk::Result::ERROR_UNKNOWN))?;

        Ok(CommandBuffer::new(handle, self.device.clone()))
    }

    /// Records a one-time command buffer with `record`, submits it and blocks until the
    /// queue is idle again. The buffer is freed whether or not that worked.
    pub fn run_once(
        &mut self,
        record: impl FnOnce(&mut CommandBuffer) -> Result<(), CommandBufferError>,
    ) -> Result<(), CommandBufferError> {
        let mut buffer = self
            .allocate_buffer(CommandBufferLevel::Primary)
            .map_err(CommandBufferError::DeviceError)?;

        let result = self.submit_once(&mut buffer, record);
        unsafe {
            self.device
                .vk_handle()
                .free_command_buffers(self.handle, &[buffer.vk_handle()]);
        };

        result
    }

    fn submit_once(
        &self,
        buffer: &mut CommandBuffer,
        record: impl FnOnce(&mut CommandBuffer) -> Result<(), CommandBufferError>,
    ) -> Result<(), CommandBufferError> {
        buffer.begin_one_time()?;
        record(buffer)?;
        buffer.end()?;

        let command_buffers = [buffer.vk_handle()];
        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .build();

        unsafe {
            self.device
                .vk_handle()
                .queue_submit(self.queue, &[submit_info], vk::Fence::null())
                .map_err(|err| CommandBufferError::DeviceError(err.into()))?;
            self.device
                .vk_handle()
                .queue_wait_idle(self.queue)
                .map_err(|err| CommandBufferError::DeviceError(err.into()))?;
        };

        Ok(())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .vk_handle()
                .destroy_command_pool(self.handle, None);
        };
    }
}
