use ash::vk;
use std::rc::Rc;

use super::{FenceStatus, FenceTimeout, FrameBackend, Submission};
use crate::{
    commands::{CommandBuffer, CommandBufferError, CommandBufferLevel, CommandPool},
    device::LogicalDevice,
    sync::{Fence, Semaphore},
    VulkanError,
};

/// [`FrameBackend`] submitting to the graphics queue of a [`LogicalDevice`]
pub struct VulkanFrameBackend {
    pool: CommandPool,
    device: Rc<LogicalDevice>,
}

impl VulkanFrameBackend {
    pub fn new(device: Rc<LogicalDevice>) -> Result<VulkanFrameBackend, CommandBufferError> {
        let pool = CommandPool::new(device.clone(), device.queue_families().graphics)?;

        Ok(VulkanFrameBackend { pool, device })
    }
}

impl FrameBackend for VulkanFrameBackend {
    type CommandBuffer = CommandBuffer;
    type Semaphore = Semaphore;
    type Fence = Fence;

    fn create_semaphore(&self) -> Result<Semaphore, VulkanError> {
        Semaphore::new(self.device.clone())
    }

    fn create_fence(&self, signaled: bool) -> Result<Fence, VulkanError> {
        Fence::new(self.device.clone(), signaled)
    }

    fn allocate_command_buffer(&mut self) -> Result<CommandBuffer, VulkanError> {
        self.pool.allocate_buffer(CommandBufferLevel::Primary)
    }

    fn wait_for_fence(&self, fence: &Fence, timeout: FenceTimeout) -> Result<FenceStatus, VulkanError> {
        let result = unsafe {
            self.device
                .vk_handle()
                .wait_for_fences(&[fence.vk_handle()], true, timeout.as_nanos())
        };

        match result {
            Ok(()) => Ok(FenceStatus::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(FenceStatus::TimedOut),
            Err(err) => Err(err.into()),
        }
    }

    fn reset_fence(&self, fence: &Fence) -> Result<(), VulkanError> {
        unsafe {
            self.device
                .vk_handle()
                .reset_fences(&[fence.vk_handle()])
                .map_err(VulkanError::from)
        }
    }

    fn reset_command_buffer(&self, buffer: &mut CommandBuffer) -> Result<(), VulkanError> {
        buffer.reset()
    }

    fn submit(&self, submission: Submission<'_, Self>) -> Result<(), VulkanError> {
        let wait_semaphores = [submission.wait_semaphore.vk_handle()];
        let wait_stages = [submission.wait_stage];
        let command_buffers = [submission.command_buffer.vk_handle()];
        let signal_semaphores = [submission.signal_semaphore.vk_handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.device
                .vk_handle()
                .queue_submit(
                    self.device.graphics_queue(),
                    &[submit_info],
                    submission.fence.vk_handle(),
                )
                .map_err(VulkanError::from)
        }
    }

    fn wait_idle(&self) -> Result<(), VulkanError> {
        self.device.wait_idle()
    }
}
