//! Double-buffered render loop.
//!
//! [`FrameScheduler`] owns a fixed ring of frame slots and runs one frame per
//! [`FrameScheduler::draw_frame`] call. It talks to the GPU only through the
//! [`FrameBackend`], [`Presenter`] and [`CommandRecorder`] traits.

use ash::vk;
use std::time::Duration;

use crate::{buffer::BufferError, commands::CommandBufferError, sync::SyncError, VulkanError};

mod scheduler;
mod vulkan;

pub use scheduler::{FrameScheduler, FrameSchedulerBuilder};
pub use vulkan::VulkanFrameBackend;

/// How long the CPU may block on a frame slot's in-flight fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceTimeout {
    /// Block until the fence signals, however long that takes
    Infinite,
    Bounded(Duration),
}

impl FenceTimeout {
    /// Timeout in the nanoseconds Vulkan expects, `u64::MAX` waits forever
    pub fn as_nanos(&self) -> u64 {
        match self {
            FenceTimeout::Infinite => u64::MAX,
            FenceTimeout::Bounded(duration) => {
                u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX - 1).min(u64::MAX - 1)
            }
        }
    }
}

impl Default for FenceTimeout {
    fn default() -> FenceTimeout {
        FenceTimeout::Bounded(Duration::from_secs(1))
    }
}

impl std::fmt::Display for FenceTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FenceTimeout::Infinite => write!(f, "no timeout"),
            FenceTimeout::Bounded(duration) => write!(f, "{:?}", duration),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Ready { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface, nothing was acquired
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Result of one successful render cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented { slot: usize, image_index: u32 },
    /// The swapchain has to be rebuilt before the next frame
    NeedsRebuild,
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("A frame scheduler needs at least one frame in flight")]
    NoFramesInFlight,
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("Frame slot {slot} was still in use after waiting {timeout}")]
    ThrottleTimeout { slot: usize, timeout: FenceTimeout },
    #[error("Failed to wait for the in-flight fence: {0}")]
    Wait(VulkanError),
    #[error("Failed to reset the in-flight fence: {0}")]
    ResetFence(VulkanError),
    #[error("Failed to reset the command buffer: {0}")]
    ResetCommandBuffer(VulkanError),
    #[error("Failed to acquire the next swapchain image: {0}")]
    Acquire(VulkanError),
    #[error("Failed to record the frame: {0}")]
    Record(#[from] CommandBufferError),
    #[error("No framebuffer exists for swapchain image {0}")]
    UnknownImage(u32),
    #[error("No per-frame resources exist for frame slot {0}")]
    UnknownSlot(usize),
    #[error("Failed to update the frame's uniform data: {0}")]
    Uniform(#[from] BufferError),
    #[error("Failed to submit the frame: {0}")]
    Submit(VulkanError),
    #[error("Failed to present the frame: {0}")]
    Present(VulkanError),
    #[error("Failed to wait for the device to become idle: {0}")]
    Idle(VulkanError),
    #[error("The frame scheduler has already been shut down")]
    ShutDown,
}

/// One batch of recorded work for the queue
pub struct Submission<'a, B: FrameBackend + ?Sized> {
    pub command_buffer: &'a B::CommandBuffer,
    /// Waited on before the `wait_stage` of the batch runs
    pub wait_semaphore: &'a B::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    /// Signaled once the batch has finished
    pub signal_semaphore: &'a B::Semaphore,
    /// Signaled once the batch has finished, lets the CPU know the slot is free again
    pub fence: &'a B::Fence,
}

/// GPU objects and queue operations the scheduler is built on
pub trait FrameBackend {
    type CommandBuffer;
    type Semaphore;
    type Fence;

    fn create_semaphore(&self) -> Result<Self::Semaphore, VulkanError>;
    fn create_fence(&self, signaled: bool) -> Result<Self::Fence, VulkanError>;
    fn allocate_command_buffer(&mut self) -> Result<Self::CommandBuffer, VulkanError>;

    fn wait_for_fence(
        &self,
        fence: &Self::Fence,
        timeout: FenceTimeout,
    ) -> Result<FenceStatus, VulkanError>;
    fn reset_fence(&self, fence: &Self::Fence) -> Result<(), VulkanError>;
    fn reset_command_buffer(&self, buffer: &mut Self::CommandBuffer) -> Result<(), VulkanError>;

    fn submit(&self, submission: Submission<'_, Self>) -> Result<(), VulkanError>;
    /// Blocks until all submitted work has finished
    fn wait_idle(&self) -> Result<(), VulkanError>;
}

/// Source of presentable images, usually a swapchain
pub trait Presenter<S> {
    /// Requests the next image, `signal` is signaled once the image can be rendered to
    fn acquire_next_image(
        &mut self,
        timeout: FenceTimeout,
        signal: &S,
    ) -> Result<AcquireOutcome, FrameError>;

    /// Queues `image_index` for presentation once `wait` is signaled
    fn present(&mut self, image_index: u32, wait: &S) -> Result<PresentOutcome, FrameError>;
}

/// What a frame's commands are recorded for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTarget {
    /// Frame slot owning the command buffer, selects per-frame resources
    pub slot: usize,
    /// Acquired swapchain image, selects the framebuffer
    pub image_index: u32,
}

/// Records the commands of a frame.
///
/// The buffer handed over has been reset, the recorder has to begin and end it.
/// Anything written once per frame, like uniform data, belongs to `target.slot`:
/// the slot's fence has signaled, while the image may still be read by an
/// older frame.
pub trait CommandRecorder<C> {
    fn record(&mut self, buffer: &mut C, target: FrameTarget) -> Result<(), FrameError>;
}

/// One resource per frame slot, looked up by [`FrameTarget::slot`]
pub struct SlotResources<T> {
    items: Vec<T>,
}

impl<T> SlotResources<T> {
    pub fn new(items: Vec<T>) -> SlotResources<T> {
        SlotResources { items }
    }

    /// Builds one resource for each of `frames_in_flight` slots, the first failure aborts
    pub fn build<E>(
        frames_in_flight: usize,
        mut create: impl FnMut(usize) -> Result<T, E>,
    ) -> Result<SlotResources<T>, E> {
        let items = (0..frames_in_flight)
            .map(&mut create)
            .collect::<Result<Vec<T>, E>>()?;

        Ok(SlotResources { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, target: FrameTarget) -> Result<&T, FrameError> {
        self.items
            .get(target.slot)
            .ok_or(FrameError::UnknownSlot(target.slot))
    }

    pub fn get_mut(&mut self, target: FrameTarget) -> Result<&mut T, FrameError> {
        self.items
            .get_mut(target.slot)
            .ok_or(FrameError::UnknownSlot(target.slot))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_timeout_is_distinct_from_any_bound() {
        assert_eq!(FenceTimeout::Infinite.as_nanos(), u64::MAX);
        assert_eq!(
            FenceTimeout::Bounded(Duration::from_secs(u64::MAX)).as_nanos(),
            u64::MAX - 1
        );
        assert_eq!(
            FenceTimeout::Bounded(Duration::from_millis(16)).as_nanos(),
            16_000_000
        );
    }

    #[test]
    fn slot_resources_ignore_the_image_index() {
        let resources = SlotResources::new(vec!["first", "second"]);

        let target = FrameTarget {
            slot: 1,
            image_index: 2,
        };
        assert_eq!(resources.get(target).ok(), Some(&"second"));

        let missing = FrameTarget {
            slot: 2,
            image_index: 0,
        };
        assert!(matches!(
            resources.get(missing),
            Err(FrameError::UnknownSlot(2))
        ));
    }

    #[test]
    fn building_slot_resources_stops_at_the_first_failure() {
        let mut attempted = Vec::new();
        let result = SlotResources::build(3, |slot| {
            attempted.push(slot);
            if slot == 1 {
                Err("out of memory")
            } else {
                Ok(slot * 10)
            }
        });

        assert!(matches!(result, Err("out of memory")));
        assert_eq!(attempted, vec![0, 1]);

        let built = SlotResources::build(2, |slot| Ok::<usize, ()>(slot * 10))
            .expect("nothing fails");
        assert_eq!(built.len(), 2);
        assert_eq!(built.iter().copied().collect::<Vec<usize>>(), vec![0, 10]);
    }

    #[test]
    fn default_timeout_is_one_second() {
        assert_eq!(
            FenceTimeout::default(),
            FenceTimeout::Bounded(Duration::from_secs(1))
        );
    }
}
