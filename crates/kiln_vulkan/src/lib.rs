//! Thin Vulkan wrappers built on [`ash`] plus the frame scheduler that drives the
//! double-buffered render loop.

extern crate log;

use ash::vk;

mod buffer;
mod commands;
pub mod constants;
mod debugger;
mod descriptors;
mod device;
pub mod frame;
mod framebuffer;
mod instance;
mod mesh;
mod pipeline;
mod recorder;
mod render_pass;
mod shader;
mod surface;
mod swapchain;
mod sync;
mod uniform;
mod utils;
mod vertex;

/// Named Vulkan result codes that the wrappers report
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VulkanError {
    #[error("A host memory allocation has failed")]
    OutOfHostMemory,
    #[error("A device memory allocation has failed")]
    OutOfDeviceMemory,
    #[error("Initialization of an object could not be completed")]
    InitializationFailed,
    #[error("The logical or physical device has been lost")]
    DeviceLost,
    #[error("A requested layer is not present or could not be loaded")]
    LayerNotPresent,
    #[error("A requested extension is not supported")]
    ExtensionNotPresent,
    #[error("A requested feature is not supported")]
    FeatureNotPresent,
    #[error("The driver is incompatible with the requested Vulkan version")]
    IncompatibleDriver,
    #[error("The surface is no longer available")]
    SurfaceLost,
    #[error("The surface has changed and no longer matches the swapchain")]
    OutOfDate,
    #[error("The swapchain no longer matches the surface properties exactly")]
    Suboptimal,
    #[error("A wait operation did not complete in the given time")]
    Timeout,
    #[error("Vulkan returned {0}")]
    Other(vk::Result),
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> VulkanError {
        match result {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY => VulkanError::OutOfHostMemory,
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => VulkanError::OutOfDeviceMemory,
            vk::Result::ERROR_INITIALIZATION_FAILED => VulkanError::InitializationFailed,
            vk::Result::ERROR_DEVICE_LOST => VulkanError::DeviceLost,
            vk::Result::ERROR_LAYER_NOT_PRESENT => VulkanError::LayerNotPresent,
            vk::Result::ERROR_EXTENSION_NOT_PRESENT => VulkanError::ExtensionNotPresent,
            vk::Result::ERROR_FEATURE_NOT_PRESENT => VulkanError::FeatureNotPresent,
            vk::Result::ERROR_INCOMPATIBLE_DRIVER => VulkanError::IncompatibleDriver,
            vk::Result::ERROR_SURFACE_LOST_KHR => VulkanError::SurfaceLost,
            vk::Result::ERROR_OUT_OF_DATE_KHR => VulkanError::OutOfDate,
            vk::Result::SUBOPTIMAL_KHR => VulkanError::Suboptimal,
            vk::Result::TIMEOUT => VulkanError::Timeout,
            other => VulkanError::Other(other),
        }
    }
}

pub mod prelude {
    pub use crate::buffer::{Buffer, BufferError};
    pub use crate::commands::{
        CommandBuffer, CommandBufferError, CommandBufferLevel, CommandBufferState, CommandPool,
    };
    pub use crate::debugger::{Debugger, DebuggerError};
    pub use crate::descriptors::{
        DescriptorError, DescriptorPool, DescriptorSetBinding, DescriptorSetLayout,
    };
    pub use crate::device::{
        LogicalDevice, LogicalDeviceError, PhysicalDevice, PhysicalDeviceError,
        QueueFamilyIndices,
    };
    pub use crate::frame::{
        AcquireOutcome, CommandRecorder, FenceStatus, FenceTimeout, FrameBackend, FrameError,
        FrameScheduler, FrameSchedulerBuilder, FrameStatus, FrameTarget, PresentOutcome,
        Presenter, SlotResources, Submission, VulkanFrameBackend,
    };
    pub use crate::framebuffer::Framebuffer;
    pub use crate::instance::{Instance, InstanceError};
    pub use crate::mesh::{Mesh, MeshError};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineError};
    pub use crate::recorder::{MeshRecorder, RecorderError};
    pub use crate::render_pass::RenderPass;
    pub use crate::shader::{ShaderError, ShaderModule};
    pub use crate::surface::{Surface, SurfaceError, SurfaceQueryType};
    pub use crate::swapchain::{Swapchain, SwapchainError};
    pub use crate::sync::{Fence, Semaphore, SemaphoreRole, SyncError};
    pub use crate::uniform::{Matrix4, TransformUniform};
    pub use crate::vertex::{ColoredVertex, Vertex, QUAD_INDICES, QUAD_VERTICES};
    pub use crate::VulkanError;
}

/// Device selection policies, usable without a Vulkan driver
pub mod selection {
    pub use crate::device::selection::*;
}

/// Swapchain negotiation policies, usable without a Vulkan driver
pub mod policy {
    pub use crate::swapchain::{
        choose_extent, choose_image_count, choose_present_mode, choose_surface_format,
    };
}
