mod logical;
mod physical;
pub mod selection;

pub use logical::{LogicalDevice, LogicalDeviceError};
pub use physical::{PhysicalDevice, PhysicalDeviceError};
pub use selection::QueueFamilyIndices;
