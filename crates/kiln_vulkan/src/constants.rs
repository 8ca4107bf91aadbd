/// Controls whether validation layers and the debug messenger are enabled
pub const ENABLE_VALIDATION_LAYERS: bool = cfg!(debug_assertions);
/// Validation layers to enable when [`ENABLE_VALIDATION_LAYERS`] is set
pub const VALIDATION_LAYERS: [&str; 1] = ["VK_LAYER_KHRONOS_validation"];
/// Device extensions a physical device has to support before it is picked
pub const DEVICE_EXTENSIONS: [&str; 1] = ["VK_KHR_swapchain"];
/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
/// Name reported to the driver for both the application and the engine
pub const APPLICATION_NAME: &str = "Kiln";
