use std::path::PathBuf;

use kiln_vulkan::{constants::MAX_FRAMES_IN_FLIGHT, prelude::*};
use kiln_window::prelude::*;

use crate::{constants, renderer::Renderer};

/// Startup options of an [App]
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Path to a precompiled SPIR-V vertex shader
    pub vertex_shader: PathBuf,
    /// Path to a precompiled SPIR-V fragment shader
    pub fragment_shader: PathBuf,
    pub clear_color: [f32; 4],
    pub frames_in_flight: usize,
    /// How long a frame waits for its slot to be released by the GPU
    pub throttle_timeout: FenceTimeout,
}

impl Default for AppConfig {
    fn default() -> AppConfig {
        AppConfig {
            width: constants::WINDOW_WIDTH,
            height: constants::WINDOW_HEIGHT,
            title: String::from(constants::WINDOW_TITLE),
            vertex_shader: PathBuf::from(constants::DEFAULT_VERTEX_SHADER),
            fragment_shader: PathBuf::from(constants::DEFAULT_FRAGMENT_SHADER),
            clear_color: constants::CLEAR_COLOR,
            frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            throttle_timeout: FenceTimeout::default(),
        }
    }
}

/// Errors that stop the app, each one names the step that failed
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Failed to create the window")]
    Window(#[from] WindowError),
    #[error("Failed to create the Vulkan instance")]
    Instance(#[from] InstanceError),
    #[error("Failed to set up the debug messenger")]
    Debugger(#[from] DebuggerError),
    #[error("Failed to create the window surface")]
    Surface(#[from] SurfaceError),
    #[error("Failed to select a physical device")]
    PhysicalDevice(#[from] PhysicalDeviceError),
    #[error("Failed to create the logical device")]
    LogicalDevice(#[from] LogicalDeviceError),
    #[error("Failed to build the swapchain")]
    Swapchain(#[from] SwapchainError),
    #[error("Failed to load a shader")]
    Shader(#[from] ShaderError),
    #[error("Failed to upload the mesh")]
    Buffer(#[from] BufferError),
    #[error("Failed to set up the pipeline and per-frame uniforms")]
    Recorder(#[from] RecorderError),
    #[error("Failed to set up command buffers")]
    CommandBuffer(#[from] CommandBufferError),
    #[error("Failed to draw a frame")]
    Frame(#[from] FrameError),
    #[error("The device reported an error")]
    Vulkan(#[from] VulkanError),
}

/// A window with a spinning quad drawn into it every frame
pub struct App {
    // Declared first so every Vulkan object is gone before the window it draws to
    renderer: Renderer,
    window: Window,
    window_system: WindowSystem,
}

impl App {
    /// Opens the window and sets up everything needed to draw into it
    pub fn new(config: AppConfig) -> Result<App, AppError> {
        let window_system = WindowSystem::init();
        let window = Window::builder()
            .width(config.width)
            .height(config.height)
            .title(config.title.as_str())
            .build(&window_system)?;

        let renderer = Renderer::new(&window, &config)?;
        log::info!("{} started", config.title);

        Ok(App {
            renderer,
            window,
            window_system,
        })
    }

    /// Draws frames until the window is closed or drawing fails.
    ///
    /// The GPU is idle once this returns, whichever way the loop ended.
    pub fn run(&mut self) -> Result<(), AppError> {
        let App {
            renderer,
            window,
            window_system,
        } = self;

        let result = window_system.run(window, |window| renderer.draw(window));
        let shutdown = renderer.shutdown();
        log::info!("Render loop finished");

        result.and(shutdown)
    }
}
