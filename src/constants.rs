/// Title of the window opened by [`crate::app::App`]
pub const WINDOW_TITLE: &str = "Kiln";
pub const WINDOW_WIDTH: u32 = 1280;
pub const WINDOW_HEIGHT: u32 = 720;

/// Vertex shader loaded when no other path is configured, `build.rs` compiles it from
/// `shaders/quad.vert` when `glslc` is installed
pub const DEFAULT_VERTEX_SHADER: &str = "shaders/quad.vert.spv";
/// Fragment shader loaded when no other path is configured, compiled from `shaders/quad.frag`
pub const DEFAULT_FRAGMENT_SHADER: &str = "shaders/quad.frag.spv";

/// Radians per second the quad turns around the view axis
pub const ROTATION_SPEED: f32 = std::f32::consts::FRAC_PI_2;

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
