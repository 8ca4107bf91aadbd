//! This crate wraps [`winit`] behind a single owned window system handle

mod window;

pub use winit;

pub mod prelude {
    pub use crate::window::{Window, WindowBuilder, WindowError, WindowSystem};
}
