//! Draws a spinning quad through Vulkan with a double-buffered frame loop.
//!
//! The quad lives in device local vertex and index buffers, its transform in one uniform
//! buffer per frame in flight.
//!
//! The Vulkan objects and the frame scheduler live in [`kiln_vulkan`], the window in
//! [`kiln_window`]. This crate wires them together into an [`app::App`].

pub use kiln_vulkan;
pub use kiln_window;

pub mod app;
pub mod constants;

mod renderer;
