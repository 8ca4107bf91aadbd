mod buffer;
mod pool;

pub use buffer::{CommandBuffer, CommandBufferError, CommandBufferLevel, CommandBufferState};
pub use pool::CommandPool;
