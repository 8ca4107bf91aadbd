use ash::vk;
use std::rc::Rc;

use crate::{buffer::Buffer, device::LogicalDevice, pipeline::Pipeline, VulkanError};

#[derive(thiserror::Error, Debug)]
pub enum CommandBufferError {
    #[error("The command buffer is in an incorrect state, should be in the {0} state")]
    IncorrectState(CommandBufferState),
    #[error("A {0} command that was started was never ended prior to finishing recording the command buffer")]
    UnfinishedCommand(&'static str),
    #[error(
        "A {0} command is already started, end that one before starting another of the same type"
    )]
    CommandAlreadyStarted(&'static str),
    #[error("A {0} command can't be recorded inside a render pass")]
    InsideRenderPass(&'static str),
    #[error("Failed to create a Vulkan command pool: {0}")]
    CantCreatePool(VulkanError),
    #[error(transparent)]
    DeviceError(VulkanError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandBufferState {
    Initial,
    Recording,
    Executable,
}

impl std::fmt::Display for CommandBufferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandBufferState::Initial => write!(f, "Initial"),
            CommandBufferState::Recording => write!(f, "Recording"),
            CommandBufferState::Executable => write!(f, "Executable"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

impl From<CommandBufferLevel> for vk::CommandBufferLevel {
    fn from(level: CommandBufferLevel) -> vk::CommandBufferLevel {
        match level {
            CommandBufferLevel::Primary => vk::CommandBufferLevel::PRIMARY,
            CommandBufferLevel::Secondary => vk::CommandBufferLevel::SECONDARY,
        }
    }
}

/// Command buffer allocated from a [`CommandPool`](super::CommandPool).
///
/// The pool owns the memory, so the buffer is freed when the pool is destroyed.
pub struct CommandBuffer {
    state: CommandBufferState,
    started_render_pass: bool,

    handle: vk::CommandBuffer,
    device: Rc<LogicalDevice>,
}

impl CommandBuffer {
    pub(crate) fn new(handle: vk::CommandBuffer, device: Rc<LogicalDevice>) -> CommandBuffer {
        CommandBuffer {
            state: CommandBufferState::Initial,
            started_render_pass: false,

            handle,
            device,
        }
    }
}

impl CommandBuffer {
    pub(crate) fn vk_handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }
}

impl CommandBuffer {
    /// Returns the buffer to the initial state so it can be recorded again
    pub fn reset(&mut self) -> Result<(), VulkanError> {
        unsafe {
            self.device
                .vk_handle()
                .reset_command_buffer(self.handle, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::from)?;
        };
        self.state = CommandBufferState::Initial;
        self.started_render_pass = false;

        Ok(())
    }

    pub fn begin(&mut self) -> Result<(), CommandBufferError> {
        self.begin_with(vk::CommandBufferUsageFlags::empty())
    }

    /// Begins a buffer that is submitted once and then freed or reset
    pub fn begin_one_time(&mut self) -> Result<(), CommandBufferError> {
        self.begin_with(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
    }

    fn begin_with(&mut self, flags: vk::CommandBufferUsageFlags) -> Result<(), CommandBufferError> {
        if self.state != CommandBufferState::Initial {
            return Err(CommandBufferError::IncorrectState(
                CommandBufferState::Initial,
            ));
        }

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);

        unsafe {
            self.device
                .vk_handle()
                .begin_command_buffer(self.handle, &begin_info)
                .map_err(|err| CommandBufferError::DeviceError(err.into()))?;
        };
        self.state = CommandBufferState::Recording;

        Ok(())
    }

    pub fn end(&mut self) -> Result<(), CommandBufferError> {
        if self.state != CommandBufferState::Recording {
            return Err(CommandBufferError::IncorrectState(
                CommandBufferState::Recording,
            ));
        }

        if self.started_render_pass {
            return Err(CommandBufferError::UnfinishedCommand("render pass"));
        }

        unsafe {
            self.device
                .vk_handle()
                .end_command_buffer(self.handle)
                .map_err(|err| CommandBufferError::DeviceError(err.into()))?;
        };
        self.state = CommandBufferState::Executable;

        Ok(())
    }

    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Result<(), CommandBufferError> {
        if self.state != CommandBufferState::Recording {
            return Err(CommandBufferError::IncorrectState(
                CommandBufferState::Recording,
            ));
        }
        if self.started_render_pass {
            return Err(CommandBufferError::CommandAlreadyStarted("render pass"));
        }

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color.map(|channel| channel.clamp(0.0, 1.0)),
            },
        }];

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            self.device.vk_handle().cmd_begin_render_pass(
                self.handle,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        };

        self.started_render_pass = true;
        Ok(())
    }

    pub fn end_render_pass(&mut self) {
        if self.started_render_pass {
            unsafe {
                self.device.vk_handle().cmd_end_render_pass(self.handle);
            };
            self.started_render_pass = false;
        }
    }

    pub fn bind_pipeline(&mut self, pipeline: &Pipeline) {
        unsafe {
            self.device.vk_handle().cmd_bind_pipeline(
                self.handle,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.vk_handle(),
            )
        };
    }

    pub fn bind_vertex_buffer<T: Copy>(&mut self, buffer: &Buffer<T>) {
        unsafe {
            self.device.vk_handle().cmd_bind_vertex_buffers(
                self.handle,
                0,
                &[buffer.vk_handle()],
                &[0],
            )
        };
    }

    pub fn bind_index_buffer(&mut self, buffer: &Buffer<u16>) {
        unsafe {
            self.device.vk_handle().cmd_bind_index_buffer(
                self.handle,
                buffer.vk_handle(),
                0,
                vk::IndexType::UINT16,
            )
        };
    }

    /// Binds `descriptor_set` as set 0 of the pipeline's layout
    pub fn bind_descriptor_set(&mut self, pipeline: &Pipeline, descriptor_set: vk::DescriptorSet) {
        unsafe {
            self.device.vk_handle().cmd_bind_descriptor_sets(
                self.handle,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout(),
                0,
                &[descriptor_set],
                &[],
            )
        };
    }

    /// Records a copy of the first `size` bytes of `source` into `destination`
    pub fn copy_buffer(
        &mut self,
        source: vk::Buffer,
        destination: vk::Buffer,
        size: vk::DeviceSize,
    ) -> Result<(), CommandBufferError> {
        if self.state != CommandBufferState::Recording {
            return Err(CommandBufferError::IncorrectState(
                CommandBufferState::Recording,
            ));
        }
        if self.started_render_pass {
            return Err(CommandBufferError::InsideRenderPass("copy"));
        }

        let regions = [vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        }];
        unsafe {
            self.device
                .vk_handle()
                .cmd_copy_buffer(self.handle, source, destination, &regions);
        };

        Ok(())
    }

    /// Sets the dynamic viewport and scissor to cover all of `extent`
    pub fn set_viewport_and_scissor(&mut self, extent: vk::Extent2D) {
        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];

        unsafe {
            self.device
                .vk_handle()
                .cmd_set_viewport(self.handle, 0, &viewports);
            self.device
                .vk_handle()
                .cmd_set_scissor(self.handle, 0, &scissors);
        };
    }

    pub fn draw_indexed(&self, index_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .vk_handle()
                .cmd_draw_indexed(self.handle, index_count, instance_count, 0, 0, 0);
        };
    }
}
