use ash::vk;
use std::rc::Rc;

use crate::{
    buffer::{Buffer, BufferError},
    commands::CommandBuffer,
    descriptors::{DescriptorError, DescriptorPool, DescriptorSetBinding, DescriptorSetLayout},
    device::LogicalDevice,
    frame::{CommandRecorder, FrameError, FrameTarget, SlotResources},
    framebuffer::Framebuffer,
    mesh::Mesh,
    pipeline::{Pipeline, PipelineError},
    render_pass::RenderPass,
    shader::ShaderModule,
    swapchain::{Swapchain, SwapchainError},
    uniform::TransformUniform,
    vertex::Vertex,
};

/// Binding the transform uniform block is read from
const TRANSFORM_BINDING: u32 = 0;

#[derive(thiserror::Error, Debug)]
pub enum RecorderError {
    #[error("A recorder needs uniforms for at least one frame in flight")]
    NoFramesInFlight,
    #[error(transparent)]
    Swapchain(#[from] SwapchainError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Uniform buffer of one frame slot and the descriptor set pointing at it
struct FrameUniform {
    descriptor_set: vk::DescriptorSet,
    buffer: Buffer<TransformUniform>,
}

/// Records an indexed mesh drawn with a per-frame transform, cleared to a fixed color.
///
/// Framebuffers are picked by the acquired image index, uniform buffers and descriptor
/// sets by the frame slot.
pub struct MeshRecorder<V: Vertex> {
    framebuffers: Vec<Framebuffer>,
    clear_color: [f32; 4],
    transform: TransformUniform,

    // Sets are freed with the pool, buffers after it
    _descriptor_pool: DescriptorPool,
    uniforms: SlotResources<FrameUniform>,
    mesh: Mesh<V>,
    pipeline: Pipeline,
    _descriptor_set_layout: DescriptorSetLayout,
    render_pass: RenderPass,
    device: Rc<LogicalDevice>,
}

impl<V: Vertex> MeshRecorder<V> {
    /// Creates the render pass, pipeline and per-frame uniforms to draw `mesh` into the
    /// images of `swapchain`
    pub fn new(
        device: Rc<LogicalDevice>,
        swapchain: &Swapchain,
        shaders: (&ShaderModule, &ShaderModule),
        mesh: Mesh<V>,
        frames_in_flight: usize,
        clear_color: [f32; 4],
    ) -> Result<MeshRecorder<V>, RecorderError> {
        if frames_in_flight == 0 {
            return Err(RecorderError::NoFramesInFlight);
        }

        let render_pass = RenderPass::new(device.clone(), swapchain.format())?;
        let descriptor_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[DescriptorSetBinding::uniform_buffer(
                TRANSFORM_BINDING,
                vk::ShaderStageFlags::VERTEX,
            )],
        )?;

        let (vertex_shader, fragment_shader) = shaders;
        let pipeline = Pipeline::builder()
            .vertex_shader(vertex_shader)
            .fragment_shader(fragment_shader)
            .vertex_input::<V>()
            .descriptor_set_layout(&descriptor_set_layout)
            .build(device.clone(), &render_pass)?;

        let descriptor_pool = DescriptorPool::for_layout(
            device.clone(),
            &descriptor_set_layout,
            frames_in_flight as u32,
        )?;
        let descriptor_sets = descriptor_pool.allocate(&descriptor_set_layout, frames_in_flight)?;
        let uniforms = SlotResources::build(frames_in_flight, |slot| {
            let mut buffer = Buffer::new(
                device.clone(),
                1,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            // Stays mapped, the slot's fence guards every write
            buffer.map()?;
            buffer.write(&[TransformUniform::default()])?;

            let descriptor_set = descriptor_sets[slot];
            descriptor_pool.write_uniform_buffer(descriptor_set, TRANSFORM_BINDING, &buffer);

            Ok::<FrameUniform, BufferError>(FrameUniform {
                descriptor_set,
                buffer,
            })
        })?;
        log::debug!("Created {} per-frame uniform buffers", uniforms.len());

        let mut recorder = MeshRecorder {
            framebuffers: Vec::new(),
            clear_color,
            transform: TransformUniform::default(),

            _descriptor_pool: descriptor_pool,
            uniforms,
            mesh,
            pipeline,
            _descriptor_set_layout: descriptor_set_layout,
            render_pass,
            device,
        };
        recorder.rebuild_framebuffers(swapchain)?;

        Ok(recorder)
    }

    /// Recreates the framebuffers for the images of a rebuilt swapchain
    pub fn rebuild_framebuffers(&mut self, swapchain: &Swapchain) -> Result<(), SwapchainError> {
        self.framebuffers.clear();
        let extent = swapchain.extent();

        for &image_view in swapchain.image_views() {
            self.framebuffers.push(Framebuffer::new(
                self.device.clone(),
                &self.render_pass,
                image_view,
                extent,
            )?);
        }
        log::trace!("Created {} framebuffers", self.framebuffers.len());

        Ok(())
    }

    /// Transform written to the uniform buffer of every frame recorded from now on
    pub fn set_transform(&mut self, transform: TransformUniform) {
        self.transform = transform;
    }
}

impl<V: Vertex> CommandRecorder<CommandBuffer> for MeshRecorder<V> {
    fn record(&mut self, buffer: &mut CommandBuffer, target: FrameTarget) -> Result<(), FrameError> {
        let framebuffer = self
            .framebuffers
            .get(target.image_index as usize)
            .ok_or(FrameError::UnknownImage(target.image_index))?;

        let uniform = self.uniforms.get_mut(target)?;
        uniform.buffer.write(&[self.transform])?;

        buffer.begin()?;
        buffer.begin_render_pass(
            self.render_pass.vk_handle(),
            framebuffer.vk_handle(),
            framebuffer.extent(),
            self.clear_color,
        )?;
        buffer.bind_pipeline(&self.pipeline);
        buffer.set_viewport_and_scissor(framebuffer.extent());
        buffer.bind_vertex_buffer(self.mesh.vertices());
        buffer.bind_index_buffer(self.mesh.indices());
        buffer.bind_descriptor_set(&self.pipeline, uniform.descriptor_set);
        buffer.draw_indexed(self.mesh.index_count(), 1);
        buffer.end_render_pass();
        buffer.end()?;

        Ok(())
    }
}
