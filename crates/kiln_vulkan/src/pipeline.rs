use ash::vk;
use std::{ffi::CStr, rc::Rc};

use crate::{
    descriptors::DescriptorSetLayout, device::LogicalDevice, render_pass::RenderPass,
    shader::ShaderModule, vertex::Vertex, VulkanError,
};

/// Entry point every shader stage is expected to export
const SHADER_ENTRY_POINT: &[u8] = b"main\0";

/// Possible errors that could be returned while building a [Pipeline]
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("A pipeline can't be built without a {0} shader")]
    MissingShader(&'static str),
    #[error("Failed to create the Vulkan pipeline layout: {0}")]
    CantCreateLayout(VulkanError),
    #[error("Failed to create the Vulkan pipeline: {0}")]
    CantCreatePipeline(VulkanError),
}

/// Wraps the steps required to create a [Pipeline]
pub struct PipelineBuilder<'a> {
    vertex_shader: Option<&'a ShaderModule>,
    fragment_shader: Option<&'a ShaderModule>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new() -> PipelineBuilder<'a> {
        PipelineBuilder {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            set_layouts: Vec::new(),
        }
    }

    pub fn vertex_shader(mut self, shader: &'a ShaderModule) -> PipelineBuilder<'a> {
        self.vertex_shader = Some(shader);
        self
    }

    pub fn fragment_shader(mut self, shader: &'a ShaderModule) -> PipelineBuilder<'a> {
        self.fragment_shader = Some(shader);
        self
    }

    /// Reads vertices laid out as `V` from the buffer bound at binding 0
    pub fn vertex_input<V: Vertex>(mut self) -> PipelineBuilder<'a> {
        self.vertex_bindings = V::binding_descriptions();
        self.vertex_attributes = V::attribute_descriptions();
        self
    }

    /// Appends a descriptor set layout, sets are numbered in the order they are added
    pub fn descriptor_set_layout(mut self, layout: &DescriptorSetLayout) -> PipelineBuilder<'a> {
        self.set_layouts.push(layout.vk_handle());
        self
    }

    /// Creates a graphics pipeline for subpass 0 of `render_pass`.
    ///
    /// Draws filled triangle lists with back faces culled, counter clockwise triangles face
    /// the front. Viewport and scissor are dynamic.
    pub fn build(
        self,
        device: Rc<LogicalDevice>,
        render_pass: &RenderPass,
    ) -> Result<Pipeline, PipelineError> {
        let vertex_shader = self
            .vertex_shader
            .ok_or(PipelineError::MissingShader("vertex"))?;
        let fragment_shader = self
            .fragment_shader
            .ok_or(PipelineError::MissingShader("fragment"))?;

        let entry_point = unsafe { CStr::from_bytes_with_nul_unchecked(SHADER_ENTRY_POINT) };
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader.vk_handle())
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_shader.vk_handle())
                .name(entry_point)
                .build(),
        ];

        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_info = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_info = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisample_info = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ZERO)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build()];

        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state_info =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let layout_create_info =
            vk::PipelineLayoutCreateInfo::builder().set_layouts(&self.set_layouts);
        let layout = unsafe {
            device
                .vk_handle()
                .create_pipeline_layout(&layout_create_info, None)
                .map_err(|err| PipelineError::CantCreateLayout(err.into()))?
        };

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly_info)
            .viewport_state(&viewport_info)
            .rasterization_state(&rasterization_info)
            .multisample_state(&multisample_info)
            .color_blend_state(&color_blend_info)
            .dynamic_state(&dynamic_state_info)
            .layout(layout)
            .render_pass(render_pass.vk_handle())
            .subpass(0)
            .build();

        let result = unsafe {
            device.vk_handle().create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_create_info),
                None,
            )
        };
        let handle = result
            .map_err(|(_, err)| VulkanError::from(err))
            .and_then(|pipelines| {
                pipelines
                    .first()
                    .copied()
                    .ok_or(VulkanError::Other(vk::Result::ERROR_UNKNOWN))
            });
        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => {
                unsafe { device.vk_handle().destroy_pipeline_layout(layout, None) };
                return Err(PipelineError::CantCreatePipeline(err));
            }
        };

        Ok(Pipeline {
            layout,
            handle,
            device,
        })
    }
}

impl<'a> Default for PipelineBuilder<'a> {
    fn default() -> PipelineBuilder<'a> {
        PipelineBuilder::new()
    }
}

/// Represents a Graphics pipeline that can be used to draw to a surface
pub struct Pipeline {
    /// Opaque handle to Vulkan layout used to create the pipeline
    layout: vk::PipelineLayout,
    /// Opaque handle to Vulkan Pipeline
    handle: vk::Pipeline,
    /// Logical device this pipeline belongs to
    device: Rc<LogicalDevice>,
}

impl Pipeline {
    /// Creates a new [PipelineBuilder]
    pub fn builder<'a>() -> PipelineBuilder<'a> {
        PipelineBuilder::new()
    }
}

impl Pipeline {
    /// Returns the handle to the Vulkan pipeline
    pub(crate) fn vk_handle(&self) -> vk::Pipeline {
        self.handle
    }

    pub(crate) fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.vk_handle().destroy_pipeline(self.handle, None);
            self.device
                .vk_handle()
                .destroy_pipeline_layout(self.layout, None);
        };
    }
}
