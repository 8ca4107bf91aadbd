use ash::vk;
use memoffset::offset_of;

/// Describes how a vertex type is laid out in a vertex buffer
pub trait Vertex: Copy {
    fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription>;
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription>;
}

/// 2D position with a color, interpolated across the primitive
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredVertex {
    pub position: [f32; 2],
    pub color: [f32; 3],
}

impl ColoredVertex {
    pub const fn new(position: [f32; 2], color: [f32; 3]) -> ColoredVertex {
        ColoredVertex { position, color }
    }
}

impl Vertex for ColoredVertex {
    fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<ColoredVertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(ColoredVertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(ColoredVertex, color) as u32,
            },
        ]
    }
}

/// Quad made of two counter clockwise triangles, one color per corner
pub const QUAD_VERTICES: [ColoredVertex; 4] = [
    ColoredVertex::new([-0.5, -0.5], [1.0, 0.0, 0.0]),
    ColoredVertex::new([0.5, -0.5], [0.0, 1.0, 0.0]),
    ColoredVertex::new([0.5, 0.5], [0.0, 0.0, 1.0]),
    ColoredVertex::new([-0.5, 0.5], [1.0, 1.0, 1.0]),
];

pub const QUAD_INDICES: [u16; 6] = [0, 2, 1, 2, 0, 3];
