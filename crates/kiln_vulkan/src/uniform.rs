/// Column major 4x4 matrix, the layout GLSL's `mat4` expects
pub type Matrix4 = [[f32; 4]; 4];

pub const IDENTITY: Matrix4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Uniform block at binding 0 of the vertex shader.
///
/// Matches the std140 block `{ mat4 model; mat4 projection_view; }`.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformUniform {
    pub model: Matrix4,
    pub projection_view: Matrix4,
}

impl Default for TransformUniform {
    fn default() -> TransformUniform {
        TransformUniform {
            model: IDENTITY,
            projection_view: IDENTITY,
        }
    }
}
