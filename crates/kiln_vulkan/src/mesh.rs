use ash::vk;
use std::rc::Rc;

use crate::{
    buffer::{Buffer, BufferError},
    commands::CommandPool,
    device::LogicalDevice,
    vertex::Vertex,
};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MeshError {
    #[error("A mesh needs at least one triangle")]
    Empty,
    #[error("{0} indices don't make whole triangles")]
    PartialTriangle(usize),
    #[error("Index {index} points past the last of {vertex_count} vertices")]
    IndexOutOfRange { index: u16, vertex_count: usize },
}

/// Checks that `indices` describe whole triangles over `vertex_count` vertices
pub fn check_indices(vertex_count: usize, indices: &[u16]) -> Result<(), MeshError> {
    if indices.is_empty() {
        return Err(MeshError::Empty);
    }
    if indices.len() % 3 != 0 {
        return Err(MeshError::PartialTriangle(indices.len()));
    }
    match indices.iter().find(|&&index| index as usize >= vertex_count) {
        Some(&index) => Err(MeshError::IndexOutOfRange {
            index,
            vertex_count,
        }),
        None => Ok(()),
    }
}

/// Indexed triangle list in device local vertex and index buffers
pub struct Mesh<V: Vertex> {
    index_count: u32,
    indices: Buffer<u16>,
    vertices: Buffer<V>,
}

impl<V: Vertex> Mesh<V> {
    /// Uploads `vertices` and `indices` through staging buffers on `transfer_pool`
    pub fn upload(
        device: Rc<LogicalDevice>,
        transfer_pool: &mut CommandPool,
        vertices: &[V],
        indices: &[u16],
    ) -> Result<Mesh<V>, BufferError> {
        check_indices(vertices.len(), indices)?;

        let vertices = Buffer::with_data(
            device.clone(),
            transfer_pool,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vertices,
        )?;
        let index_buffer = Buffer::with_data(
            device,
            transfer_pool,
            vk::BufferUsageFlags::INDEX_BUFFER,
            indices,
        )?;
        log::debug!(
            "Uploaded mesh with {} vertices and {} indices",
            vertices.len(),
            indices.len()
        );

        Ok(Mesh {
            index_count: indices.len() as u32,
            indices: index_buffer,
            vertices,
        })
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertices(&self) -> &Buffer<V> {
        &self.vertices
    }

    pub fn indices(&self) -> &Buffer<u16> {
        &self.indices
    }
}
