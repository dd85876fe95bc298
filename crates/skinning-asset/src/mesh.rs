use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::{render::GpuHandle, texture::Texture};

pub const MAX_BONE_INFLUENCE: usize = 4;

/// One skinned vertex. Unweighted vertices keep zero joints and weights.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
    pub joints: [u32; MAX_BONE_INFLUENCE],
    pub weights: [f32; MAX_BONE_INFLUENCE],
}

impl Vertex {
    pub fn is_weighted(&self) -> bool {
        self.weights.iter().any(|weight| *weight != 0.0)
    }
}

/// Handles handed out by the renderer after [`crate::render::RenderBackend::upload_mesh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshGpuHandles {
    pub vertex_buffer: GpuHandle,
    pub index_buffer: GpuHandle,
    pub texture_views: Vec<GpuHandle>,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub textures: Vec<Arc<Texture>>,
    pub gpu: Option<MeshGpuHandles>,
}

impl Mesh {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
