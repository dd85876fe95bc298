//! The renderer-facing side of a loaded model.
//!
//! GPU resources are created by whoever implements [`RenderBackend`]; this
//! crate only keeps the opaque handles it gets back.

use std::fmt::{self, Display, Formatter};

use crate::{mesh::Mesh, texture::Texture};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuHandle(pub u64);

impl Display for GpuHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "gpu#{}", self.0)
    }
}

pub trait RenderBackend {
    type Error;

    /// Upload vertex and index data, returning the vertex and index buffer handles.
    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<(GpuHandle, GpuHandle), Self::Error>;

    fn create_texture_view(&mut self, texture: &Texture) -> Result<GpuHandle, Self::Error>;
}
