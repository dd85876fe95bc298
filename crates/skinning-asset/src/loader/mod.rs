use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use glam::Mat4;

use self::gltf::ParseError;

/// glTF 2.0 / GLB parser built on the `gltf` crate.
pub mod gltf;

/// Conversion of parsed assets into [`crate::model::Model`].
pub mod model;

pub(crate) mod texture;

#[cfg(test)]
pub(crate) mod fixture;

#[inline]
pub(crate) fn chunk_vec2<T: Copy>(data: &[T]) -> Vec<[T; 2]> {
    data.chunks_exact(2).map(|item| [item[0], item[1]]).collect()
}

#[inline]
pub(crate) fn chunk_vec3<T: Copy>(data: &[T]) -> Vec<[T; 3]> {
    data.chunks_exact(3)
        .map(|item| [item[0], item[1], item[2]])
        .collect()
}

#[inline]
pub(crate) fn chunk_vec4<T: Copy>(data: &[T]) -> Vec<[T; 4]> {
    data.chunks_exact(4)
        .map(|item| [item[0], item[1], item[2], item[3]])
        .collect()
}

#[inline]
pub(crate) fn chunk_mat4(data: &[f32]) -> Vec<Mat4> {
    data.chunks_exact(16).map(Mat4::from_cols_slice).collect()
}

/// How to pick the root joint of a skin that has no usable `skeleton` node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RootPolicy {
    /// The joint no other joint of the skin lists as a child.
    #[default]
    Hierarchy,
    /// Always joint 0.
    FirstJoint,
}

#[derive(Debug, Clone)]
pub struct LoadParams {
    pub root_policy: RootPolicy,
    /// Treat an image file that cannot be found like an image that cannot be
    /// decoded, instead of failing the parse.
    pub placeholder_on_missing_image: bool,
    pub model_file_name: String,
    pub model_file_extension: bool,
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            root_policy: RootPolicy::default(),
            placeholder_on_missing_image: true,
            model_file_name: String::from("model"),
            model_file_extension: true,
        }
    }
}

impl LoadParams {
    pub(crate) fn model_file_name(&self, extension: &str) -> String {
        if self.model_file_extension {
            format!("{}.{}", self.model_file_name, extension)
        } else {
            self.model_file_name.clone()
        }
    }
}

#[derive(Debug)]
pub enum LoadError<E> {
    Parse(ParseError<E>),
    Build(model::BuildError),
}

impl<E: Display> Display for LoadError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Parse(error) => Display::fmt(error, f),
            LoadError::Build(error) => Display::fmt(error, f),
        }
    }
}

impl<E: Error> Error for LoadError<E> {}

impl<E> From<ParseError<E>> for LoadError<E> {
    fn from(value: ParseError<E>) -> Self {
        Self::Parse(value)
    }
}

impl<E> From<model::BuildError> for LoadError<E> {
    fn from(value: model::BuildError) -> Self {
        Self::Build(value)
    }
}
