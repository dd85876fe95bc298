//! Skinned model assets and skeletal animation playback.
//!
//! This library loads glTF 2.0 and GLB files into meshes, skeletons and
//! animations, and evaluates an animation each tick into a fixed-size array
//! of skinning matrices ready for a shader. Resource loading goes through an
//! archive abstraction, so a model and its sidecar files can come from a
//! directory or from a single packed archive.
//!
//! GPU work is left to the caller through [`render::RenderBackend`].
//!
pub mod accessor;
pub mod animation;
pub mod animator;
pub mod archive;
pub mod index;
/// Model loaders
pub mod loader;
pub mod mesh;
pub mod model;
pub mod node;
pub mod render;
pub mod sampler;
pub mod skin;
pub mod texture;

pub use animator::{Animator, AnimatorError, PlaybackState, MAX_JOINTS};
pub use loader::{LoadError, LoadParams, RootPolicy};
pub use model::Model;
