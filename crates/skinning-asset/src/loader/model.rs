use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use glam::{Mat4, Quat, Vec3};
use gltf::mesh::Mode;
use log::{debug, info, warn};

use crate::{
    accessor::{AccessorReader, DecodeError},
    animation::{Animation, AnimationChannel, ChannelPath, ChannelValues, Interpolation, Track},
    mesh::{Mesh, Vertex, MAX_BONE_INFLUENCE},
    model::Model,
    node::DecomposedTransform,
    skin::{Joint, Skeleton},
    texture::Texture,
};

use super::{
    gltf::{AnimationDesc, MeshDesc, ParsedAsset, PrimitiveDesc, SkinDesc},
    texture::TextureLoader,
    LoadParams, RootPolicy,
};

#[derive(Debug)]
pub enum BuildError {
    MissingPositions {
        mesh: usize,
        primitive: usize,
    },
    Decode {
        what: String,
        source: DecodeError,
    },
    IndexOutOfRange {
        mesh: usize,
        index: u32,
        vertex_count: usize,
    },
    BadInverseBindMatrices {
        skin: usize,
        expected: usize,
        actual: usize,
    },
    ChannelLengthMismatch {
        animation: usize,
        channel: usize,
        times: usize,
        values: usize,
    },
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::MissingPositions { mesh, primitive } => write!(
                f,
                "Primitive #{} of mesh #{} has no POSITION attribute",
                primitive, mesh
            ),
            BuildError::Decode { what, source } => write!(f, "Bad {}: {}", what, source),
            BuildError::IndexOutOfRange {
                mesh,
                index,
                vertex_count,
            } => write!(
                f,
                "Index {} of mesh #{} out of range of {} vertices",
                index, mesh, vertex_count
            ),
            BuildError::BadInverseBindMatrices {
                skin,
                expected,
                actual,
            } => write!(
                f,
                "Skin #{} has {} joints, but {} inverse bind matrices",
                skin, expected, actual
            ),
            BuildError::ChannelLengthMismatch {
                animation,
                channel,
                times,
                values,
            } => write!(
                f,
                "Channel #{} of animation #{} has {} keyframe times, but {} values",
                channel, animation, times, values
            ),
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BuildError::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Scale each weight set to sum to one. Vertices without any weight lose
/// their joint indices too.
fn normalize_weights(vertex: &mut Vertex) {
    let sum: f32 = vertex.weights.iter().sum();
    if sum <= 0.0 {
        vertex.weights = [0.0; MAX_BONE_INFLUENCE];
        vertex.joints = [0; MAX_BONE_INFLUENCE];
    } else if (sum - 1.0).abs() > f32::EPSILON {
        for weight in &mut vertex.weights {
            *weight /= sum;
        }
    }
}

fn track<T: Copy>(values: Vec<T>, cubic: bool) -> Track<T> {
    if cubic {
        Track::from_triplets(values)
    } else {
        Track::new(values)
    }
}

pub struct ModelBuilder<'a> {
    asset: &'a ParsedAsset,
    params: &'a LoadParams,
    textures: TextureLoader,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(asset: &'a ParsedAsset, params: &'a LoadParams) -> Self {
        Self {
            asset,
            params,
            textures: TextureLoader::default(),
        }
    }

    fn read<T>(
        &self,
        accessor: usize,
        what: impl FnOnce() -> String,
        read: impl FnOnce(AccessorReader<'a>) -> Result<Vec<T>, DecodeError>,
    ) -> Result<Vec<T>, BuildError> {
        self.asset
            .reader(accessor)
            .and_then(read)
            .map_err(|source| BuildError::Decode {
                what: what(),
                source,
            })
    }

    /// Read an attribute that may be absent. Any failure, or a short array,
    /// leaves the affected vertices at the default value.
    fn optional_attribute<T: Clone + Default>(
        &self,
        accessor: Option<usize>,
        name: &str,
        vertex_count: usize,
        read: impl FnOnce(AccessorReader<'a>) -> Result<Vec<T>, DecodeError>,
    ) -> Option<Vec<T>> {
        let accessor = accessor?;
        let mut values = match self.asset.reader(accessor).and_then(read) {
            Ok(values) => values,
            Err(error) => {
                warn!("Attribute {} unavailable: {}", name, error);
                return None;
            }
        };
        if values.len() < vertex_count {
            warn!(
                "Attribute {} has {} values for {} vertices, filling with defaults",
                name,
                values.len(),
                vertex_count
            );
        }
        values.resize(vertex_count, T::default());
        Some(values)
    }

    /// Base color texture of `material`, if it has one.
    fn material_texture(&mut self, material: usize) -> Option<Arc<Texture>> {
        let asset = self.asset;
        let texture = asset.materials.get(material)?.base_color_texture?;
        let image = *asset.textures.get(texture)?;
        let desc = asset.images.get(image)?;
        Some(self.textures.load(image, desc))
    }

    fn build_primitive(
        &mut self,
        mesh_index: usize,
        primitive_index: usize,
        primitive: &PrimitiveDesc,
        mesh: &mut Mesh,
    ) -> Result<(), BuildError> {
        let position = primitive.position.ok_or(BuildError::MissingPositions {
            mesh: mesh_index,
            primitive: primitive_index,
        })?;
        let what = |name: &str| {
            format!(
                "{} of mesh #{} primitive #{}",
                name, mesh_index, primitive_index
            )
        };
        let positions = self.read(position, || what("POSITION"), |reader| reader.read_vec3())?;
        let vertex_count = positions.len();
        let mut vertices: Vec<Vertex> = positions
            .into_iter()
            .map(|position| Vertex {
                position,
                ..Default::default()
            })
            .collect();

        if let Some(normals) =
            self.optional_attribute(primitive.normal, "NORMAL", vertex_count, |reader| {
                reader.read_vec3()
            })
        {
            for (vertex, normal) in vertices.iter_mut().zip(normals) {
                vertex.normal = normal;
            }
        }
        if let Some(tex_coords) =
            self.optional_attribute(primitive.tex_coord, "TEXCOORD_0", vertex_count, |reader| {
                reader.read_vec2_normalized()
            })
        {
            for (vertex, tex_coord) in vertices.iter_mut().zip(tex_coords) {
                vertex.tex_coord = tex_coord;
            }
        }
        if let Some(joints) =
            self.optional_attribute(primitive.joints, "JOINTS_0", vertex_count, |reader| {
                reader.read_uvec4()
            })
        {
            for (vertex, joints) in vertices.iter_mut().zip(joints) {
                vertex.joints = joints;
            }
        }
        if let Some(weights) =
            self.optional_attribute(primitive.weights, "WEIGHTS_0", vertex_count, |reader| {
                reader.read_vec4_normalized()
            })
        {
            for (vertex, weights) in vertices.iter_mut().zip(weights) {
                vertex.weights = weights;
            }
        }
        for vertex in &mut vertices {
            normalize_weights(vertex);
        }

        let indices = match primitive.indices {
            Some(indices) => self.read(indices, || what("indices"), |reader| reader.read_indices())?,
            None => (0..vertex_count as u32).collect(),
        };
        if let Some(index) = indices.iter().find(|index| **index as usize >= vertex_count) {
            return Err(BuildError::IndexOutOfRange {
                mesh: mesh_index,
                index: *index,
                vertex_count,
            });
        }

        let base = mesh.vertices.len() as u32;
        mesh.indices.extend(indices.into_iter().map(|index| index + base));
        mesh.vertices.extend(vertices);

        if let Some(material) = primitive.material {
            if let Some(texture) = self.material_texture(material) {
                if !mesh.textures.iter().any(|known| Arc::ptr_eq(known, &texture)) {
                    mesh.textures.push(texture);
                }
            }
        }
        Ok(())
    }

    fn build_mesh(&mut self, index: usize, desc: &MeshDesc) -> Result<Mesh, BuildError> {
        let mut mesh = Mesh {
            name: desc.name.clone(),
            ..Default::default()
        };
        for (primitive_index, primitive) in desc.primitives.iter().enumerate() {
            if primitive.mode != Mode::Triangles {
                warn!(
                    "Skipping primitive #{} of mesh #{}: unsupported mode {:?}",
                    primitive_index, index, primitive.mode
                );
                continue;
            }
            self.build_primitive(index, primitive_index, primitive, &mut mesh)?;
        }
        Ok(mesh)
    }

    fn resolve_root(&self, index: usize, desc: &SkinDesc, skeleton: &Skeleton) -> usize {
        if let Some(node) = desc.skeleton {
            if let Some(joint) = skeleton.joint_for_node(node) {
                return joint;
            }
            debug!(
                "Skeleton node #{} of skin #{} is not one of its joints",
                node, index
            );
        }
        match self.params.root_policy {
            RootPolicy::FirstJoint => 0,
            RootPolicy::Hierarchy => {
                let roots = skeleton.parentless_joints();
                if roots.len() > 1 {
                    warn!(
                        "Skin #{} has {} parentless joints, using joint #{} as root",
                        index,
                        roots.len(),
                        roots[0]
                    );
                }
                roots.first().copied().unwrap_or(0)
            }
        }
    }

    fn build_skeleton(&self, index: usize, desc: &SkinDesc) -> Result<Skeleton, BuildError> {
        // Map every joint first so children can refer to joints listed after them
        let node_to_joint: HashMap<usize, usize> = desc
            .joints
            .iter()
            .enumerate()
            .map(|(joint, node)| (*node, joint))
            .collect();

        let inverse_bind_matrices = match desc.inverse_bind_matrices {
            Some(accessor) => {
                let matrices = self.read(
                    accessor,
                    || format!("inverse bind matrices of skin #{}", index),
                    |reader| reader.read_mat4(),
                )?;
                if matrices.len() < desc.joints.len() {
                    return Err(BuildError::BadInverseBindMatrices {
                        skin: index,
                        expected: desc.joints.len(),
                        actual: matrices.len(),
                    });
                }
                matrices
            }
            None => vec![Mat4::IDENTITY; desc.joints.len()],
        };

        let joints = desc
            .joints
            .iter()
            .zip(inverse_bind_matrices)
            .map(|(node_index, inverse_bind_matrix)| {
                let node = self.asset.nodes.get(*node_index);
                Joint {
                    node: *node_index,
                    name: node.and_then(|node| node.name.clone()),
                    inverse_bind_matrix,
                    rest: node
                        .map(|node| DecomposedTransform::from(node.transform))
                        .unwrap_or_default(),
                    children: node
                        .map(|node| {
                            node.children
                                .iter()
                                .filter_map(|child| node_to_joint.get(child).copied())
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            })
            .collect();

        let mut skeleton = Skeleton {
            name: desc.name.clone(),
            joints,
            node_to_joint,
            root: 0,
        };
        skeleton.root = self.resolve_root(index, desc, &skeleton);
        Ok(skeleton)
    }

    fn build_animation(&self, index: usize, desc: &AnimationDesc) -> Result<Animation, BuildError> {
        let mut channels = Vec::with_capacity(desc.channels.len());
        for (channel_index, channel) in desc.channels.iter().enumerate() {
            let Some(sampler) = desc.samplers.get(channel.sampler) else {
                warn!(
                    "Channel #{} of animation #{} refers to missing sampler #{}",
                    channel_index, index, channel.sampler
                );
                continue;
            };
            let what = |name: &str| {
                format!(
                    "{} of animation #{} channel #{}",
                    name, index, channel_index
                )
            };
            let times = self.read(sampler.input, || what("keyframe times"), |reader| {
                reader.read_scalars()
            })?;

            let cubic = sampler.interpolation == Interpolation::CubicSpline;

            let values = match &channel.path {
                ChannelPath::Translation => {
                    let values = self.read(sampler.output, || what("translations"), |reader| {
                        reader.read_vec3()
                    })?;
                    ChannelValues::Translation(track(
                        values.into_iter().map(Vec3::from_array).collect(),
                        cubic,
                    ))
                }
                ChannelPath::Rotation => {
                    let values = self.read(sampler.output, || what("rotations"), |reader| {
                        reader.read_vec4_normalized()
                    })?;
                    ChannelValues::Rotation(track(
                        values.into_iter().map(Quat::from_array).collect(),
                        cubic,
                    ))
                }
                ChannelPath::Scale => {
                    let values = self.read(sampler.output, || what("scales"), |reader| {
                        reader.read_vec3()
                    })?;
                    ChannelValues::Scale(track(
                        values.into_iter().map(Vec3::from_array).collect(),
                        cubic,
                    ))
                }
                ChannelPath::Unknown(path) => {
                    warn!(
                        "Channel #{} of animation #{} drives unsupported path {}",
                        channel_index, index, path
                    );
                    ChannelValues::Unknown(path.clone())
                }
            };

            if let Some(count) = values.len() {
                if count != times.len() {
                    return Err(BuildError::ChannelLengthMismatch {
                        animation: index,
                        channel: channel_index,
                        times: times.len(),
                        values: count,
                    });
                }
            }

            channels.push(AnimationChannel {
                target_node: channel.target_node,
                times,
                interpolation: sampler.interpolation,
                values,
            });
        }
        Ok(Animation::new(desc.name.clone(), channels))
    }

    pub fn build(mut self) -> Result<Model, BuildError> {
        let asset = self.asset;
        let meshes = asset
            .meshes
            .iter()
            .enumerate()
            .map(|(index, mesh)| self.build_mesh(index, mesh))
            .collect::<Result<Vec<_>, _>>()?;
        let skeletons = asset
            .skins
            .iter()
            .enumerate()
            .map(|(index, skin)| self.build_skeleton(index, skin))
            .collect::<Result<Vec<_>, _>>()?;
        let animations = asset
            .animations
            .iter()
            .enumerate()
            .map(|(index, animation)| self.build_animation(index, animation))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Loaded model: {} mesh(es), {} skeleton(s), {} animation(s)",
            meshes.len(),
            skeletons.len(),
            animations.len()
        );
        Ok(Model::new(meshes, skeletons, animations))
    }
}
