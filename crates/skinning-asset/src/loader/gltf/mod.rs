use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
    fs, io,
    ops::Range,
    path::{Path, PathBuf},
};

use gltf::{animation::Property, mesh::Mode, Accessor, Document, Gltf, Semantic};
use log::{debug, warn};
use scheme::{Scheme, SchemeError};

use crate::{
    accessor::{AccessorLayout, AccessorReader, DecodeError},
    animation::{ChannelPath, Interpolation},
    archive::{Archive, DirectoryArchive, Entry},
    node::NodeTransform,
};

use super::LoadParams;

pub mod scheme;

#[derive(Debug)]
pub enum ParseError<E> {
    Io(E),
    Gltf(gltf::Error),
    ModelNotFound(String),
    MissingBinaryChunk,
    InvalidScheme(SchemeError),
    ResourceNotFound(String),
    BadBufferMime {
        uri: String,
        mime: String,
    },
    BufferTooShort {
        index: usize,
        expected: usize,
        actual: usize,
    },
    ViewOutOfBounds {
        view: usize,
        end: usize,
        buffer_length: usize,
    },
}

impl<E: Display> Display for ParseError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Io(error) => Display::fmt(error, f),
            ParseError::Gltf(error) => Display::fmt(error, f),
            ParseError::ModelNotFound(file_name) => {
                write!(f, "File {} not found in archive", file_name)
            }
            ParseError::MissingBinaryChunk => {
                write!(f, "Buffer refers to the GLB binary chunk, but there is none")
            }
            ParseError::InvalidScheme(error) => Display::fmt(error, f),
            ParseError::ResourceNotFound(name) => write!(f, "Resource {} not found", name),
            ParseError::BadBufferMime { uri, mime } => {
                write!(f, "Bad MIME {} for buffer {}", mime, uri)
            }
            ParseError::BufferTooShort {
                index,
                expected,
                actual,
            } => write!(
                f,
                "Buffer #{} is too short: expected {} bytes, but got {}",
                index, expected, actual
            ),
            ParseError::ViewOutOfBounds {
                view,
                end,
                buffer_length,
            } => write!(
                f,
                "Buffer view #{} ends at {}, out of bounds of buffer with length {}",
                view, end, buffer_length
            ),
        }
    }
}

impl<E: Error> Error for ParseError<E> {}

impl<E> From<gltf::Error> for ParseError<E> {
    fn from(value: gltf::Error) -> Self {
        Self::Gltf(value)
    }
}

impl<E> From<SchemeError> for ParseError<E> {
    fn from(value: SchemeError) -> Self {
        Self::InvalidScheme(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    View(usize),
    Uri(String),
}

impl Display for ImageSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::View(index) => write!(f, "buffer view #{}", index),
            ImageSource::Uri(uri) => Display::fmt(uri, f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferViewDesc {
    pub buffer: usize,
    pub offset: usize,
    pub length: usize,
    pub stride: Option<usize>,
}

impl BufferViewDesc {
    /// Byte range inside the buffer, `None` if it overflows.
    pub fn range(&self) -> Option<Range<usize>> {
        Some(self.offset..self.offset.checked_add(self.length)?)
    }

    fn bytes<'a>(&self, buffers: &'a [Vec<u8>]) -> Option<&'a [u8]> {
        buffers.get(self.buffer)?.get(self.range()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorDesc {
    pub view: Option<usize>,
    pub layout: AccessorLayout,
}

#[derive(Clone)]
pub struct ImageDesc {
    pub name: Option<String>,
    pub source: ImageSource,
    pub mime_type: Option<String>,
    /// Encoded image file, `None` when the file could not be found.
    pub data: Option<Vec<u8>>,
}

impl Debug for ImageDesc {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageDesc")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("mime_type", &self.mime_type)
            .field("data", &self.data.as_ref().map(Vec::len))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialDesc {
    pub name: Option<String>,
    /// Texture index of the PBR base color.
    pub base_color_texture: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveDesc {
    pub position: Option<usize>,
    pub normal: Option<usize>,
    pub tex_coord: Option<usize>,
    pub joints: Option<usize>,
    pub weights: Option<usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshDesc {
    pub name: Option<String>,
    pub primitives: Vec<PrimitiveDesc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinDesc {
    pub name: Option<String>,
    /// Node indices, in joint order.
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Option<usize>,
    pub skeleton: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDesc {
    pub target_node: usize,
    pub path: ChannelPath,
    pub sampler: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerDesc {
    pub input: usize,
    pub output: usize,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationDesc {
    pub name: Option<String>,
    pub channels: Vec<ChannelDesc>,
    pub samplers: Vec<SamplerDesc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDesc {
    pub name: Option<String>,
    pub children: Vec<usize>,
    pub transform: NodeTransform,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
}

/// A glTF asset with every buffer resolved and every image file fetched.
#[derive(Debug, Clone, Default)]
pub struct ParsedAsset {
    pub buffers: Vec<Vec<u8>>,
    pub views: Vec<BufferViewDesc>,
    pub accessors: Vec<AccessorDesc>,
    pub images: Vec<ImageDesc>,
    /// Image index of each texture.
    pub textures: Vec<usize>,
    pub materials: Vec<MaterialDesc>,
    pub meshes: Vec<MeshDesc>,
    pub skins: Vec<SkinDesc>,
    pub animations: Vec<AnimationDesc>,
    pub nodes: Vec<NodeDesc>,
}

impl ParsedAsset {
    pub fn reader(&self, accessor: usize) -> Result<AccessorReader<'_>, DecodeError> {
        let desc = self
            .accessors
            .get(accessor)
            .ok_or(DecodeError::MissingAccessor(accessor))?;
        let Some(view) = desc.view else {
            return Ok(AccessorReader::zeroed(desc.layout));
        };
        let data = self
            .views
            .get(view)
            .and_then(|view| view.bytes(&self.buffers))
            .ok_or(DecodeError::MissingAccessor(accessor))?;
        Ok(AccessorReader::new(data, desc.layout))
    }

    /// Parent node of each node, `None` for scene roots.
    pub fn node_parents(&self) -> Vec<Option<usize>> {
        let mut parents = vec![None; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            for child in &node.children {
                if let Some(parent) = parents.get_mut(*child) {
                    *parent = Some(index);
                }
            }
        }
        parents
    }
}

struct AssetParser<'a, A> {
    document: &'a Document,
    archive: &'a mut A,
    base: &'a Path,
    params: &'a LoadParams,
}

impl<'a, A: Archive> AssetParser<'a, A> {
    fn new(document: &'a Document, archive: &'a mut A, base: &'a Path, params: &'a LoadParams) -> Self {
        Self {
            document,
            archive,
            base,
            params,
        }
    }

    fn load_uri(&mut self, uri: &str) -> Result<Option<(Option<String>, Vec<u8>)>, ParseError<A::Error>> {
        let scheme = Scheme::try_from(uri)?;
        let loaded = scheme
            .load(self.archive, self.base)
            .map_err(ParseError::Io)?;
        Ok(loaded.map(|(mime, data)| (mime.map(str::to_string), data)))
    }

    fn load_buffers(&mut self, mut blob: Option<Vec<u8>>) -> Result<Vec<Vec<u8>>, ParseError<A::Error>> {
        let document = self.document;
        let mut buffers = Vec::new();
        for buffer in document.buffers() {
            let mut data = match buffer.source() {
                gltf::buffer::Source::Bin => blob.take().ok_or(ParseError::MissingBinaryChunk)?,
                gltf::buffer::Source::Uri(uri) => {
                    let Some((mime, data)) = self.load_uri(uri)? else {
                        return Err(ParseError::ResourceNotFound(uri.to_string()));
                    };
                    if let Some(mime) = mime {
                        if !mime.eq_ignore_ascii_case("application/octet-stream")
                            && !mime.eq_ignore_ascii_case("application/gltf-buffer")
                        {
                            return Err(ParseError::BadBufferMime {
                                uri: uri.to_string(),
                                mime,
                            });
                        }
                    }
                    data
                }
            };

            if data.len() < buffer.length() {
                return Err(ParseError::BufferTooShort {
                    index: buffer.index(),
                    expected: buffer.length(),
                    actual: data.len(),
                });
            }

            // Pad the data to 4 bytes with zeroes
            while data.len() % 4 != 0 {
                data.push(0);
            }
            buffers.push(data);
        }
        Ok(buffers)
    }

    fn load_views(&self, buffers: &[Vec<u8>]) -> Result<Vec<BufferViewDesc>, ParseError<A::Error>> {
        self.document
            .views()
            .map(|view| {
                let desc = BufferViewDesc {
                    buffer: view.buffer().index(),
                    offset: view.offset(),
                    length: view.length(),
                    stride: view.stride(),
                };
                let buffer_length = buffers.get(desc.buffer).map(Vec::len).unwrap_or(0);
                let end = desc.range().map_or(usize::MAX, |range| range.end);
                if end > buffer_length {
                    return Err(ParseError::ViewOutOfBounds {
                        view: view.index(),
                        end,
                        buffer_length,
                    });
                }
                Ok(desc)
            })
            .collect()
    }

    fn load_accessor(accessor: Accessor) -> AccessorDesc {
        if accessor.sparse().is_some() {
            warn!(
                "Sparse accessor #{} is not supported, reading its base values only",
                accessor.index()
            );
        }
        let view = accessor.view();
        AccessorDesc {
            view: view.as_ref().map(|view| view.index()),
            layout: AccessorLayout {
                byte_offset: accessor.offset(),
                stride: view.and_then(|view| view.stride()).unwrap_or(0),
                count: accessor.count(),
                component_type: accessor.data_type().into(),
                kind: accessor.dimensions().into(),
                normalized: accessor.normalized(),
            },
        }
    }

    fn load_images(&mut self, buffers: &[Vec<u8>], views: &[BufferViewDesc]) -> Result<Vec<ImageDesc>, ParseError<A::Error>> {
        let document = self.document;
        let mut images = Vec::new();
        for image in document.images() {
            let name = image.name().map(str::to_string);
            let desc = match image.source() {
                gltf::image::Source::View { view, mime_type } => {
                    let data = views.get(view.index()).and_then(|desc| desc.bytes(buffers));
                    ImageDesc {
                        name,
                        source: ImageSource::View(view.index()),
                        mime_type: Some(mime_type.to_string()),
                        data: data.map(<[u8]>::to_vec),
                    }
                }
                gltf::image::Source::Uri { uri, mime_type } => {
                    let loaded = self.load_uri(uri)?;
                    if loaded.is_none() {
                        if self.params.placeholder_on_missing_image {
                            warn!("Image {} not found", uri);
                        } else {
                            return Err(ParseError::ResourceNotFound(uri.to_string()));
                        }
                    }
                    let (load_mime, data) = match loaded {
                        Some((mime, data)) => (mime, Some(data)),
                        None => (None, None),
                    };
                    ImageDesc {
                        name,
                        source: ImageSource::Uri(uri.to_string()),
                        mime_type: mime_type.map(str::to_string).or(load_mime),
                        data,
                    }
                }
            };
            images.push(desc);
        }
        Ok(images)
    }

    fn load_meshes(&self) -> Vec<MeshDesc> {
        self.document
            .meshes()
            .map(|mesh| MeshDesc {
                name: mesh.name().map(str::to_string),
                primitives: mesh
                    .primitives()
                    .map(|primitive| {
                        let attribute = |semantic: Semantic| {
                            primitive.get(&semantic).map(|accessor| accessor.index())
                        };
                        for (semantic, _) in primitive.attributes() {
                            match semantic {
                                Semantic::Positions
                                | Semantic::Normals
                                | Semantic::TexCoords(0)
                                | Semantic::Joints(0)
                                | Semantic::Weights(0) => (),
                                other => debug!("Ignoring attribute {:?}", other),
                            }
                        }
                        PrimitiveDesc {
                            position: attribute(Semantic::Positions),
                            normal: attribute(Semantic::Normals),
                            tex_coord: attribute(Semantic::TexCoords(0)),
                            joints: attribute(Semantic::Joints(0)),
                            weights: attribute(Semantic::Weights(0)),
                            indices: primitive.indices().map(|accessor| accessor.index()),
                            material: primitive.material().index(),
                            mode: primitive.mode(),
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    fn load_animations(&self) -> Vec<AnimationDesc> {
        self.document
            .animations()
            .map(|animation| AnimationDesc {
                name: animation.name().map(str::to_string),
                channels: animation
                    .channels()
                    .map(|channel| {
                        let target = channel.target();
                        let path = match target.property() {
                            Property::Translation => ChannelPath::Translation,
                            Property::Rotation => ChannelPath::Rotation,
                            Property::Scale => ChannelPath::Scale,
                            Property::MorphTargetWeights => {
                                ChannelPath::Unknown(String::from("weights"))
                            }
                        };
                        ChannelDesc {
                            target_node: target.node().index(),
                            path,
                            sampler: channel.sampler().index(),
                        }
                    })
                    .collect(),
                samplers: animation
                    .samplers()
                    .map(|sampler| SamplerDesc {
                        input: sampler.input().index(),
                        output: sampler.output().index(),
                        interpolation: match sampler.interpolation() {
                            gltf::animation::Interpolation::Linear => Interpolation::Linear,
                            gltf::animation::Interpolation::Step => Interpolation::Step,
                            gltf::animation::Interpolation::CubicSpline => {
                                Interpolation::CubicSpline
                            }
                        },
                    })
                    .collect(),
            })
            .collect()
    }

    fn parse(mut self, blob: Option<Vec<u8>>) -> Result<ParsedAsset, ParseError<A::Error>> {
        let buffers = self.load_buffers(blob)?;
        let views = self.load_views(&buffers)?;
        let accessors = self.document.accessors().map(Self::load_accessor).collect();
        let images = self.load_images(&buffers, &views)?;
        let textures = self
            .document
            .textures()
            .map(|texture| texture.source().index())
            .collect();
        let materials = self
            .document
            .materials()
            .map(|material| MaterialDesc {
                name: material.name().map(str::to_string),
                base_color_texture: material
                    .pbr_metallic_roughness()
                    .base_color_texture()
                    .map(|info| info.texture().index()),
            })
            .collect();
        let meshes = self.load_meshes();
        let skins = self
            .document
            .skins()
            .map(|skin| SkinDesc {
                name: skin.name().map(str::to_string),
                joints: skin.joints().map(|joint| joint.index()).collect(),
                inverse_bind_matrices: skin.inverse_bind_matrices().map(|accessor| accessor.index()),
                skeleton: skin.skeleton().map(|node| node.index()),
            })
            .collect();
        let animations = self.load_animations();
        let nodes = self
            .document
            .nodes()
            .map(|node| NodeDesc {
                name: node.name().map(str::to_string),
                children: node.children().map(|child| child.index()).collect(),
                transform: node.transform().into(),
                mesh: node.mesh().map(|mesh| mesh.index()),
                skin: node.skin().map(|skin| skin.index()),
            })
            .collect();

        Ok(ParsedAsset {
            buffers,
            views,
            accessors,
            images,
            textures,
            materials,
            meshes,
            skins,
            animations,
            nodes,
        })
    }
}

/// Parse a glTF or GLB file held in memory.
///
/// External buffers and images are read from `archive`; relative URIs are
/// joined onto `base`, the directory of the model inside the archive.
pub fn parse_slice<A: Archive>(
    data: &[u8],
    archive: &mut A,
    base: &Path,
    params: &LoadParams,
) -> Result<ParsedAsset, ParseError<A::Error>> {
    let gltf = Gltf::from_slice(data)?;
    let Gltf { document, blob } = gltf;
    AssetParser::new(&document, archive, base, params).parse(blob)
}

/// Parse a glTF or GLB file from disk. Sidecar files are looked up next to it.
pub fn parse_file<P: AsRef<Path>>(
    path: P,
    params: &LoadParams,
) -> Result<ParsedAsset, ParseError<io::Error>> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(ParseError::Io)?;
    let directory = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut archive = DirectoryArchive::new(directory);
    parse_slice(&data, &mut archive, Path::new(""), params)
}

/// Parse the model file named by [`LoadParams::model_file_name`] from an
/// archive, trying the binary form first.
pub fn parse_from_archive<A: Archive>(
    archive: &mut A,
    params: &LoadParams,
) -> Result<ParsedAsset, ParseError<A::Error>> {
    let candidates = [params.model_file_name("glb"), params.model_file_name("gltf")];
    for file_name in &candidates {
        let Some(mut entry) = archive.by_path(file_name).map_err(ParseError::Io)? else {
            continue;
        };
        let data = entry.unpack().map_err(ParseError::Io)?;
        drop(entry);
        let base = Path::new(file_name)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        return parse_slice(&data, archive, &base, params);
    }
    Err(ParseError::ModelNotFound(candidates[1].clone()))
}
