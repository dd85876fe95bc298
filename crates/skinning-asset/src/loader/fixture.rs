//! In-memory glTF/GLB assets for tests.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

pub(crate) const FLOAT: u32 = 5126;
pub(crate) const UNSIGNED_BYTE: u32 = 5121;
pub(crate) const UNSIGNED_SHORT: u32 = 5123;

pub(crate) fn encode_png(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
    let image = RgbaImage::from_raw(width, height, rgba.to_vec()).unwrap();
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png).unwrap();
    cursor.into_inner()
}

fn components(kind: &str) -> usize {
    match kind {
        "SCALAR" => 1,
        "VEC2" => 2,
        "VEC3" => 3,
        "VEC4" => 4,
        "MAT4" => 16,
        other => panic!("unknown accessor type {}", other),
    }
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn json_array(name: &str, items: &[String]) -> Option<String> {
    (!items.is_empty()).then(|| format!(r#""{}":[{}]"#, name, items.join(",")))
}

/// Builds a single-buffer asset. Every accessor gets its own buffer view.
#[derive(Debug, Default)]
pub(crate) struct GlbBuilder {
    bin: Vec<u8>,
    views: Vec<String>,
    accessors: Vec<String>,
    meshes: Vec<String>,
    nodes: Vec<String>,
    pub skins: Vec<String>,
    animations: Vec<String>,
    images: Vec<String>,
    textures: Vec<String>,
    materials: Vec<String>,
}

impl GlbBuilder {
    fn push_view(&mut self, data: &[u8]) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let offset = self.bin.len();
        self.bin.extend_from_slice(data);
        self.views.push(format!(
            r#"{{"buffer":0,"byteOffset":{},"byteLength":{}}}"#,
            offset,
            data.len()
        ));
        self.views.len() - 1
    }

    /// `extra` is spliced into the accessor object, e.g. `"normalized":true`.
    pub fn push_accessor(
        &mut self,
        data: &[u8],
        component_type: u32,
        kind: &str,
        count: usize,
        extra: &str,
    ) -> usize {
        let view = self.push_view(data);
        let extra = if extra.is_empty() {
            String::new()
        } else {
            format!(",{}", extra)
        };
        self.accessors.push(format!(
            r#"{{"bufferView":{},"componentType":{},"count":{},"type":"{}"{}}}"#,
            view, component_type, count, kind, extra
        ));
        self.accessors.len() - 1
    }

    pub fn push_f32(&mut self, values: &[f32], kind: &str) -> usize {
        let count = values.len() / components(kind);
        self.push_accessor(&f32_bytes(values), FLOAT, kind, count, "")
    }

    pub fn push_positions(&mut self, positions: &[[f32; 3]]) -> usize {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for position in positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(position[axis]);
                max[axis] = max[axis].max(position[axis]);
            }
        }
        let flat: Vec<f32> = positions.iter().flatten().copied().collect();
        let bounds = format!(
            r#""min":[{},{},{}],"max":[{},{},{}]"#,
            min[0], min[1], min[2], max[0], max[1], max[2]
        );
        self.push_accessor(&f32_bytes(&flat), FLOAT, "VEC3", positions.len(), &bounds)
    }

    /// Keyframe times, with the bounds animation inputs carry.
    pub fn push_times(&mut self, times: &[f32]) -> usize {
        let min = times.iter().copied().fold(f32::MAX, f32::min);
        let max = times.iter().copied().fold(f32::MIN, f32::max);
        let bounds = format!(r#""min":[{}],"max":[{}]"#, min, max);
        self.push_accessor(&f32_bytes(times), FLOAT, "SCALAR", times.len(), &bounds)
    }

    pub fn push_u16_indices(&mut self, indices: &[u16]) -> usize {
        let data: Vec<u8> = indices.iter().flat_map(|index| index.to_le_bytes()).collect();
        self.push_accessor(&data, UNSIGNED_SHORT, "SCALAR", indices.len(), "")
    }

    pub fn push_u8(&mut self, values: &[u8], kind: &str, normalized: bool) -> usize {
        let count = values.len() / components(kind);
        let extra = if normalized { r#""normalized":true"# } else { "" };
        self.push_accessor(values, UNSIGNED_BYTE, kind, count, extra)
    }

    pub fn primitive(attributes: &str, indices: Option<usize>, material: Option<usize>) -> String {
        let mut primitive = format!(r#"{{"attributes":{{{}}}"#, attributes);
        if let Some(indices) = indices {
            primitive.push_str(&format!(r#","indices":{}"#, indices));
        }
        if let Some(material) = material {
            primitive.push_str(&format!(r#","material":{}"#, material));
        }
        primitive.push('}');
        primitive
    }

    pub fn push_primitives(&mut self, name: &str, primitives: &[String]) -> usize {
        self.meshes.push(format!(
            r#"{{"name":"{}","primitives":[{}]}}"#,
            name,
            primitives.join(",")
        ));
        self.meshes.len() - 1
    }

    pub fn push_mesh(
        &mut self,
        name: &str,
        attributes: &str,
        indices: Option<usize>,
        material: Option<usize>,
    ) -> usize {
        let primitive = Self::primitive(attributes, indices, material);
        self.push_primitives(name, &[primitive])
    }

    pub fn push_node(&mut self, json: &str) -> usize {
        self.nodes.push(json.to_string());
        self.nodes.len() - 1
    }

    pub fn push_skin(&mut self, json: &str) -> usize {
        self.skins.push(json.to_string());
        self.skins.len() - 1
    }

    pub fn push_animation(&mut self, json: &str) -> usize {
        self.animations.push(json.to_string());
        self.animations.len() - 1
    }

    pub fn push_image(&mut self, data: &[u8], mime: &str) -> usize {
        let view = self.push_view(data);
        self.images
            .push(format!(r#"{{"bufferView":{},"mimeType":"{}"}}"#, view, mime));
        self.images.len() - 1
    }

    pub fn push_image_uri(&mut self, uri: &str) -> usize {
        self.images.push(format!(r#"{{"uri":"{}"}}"#, uri));
        self.images.len() - 1
    }

    /// A texture over `image` and a material using it as base color.
    pub fn push_textured_material(&mut self, image: usize) -> usize {
        self.textures.push(format!(r#"{{"source":{}}}"#, image));
        let texture = self.textures.len() - 1;
        self.materials.push(format!(
            r#"{{"pbrMetallicRoughness":{{"baseColorTexture":{{"index":{}}}}}}}"#,
            texture
        ));
        self.materials.len() - 1
    }

    fn json(&self, buffer_uri: Option<&str>) -> String {
        let buffer = if self.bin.is_empty() {
            None
        } else if let Some(uri) = buffer_uri {
            Some(format!(
                r#""buffers":[{{"byteLength":{},"uri":"{}"}}]"#,
                self.bin.len(),
                uri
            ))
        } else {
            Some(format!(r#""buffers":[{{"byteLength":{}}}]"#, self.bin.len()))
        };
        let parts: Vec<String> = [
            Some(String::from(r#""asset":{"version":"2.0"}"#)),
            buffer,
            json_array("bufferViews", &self.views),
            json_array("accessors", &self.accessors),
            json_array("images", &self.images),
            json_array("textures", &self.textures),
            json_array("materials", &self.materials),
            json_array("meshes", &self.meshes),
            json_array("nodes", &self.nodes),
            json_array("skins", &self.skins),
            json_array("animations", &self.animations),
        ]
        .into_iter()
        .flatten()
        .collect();
        format!("{{{}}}", parts.join(","))
    }

    /// Assemble a `.glb` file.
    pub fn build(self) -> Vec<u8> {
        let json = self.json(None);
        let bin = (!self.bin.is_empty()).then_some(self.bin.as_slice());
        Self::wrap(&json, bin)
    }

    /// JSON text plus the external buffer it names as `buffer_uri`.
    pub fn into_gltf(self, buffer_uri: &str) -> (String, Vec<u8>) {
        (self.json(Some(buffer_uri)), self.bin)
    }

    pub fn wrap(json: &str, bin: Option<&[u8]>) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let bin = bin.map(|bin| {
            let mut bin = bin.to_vec();
            while bin.len() % 4 != 0 {
                bin.push(0);
            }
            bin
        });

        let total = 12 + 8 + json.len() + bin.as_ref().map_or(0, |bin| 8 + bin.len());
        let mut data = Vec::with_capacity(total);
        data.extend_from_slice(GLB_MAGIC);
        data.extend_from_slice(&GLB_VERSION.to_le_bytes());
        data.extend_from_slice(&(total as u32).to_le_bytes());
        data.extend_from_slice(&(json.len() as u32).to_le_bytes());
        data.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        data.extend_from_slice(&json);
        if let Some(bin) = bin {
            data.extend_from_slice(&(bin.len() as u32).to_le_bytes());
            data.extend_from_slice(&CHUNK_BIN.to_le_bytes());
            data.extend_from_slice(&bin);
        }
        data
    }
}
