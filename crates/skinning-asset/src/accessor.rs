//! Typed, strided element decoding over raw buffer bytes.
//!
//! An [`AccessorReader`] knows nothing about glTF documents. It is handed a
//! byte slice (usually one buffer view), a layout and a component type, and
//! turns that into flat vectors of `f32` or `u32` components.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use glam::Mat4;

use crate::loader::{chunk_mat4, chunk_vec2, chunk_vec3, chunk_vec4};

/// Largest accessor without a buffer view that is expanded into zeroes.
pub const MAX_ZEROED_ELEMENTS: usize = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
}

impl ComponentType {
    /// Map an OpenGL enum value, as stored in `accessors[].componentType`.
    pub fn from_gl(value: u32) -> Result<Self, DecodeError> {
        match value {
            5120 => Ok(ComponentType::I8),
            5121 => Ok(ComponentType::U8),
            5122 => Ok(ComponentType::I16),
            5123 => Ok(ComponentType::U16),
            5124 => Ok(ComponentType::I32),
            5125 => Ok(ComponentType::U32),
            5126 => Ok(ComponentType::F32),
            unknown => Err(DecodeError::UnknownComponentType(unknown)),
        }
    }

    pub fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::I32 | ComponentType::U32 | ComponentType::F32 => 4,
        }
    }
}

impl Display for ComponentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentType::I8 => "BYTE",
            ComponentType::U8 => "UNSIGNED_BYTE",
            ComponentType::I16 => "SHORT",
            ComponentType::U16 => "UNSIGNED_SHORT",
            ComponentType::I32 => "INT",
            ComponentType::U32 => "UNSIGNED_INT",
            ComponentType::F32 => "FLOAT",
        };
        f.write_str(name)
    }
}

impl From<gltf::accessor::DataType> for ComponentType {
    fn from(value: gltf::accessor::DataType) -> Self {
        use gltf::accessor::DataType;
        match value {
            DataType::I8 => ComponentType::I8,
            DataType::U8 => ComponentType::U8,
            DataType::I16 => ComponentType::I16,
            DataType::U16 => ComponentType::U16,
            DataType::U32 => ComponentType::U32,
            DataType::F32 => ComponentType::F32,
        }
    }
}

/// Number and arrangement of components in one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementKind {
    pub fn components(self) -> usize {
        match self {
            ElementKind::Scalar => 1,
            ElementKind::Vec2 => 2,
            ElementKind::Vec3 => 3,
            ElementKind::Vec4 | ElementKind::Mat2 => 4,
            ElementKind::Mat3 => 9,
            ElementKind::Mat4 => 16,
        }
    }
}

impl From<gltf::accessor::Dimensions> for ElementKind {
    fn from(value: gltf::accessor::Dimensions) -> Self {
        use gltf::accessor::Dimensions;
        match value {
            Dimensions::Scalar => ElementKind::Scalar,
            Dimensions::Vec2 => ElementKind::Vec2,
            Dimensions::Vec3 => ElementKind::Vec3,
            Dimensions::Vec4 => ElementKind::Vec4,
            Dimensions::Mat2 => ElementKind::Mat2,
            Dimensions::Mat3 => ElementKind::Mat3,
            Dimensions::Mat4 => ElementKind::Mat4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    MissingAccessor(usize),
    UnknownComponentType(u32),
    UnsupportedComponentType {
        expected: &'static str,
        actual: ComponentType,
    },
    BadDimensions {
        expected: ElementKind,
        actual: ElementKind,
    },
    StrideTooSmall {
        stride: usize,
        element_size: usize,
    },
    OutOfBounds {
        offset: usize,
        length: usize,
        buffer_length: usize,
    },
    NegativeIndex {
        position: usize,
        value: i64,
    },
    TooManyElements {
        count: usize,
        max: usize,
    },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MissingAccessor(index) => write!(f, "Accessor #{} not found", index),
            DecodeError::UnknownComponentType(value) => {
                write!(f, "Unknown component type: {}", value)
            }
            DecodeError::UnsupportedComponentType { expected, actual } => write!(
                f,
                "Unsupported component type: expected {}, but got {}",
                expected, actual
            ),
            DecodeError::BadDimensions { expected, actual } => write!(
                f,
                "Bad accessor dimensions: expected {:?}, but got {:?}",
                expected, actual
            ),
            DecodeError::StrideTooSmall {
                stride,
                element_size,
            } => write!(
                f,
                "Byte stride {} is smaller than element size {}",
                stride, element_size
            ),
            DecodeError::OutOfBounds {
                offset,
                length,
                buffer_length,
            } => write!(
                f,
                "Accessor range {}..{} out of bounds of buffer with length {}",
                offset,
                offset.saturating_add(*length),
                buffer_length
            ),
            DecodeError::NegativeIndex { position, value } => {
                write!(f, "Negative value {} at element {}", value, position)
            }
            DecodeError::TooManyElements { count, max } => write!(
                f,
                "Accessor without buffer view has {} elements, at most {} are supported",
                count, max
            ),
        }
    }
}

impl Error for DecodeError {}

/// Where the elements of one accessor live inside its byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorLayout {
    pub byte_offset: usize,
    /// Distance between the starts of two elements. Zero means tightly packed.
    pub stride: usize,
    pub count: usize,
    pub component_type: ComponentType,
    pub kind: ElementKind,
    pub normalized: bool,
}

impl AccessorLayout {
    pub fn element_size(&self) -> usize {
        self.component_type.size() * self.kind.components()
    }

    pub fn effective_stride(&self) -> usize {
        if self.stride == 0 {
            self.element_size()
        } else {
            self.stride
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccessorReader<'a> {
    // None for accessors without a buffer view, which decode as zeroes.
    data: Option<&'a [u8]>,
    layout: AccessorLayout,
}

impl<'a> AccessorReader<'a> {
    pub fn new(data: &'a [u8], layout: AccessorLayout) -> Self {
        Self {
            data: Some(data),
            layout,
        }
    }

    pub fn zeroed(layout: AccessorLayout) -> Self {
        Self { data: None, layout }
    }

    pub fn layout(&self) -> &AccessorLayout {
        &self.layout
    }

    pub fn count(&self) -> usize {
        self.layout.count
    }

    pub fn expect_kind(&self, kind: ElementKind) -> Result<(), DecodeError> {
        if self.layout.kind == kind {
            Ok(())
        } else {
            Err(DecodeError::BadDimensions {
                expected: kind,
                actual: self.layout.kind,
            })
        }
    }

    fn check_bounds(&self, data: &[u8]) -> Result<usize, DecodeError> {
        let element_size = self.layout.element_size();
        let stride = self.layout.effective_stride();
        if stride < element_size {
            return Err(DecodeError::StrideTooSmall {
                stride,
                element_size,
            });
        }
        if self.layout.count == 0 {
            return Ok(stride);
        }
        let out_of_bounds = |length| DecodeError::OutOfBounds {
            offset: self.layout.byte_offset,
            length,
            buffer_length: data.len(),
        };
        // Counts come from the file, so every step may overflow
        let length = (self.layout.count - 1)
            .checked_mul(stride)
            .and_then(|length| length.checked_add(element_size))
            .ok_or_else(|| out_of_bounds(usize::MAX))?;
        match self.layout.byte_offset.checked_add(length) {
            Some(end) if end <= data.len() => Ok(stride),
            _ => Err(out_of_bounds(length)),
        }
    }

    /// Visit every component in element order, handing out its raw bytes.
    fn read_components<T>(&self, read: impl Fn(&[u8]) -> T, zero: T) -> Result<Vec<T>, DecodeError>
    where
        T: Copy,
    {
        let components = self.layout.kind.components();
        let Some(data) = self.data else {
            if self.layout.count > MAX_ZEROED_ELEMENTS {
                return Err(DecodeError::TooManyElements {
                    count: self.layout.count,
                    max: MAX_ZEROED_ELEMENTS,
                });
            }
            return Ok(vec![zero; self.layout.count * components]);
        };
        // In bounds from here on, so no offset below can overflow
        let stride = self.check_bounds(data)?;
        let size = self.layout.component_type.size();

        let mut result = Vec::with_capacity(self.layout.count * components);
        for element in 0..self.layout.count {
            let start = self.layout.byte_offset + element * stride;
            for component in 0..components {
                let offset = start + component * size;
                result.push(read(&data[offset..offset + size]));
            }
        }
        Ok(result)
    }

    /// Read FLOAT components as they are stored.
    pub fn read_f32(&self) -> Result<Vec<f32>, DecodeError> {
        if self.layout.component_type != ComponentType::F32 {
            return Err(DecodeError::UnsupportedComponentType {
                expected: "FLOAT",
                actual: self.layout.component_type,
            });
        }
        self.read_components(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 0.0)
    }

    /// Read FLOAT components, or integer components mapped into [0, 1] / [-1, 1].
    pub fn read_normalized(&self) -> Result<Vec<f32>, DecodeError> {
        match self.layout.component_type {
            ComponentType::F32 => self.read_f32(),
            ComponentType::U8 => {
                self.read_components(|bytes| bytes[0] as f32 / u8::MAX as f32, 0.0)
            }
            ComponentType::I8 => self.read_components(
                |bytes| (bytes[0] as i8 as f32 / i8::MAX as f32).max(-1.0),
                0.0,
            ),
            ComponentType::U16 => self.read_components(
                |bytes| u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / u16::MAX as f32,
                0.0,
            ),
            ComponentType::I16 => self.read_components(
                |bytes| (i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / i16::MAX as f32).max(-1.0),
                0.0,
            ),
            ComponentType::U32 => self.read_components(
                |bytes| {
                    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
                        / u32::MAX as f32
                },
                0.0,
            ),
            actual @ ComponentType::I32 => Err(DecodeError::UnsupportedComponentType {
                expected: "FLOAT or normalized integer",
                actual,
            }),
        }
    }

    /// Read integer components widened to `u32`.
    ///
    /// Unsigned types are zero-extended. Signed types are accepted as long as
    /// every value is non-negative.
    pub fn read_u32(&self) -> Result<Vec<u32>, DecodeError> {
        match self.layout.component_type {
            ComponentType::U8 => self.read_components(|bytes| bytes[0] as u32, 0),
            ComponentType::U16 => {
                self.read_components(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]) as u32, 0)
            }
            ComponentType::U32 => self.read_components(
                |bytes| u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                0,
            ),
            ComponentType::I8 => {
                Self::reject_negative(self.read_components(|bytes| bytes[0] as i8 as i64, 0)?)
            }
            ComponentType::I16 => Self::reject_negative(
                self.read_components(|bytes| i16::from_le_bytes([bytes[0], bytes[1]]) as i64, 0)?,
            ),
            ComponentType::I32 => Self::reject_negative(self.read_components(
                |bytes| i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
                0,
            )?),
            actual @ ComponentType::F32 => Err(DecodeError::UnsupportedComponentType {
                expected: "integer",
                actual,
            }),
        }
    }

    fn reject_negative(values: Vec<i64>) -> Result<Vec<u32>, DecodeError> {
        values
            .into_iter()
            .enumerate()
            .map(|(position, value)| {
                u32::try_from(value).map_err(|_| DecodeError::NegativeIndex { position, value })
            })
            .collect()
    }

    /// Read a SCALAR integer accessor as vertex indices.
    pub fn read_indices(&self) -> Result<Vec<u32>, DecodeError> {
        self.expect_kind(ElementKind::Scalar)?;
        self.read_u32()
    }

    pub fn read_scalars(&self) -> Result<Vec<f32>, DecodeError> {
        self.expect_kind(ElementKind::Scalar)?;
        self.read_f32()
    }

    pub fn read_vec2_normalized(&self) -> Result<Vec<[f32; 2]>, DecodeError> {
        self.expect_kind(ElementKind::Vec2)?;
        Ok(chunk_vec2(&self.read_normalized()?))
    }

    pub fn read_vec3(&self) -> Result<Vec<[f32; 3]>, DecodeError> {
        self.expect_kind(ElementKind::Vec3)?;
        Ok(chunk_vec3(&self.read_f32()?))
    }

    pub fn read_vec4_normalized(&self) -> Result<Vec<[f32; 4]>, DecodeError> {
        self.expect_kind(ElementKind::Vec4)?;
        Ok(chunk_vec4(&self.read_normalized()?))
    }

    pub fn read_uvec4(&self) -> Result<Vec<[u32; 4]>, DecodeError> {
        self.expect_kind(ElementKind::Vec4)?;
        Ok(chunk_vec4(&self.read_u32()?))
    }

    pub fn read_mat4(&self) -> Result<Vec<Mat4>, DecodeError> {
        self.expect_kind(ElementKind::Mat4)?;
        Ok(chunk_mat4(&self.read_f32()?))
    }
}
