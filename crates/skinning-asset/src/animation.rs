use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, Mul},
};

use glam::{Quat, Vec3};

use crate::sampler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelPath {
    Translation,
    Rotation,
    Scale,
    // Morph target weights and anything else the skeleton can't consume
    Unknown(String),
}

impl Display for ChannelPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChannelPath::Translation => write!(f, "translation"),
            ChannelPath::Rotation => write!(f, "rotation"),
            ChannelPath::Scale => write!(f, "scale"),
            ChannelPath::Unknown(path) => write!(f, "{}", path),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

/// Value types a channel can drive.
pub trait Interpolate: Copy + Debug + Mul<f32, Output = Self> + Add<Self, Output = Self> {
    /// Returned when there is nothing to sample.
    fn identity() -> Self;

    fn interpolate(from: Self, to: Self, factor: f32) -> Self;

    /// Applied to every value produced by blending keyframes.
    fn finish(self) -> Self {
        self
    }

    /// Cubic Hermite spline between keyframes `k` and `k + 1`, with
    /// `out_tangent` leaving `from` and `in_tangent` entering `to`.
    fn hermite(
        from: Self,
        out_tangent: Self,
        to: Self,
        in_tangent: Self,
        factor: f32,
        delta: f32,
    ) -> Self {
        let t2 = factor * factor;
        let t3 = t2 * factor;
        from * (2.0 * t3 - 3.0 * t2 + 1.0)
            + out_tangent * (delta * (t3 - 2.0 * t2 + factor))
            + to * (-2.0 * t3 + 3.0 * t2)
            + in_tangent * (delta * (t3 - t2))
    }
}

impl Interpolate for Vec3 {
    fn identity() -> Self {
        Vec3::ZERO
    }

    fn interpolate(from: Self, to: Self, factor: f32) -> Self {
        from * (1.0 - factor) + to * factor
    }
}

impl Interpolate for Quat {
    fn identity() -> Self {
        Quat::IDENTITY
    }

    fn interpolate(from: Self, to: Self, factor: f32) -> Self {
        sampler::slerp(from, to, factor)
    }

    fn finish(self) -> Self {
        self.normalize()
    }
}

/// Keyframe values of one channel. `tangents` holds `(in, out)` pairs and is
/// only filled for cubic spline channels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track<T> {
    pub values: Vec<T>,
    pub tangents: Vec<(T, T)>,
}

impl<T> Track<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self {
            values,
            tangents: Vec::new(),
        }
    }

    /// Split glTF cubic spline output, stored as `in, value, out` triplets.
    pub fn from_triplets(data: Vec<T>) -> Self
    where
        T: Copy,
    {
        let mut values = Vec::with_capacity(data.len() / 3);
        let mut tangents = Vec::with_capacity(data.len() / 3);
        for triplet in data.chunks_exact(3) {
            tangents.push((triplet[0], triplet[2]));
            values.push(triplet[1]);
        }
        Self { values, tangents }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    Translation(Track<Vec3>),
    Rotation(Track<Quat>),
    Scale(Track<Vec3>),
    Unknown(String),
}

impl ChannelValues {
    pub fn path(&self) -> ChannelPath {
        match self {
            ChannelValues::Translation(_) => ChannelPath::Translation,
            ChannelValues::Rotation(_) => ChannelPath::Rotation,
            ChannelValues::Scale(_) => ChannelPath::Scale,
            ChannelValues::Unknown(path) => ChannelPath::Unknown(path.clone()),
        }
    }

    /// Number of keyframe values, `None` for unknown paths.
    pub fn len(&self) -> Option<usize> {
        match self {
            ChannelValues::Translation(track) | ChannelValues::Scale(track) => Some(track.len()),
            ChannelValues::Rotation(track) => Some(track.len()),
            ChannelValues::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationChannel {
    pub target_node: usize,
    /// Strictly ascending keyframe times in seconds.
    pub times: Vec<f32>,
    pub interpolation: Interpolation,
    pub values: ChannelValues,
}

impl AnimationChannel {
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animation {
    pub name: Option<String>,
    pub channels: Vec<AnimationChannel>,
    pub duration: f32,
}

impl Animation {
    pub fn new(name: Option<String>, channels: Vec<AnimationChannel>) -> Self {
        let duration = channels
            .iter()
            .map(AnimationChannel::end_time)
            .fold(0.0, f32::max);
        Self {
            name,
            channels,
            duration,
        }
    }
}
