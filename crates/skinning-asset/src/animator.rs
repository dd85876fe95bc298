//! Playback of one animation over one skeleton.
//!
//! An [`Animator`] refers to its skeleton and animation by handle, so it holds
//! no borrow of the [`crate::model::Model`] that owns them. Every call that
//! needs the data takes the model's tables and resolves the handles again.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use glam::Mat4;
use log::{trace, warn};

use crate::{
    animation::{Animation, ChannelValues},
    index::{AnimationHandle, SkeletonHandle},
    node::DecomposedTransform,
    sampler::sample_track,
    skin::Skeleton,
};

/// Size of the bone palette handed to the renderer.
pub const MAX_JOINTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Unbound,
    Playing { looping: bool },
    Paused,
    /// A one-shot animation reached its end.
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimatorError {
    InvalidSkeleton(SkeletonHandle),
    InvalidAnimation(AnimationHandle),
    TooManyJoints { count: usize, max: usize },
    /// The skeleton or animation behind a handle changed shape since `bind`.
    StaleBinding {
        skeleton: SkeletonHandle,
        animation: AnimationHandle,
    },
}

impl Display for AnimatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AnimatorError::InvalidSkeleton(handle) => write!(f, "No such skeleton: {}", handle),
            AnimatorError::InvalidAnimation(handle) => write!(f, "No such animation: {}", handle),
            AnimatorError::TooManyJoints { count, max } => write!(
                f,
                "Skeleton has {} joints, but at most {} are supported",
                count, max
            ),
            AnimatorError::StaleBinding {
                skeleton,
                animation,
            } => write!(
                f,
                "{} or {} changed since it was bound, bind again",
                skeleton, animation
            ),
        }
    }
}

impl Error for AnimatorError {}

#[derive(Debug, Clone)]
struct Binding {
    skeleton: SkeletonHandle,
    animation: AnimationHandle,
    joint_count: usize,
    order: Vec<(usize, Option<usize>)>,
    // Joint driven by each channel of the animation
    channel_joints: Vec<Option<usize>>,
    locals: Vec<DecomposedTransform>,
    globals: Vec<Mat4>,
}

impl Binding {
    fn resolve<'a>(
        &self,
        skeletons: &'a [Skeleton],
        animations: &'a [Animation],
    ) -> Result<(&'a Skeleton, &'a Animation), AnimatorError> {
        let skeleton = skeletons
            .get(self.skeleton.0)
            .ok_or(AnimatorError::InvalidSkeleton(self.skeleton))?;
        let animation = animations
            .get(self.animation.0)
            .ok_or(AnimatorError::InvalidAnimation(self.animation))?;
        // Cached indices are only valid for the shapes seen at bind time
        if skeleton.joints.len() != self.joint_count
            || animation.channels.len() != self.channel_joints.len()
        {
            return Err(AnimatorError::StaleBinding {
                skeleton: self.skeleton,
                animation: self.animation,
            });
        }
        Ok((skeleton, animation))
    }

    /// Sample every channel at `time` and write the skinning matrices.
    fn evaluate(
        &mut self,
        skeleton: &Skeleton,
        animation: &Animation,
        time: f32,
        output: &mut [Mat4; MAX_JOINTS],
    ) {
        self.locals.clear();
        self.locals
            .extend(skeleton.joints.iter().map(|joint| joint.rest));

        for (channel, joint) in animation.channels.iter().zip(&self.channel_joints) {
            let Some(local) = joint.and_then(|joint| self.locals.get_mut(joint)) else {
                continue;
            };
            if channel.times.is_empty() {
                continue;
            }
            let (times, interpolation) = (&channel.times, channel.interpolation);
            match &channel.values {
                ChannelValues::Translation(track) => {
                    local.translation = sample_track(times, track, interpolation, time)
                }
                ChannelValues::Rotation(track) => {
                    local.rotation = sample_track(times, track, interpolation, time)
                }
                ChannelValues::Scale(track) => {
                    local.scale = sample_track(times, track, interpolation, time)
                }
                ChannelValues::Unknown(_) => (),
            }
        }

        self.globals.clear();
        self.globals.resize(skeleton.joints.len(), Mat4::IDENTITY);
        for (joint, parent) in &self.order {
            let parent = parent.map_or(Mat4::IDENTITY, |parent| self.globals[parent]);
            let global = parent * self.locals[*joint].to_matrix();
            self.globals[*joint] = global;
            output[*joint] = global * skeleton.joints[*joint].inverse_bind_matrix;
        }
        trace!(
            "Evaluated {} joints of {} at {:.3}s",
            self.order.len(),
            self.animation,
            time
        );
    }
}

#[derive(Debug, Clone)]
pub struct Animator {
    binding: Option<Binding>,
    state: PlaybackState,
    current_time: f32,
    speed: f32,
    looping: bool,
    final_bone_transforms: [Mat4; MAX_JOINTS],
}

impl Default for Animator {
    fn default() -> Self {
        Self {
            binding: None,
            state: PlaybackState::Unbound,
            current_time: 0.0,
            speed: 1.0,
            looping: false,
            final_bone_transforms: [Mat4::IDENTITY; MAX_JOINTS],
        }
    }
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start playing `animation` on `skeleton` from time zero.
    pub fn bind(
        &mut self,
        skeletons: &[Skeleton],
        animations: &[Animation],
        skeleton: SkeletonHandle,
        animation: AnimationHandle,
        speed: f32,
        looping: bool,
    ) -> Result<(), AnimatorError> {
        let skeleton_data = skeletons
            .get(skeleton.0)
            .ok_or(AnimatorError::InvalidSkeleton(skeleton))?;
        let animation_data = animations
            .get(animation.0)
            .ok_or(AnimatorError::InvalidAnimation(animation))?;
        if skeleton_data.joints.len() > MAX_JOINTS {
            return Err(AnimatorError::TooManyJoints {
                count: skeleton_data.joints.len(),
                max: MAX_JOINTS,
            });
        }

        let channel_joints: Vec<Option<usize>> = animation_data
            .channels
            .iter()
            .map(|channel| skeleton_data.joint_for_node(channel.target_node))
            .collect();
        let skipped = channel_joints.iter().filter(|joint| joint.is_none()).count();
        if skipped > 0 {
            warn!(
                "{} channel(s) of {} target nodes outside {}, skipping them",
                skipped, animation, skeleton
            );
        }

        let mut binding = Binding {
            skeleton,
            animation,
            joint_count: skeleton_data.joints.len(),
            order: skeleton_data.traversal_order(),
            channel_joints,
            locals: Vec::with_capacity(skeleton_data.joints.len()),
            globals: Vec::with_capacity(skeleton_data.joints.len()),
        };
        self.final_bone_transforms = [Mat4::IDENTITY; MAX_JOINTS];
        binding.evaluate(
            skeleton_data,
            animation_data,
            0.0,
            &mut self.final_bone_transforms,
        );

        self.binding = Some(binding);
        self.current_time = 0.0;
        self.speed = speed;
        self.looping = looping;
        self.state = PlaybackState::Playing { looping };
        Ok(())
    }

    /// Advance playback by `delta_time` seconds and recompute the bone palette.
    /// Does nothing unless playing.
    pub fn update(
        &mut self,
        skeletons: &[Skeleton],
        animations: &[Animation],
        delta_time: f32,
    ) -> Result<(), AnimatorError> {
        let PlaybackState::Playing { looping } = self.state else {
            return Ok(());
        };
        let Some(binding) = self.binding.as_mut() else {
            return Ok(());
        };
        let (skeleton, animation) = binding.resolve(skeletons, animations)?;
        let duration = animation.duration;

        let step = delta_time * self.speed;
        if !step.is_finite() {
            warn!("Ignoring non-finite time step {}", step);
            return Ok(());
        }
        self.current_time += step;
        if looping {
            if duration <= 0.0 {
                self.current_time = 0.0;
            } else if self.current_time > duration || self.current_time < 0.0 {
                self.current_time = self.current_time.rem_euclid(duration);
            }
        } else if self.current_time >= duration {
            self.current_time = duration;
            self.state = PlaybackState::Finished;
        } else if self.current_time < 0.0 {
            self.current_time = 0.0;
        }

        binding.evaluate(
            skeleton,
            animation,
            self.current_time,
            &mut self.final_bone_transforms,
        );
        Ok(())
    }

    /// Jump to `time`, clamped (or wrapped, when looping) into the animation.
    pub fn seek(
        &mut self,
        skeletons: &[Skeleton],
        animations: &[Animation],
        time: f32,
    ) -> Result<(), AnimatorError> {
        let Some(binding) = self.binding.as_mut() else {
            return Ok(());
        };
        let (skeleton, animation) = binding.resolve(skeletons, animations)?;
        let duration = animation.duration;
        if !time.is_finite() {
            warn!("Ignoring seek to non-finite time {}", time);
            return Ok(());
        }

        self.current_time = if self.looping && duration > 0.0 {
            time.rem_euclid(duration)
        } else {
            time.clamp(0.0, duration.max(0.0))
        };
        if self.state == PlaybackState::Finished && self.current_time < duration {
            self.state = PlaybackState::Playing {
                looping: self.looping,
            };
        }

        binding.evaluate(
            skeleton,
            animation,
            self.current_time,
            &mut self.final_bone_transforms,
        );
        Ok(())
    }

    pub fn pause(&mut self) {
        if let PlaybackState::Playing { .. } = self.state {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing {
                looping: self.looping,
            };
        }
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Unbind and reset the palette to identity.
    pub fn stop(&mut self) {
        *self = Self::default();
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn skeleton(&self) -> Option<SkeletonHandle> {
        self.binding.as_ref().map(|binding| binding.skeleton)
    }

    pub fn animation(&self) -> Option<AnimationHandle> {
        self.binding.as_ref().map(|binding| binding.animation)
    }

    /// Joints evaluated each tick. Palette entries past the skeleton stay identity.
    pub fn joint_count(&self) -> usize {
        self.binding
            .as_ref()
            .map_or(0, |binding| binding.order.len())
    }

    pub fn final_bone_transforms(&self) -> &[Mat4; MAX_JOINTS] {
        &self.final_bone_transforms
    }

    /// The palette as raw column-major `f32` data, ready for a constant buffer.
    pub fn palette_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.final_bone_transforms[..])
    }
}
