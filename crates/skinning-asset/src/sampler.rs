//! Keyframe sampling.
//!
//! Every sampler shares the same boundary rules: nothing to sample gives the
//! identity value, a time at or before the first keyframe gives the first value
//! and a time at or after the last keyframe gives the last value. A time that
//! lands exactly on a keyframe returns the stored value untouched.

use glam::Quat;

use crate::animation::{Interpolate, Interpolation, Track};

/// Dot product above which two rotations are treated as parallel.
const SLERP_EPSILON: f32 = 1e-5;

enum Position {
    Exact(usize),
    // Interval start and factor inside it
    Between(usize, f32),
}

fn locate(times: &[f32], t: f32) -> Option<Position> {
    let (first, last) = (*times.first()?, *times.last()?);
    if t <= first {
        return Some(Position::Exact(0));
    }
    if t >= last {
        return Some(Position::Exact(times.len() - 1));
    }
    // First keyframe strictly after t. A NaN time or unsorted keyframes can
    // put it at either end.
    let next = times.partition_point(|time| *time <= t);
    let Some(index) = next.checked_sub(1) else {
        return Some(Position::Exact(0));
    };
    let start = times[index];
    let Some(end) = times.get(next) else {
        return Some(Position::Exact(index));
    };
    if t == start {
        return Some(Position::Exact(index));
    }
    let span = end - start;
    if span <= 0.0 {
        return Some(Position::Exact(index));
    }
    Some(Position::Between(index, (t - start) / span))
}

/// Linear sampling: `lerp` for vectors, `slerp` for rotations.
pub fn sample<T: Interpolate>(times: &[f32], values: &[T], t: f32) -> T {
    let count = times.len().min(values.len());
    match locate(&times[..count], t) {
        None => T::identity(),
        Some(Position::Exact(index)) => values[index],
        Some(Position::Between(index, factor)) => {
            T::interpolate(values[index], values[index + 1], factor).finish()
        }
    }
}

/// Holds each keyframe until the next one.
pub fn sample_step<T: Interpolate>(times: &[f32], values: &[T], t: f32) -> T {
    let count = times.len().min(values.len());
    match locate(&times[..count], t) {
        None => T::identity(),
        Some(Position::Exact(index)) | Some(Position::Between(index, _)) => values[index],
    }
}

/// Hermite spline through `values` with `(in, out)` tangents per keyframe.
/// Falls back to linear sampling when tangents are missing.
pub fn sample_cubic_spline<T: Interpolate>(
    times: &[f32],
    values: &[T],
    tangents: &[(T, T)],
    t: f32,
) -> T {
    let count = times.len().min(values.len());
    if tangents.len() < count {
        return sample(times, values, t);
    }
    match locate(&times[..count], t) {
        None => T::identity(),
        Some(Position::Exact(index)) => values[index],
        Some(Position::Between(index, factor)) => {
            let delta = times[index + 1] - times[index];
            T::hermite(
                values[index],
                tangents[index].1,
                values[index + 1],
                tangents[index + 1].0,
                factor,
                delta,
            )
            .finish()
        }
    }
}

pub fn sample_track<T: Interpolate>(
    times: &[f32],
    track: &Track<T>,
    interpolation: Interpolation,
    t: f32,
) -> T {
    match interpolation {
        Interpolation::Linear => sample(times, &track.values, t),
        Interpolation::Step => sample_step(times, &track.values, t),
        Interpolation::CubicSpline => sample_cubic_spline(times, &track.values, &track.tangents, t),
    }
}

/// Shortest-arc spherical interpolation. The result is always normalized.
pub fn slerp(from: Quat, to: Quat, factor: f32) -> Quat {
    let mut to = to;
    let mut dot = from.dot(to);
    if dot < 0.0 {
        to = -to;
        dot = -dot;
    }

    if dot > 1.0 - SLERP_EPSILON {
        return (from * (1.0 - factor) + to * factor).normalize();
    }

    let theta = dot.acos();
    let sin_theta = theta.sin();
    let from_weight = ((1.0 - factor) * theta).sin() / sin_theta;
    let to_weight = (factor * theta).sin() / sin_theta;
    (from * from_weight + to * to_weight).normalize()
}

#[cfg(test)]
mod test {
    use std::f32::consts::FRAC_PI_2;

    use glam::Vec3;

    use super::*;

    const TIMES: [f32; 3] = [0.0, 1.0, 2.0];

    fn translations() -> [Vec3; 3] {
        [Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)]
    }

    fn same_rotation(a: Quat, b: Quat) -> bool {
        a.dot(b).abs() > 1.0 - 1e-5
    }

    #[test]
    fn linear_translation() {
        let values = translations();
        assert_eq!(sample(&TIMES, &values, 0.5), Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(sample(&TIMES, &values, 1.5), Vec3::new(1.5, 0.0, 0.0));
        assert_eq!(sample(&TIMES, &values, -1.0), Vec3::ZERO);
        assert_eq!(sample(&TIMES, &values, 5.0), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn keyframes_are_exact() {
        let times = [0.0, 0.3, 0.7, 1.1];
        let rotations = [
            Quat::from_rotation_x(0.1),
            Quat::from_rotation_y(1.3),
            Quat::from_rotation_z(-0.4),
            Quat::from_xyzw(0.5, 0.5, 0.5, 0.5),
        ];
        let translations = [
            Vec3::new(0.1, 0.2, 0.3),
            Vec3::new(-1.0, 3.3, 0.7),
            Vec3::new(9.0, 0.0, 1.0),
            Vec3::ONE,
        ];
        for (index, time) in times.iter().enumerate() {
            assert_eq!(sample(&times, &rotations, *time), rotations[index]);
            assert_eq!(sample(&times, &translations, *time), translations[index]);
            assert_eq!(sample_step(&times, &translations, *time), translations[index]);
        }
    }

    #[test]
    fn empty_tracks_give_identity() {
        assert_eq!(sample::<Vec3>(&[], &[], 1.0), Vec3::ZERO);
        assert_eq!(sample::<Quat>(&[0.0], &[], 1.0), Quat::IDENTITY);
    }

    #[test]
    fn nan_time_gives_first_keyframe() {
        let values = translations();
        let tangents = [(Vec3::ZERO, Vec3::ZERO); 3];
        assert_eq!(sample(&TIMES, &values, f32::NAN), values[0]);
        assert_eq!(sample_step(&TIMES, &values, f32::NAN), values[0]);
        assert_eq!(
            sample_cubic_spline(&TIMES, &values, &tangents, f32::NAN),
            values[0]
        );
    }

    #[test]
    fn unsorted_keyframes_do_not_panic() {
        let times = [0.0, 3.0, 0.5, 2.0];
        let values = [Vec3::ZERO, Vec3::ONE, Vec3::X, Vec3::Y];
        for t in [0.25, 0.75, 1.0, 1.9] {
            assert!(sample(&times, &values, t).is_finite());
        }
    }

    #[test]
    fn step_holds_left_keyframe() {
        let values = translations();
        assert_eq!(sample_step(&TIMES, &values, 0.99), Vec3::ZERO);
        assert_eq!(sample_step(&TIMES, &values, 1.5), values[1]);
        assert_eq!(sample_step(&TIMES, &values, 3.0), values[2]);
    }

    #[test]
    fn cubic_spline_with_zero_tangents_is_smoothstep() {
        let values = [Vec3::ZERO, Vec3::ONE];
        let tangents = [(Vec3::ZERO, Vec3::ZERO); 2];
        let middle = sample_cubic_spline(&[0.0, 1.0], &values, &tangents, 0.5);
        assert!(middle.abs_diff_eq(Vec3::splat(0.5), 1e-6));
        let early = sample_cubic_spline(&[0.0, 1.0], &values, &tangents, 0.25);
        assert!(early.abs_diff_eq(Vec3::splat(0.15625), 1e-6));
        assert_eq!(sample_cubic_spline(&[0.0, 1.0], &values, &tangents, 1.0), Vec3::ONE);
    }

    #[test]
    fn cubic_spline_without_tangents_is_linear() {
        let values = translations();
        assert_eq!(
            sample_cubic_spline(&TIMES, &values, &[], 0.5),
            Vec3::new(0.5, 0.0, 0.0)
        );
    }

    #[test]
    fn slerp_identity_law() {
        let q = Quat::from_axis_angle(Vec3::new(1.0, 2.0, 3.0).normalize(), 0.8);
        for step in 0..=10 {
            let t = step as f32 / 10.0;
            assert!(slerp(q, q, t).abs_diff_eq(q, 1e-6));
        }
    }

    #[test]
    fn slerp_takes_shortest_arc() {
        let q = Quat::from_rotation_y(0.7);
        assert!(same_rotation(slerp(q, q, 0.5), slerp(q, -q, 0.5)));

        let half = slerp(Quat::IDENTITY, -Quat::from_rotation_z(FRAC_PI_2), 0.5);
        assert!(same_rotation(half, Quat::from_rotation_z(FRAC_PI_2 / 2.0)));
    }

    #[test]
    fn slerp_is_normalized() {
        let from = Quat::from_rotation_x(0.2);
        let to = Quat::from_rotation_x(2.9);
        for step in 0..=8 {
            let rotation = slerp(from, to, step as f32 / 8.0);
            assert!((rotation.length() - 1.0).abs() < 1e-5);
        }
        let quarter = slerp(from, to, 0.25);
        assert!(same_rotation(quarter, Quat::from_rotation_x(0.2 + 2.7 * 0.25)));
    }
}
