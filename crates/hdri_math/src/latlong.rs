//! Equirectangular (lat-long) mapping between image coordinates and directions.
//!
//! `u` runs left to right across the longitude, `v` top to bottom from the
//! +Y pole. Both are normalized to [0, 1].

use glam::Vec3;
use std::f32::consts::{PI, TAU};

/// Converts lat-long coordinates to a unit direction.
///
/// `theta = v * PI` is measured from +Y and `phi = (u - 0.5) * 2PI` around
/// it, starting from +Z.
pub fn latlong_to_direction(u: f32, v: f32) -> Vec3 {
    let theta = v * PI;
    let phi = (u - 0.5) * TAU;
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(sin_theta * sin_phi, cos_theta, sin_theta * cos_phi)
}

/// Converts a direction to lat-long coordinates. Inverse of [`latlong_to_direction`].
///
/// The direction does not need to be normalized; a zero vector maps to the
/// image center.
pub fn direction_to_latlong(dir: Vec3) -> (f32, f32) {
    let dir = dir.normalize_or_zero();
    if dir == Vec3::ZERO {
        return (0.5, 0.5);
    }
    let v = dir.y.clamp(-1.0, 1.0).acos() / PI;
    let u = dir.x.atan2(dir.z) / TAU + 0.5;
    (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
}
