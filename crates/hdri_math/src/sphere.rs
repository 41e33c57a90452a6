//! Screen-space sphere used for mirror-ball rendering.
//!
//! The sphere is a disc of integer center and radius in image space. Each
//! covered pixel maps to a point of the unit hemisphere facing the viewer,
//! with `z` derived from the sphere equation. Image rows grow downward while
//! the hemisphere frame is y-up.

use glam::{IVec2, IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Sentinel returned for pixels that are not covered by the sphere.
pub const OUTSIDE: Vec3 = Vec3::NEG_ONE;

/// A screen-space sphere.
///
/// Deserialization goes through [`Sphere::new`], so the radius is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SphereFields")]
pub struct Sphere {
    center: IVec3,
    radius: i32,
}

#[derive(Deserialize)]
struct SphereFields {
    center: IVec3,
    radius: i32,
}

impl From<SphereFields> for Sphere {
    fn from(fields: SphereFields) -> Self {
        Self::new(fields.center, fields.radius)
    }
}

impl Sphere {
    /// Create a new sphere. Negative radii are clamped to zero.
    pub fn new(center: IVec3, radius: i32) -> Self {
        Self {
            center,
            radius: radius.max(0),
        }
    }

    pub fn center(&self) -> IVec3 {
        self.center
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Inclusive screen-space bounding box as (min corner, max corner).
    ///
    /// Corners saturate at the `i32` range.
    pub fn bounds(&self) -> (IVec2, IVec2) {
        let (cx, cy, r) = (self.center.x, self.center.y, self.radius);
        (
            IVec2::new(cx.saturating_sub(r), cy.saturating_sub(r)),
            IVec2::new(cx.saturating_add(r), cy.saturating_add(r)),
        )
    }

    /// Returns true if the whole bounding box lies inside a `width` x `height` image.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        let (cx, cy, r) = (
            self.center.x as i64,
            self.center.y as i64,
            self.radius as i64,
        );
        let (width, height) = (
            i64::try_from(width).unwrap_or(i64::MAX),
            i64::try_from(height).unwrap_or(i64::MAX),
        );
        r >= 0 && cx - r >= 0 && cy - r >= 0 && cx + r < width && cy + r < height
    }

    /// Unit surface normal seen through pixel (x, y), or [`OUTSIDE`].
    ///
    /// Pixels on or beyond the rim (`dx² + dy² >= r²`) are outside.
    pub fn normal_xy(&self, x: i32, y: i32) -> Vec3 {
        let dx = x as i64 - self.center.x as i64;
        let dy = self.center.y as i64 - y as i64;
        let r = self.radius as i64;
        if dx.abs() >= r || dy.abs() >= r {
            return OUTSIDE;
        }
        let r2 = r * r;
        let d2 = dx * dx + dy * dy;
        if d2 >= r2 {
            return OUTSIDE;
        }
        let z = ((r2 - d2) as f32).sqrt();
        Vec3::new(dx as f32, dy as f32, z) / self.radius as f32
    }

    /// Mirror reflection of `view` about the normal at pixel (x, y).
    ///
    /// Computes `normalize(2(n.v)n - v)`. Pixels outside the sphere return
    /// [`OUTSIDE`] unchanged.
    pub fn reflectance_xy(&self, x: i32, y: i32, view: Vec3) -> Vec3 {
        let n = self.normal_xy(x, y);
        if n == OUTSIDE {
            return OUTSIDE;
        }
        (2.0 * n.dot(view) * n - view).normalize_or_zero()
    }
}
