//! HDRI Math - vector primitives and screen-space geometry.
//!
//! Re-exports glam for vector algebra and adds the few geometric
//! contracts the image engine relies on:
//!
//! - [`Interval`] for value windows and clamping
//! - [`Sphere`], a screen-space disc parameterizing a unit hemisphere
//! - equirectangular (lat-long) direction mapping

pub use glam::*;

mod interval;
mod latlong;
mod sphere;

pub use interval::Interval;
pub use latlong::{direction_to_latlong, latlong_to_direction};
pub use sphere::{Sphere, OUTSIDE};
