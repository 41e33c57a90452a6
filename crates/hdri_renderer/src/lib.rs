//! HDRI Renderer - importance sampled environment lighting on spheres.
//!
//! Renders what a mirror or glossy ball placed in an environment map would
//! look like, by Monte Carlo integration over luminance-importance-sampled
//! environment directions.

mod brdf;
mod importance;
mod phong;
mod renderer;
mod sampler;

pub use brdf::BrdfModel;
pub use importance::{
    find_inverse, sample_em, sample_em_with_mode, EnvDistribution, SampleCoord, SamplingError,
    SamplingMode, SamplingResult,
};
pub use phong::{LobeSample, PhongSampler};
pub use renderer::{
    latlong_to_sphere, reflectance_sphere, render, render_biased, sample_direction, worker_seed,
    RenderConfig,
};
pub use sampler::{Haynes, ParkMiller, RandSampler, UniformSampler};

/// Re-export the image and math types used in the public API
pub use hdri_core::{HdrImage, Sphere};
pub use hdri_math::{IVec3, Vec3};
