//! Monte Carlo rendering of an environment map onto a screen-space sphere.
//!
//! For every covered pixel the view vector is mirrored about the sphere
//! normal, environment directions are importance sampled by luminance, and
//! each sample contributes `brdf * cos * (radiance / |radiance|)`. The sum is
//! scaled by the map's solid-angle weighted mean radiance.
//!
//! - [`render_biased`] shares one sample set between all pixels
//! - [`render`] draws a fresh set per pixel, with one RNG stream per worker

use glam::Vec3;
use hdri_core::{HdrImage, Sphere};
use hdri_math::{direction_to_latlong, latlong_to_direction, OUTSIDE};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::brdf::BrdfModel;
use crate::importance::{sample_em, EnvDistribution, SampleCoord, SamplingResult};
use crate::sampler::UniformSampler;

/// Render configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Environment samples per pixel
    pub samples: usize,
    /// Direction towards the viewer
    pub view: Vec3,
    /// Base seed of the per-worker RNG streams
    pub seed: u64,
    /// Number of row ranges rendered independently
    pub workers: usize,
    /// Share one sample set between all pixels
    pub biased: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            samples: 64,
            view: Vec3::Z,
            seed: 0,
            workers: rayon::current_num_threads(),
            biased: false,
        }
    }
}

/// Seed of worker `index`'s stream: `base + (17 index)² + 13`.
pub fn worker_seed(base: u64, index: usize) -> u64 {
    let offset = (index as u64).wrapping_mul(17);
    base.wrapping_add(offset.wrapping_mul(offset)).wrapping_add(13)
}

/// Normalized position of `index` along an axis of `len` pixels.
#[inline]
fn axis_coord(index: usize, len: usize) -> f32 {
    if len > 1 {
        index as f32 / (len - 1) as f32
    } else {
        0.5
    }
}

/// Direction of an environment sample.
pub fn sample_direction(env: &HdrImage, coord: SampleCoord) -> Vec3 {
    let u = axis_coord(coord.col, env.width());
    let v = axis_coord(coord.row, env.height());
    latlong_to_direction(u, v).normalize_or_zero()
}

/// Precomputed per-sample terms that do not depend on the shaded pixel.
#[derive(Debug, Clone, Copy)]
struct Contribution {
    dir: Vec3,
    color: Vec3,
}

impl Contribution {
    /// `None` for black samples, which add nothing.
    fn new(env: &HdrImage, coord: SampleCoord, brdf: &BrdfModel) -> Option<Self> {
        let radiance = Vec3::from_array(env.pixel(coord.col, coord.row));
        let norm = radiance.length();
        if norm <= 0.0 || !norm.is_finite() {
            return None;
        }
        let dir = sample_direction(env, coord);
        let f = brdf.phong(dir, dir, dir);
        Some(Self {
            dir,
            color: radiance * (f / norm),
        })
    }

    #[inline]
    fn shade(&self, reflected: Vec3) -> Vec3 {
        self.color * (-self.dir.dot(reflected)).max(0.0)
    }
}

/// Inclusive pixel ranges covered by `sphere`, or `None` if it leaves the image.
fn covered_box(image: &HdrImage, sphere: &Sphere) -> Option<(usize, usize, usize, usize)> {
    if image.is_empty() || !sphere.fits_within(image.width(), image.height()) {
        return None;
    }
    let (lo, hi) = sphere.bounds();
    Some((lo.x as usize, hi.x as usize, lo.y as usize, hi.y as usize))
}

/// Write the mirror direction of `view` for every pixel covered by `sphere`.
///
/// The cached bounds become `[-1, 1]`. Spheres reaching past the image edge
/// leave the image untouched.
pub fn reflectance_sphere(image: &mut HdrImage, sphere: &Sphere, view: Vec3) {
    let Some((x0, x1, y0, y1)) = covered_box(image, sphere) else {
        log::debug!("reflectance_sphere: sphere outside image, skipped");
        return;
    };
    image
        .par_rows_mut()
        .enumerate()
        .skip(y0)
        .take(y1 - y0 + 1)
        .for_each(|(y, row)| {
            for x in x0..=x1 {
                let r = sphere.reflectance_xy(x as i32, y as i32, view);
                if r != OUTSIDE {
                    hdri_core::pixel::set_row_pixel(row, x, r.to_array());
                }
            }
        });
    image.set_channel_bounds(-1.0, 1.0);
}

/// Mirror-ball lookup: each covered pixel takes the environment radiance in
/// its reflected direction.
///
/// `x_offset` rotates the map in longitude and `y_offset` shifts it in
/// latitude, both in environment pixels with wrap-around. The cached bounds
/// are copied from `env`.
pub fn latlong_to_sphere(
    image: &mut HdrImage,
    sphere: &Sphere,
    view: Vec3,
    env: &HdrImage,
    x_offset: isize,
    y_offset: isize,
) {
    if env.is_empty() {
        return;
    }
    let Some((x0, x1, y0, y1)) = covered_box(image, sphere) else {
        log::debug!("latlong_to_sphere: sphere outside image, skipped");
        return;
    };
    let (env_w, env_h) = (env.width() as isize, env.height() as isize);
    let (x_offset, y_offset) = (x_offset.rem_euclid(env_w), y_offset.rem_euclid(env_h));

    image
        .par_rows_mut()
        .enumerate()
        .skip(y0)
        .take(y1 - y0 + 1)
        .for_each(|(y, row)| {
            for x in x0..=x1 {
                let r = sphere.reflectance_xy(x as i32, y as i32, view);
                if r == OUTSIDE {
                    continue;
                }
                let (u, v) = direction_to_latlong(r);
                let col = ((u * (env_w - 1) as f32).round() as isize + x_offset).rem_euclid(env_w);
                let line = ((v * (env_h - 1) as f32).round() as isize - y_offset).rem_euclid(env_h);
                let rgb = env.pixel(col as usize, line as usize);
                hdri_core::pixel::set_row_pixel(row, x, rgb);
            }
        });
    image.set_channel_bounds(env.min_channel(), env.max_channel());
}

/// Render with one sample set shared by every pixel.
///
/// Cheap, but the error is correlated across the sphere.
pub fn render_biased<R: UniformSampler + ?Sized>(
    image: &mut HdrImage,
    sphere: &Sphere,
    env: &HdrImage,
    view: Vec3,
    samples: usize,
    brdf: &BrdfModel,
    rng: &mut R,
) -> SamplingResult<()> {
    let Some((x0, x1, y0, y1)) = covered_box(image, sphere) else {
        log::debug!("render_biased: sphere outside image, skipped");
        return Ok(());
    };
    if env.is_empty() || samples == 0 {
        return Ok(());
    }
    let dist = EnvDistribution::build(env)?;
    let mut coords = Vec::new();
    sample_em(env, samples, rng, &mut coords, Some(&dist))?;
    image.set_channel_bounds(env.min_channel(), env.max_channel());
    let contributions: Vec<Contribution> = coords
        .iter()
        .filter_map(|&coord| Contribution::new(env, coord, brdf))
        .collect();

    let scale = env.integrate() / samples as f32;
    log::info!(
        "Rendering sphere at {:?} r={} with {} shared samples",
        sphere.center(),
        sphere.radius(),
        samples
    );

    image
        .par_rows_mut()
        .enumerate()
        .skip(y0)
        .take(y1 - y0 + 1)
        .for_each(|(y, row)| {
            for x in x0..=x1 {
                let reflected = sphere.reflectance_xy(x as i32, y as i32, view);
                if reflected == OUTSIDE {
                    continue;
                }
                let acc: Vec3 = contributions.iter().map(|c| c.shade(reflected)).sum();
                hdri_core::pixel::set_row_pixel(row, x, (acc * scale).to_array());
            }
        });
    Ok(())
}

/// Render with an independent sample set for every pixel.
///
/// Covered rows are split into `workers` contiguous ranges. Range `k` draws
/// from a clone of `rng` reseeded with [`worker_seed`], so output is
/// reproducible for a given seed and worker count. A worker that cannot
/// allocate its sample buffer leaves its rows untouched.
#[allow(clippy::too_many_arguments)]
pub fn render<R: UniformSampler + Clone + Send + Sync>(
    image: &mut HdrImage,
    sphere: &Sphere,
    env: &HdrImage,
    view: Vec3,
    samples: usize,
    brdf: &BrdfModel,
    rng: &R,
    workers: usize,
) -> SamplingResult<()> {
    let Some((x0, x1, y0, y1)) = covered_box(image, sphere) else {
        log::debug!("render: sphere outside image, skipped");
        return Ok(());
    };
    if env.is_empty() || samples == 0 {
        return Ok(());
    }
    let dist = EnvDistribution::build(env)?;
    image.set_channel_bounds(env.min_channel(), env.max_channel());
    let scale = env.integrate() / samples as f32;
    let rows = y1 - y0 + 1;
    let workers = workers.clamp(1, rows);
    let rows_per_worker = rows.div_ceil(workers);
    let base = rng.base_seed();
    log::info!(
        "Rendering sphere at {:?} r={} with {} samples/pixel on {} workers",
        sphere.center(),
        sphere.radius(),
        samples,
        workers
    );

    image
        .par_rows_mut()
        .enumerate()
        .skip(y0)
        .take(rows)
        .chunks(rows_per_worker)
        .enumerate()
        .for_each(|(worker, chunk)| {
            let mut rng = rng.clone();
            rng.seed(worker_seed(base, worker));

            let mut coords = Vec::new();
            if coords.try_reserve_exact(samples).is_err() {
                log::warn!("Worker {} could not allocate {} samples, rows skipped", worker, samples);
                return;
            }

            for (y, row) in chunk {
                for x in x0..=x1 {
                    let reflected = sphere.reflectance_xy(x as i32, y as i32, view);
                    if reflected == OUTSIDE {
                        continue;
                    }
                    if let Err(e) = sample_em(env, samples, &mut rng, &mut coords, Some(&dist)) {
                        log::warn!("Worker {} stopped: {}", worker, e);
                        return;
                    }
                    let acc: Vec3 = coords
                        .iter()
                        .filter_map(|&coord| Contribution::new(env, coord, brdf))
                        .map(|c| c.shade(reflected))
                        .sum();
                    hdri_core::pixel::set_row_pixel(row, x, (acc * scale).to_array());
                }
            }
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importance::SamplingError;
    use crate::sampler::Haynes;
    use hdri_math::IVec3;
    use std::f32::consts::PI;

    fn uniform_env(width: usize, height: usize, value: f32) -> HdrImage {
        let mut env = HdrImage::with_size(width, height, value).unwrap();
        env.fill(value);
        env
    }

    fn lambert() -> BrdfModel {
        BrdfModel::new(Vec3::Z, 1.0, 0.0, 1.0)
    }

    /// Expected pixel value for a constant map and a purely diffuse BRDF:
    /// `L * (1/PI) * E[cos+] / sqrt(3)` with `E[cos+] = 1/4` over the sphere.
    fn expected_uniform(env: &HdrImage) -> f32 {
        env.integrate() / PI * 0.25 / 3f32.sqrt()
    }

    #[test]
    fn test_worker_seed() {
        assert_eq!(worker_seed(100, 0), 113);
        assert_eq!(worker_seed(100, 1), 100 + 289 + 13);
        assert_eq!(worker_seed(0, 2), 34 * 34 + 13);
    }

    #[test]
    fn test_reflectance_sphere() {
        let mut image = HdrImage::with_size(21, 21, 1.0).unwrap();
        let sphere = Sphere::new(IVec3::new(10, 10, 0), 8);
        reflectance_sphere(&mut image, &sphere, Vec3::Z);
        let center = image.pixel(10, 10);
        assert!((Vec3::from_array(center) - Vec3::Z).length() < 1e-6);
        assert_eq!(image.pixel(0, 0), [0.0; 3]);
        assert_eq!((image.min_channel(), image.max_channel()), (-1.0, 1.0));
    }

    #[test]
    fn test_latlong_to_sphere_center_sees_forward() {
        let mut env = HdrImage::with_size(9, 5, 1.0).unwrap();
        // Center of the map faces +Z
        env.set_pixel(4, 2, [5.0, 6.0, 7.0]);
        env.refresh_channel_bounds();

        let mut image = HdrImage::with_size(11, 11, 1.0).unwrap();
        let sphere = Sphere::new(IVec3::new(5, 5, 0), 5);
        latlong_to_sphere(&mut image, &sphere, Vec3::Z, &env, 0, 0);
        assert_eq!(image.pixel(5, 5), [5.0, 6.0, 7.0]);
        assert_eq!(image.max_channel(), 7.0);

        // A one-column rotation moves a different texel under the center
        latlong_to_sphere(&mut image, &sphere, Vec3::Z, &env, 1, 0);
        assert_eq!(image.pixel(5, 5), env.pixel(5, 2));

        // Offsets wrap around the map
        latlong_to_sphere(&mut image, &sphere, Vec3::Z, &env, 1 - 9 * 1000, 5);
        assert_eq!(image.pixel(5, 5), env.pixel(5, 2));
        latlong_to_sphere(&mut image, &sphere, Vec3::Z, &env, isize::MIN, isize::MAX);
        assert_eq!(image.max_channel(), 7.0);
    }

    #[test]
    fn test_out_of_bounds_sphere_is_noop() {
        let env = uniform_env(16, 8, 1.0);
        let brdf = lambert();
        let mut image = HdrImage::with_size(20, 20, 1.0).unwrap();
        image.set_pixel(3, 3, [0.5, 0.5, 0.5]);
        let before = image.clone();

        for sphere in [
            Sphere::new(IVec3::new(100, 100, 0), 5),
            Sphere::new(IVec3::new(18, 10, 0), 5),
        ] {
            reflectance_sphere(&mut image, &sphere, Vec3::Z);
            latlong_to_sphere(&mut image, &sphere, Vec3::Z, &env, 0, 0);
            render_biased(&mut image, &sphere, &env, Vec3::Z, 8, &brdf, &mut Haynes::new(1)).unwrap();
            render(&mut image, &sphere, &env, Vec3::Z, 8, &brdf, &Haynes::new(1), 4).unwrap();
            assert_eq!(image, before);
        }
    }

    /// Spheres that cover no pixel of a 30x30 image.
    fn degenerate_spheres() -> Vec<Sphere> {
        let mut spheres: Vec<Sphere> = [
            r#"{"center":[10,10,0],"radius":-5}"#,
            r#"{"center":[0,0,0],"radius":-2147483648}"#,
        ]
        .iter()
        .map(|text| serde_json::from_str(text).unwrap())
        .collect();
        for center in [
            IVec3::new(i32::MAX, 5, 0),
            IVec3::new(5, i32::MAX, 0),
            IVec3::new(i32::MIN, i32::MIN, 0),
            IVec3::new(i32::MAX, i32::MAX, 0),
        ] {
            spheres.push(Sphere::new(center, 5));
            spheres.push(Sphere::new(center, i32::MAX));
        }
        spheres.push(Sphere::new(IVec3::new(15, 15, 0), i32::MAX));
        spheres
    }

    #[test]
    fn test_degenerate_spheres_leave_image_unchanged() {
        // Same bounds as the image, so copying them is not a change
        let env = uniform_env(16, 8, 1.0);
        let brdf = lambert();
        let mut image = HdrImage::with_size(30, 30, 1.0).unwrap();
        image.set_pixel(3, 3, [0.5, 0.5, 0.5]);
        let before = image.clone();

        for sphere in degenerate_spheres() {
            render_biased(&mut image, &sphere, &env, Vec3::Z, 8, &brdf, &mut Haynes::new(1))
                .unwrap();
            render(&mut image, &sphere, &env, Vec3::Z, 8, &brdf, &Haynes::new(1), 4).unwrap();
            latlong_to_sphere(&mut image, &sphere, Vec3::Z, &env, 0, 0);
            assert_eq!(image, before, "{sphere:?}");

            // A fitting zero-radius sphere still resets the bounds to [-1, 1]
            if !sphere.fits_within(image.width(), image.height()) {
                reflectance_sphere(&mut image, &sphere, Vec3::Z);
                assert_eq!(image, before, "{sphere:?}");
            }
        }
    }

    #[test]
    fn test_zero_radius_at_corner_draws_nothing() {
        let env = uniform_env(16, 8, 1.0);
        let mut image = HdrImage::with_size(4, 4, 1.0).unwrap();
        let sphere = Sphere::new(IVec3::ZERO, 0);
        reflectance_sphere(&mut image, &sphere, Vec3::Z);
        latlong_to_sphere(&mut image, &sphere, Vec3::Z, &env, 0, 0);
        render_biased(&mut image, &sphere, &env, Vec3::Z, 8, &lambert(), &mut Haynes::new(1))
            .unwrap();
        render(&mut image, &sphere, &env, Vec3::Z, 8, &lambert(), &Haynes::new(1), 2).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(image.pixel(x, y), [0.0; 3]);
            }
        }
    }

    #[test]
    fn test_failed_render_keeps_bounds() {
        let mut env = uniform_env(8, 8, 2.0);
        env.set_channel_bounds(0.5, 3.0);
        let mut image = HdrImage::with_size(9, 9, 1.0).unwrap();
        let before = image.clone();
        let sphere = Sphere::new(IVec3::new(4, 4, 0), 4);
        let result = render_biased(
            &mut image,
            &sphere,
            &env,
            Vec3::Z,
            usize::MAX,
            &lambert(),
            &mut Haynes::new(1),
        );
        assert!(matches!(result, Err(SamplingError::Allocation { .. })));
        assert_eq!(image, before);
    }

    #[test]
    fn test_render_biased_uniform_env() {
        let env = uniform_env(64, 32, 1.0);
        let mut image = HdrImage::with_size(21, 21, 1.0).unwrap();
        let sphere = Sphere::new(IVec3::new(10, 10, 0), 9);
        let mut rng = Haynes::new(11);
        render_biased(&mut image, &sphere, &env, Vec3::Z, 20_000, &lambert(), &mut rng).unwrap();

        let expected = expected_uniform(&env);
        let p = image.pixel(10, 10);
        for c in p {
            assert!((c - expected).abs() / expected < 0.1, "{c} vs {expected}");
        }
        // Pixels outside the disc are not written
        assert_eq!(image.pixel(1, 1), [0.0; 3]);
    }

    #[test]
    fn test_render_uniform_env_mean() {
        let env = uniform_env(64, 32, 1.0);
        let mut image = HdrImage::with_size(17, 17, 1.0).unwrap();
        let sphere = Sphere::new(IVec3::new(8, 8, 0), 7);
        render(&mut image, &sphere, &env, Vec3::Z, 256, &lambert(), &Haynes::new(5), 3).unwrap();

        let mut sum = 0.0;
        let mut count = 0;
        for y in 0..17 {
            for x in 0..17 {
                if sphere.normal_xy(x as i32, y as i32) != OUTSIDE {
                    sum += image.pixel(x, y)[0];
                    count += 1;
                }
            }
        }
        let mean = sum / count as f32;
        let expected = expected_uniform(&env);
        assert!((mean - expected).abs() / expected < 0.1, "{mean} vs {expected}");
    }

    #[test]
    fn test_render_is_deterministic_per_worker_count() {
        let mut env = uniform_env(32, 16, 0.2);
        env.set_pixel(20, 6, [40.0, 30.0, 10.0]);
        env.refresh_channel_bounds();
        let sphere = Sphere::new(IVec3::new(6, 6, 0), 6);
        let brdf = BrdfModel::new(Vec3::Z, 8.0, 0.4, 0.5);

        let run = |workers: usize| {
            let mut image = HdrImage::with_size(13, 13, 1.0).unwrap();
            render(&mut image, &sphere, &env, Vec3::Z, 32, &brdf, &Haynes::new(9), workers).unwrap();
            image
        };
        assert_eq!(run(4), run(4));
        assert_eq!(run(1), run(1));
        assert_ne!(run(1), run(4));
    }

    #[test]
    fn test_render_copies_env_bounds() {
        let mut env = uniform_env(8, 8, 2.0);
        env.set_channel_bounds(0.5, 3.0);
        let mut image = HdrImage::with_size(9, 9, 1.0).unwrap();
        let sphere = Sphere::new(IVec3::new(4, 4, 0), 4);
        render(&mut image, &sphere, &env, Vec3::Z, 4, &lambert(), &Haynes::new(1), 2).unwrap();
        assert_eq!((image.min_channel(), image.max_channel()), (0.5, 3.0));
    }
}
