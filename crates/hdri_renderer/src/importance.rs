//! Inverse-CDF importance sampling of an environment map.
//!
//! The sampling density is the solid-angle weighted luminance built by
//! [`HdrImage::y_cdf_into`] (rows) and [`HdrImage::x_cdf_row_into`]
//! (columns given a row). A draw picks a row by inverting the marginal CDF,
//! then a column by inverting that row's conditional CDF.

use hdri_core::{HdrImage, ImageError};
use thiserror::Error;

use crate::sampler::UniformSampler;

/// Errors raised while building distributions or drawing samples.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("Failed to allocate scratch space for {samples} samples")]
    Allocation { samples: usize },

    #[error("Distribution is {dist_width}x{dist_height} but the map is {width}x{height}")]
    DistributionMismatch {
        dist_width: usize,
        dist_height: usize,
        width: usize,
        height: usize,
    },

    #[error("Lobe weights kd={kd} ks={ks} must be non-negative with 0 < kd + ks <= 1")]
    InvalidLobes { kd: f32, ks: f32 },

    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

pub type SamplingResult<T> = Result<T, SamplingError>;

/// A sampled pixel of the environment map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SampleCoord {
    pub row: usize,
    pub col: usize,
}

/// How [`sample_em_with_mode`] obtains column CDFs when no prebuilt
/// distribution is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingMode {
    /// `PerSample` when fewer samples than rows are requested, else `Precomputed`.
    #[default]
    Auto,
    /// Rebuild the chosen row's column CDF for every sample.
    PerSample,
    /// Build every row's column CDF once up front.
    Precomputed,
}

/// Index `i` such that `cdf[i] <= target < cdf[i + 1]`.
///
/// `cdf` must be non-decreasing. Targets below `cdf[0]` resolve to 0 and
/// targets at or past the last entry to `len - 1`; an empty slice yields 0.
///
/// With a CDF starting at 0 and targets drawn from `[0, last)`, index `len - 1`
/// is never returned and index 0 absorbs the mass of the first two cells.
pub fn find_inverse(cdf: &[f32], target: f32) -> usize {
    cdf.partition_point(|&value| value <= target).saturating_sub(1)
}

fn zeroed(len: usize, samples: usize) -> SamplingResult<Vec<f32>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| SamplingError::Allocation { samples })?;
    buffer.resize(len, 0.0);
    Ok(buffer)
}

#[inline]
fn draw_index<R: UniformSampler + ?Sized>(cdf: &[f32], rng: &mut R) -> usize {
    let total = cdf.last().copied().unwrap_or(0.0);
    find_inverse(cdf, rng.uniform(0.0, total))
}

/// Row marginal plus every row's conditional CDF for one environment map.
///
/// Read-only once built, so one instance can be shared by all render workers.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvDistribution {
    width: usize,
    height: usize,
    marginal: Vec<f32>,
    conditional: Vec<f32>,
}

impl EnvDistribution {
    pub fn build(env: &HdrImage) -> SamplingResult<Self> {
        let (width, height) = (env.width(), env.height());
        let mut marginal = zeroed(height, 0)?;
        let mut conditional = zeroed(width * height, 0)?;
        env.y_cdf_into(&mut marginal)?;
        env.x_cdf_all_into(&mut conditional)?;
        log::debug!("Built {}x{} environment distribution", width, height);
        Ok(Self {
            width,
            height,
            marginal,
            conditional,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row CDF, one entry per image row.
    pub fn marginal(&self) -> &[f32] {
        &self.marginal
    }

    /// Column CDF of `row`.
    pub fn conditional(&self, row: usize) -> &[f32] {
        &self.conditional[row * self.width..(row + 1) * self.width]
    }

    /// Final value of the row CDF.
    pub fn total(&self) -> f32 {
        self.marginal.last().copied().unwrap_or(0.0)
    }

    pub fn matches(&self, env: &HdrImage) -> bool {
        self.width == env.width() && self.height == env.height()
    }

    /// Draw one sample.
    pub fn sample<R: UniformSampler + ?Sized>(&self, rng: &mut R) -> SampleCoord {
        let row = draw_index(&self.marginal, rng);
        let col = draw_index(self.conditional(row), rng);
        SampleCoord { row, col }
    }
}

/// Draw `n` samples from `env` into `out` with [`SamplingMode::Auto`].
///
/// Pass a prebuilt distribution to skip rebuilding CDFs on repeated calls.
pub fn sample_em<R: UniformSampler + ?Sized>(
    env: &HdrImage,
    n: usize,
    rng: &mut R,
    out: &mut Vec<SampleCoord>,
    prebuilt: Option<&EnvDistribution>,
) -> SamplingResult<()> {
    sample_em_with_mode(env, n, rng, out, prebuilt, SamplingMode::Auto)
}

/// Draw `n` samples from `env` into `out`, replacing its contents.
///
/// On failure `out` is left empty.
pub fn sample_em_with_mode<R: UniformSampler + ?Sized>(
    env: &HdrImage,
    n: usize,
    rng: &mut R,
    out: &mut Vec<SampleCoord>,
    prebuilt: Option<&EnvDistribution>,
    mode: SamplingMode,
) -> SamplingResult<()> {
    out.clear();
    let result = fill_samples(env, n, rng, out, prebuilt, mode);
    if result.is_err() {
        out.clear();
    }
    result
}

fn fill_samples<R: UniformSampler + ?Sized>(
    env: &HdrImage,
    n: usize,
    rng: &mut R,
    out: &mut Vec<SampleCoord>,
    prebuilt: Option<&EnvDistribution>,
    mode: SamplingMode,
) -> SamplingResult<()> {
    if env.is_empty() {
        return Err(ImageError::Empty.into());
    }
    out.try_reserve(n)
        .map_err(|_| SamplingError::Allocation { samples: n })?;

    if let Some(dist) = prebuilt {
        if !dist.matches(env) {
            return Err(SamplingError::DistributionMismatch {
                dist_width: dist.width(),
                dist_height: dist.height(),
                width: env.width(),
                height: env.height(),
            });
        }
        out.extend((0..n).map(|_| dist.sample(rng)));
        return Ok(());
    }

    let per_sample = match mode {
        SamplingMode::Auto => n < env.height(),
        SamplingMode::PerSample => true,
        SamplingMode::Precomputed => false,
    };

    if per_sample {
        let mut marginal = zeroed(env.height(), n)?;
        let mut row_cdf = zeroed(env.width(), n)?;
        env.y_cdf_into(&mut marginal)?;
        for _ in 0..n {
            let row = draw_index(&marginal, rng);
            env.x_cdf_row_into(row, &mut row_cdf)?;
            let col = draw_index(&row_cdf, rng);
            out.push(SampleCoord { row, col });
        }
    } else {
        let dist = EnvDistribution::build(env)?;
        out.extend((0..n).map(|_| dist.sample(rng)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{Haynes, RandSampler};
    use rand::rngs::StdRng;

    fn env(width: usize, height: usize) -> HdrImage {
        let mut image = HdrImage::with_size(width, height, 1.0).unwrap();
        for y in 0..height {
            for x in 0..width {
                let v = 0.2 + ((x * 5 + y * 3) % 7) as f32;
                image.set_pixel(x, y, [v, v * 0.5, v * 0.25]);
            }
        }
        image.refresh_channel_bounds();
        image
    }

    /// Probability of each index under `find_inverse` with a target uniform
    /// in `[0, cdf[last])`.
    fn interval_probabilities(cdf: &[f32]) -> Vec<f64> {
        let total = *cdf.last().unwrap() as f64;
        (0..cdf.len())
            .map(|i| {
                let lower = if i == 0 { 0.0 } else { cdf[i] as f64 };
                let upper = if i + 1 == cdf.len() { total } else { cdf[i + 1] as f64 };
                (upper - lower).max(0.0) / total
            })
            .collect()
    }

    #[test]
    fn test_find_inverse_brackets() {
        let cdf = [0.0, 1.0, 3.0, 3.0, 6.0];
        assert_eq!(find_inverse(&cdf, 0.0), 0);
        assert_eq!(find_inverse(&cdf, 0.5), 0);
        assert_eq!(find_inverse(&cdf, 1.0), 1);
        assert_eq!(find_inverse(&cdf, 2.999), 1);
        // Flat run resolves to its last index
        assert_eq!(find_inverse(&cdf, 3.0), 3);
        assert_eq!(find_inverse(&cdf, 5.9), 3);
        assert_eq!(find_inverse(&cdf, 6.0), 4);
    }

    #[test]
    fn test_find_inverse_every_interval() {
        let cdf: Vec<f32> = (0..50).map(|i| (i * i) as f32 * 0.1).collect();
        for i in 0..cdf.len() - 1 {
            let lo = cdf[i];
            let hi = cdf[i + 1];
            for t in [lo, lo + (hi - lo) * 0.5, hi - (hi - lo) * 1e-3] {
                assert_eq!(find_inverse(&cdf, t), i, "target {t}");
            }
        }
    }

    #[test]
    fn test_find_inverse_degenerate() {
        assert_eq!(find_inverse(&[], 1.0), 0);
        assert_eq!(find_inverse(&[2.0, 3.0], 1.0), 0);
        assert_eq!(find_inverse(&[2.0, 3.0], 99.0), 1);
        assert_eq!(find_inverse(&[0.0, 0.0, 0.0], 0.0), 2);
        assert_eq!(find_inverse(&[1.0, 2.0], f32::NAN), 0);
    }

    #[test]
    fn test_distribution_matches_image_cdfs() {
        let image = env(9, 6);
        let dist = EnvDistribution::build(&image).unwrap();
        assert_eq!(dist.marginal(), image.y_cdf().unwrap().as_slice());
        let mut row = vec![0.0; 9];
        image.x_cdf_row_into(4, &mut row).unwrap();
        assert_eq!(dist.conditional(4), row.as_slice());
        assert!(dist.total() > 0.0);
    }

    #[test]
    fn test_modes_agree_in_range() {
        let image = env(12, 8);
        for mode in [SamplingMode::PerSample, SamplingMode::Precomputed, SamplingMode::Auto] {
            let mut out = Vec::new();
            let mut rng = Haynes::new(5);
            sample_em_with_mode(&image, 500, &mut rng, &mut out, None, mode).unwrap();
            assert_eq!(out.len(), 500);
            assert!(out.iter().all(|s| s.row < 8 && s.col < 12));
        }
    }

    #[test]
    fn test_modes_draw_identical_streams() {
        // Both modes consume two draws per sample from the same CDFs
        let image = env(10, 10);
        let mut a = Vec::new();
        let mut b = Vec::new();
        sample_em_with_mode(&image, 40, &mut Haynes::new(3), &mut a, None, SamplingMode::PerSample)
            .unwrap();
        sample_em_with_mode(&image, 40, &mut Haynes::new(3), &mut b, None, SamplingMode::Precomputed)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_prebuilt_mismatch() {
        let dist = EnvDistribution::build(&env(4, 4)).unwrap();
        let mut out = vec![SampleCoord::default(); 3];
        let result = sample_em(&env(5, 4), 10, &mut Haynes::new(1), &mut out, Some(&dist));
        assert!(matches!(result, Err(SamplingError::DistributionMismatch { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_empty_env() {
        let mut out = Vec::new();
        let result = sample_em(&HdrImage::new(), 10, &mut Haynes::new(1), &mut out, None);
        assert_eq!(result, Err(SamplingError::Image(ImageError::Empty)));
    }

    #[test]
    fn test_samples_follow_density() {
        let image = env(6, 5);
        let dist = EnvDistribution::build(&image).unwrap();
        let rows = interval_probabilities(dist.marginal());

        let n = 200_000;
        let mut out = Vec::new();
        let mut rng = RandSampler::<StdRng>::new(2024);
        sample_em(&image, n, &mut rng, &mut out, Some(&dist)).unwrap();

        let mut counts = vec![0usize; 6 * 5];
        for s in &out {
            counts[s.row * 6 + s.col] += 1;
        }

        let mut chi2 = 0.0;
        for row in 0..5 {
            let cols = interval_probabilities(dist.conditional(row));
            for col in 0..6 {
                let expected = rows[row] * cols[col] * n as f64;
                let observed = counts[row * 6 + col] as f64;
                if expected == 0.0 {
                    assert_eq!(observed, 0.0, "sample in zero-probability cell");
                } else {
                    chi2 += (observed - expected).powi(2) / expected;
                }
            }
        }
        // 20 reachable cells, so 19 degrees of freedom; p = 1e-4 is at ~49
        assert!(chi2 < 60.0, "chi-square {chi2}");
    }
}
