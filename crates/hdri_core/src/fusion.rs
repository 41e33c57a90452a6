//! Exposure fusion: merge bracketed LDR exposures into one HDR image.
//!
//! Each channel sample is weighted by a camera response weight and merged
//! in log-radiance space (`ln(value / exposure_time)`), so exposures of
//! different length become comparable. Samples outside the `(HDR_LT, HDR_HT)`
//! window, or brighter than the same pixel in the next longer exposure, are
//! rejected; a per-channel balance of rejections picks black or white for
//! pixels no exposure could measure.

use hdri_math::Interval;
use rayon::prelude::*;
use std::f32::consts::{PI, TAU};
use thiserror::Error;

use crate::hdr_image::{HdrImage, ImageError};
use crate::pixel::{BLOCK_WIDTH, PixelBlock};

/// Lower admission bound for a channel sample.
pub const HDR_LT: f32 = 0.005;
/// Upper admission bound for a channel sample.
pub const HDR_HT: f32 = 0.92;

/// Window a sample must lie strictly inside to be merged.
pub const ADMISSION_WINDOW: Interval = Interval::new(HDR_LT, HDR_HT);

/// Errors that can occur while fusing exposures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error("No exposures to fuse")]
    NoImages,

    #[error("Got {times} exposure times for {images} images")]
    TimeCountMismatch { times: usize, images: usize },

    #[error("Exposure {index} is {width}x{height}, expected {expected_width}x{expected_height}")]
    SizeMismatch {
        index: usize,
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },

    #[error("Exposure {0} is empty")]
    EmptyImage(usize),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

pub type FusionResult<T> = Result<T, FusionError>;

/// Camera response weighting used to trust mid-range samples over dark or
/// saturated ones.
pub trait CameraWeight: Send + Sync {
    /// Weight of a normalized sample value in `[0, 1]`.
    fn weight(&self, x: f32) -> f32;
}

/// Smooth polynomial hat: `(c1 - x)²(c2 - x)²` normalized to 1 at the
/// midpoint, zero outside `(c1, c2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolynomialWeight {
    pub c1: f32,
    pub c2: f32,
}

impl PolynomialWeight {
    pub fn new(c1: f32, c2: f32) -> Self {
        Self { c1, c2 }
    }
}

impl Default for PolynomialWeight {
    fn default() -> Self {
        Self { c1: 0.0, c2: 1.0 }
    }
}

impl CameraWeight for PolynomialWeight {
    fn weight(&self, x: f32) -> f32 {
        if !Interval::new(self.c1, self.c2).surrounds(x) {
            return 0.0;
        }
        let half = (self.c2 - self.c1) / 2.0;
        let norm = half * half * half * half;
        let a = self.c1 - x;
        let b = self.c2 - x;
        a * a * b * b / norm
    }
}

/// Raised-cosine hat: `sin(2 PI x - PI/2) + 1`, zero outside `(0, 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrigWeight;

impl CameraWeight for TrigWeight {
    fn weight(&self, x: f32) -> f32 {
        if !Interval::UNIT.surrounds(x) {
            return 0.0;
        }
        (TAU * x - PI / 2.0).sin() + 1.0
    }
}

/// Merge `images`, taken with the given exposure `times`, into one HDR image.
///
/// All images must share the same dimensions. Exposure times `<= 0` skip
/// that exposure. The output's cached bounds are refreshed from the result.
pub fn create_hdr(
    times: &[f32],
    images: &[HdrImage],
    weight: &dyn CameraWeight,
) -> FusionResult<HdrImage> {
    let first = images.first().ok_or(FusionError::NoImages)?;
    if times.len() != images.len() {
        return Err(FusionError::TimeCountMismatch {
            times: times.len(),
            images: images.len(),
        });
    }
    for (index, image) in images.iter().enumerate() {
        if image.is_empty() {
            return Err(FusionError::EmptyImage(index));
        }
        if !image.same_size(first) {
            return Err(FusionError::SizeMismatch {
                index,
                width: image.width(),
                height: image.height(),
                expected_width: first.width(),
                expected_height: first.height(),
            });
        }
    }

    let (width, height) = (first.width(), first.height());
    log::info!("Fusing {} exposures of {}x{}", images.len(), width, height);

    let mut output = HdrImage::with_size(width, height, 1.0)?;
    let (low, high) = (output.min_channel(), output.max_channel());
    let last = images.len() - 1;

    output.par_rows_mut().enumerate().for_each(|(y, out_row)| {
        let rows: Vec<&[PixelBlock]> = images.iter().map(|image| image.row(y)).collect();

        for (bx, out_block) in out_row.iter_mut().enumerate() {
            let lanes = (width - bx * BLOCK_WIDTH).min(BLOCK_WIDTH);
            for lane in 0..lanes {
                let mut merged = [0.0f32; 3];
                for (c, value) in merged.iter_mut().enumerate() {
                    let mut acc = 0.0f32;
                    let mut weight_sum = 0.0f32;
                    let mut balance = 0i32;

                    for (l, &time) in times.iter().enumerate() {
                        if time <= 0.0 {
                            continue;
                        }
                        let next = (l + 1).min(last);
                        let v = rows[l][bx].get(lane)[c];
                        let v_next = rows[next][bx].get(lane)[c];

                        if ADMISSION_WINDOW.surrounds(v) && v <= v_next {
                            let w = weight.weight(v);
                            acc += w * (v / time).ln();
                            weight_sum += w;
                        } else {
                            balance += (v > HDR_LT) as i32 - (v < HDR_HT) as i32;
                        }
                    }

                    *value = if weight_sum > 0.0 {
                        (acc / weight_sum).exp()
                    } else if balance > 0 {
                        high
                    } else {
                        low
                    };
                }
                out_block.set(lane, merged);
            }
        }
    });

    output.refresh_channel_bounds();
    log::debug!(
        "Fused range [{}, {}]",
        output.min_channel(),
        output.max_channel()
    );
    Ok(output)
}

impl HdrImage {
    /// Replace this image with the fusion of `images`. On error this image is
    /// left unchanged.
    pub fn create_hdr(
        &mut self,
        times: &[f32],
        images: &[HdrImage],
        weight: &dyn CameraWeight,
    ) -> FusionResult<()> {
        *self = create_hdr(times, images, weight)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: usize, height: usize, v: f32) -> HdrImage {
        let mut image = HdrImage::with_size(width, height, 1.0).unwrap();
        image.fill(v);
        image
    }

    #[test]
    fn test_polynomial_weight_shape() {
        let w = PolynomialWeight::default();
        assert_eq!(w.weight(0.0), 0.0);
        assert_eq!(w.weight(1.0), 0.0);
        assert_eq!(w.weight(-0.5), 0.0);
        assert!((w.weight(0.5) - 1.0).abs() < 1e-6);
        assert!((w.weight(0.25) - w.weight(0.75)).abs() < 1e-6);
        assert!(w.weight(0.25) < w.weight(0.4));
    }

    #[test]
    fn test_trig_weight_shape() {
        let w = TrigWeight;
        assert_eq!(w.weight(0.0), 0.0);
        assert_eq!(w.weight(1.5), 0.0);
        assert!((w.weight(0.5) - 2.0).abs() < 1e-6);
        assert!((w.weight(0.2) - w.weight(0.8)).abs() < 1e-5);
    }

    #[test]
    fn test_consistent_exposures_fuse_to_irradiance() {
        let images = vec![flat(9, 3, 0.3), flat(9, 3, 0.6)];
        let hdr = create_hdr(&[1.0, 2.0], &images, &PolynomialWeight::default()).unwrap();
        for y in 0..3 {
            for x in 0..9 {
                for c in hdr.pixel(x, y) {
                    assert!((c - 0.3).abs() < 1e-5, "got {c}");
                }
            }
        }
        assert!((hdr.max_channel() - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_saturated_pixels_fall_back_to_max() {
        let images = vec![flat(4, 4, 0.95), flat(4, 4, 0.99)];
        let hdr = create_hdr(&[1.0, 2.0], &images, &TrigWeight).unwrap();
        assert_eq!(hdr.pixel(2, 2), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_dark_pixels_fall_back_to_min() {
        let images = vec![flat(4, 4, 0.001), flat(4, 4, 0.002)];
        let hdr = create_hdr(&[1.0, 2.0], &images, &TrigWeight).unwrap();
        assert_eq!(hdr.pixel(1, 3), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_non_monotonic_sample_rejected() {
        // Exposure 0 reads brighter than exposure 1, so only exposure 1 counts
        let images = vec![flat(2, 2, 0.8), flat(2, 2, 0.4)];
        let hdr = create_hdr(&[1.0, 4.0], &images, &PolynomialWeight::default()).unwrap();
        assert!((hdr.pixel(0, 0)[0] - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_zero_time_skips_exposure() {
        let images = vec![flat(2, 2, 0.2), flat(2, 2, 0.5)];
        let hdr = create_hdr(&[0.0, 1.0], &images, &PolynomialWeight::default()).unwrap();
        assert!((hdr.pixel(1, 1)[1] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_output_within_bounds() {
        let mut a = HdrImage::with_size(16, 8, 1.0).unwrap();
        let mut b = HdrImage::with_size(16, 8, 1.0).unwrap();
        for y in 0..8 {
            for x in 0..16 {
                let v = (x + y * 16) as f32 / 128.0;
                a.set_pixel(x, y, [v * 0.5, v * 0.4, v * 0.3]);
                b.set_pixel(x, y, [v, v * 0.8, v * 0.6]);
            }
        }
        let hdr = create_hdr(&[0.5, 1.0], &[a, b], &PolynomialWeight::default()).unwrap();
        for y in 0..8 {
            for x in 0..16 {
                for c in hdr.pixel(x, y) {
                    assert!(c >= hdr.min_channel() && c <= hdr.max_channel());
                }
            }
        }
    }

    #[test]
    fn test_precondition_errors() {
        let w = PolynomialWeight::default();
        assert_eq!(create_hdr(&[], &[], &w), Err(FusionError::NoImages));

        let images = vec![flat(4, 4, 0.5), flat(4, 4, 0.5)];
        assert!(matches!(
            create_hdr(&[1.0], &images, &w),
            Err(FusionError::TimeCountMismatch { times: 1, images: 2 })
        ));

        let images = vec![flat(4, 4, 0.5), flat(5, 4, 0.5)];
        assert!(matches!(
            create_hdr(&[1.0, 2.0], &images, &w),
            Err(FusionError::SizeMismatch { index: 1, .. })
        ));

        let images = vec![flat(4, 4, 0.5), HdrImage::new()];
        assert_eq!(
            create_hdr(&[1.0, 2.0], &images, &w),
            Err(FusionError::EmptyImage(1))
        );
    }

    #[test]
    fn test_method_leaves_target_on_error() {
        let mut target = flat(3, 3, 0.7);
        let before = target.clone();
        assert!(target
            .create_hdr(&[1.0], &[], &PolynomialWeight::default())
            .is_err());
        assert_eq!(target, before);
    }
}
