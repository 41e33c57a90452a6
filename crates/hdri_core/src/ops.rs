//! Pixel-wise operations, channel statistics and tone mapping.
//!
//! Every operation here is independent per row and runs on the rayon pool.

use hdri_math::Interval;
use rayon::prelude::*;
use std::f32::consts::PI;

use crate::hdr_image::{Channel, HdrImage, ImageError, ImageResult};
use crate::pixel::{map_row, row_pixels, BLOCK_WIDTH};

/// Default number of histogram bins for [`HdrImage::hist_eq_tone_map`].
pub const DEFAULT_HISTOGRAM_BINS: usize = 256;

/// Solid-angle weight of row `y` in an equirectangular map of `height` rows.
#[inline]
pub fn row_solid_angle_weight(y: usize, height: usize) -> f32 {
    (PI * (1.0 - y as f32 / height as f32)).sin()
}

impl HdrImage {
    fn map_pixels(&mut self, f: impl Fn(f32) -> f32 + Copy + Sync + Send) {
        let width = self.width();
        self.par_rows_mut().for_each(|row| map_row(row, width, f));
    }

    fn fold_channel(&self, channel: Channel, identity: f32, f: fn(f32, f32) -> f32) -> f32 {
        let width = self.width();
        self.par_rows()
            .map(|row| {
                row_pixels(row, width)
                    .map(|rgb| channel.select(rgb, f))
                    .fold(identity, f)
            })
            .reduce(|| identity, f)
    }

    /// Largest value of `channel` over all pixels (0 for an empty image).
    pub fn max_pixel_value(&self, channel: Channel) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        self.fold_channel(channel, f32::NEG_INFINITY, f32::max)
    }

    /// Smallest value of `channel` over all pixels (0 for an empty image).
    pub fn min_pixel_value(&self, channel: Channel) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        self.fold_channel(channel, f32::INFINITY, f32::min)
    }

    /// Ratio of the largest to the smallest value of `channel`.
    pub fn dynamic_range(&self, channel: Channel) -> f32 {
        self.max_pixel_value(channel) / self.min_pixel_value(channel)
    }

    pub fn update_max_channel(&mut self) {
        let max = self.max_pixel_value(Channel::All);
        self.set_channel_bounds(self.min_channel(), max);
    }

    pub fn update_min_channel(&mut self) {
        let min = self.min_pixel_value(Channel::All);
        self.set_channel_bounds(min, self.max_channel());
    }

    /// Recompute both cached bounds with a full scan.
    pub fn refresh_channel_bounds(&mut self) {
        self.update_min_channel();
        self.update_max_channel();
    }

    /// Set every channel of every pixel to `value`. The cached bounds are
    /// widened to include it.
    pub fn fill(&mut self, value: f32) {
        if self.is_empty() {
            return;
        }
        self.map_pixels(move |_| value);
        let bounds = Interval::new(self.min_channel(), self.max_channel()).include(value);
        self.set_channel_bounds(bounds.min, bounds.max);
    }

    /// Invert every value against the cached maximum (`x -> max - x`).
    pub fn negate(&mut self) {
        if self.is_empty() {
            return;
        }
        let max = self.max_channel();
        let min = self.min_channel();
        self.map_pixels(move |v| max - v);
        self.set_channel_bounds(0.0, max - min);
    }

    /// Multiply every value (and the cached bounds) by `factor`.
    pub fn scale(&mut self, factor: f32) {
        if self.is_empty() {
            return;
        }
        self.map_pixels(move |v| v * factor);
        let (a, b) = (self.min_channel() * factor, self.max_channel() * factor);
        self.set_channel_bounds(a.min(b), a.max(b));
    }

    /// Clamp every value to `[min, max]`; the cached bounds become the clamp bounds.
    pub fn truncate(&mut self, min: f32, max: f32) -> ImageResult<()> {
        self.ensure_not_empty()?;
        let range = Interval::new(min, max);
        if range.is_empty() {
            return Err(ImageError::InvalidParameter(format!(
                "truncate range [{min}, {max}] is empty"
            )));
        }
        self.map_pixels(move |v| range.clamp(v));
        self.set_channel_bounds(min, max);
        Ok(())
    }

    /// Rescale `[min_channel, max_channel]` linearly onto `[0, target]`.
    ///
    /// A degenerate cached range maps every value to 0.
    pub fn normalise(&mut self, target: f32) {
        if self.is_empty() {
            return;
        }
        let source = Interval::new(self.min_channel(), self.max_channel());
        let dest = Interval::new(0.0, target);
        self.map_pixels(move |v| source.remap(v, &dest));
        self.set_channel_bounds(0.0, target);
    }

    /// Apply `x -> x^(1/power)` to every value and to the cached bounds.
    ///
    /// Negative values keep their sign: `-|x|^(1/power)`.
    pub fn gamma(&mut self, power: f32) -> ImageResult<()> {
        self.ensure_not_empty()?;
        if !(power > 0.0 && power.is_finite()) {
            return Err(ImageError::InvalidParameter(format!(
                "gamma power must be positive, got {power}"
            )));
        }
        let inv = 1.0 / power;
        let curve = move |v: f32| v.signum() * v.abs().powf(inv);
        self.map_pixels(curve);
        self.set_channel_bounds(curve(self.min_channel()), curve(self.max_channel()));
        Ok(())
    }

    /// Expose by `stops` and clip to the displayable range:
    /// `normalise(2^stops)` followed by `truncate(0, 1)`.
    pub fn linear_tone_map(&mut self, stops: f32) {
        if self.is_empty() {
            return;
        }
        self.normalise(stops.exp2());
        let unit = Interval::UNIT;
        self.map_pixels(move |v| unit.clamp(v));
        self.set_channel_bounds(unit.min, unit.max);
    }

    /// Histogram-equalization tone mapping over grey levels.
    ///
    /// Builds a `bins`-bin histogram of `(r + g + b) / 3` over the cached
    /// range, turns it into a normalized cumulative histogram and scales each
    /// pixel by `cdf[bin] / grey`. Bounds are refreshed afterwards.
    pub fn hist_eq_tone_map(&mut self, bins: usize) -> ImageResult<()> {
        self.ensure_not_empty()?;
        if bins == 0 {
            return Err(ImageError::InvalidParameter("histogram needs at least one bin".into()));
        }

        let width = self.width();
        let min = self.min_channel();
        let range = self.max_channel() - min;
        let range = if range > 0.0 && range.is_finite() { range } else { 1.0 };
        let bin_of = move |grey: f32| -> usize {
            let t = ((grey - min) / range * bins as f32).floor();
            if t.is_nan() || t < 0.0 {
                0
            } else {
                (t as usize).min(bins - 1)
            }
        };

        let histogram = self
            .par_rows()
            .fold(
                || vec![0u64; bins],
                |mut hist, row| {
                    for rgb in row_pixels(row, width) {
                        hist[bin_of((rgb[0] + rgb[1] + rgb[2]) / 3.0)] += 1;
                    }
                    hist
                },
            )
            .reduce(
                || vec![0u64; bins],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                    a
                },
            );

        let total = (width * self.height()) as f32;
        let mut running = 0u64;
        let cdf: Vec<f32> = histogram
            .iter()
            .map(|&count| {
                running += count;
                running as f32 / total
            })
            .collect();

        self.par_rows_mut().for_each(|row| {
            for (i, block) in row.iter_mut().enumerate() {
                let lanes = (width - i * BLOCK_WIDTH).min(BLOCK_WIDTH);
                for lane in 0..lanes {
                    let rgb = block.get(lane);
                    let grey = (rgb[0] + rgb[1] + rgb[2]) / 3.0;
                    let mapped = if grey > 0.0 {
                        let k = cdf[bin_of(grey)] / grey;
                        [rgb[0] * k, rgb[1] * k, rgb[2] * k]
                    } else {
                        [0.0; 3]
                    };
                    block.set(lane, mapped);
                }
            }
        });

        self.refresh_channel_bounds();
        Ok(())
    }

    /// Solid-angle weighted mean radiance of an equirectangular map:
    /// `sum(sin(PI (1 - y/h)) * (r + g + b)) / (3 h w)`.
    pub fn integrate(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let (width, height) = (self.width(), self.height());
        let sum: f64 = self
            .par_rows()
            .enumerate()
            .map(|(y, row)| {
                let row_sum: f32 = row_pixels(row, width).map(|p| p[0] + p[1] + p[2]).sum();
                (row_solid_angle_weight(y, height) * row_sum) as f64
            })
            .sum();
        (sum / (3.0 * height as f64 * width as f64)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> HdrImage {
        let mut image = HdrImage::with_size(width, height, 1.0).unwrap();
        for y in 0..height {
            for x in 0..width {
                let v = (y * width + x) as f32;
                image.set_pixel(x, y, [v, v * 0.5, v * 0.25]);
            }
        }
        image.refresh_channel_bounds();
        image
    }

    #[test]
    fn test_channel_statistics() {
        let image = gradient(11, 3);
        assert_eq!(image.max_pixel_value(Channel::Red), 32.0);
        assert_eq!(image.max_pixel_value(Channel::Green), 16.0);
        assert_eq!(image.max_pixel_value(Channel::Blue), 8.0);
        assert_eq!(image.min_pixel_value(Channel::All), 0.0);
        assert_eq!(image.max_channel(), 32.0);
    }

    #[test]
    fn test_statistics_ignore_padding_lanes() {
        let mut image = HdrImage::with_size(3, 1, 1.0).unwrap();
        // Write garbage past the width directly into the block
        image.row_mut(0)[0].set(5, [100.0, 100.0, 100.0]);
        image.set_pixel(1, 0, [2.0, 2.0, 2.0]);
        assert_eq!(image.max_pixel_value(Channel::All), 2.0);
    }

    #[test]
    fn test_dynamic_range() {
        let mut image = HdrImage::with_size(2, 1, 1.0).unwrap();
        image.set_pixel(0, 0, [0.5, 0.5, 0.5]);
        image.set_pixel(1, 0, [4.0, 4.0, 4.0]);
        assert!((image.dynamic_range(Channel::All) - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_fill_widens_bounds() {
        let mut image = HdrImage::with_size(9, 2, 1.0).unwrap();
        image.fill(3.0);
        assert_eq!(image.pixel(8, 1), [3.0, 3.0, 3.0]);
        assert_eq!(image.max_channel(), 3.0);
        assert_eq!(image.min_channel(), 0.0);
    }

    #[test]
    fn test_negate() {
        let mut image = HdrImage::with_size(2, 1, 1.0).unwrap();
        image.set_pixel(0, 0, [0.25, 0.5, 1.0]);
        image.negate();
        assert_eq!(image.pixel(0, 0), [0.75, 0.5, 0.0]);
        assert_eq!(image.pixel(1, 0), [1.0, 1.0, 1.0]);
        assert_eq!((image.min_channel(), image.max_channel()), (0.0, 1.0));
    }

    #[test]
    fn test_truncate() {
        let mut image = gradient(4, 2);
        image.truncate(1.0, 2.0).unwrap();
        assert_eq!(image.pixel(0, 0), [1.0, 1.0, 1.0]);
        assert_eq!(image.pixel(3, 1), [2.0, 2.0, 1.75]);
        assert_eq!((image.min_channel(), image.max_channel()), (1.0, 2.0));
        assert!(image.truncate(2.0, 1.0).is_err());
        assert_eq!(HdrImage::new().truncate(0.0, 1.0), Err(ImageError::Empty));
    }

    #[test]
    fn test_normalise_is_idempotent() {
        let mut image = gradient(10, 10);
        image.normalise(1.0);
        assert_eq!(image.max_channel(), 1.0);
        assert!((image.pixel(9, 9)[0] - 1.0).abs() < 1e-6);

        let once = image.clone();
        image.normalise(1.0);
        for (a, b) in once.to_rgb_f32().iter().zip(image.to_rgb_f32()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalise_flat_image() {
        let mut image = HdrImage::with_size(3, 3, 0.0).unwrap();
        image.normalise(1.0);
        assert_eq!(image.pixel(1, 1), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_gamma() {
        let mut image = HdrImage::with_size(1, 1, 4.0).unwrap();
        image.set_pixel(0, 0, [4.0, 0.25, -4.0]);
        image.gamma(2.0).unwrap();
        let p = image.pixel(0, 0);
        assert!((p[0] - 2.0).abs() < 1e-6);
        assert!((p[1] - 0.5).abs() < 1e-6);
        assert!((p[2] + 2.0).abs() < 1e-6);
        assert!((image.max_channel() - 2.0).abs() < 1e-6);
        assert!(image.gamma(0.0).is_err());
    }

    #[test]
    fn test_linear_tone_map_clips() {
        let mut image = gradient(4, 4);
        image.linear_tone_map(1.0);
        // normalise(2) then clip: top half saturates
        assert_eq!(image.pixel(3, 3)[0], 1.0);
        assert_eq!(image.max_channel(), 1.0);
        let p = image.pixel(1, 0);
        assert!((p[0] - 2.0 / 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_hist_eq_maps_into_unit_range() {
        let mut image = gradient(16, 16);
        image.hist_eq_tone_map(DEFAULT_HISTOGRAM_BINS).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                let p = image.pixel(x, y);
                let grey = (p[0] + p[1] + p[2]) / 3.0;
                assert!((0.0..=1.0 + 1e-5).contains(&grey), "grey {grey}");
            }
        }
        // Brightest pixel lands in the last bin: cdf = 1
        let p = image.pixel(15, 15);
        assert!(((p[0] + p[1] + p[2]) / 3.0 - 1.0).abs() < 1e-5);
        assert!(image.hist_eq_tone_map(0).is_err());
    }

    #[test]
    fn test_integrate_uniform_map() {
        let mut image = HdrImage::with_size(8, 64, 1.0).unwrap();
        image.fill(1.0);
        // Mean of sin(PI (1 - y/h)) over the rows approaches 2/PI
        let expected = (0..64).map(|y| row_solid_angle_weight(y, 64)).sum::<f32>() / 64.0;
        assert!((image.integrate() - expected).abs() < 1e-5);
        assert!((expected - 2.0 / PI).abs() < 0.01);
    }

    #[test]
    fn test_empty_image_ops_are_noops() {
        let mut image = HdrImage::new();
        image.fill(1.0);
        image.normalise(1.0);
        image.negate();
        image.linear_tone_map(0.0);
        assert!(image.is_empty());
        assert_eq!(image.integrate(), 0.0);
        assert_eq!(image.max_pixel_value(Channel::All), 0.0);
    }
}
