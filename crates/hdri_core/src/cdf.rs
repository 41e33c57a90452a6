//! Luminance CDFs over an equirectangular environment map.
//!
//! The row marginal is weighted by `sin(PI (1 - y/h))` so that sampling it is
//! proportional to solid angle rather than pixel area. Column CDFs are plain
//! prefix sums of `(r + g + b) / 3` along one row.

use rayon::prelude::*;

use crate::hdr_image::{HdrImage, ImageError, ImageResult};
use crate::ops::row_solid_angle_weight;
use crate::pixel::{row_pixels, PixelBlock};

fn check_len(expected: usize, actual: usize) -> ImageResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ImageError::SizeMismatch { expected, actual })
    }
}

impl HdrImage {
    /// Fill `out` (length = height) with the row marginal CDF.
    ///
    /// `out[0] = 0` and
    /// `out[i] = out[i-1] + rowsum(i) * sin(PI (1 - i/h)) / (3 w)`.
    pub fn y_cdf_into(&self, out: &mut [f32]) -> ImageResult<()> {
        self.ensure_not_empty()?;
        check_len(self.height(), out.len())?;

        let (width, height) = (self.width(), self.height());
        let norm = 1.0 / (3.0 * width as f32);
        out.par_iter_mut()
            .zip(self.par_rows())
            .enumerate()
            .for_each(|(y, (value, row))| {
                let sum: f32 = row_pixels(row, width).map(|p| p[0] + p[1] + p[2]).sum();
                *value = sum * row_solid_angle_weight(y, height) * norm;
            });

        out[0] = 0.0;
        for i in 1..out.len() {
            out[i] += out[i - 1];
        }
        Ok(())
    }

    /// Allocating variant of [`HdrImage::y_cdf_into`].
    pub fn y_cdf(&self) -> ImageResult<Vec<f32>> {
        let mut out = vec![0.0; self.height()];
        self.y_cdf_into(&mut out)?;
        Ok(out)
    }

    /// Fill `out` (length = width) with the column CDF of row `y`.
    pub fn x_cdf_row_into(&self, y: usize, out: &mut [f32]) -> ImageResult<()> {
        self.ensure_not_empty()?;
        check_len(self.width(), out.len())?;
        if y >= self.height() {
            return Err(ImageError::InvalidParameter(format!(
                "row {y} out of range for height {}",
                self.height()
            )));
        }
        prefix_row(self.row(y), self.width(), out);
        Ok(())
    }

    /// Fill `out` (length = width * height, row-major) with the column CDF of
    /// every row.
    pub fn x_cdf_all_into(&self, out: &mut [f32]) -> ImageResult<()> {
        self.ensure_not_empty()?;
        let width = self.width();
        check_len(width * self.height(), out.len())?;
        out.par_chunks_exact_mut(width)
            .zip(self.par_rows())
            .for_each(|(cdf, row)| prefix_row(row, width, cdf));
        Ok(())
    }

    /// Allocating variant of [`HdrImage::x_cdf_all_into`].
    pub fn x_cdf_all(&self) -> ImageResult<Vec<f32>> {
        let mut out = vec![0.0; self.width() * self.height()];
        self.x_cdf_all_into(&mut out)?;
        Ok(out)
    }
}

fn prefix_row(row: &[PixelBlock], width: usize, out: &mut [f32]) {
    let mut acc = 0.0;
    for (value, rgb) in out.iter_mut().zip(row_pixels(row, width)) {
        acc += (rgb[0] + rgb[1] + rgb[2]) / 3.0;
        *value = acc;
    }
}
