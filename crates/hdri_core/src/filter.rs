//! Sliding-window median filter.

use rayon::prelude::*;

use crate::hdr_image::{HdrImage, ImageError, ImageResult};
use crate::pixel::set_row_pixel;

impl HdrImage {
    /// Median-filter this image in place with a `radius` x `radius` window.
    ///
    /// See [`HdrImage::median_from`].
    pub fn median(&mut self, radius: usize) -> ImageResult<()> {
        let source = self.clone();
        self.median_from(&source, radius)
    }

    /// Write the per-channel median of `source` into this image.
    ///
    /// `radius` is the window side length and must be odd. Only interior
    /// pixels whose full window fits inside the image are written; border
    /// pixels keep their current value. Images smaller than `radius²` in
    /// either dimension are left untouched.
    pub fn median_from(&mut self, source: &HdrImage, radius: usize) -> ImageResult<()> {
        source.ensure_not_empty()?;
        if radius % 2 == 0 {
            return Err(ImageError::InvalidRadius(radius));
        }
        if !self.same_size(source) {
            return Err(ImageError::SizeMismatch {
                expected: source.width() * source.height(),
                actual: self.width() * self.height(),
            });
        }

        let (width, height) = (source.width(), source.height());
        let area = radius * radius;
        if height < area || width < area {
            log::debug!(
                "median: {}x{} image smaller than window area {}, skipped",
                width,
                height,
                area
            );
            return Ok(());
        }

        let half = radius / 2;
        self.par_rows_mut()
            .enumerate()
            .skip(half)
            .take(height - 2 * half)
            .for_each_init(
                || [Vec::with_capacity(area), Vec::with_capacity(area), Vec::with_capacity(area)],
                |windows, (y, row)| {
                    for x in half..width - half {
                        for window in windows.iter_mut() {
                            window.clear();
                        }
                        for wy in y - half..=y + half {
                            for wx in x - half..=x + half {
                                let rgb = source.pixel(wx, wy);
                                for (window, value) in windows.iter_mut().zip(rgb) {
                                    window.push(value);
                                }
                            }
                        }
                        let mut out = [0.0; 3];
                        for (value, window) in out.iter_mut().zip(windows.iter_mut()) {
                            let mid = window.len() / 2;
                            let (_, median, _) = window.select_nth_unstable_by(mid, f32::total_cmp);
                            *value = *median;
                        }
                        set_row_pixel(row, x, out);
                    }
                },
            );
        Ok(())
    }
}
