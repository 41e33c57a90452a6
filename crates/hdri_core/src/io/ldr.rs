//! Low dynamic range interop (PNG, JPEG, ...) through the `image` crate.
//!
//! Imported images keep their encoded values scaled to `[0, 1]`, which is
//! the range exposure fusion expects. Exports clamp to `[0, 1]` and
//! quantize to 8 bits; tone map first.

use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};

use super::IoResult;
use crate::hdr_image::{HdrImage, ImageResult};
use crate::pixel::set_row_pixel;

impl HdrImage {
    /// Convert a decoded image into an HDR image with values in `[0, 1]`.
    pub fn from_dynamic(source: &DynamicImage) -> ImageResult<Self> {
        let rgb = source.to_rgb32f();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let mut image = HdrImage::with_size(width, height, 1.0)?;
        for (y, src_row) in rgb.rows().enumerate() {
            let row = image.row_mut(y);
            for (x, px) in src_row.enumerate() {
                set_row_pixel(row, x, px.0);
            }
        }
        image.refresh_channel_bounds();
        Ok(image)
    }

    /// Load an 8/16-bit image file in any format the `image` crate decodes.
    pub fn load_ldr(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref();
        let decoded = image::open(path).inspect_err(|e| {
            log::error!("Failed to decode {}: {}", path.display(), e);
        })?;
        log::debug!(
            "Loaded {} ({}x{})",
            path.display(),
            decoded.width(),
            decoded.height()
        );
        Ok(Self::from_dynamic(&decoded)?)
    }

    /// Quantize to 8-bit RGB, clamping to `[0, 1]`.
    pub fn to_rgb8(&self) -> RgbImage {
        let quantize = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        RgbImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let [r, g, b] = self.pixel(x as usize, y as usize);
            Rgb([quantize(r), quantize(g), quantize(b)])
        })
    }

    /// Save as an 8-bit image; the format follows the file extension.
    pub fn save_ldr(&self, path: impl AsRef<Path>) -> IoResult<()> {
        let path = path.as_ref();
        if self.is_empty() {
            return Err(super::IoError::EmptyImage);
        }
        self.to_rgb8().save(path).inspect_err(|e| {
            log::error!("Failed to save {}: {}", path.display(), e);
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dynamic_scales_to_unit() {
        let mut rgb = RgbImage::new(3, 2);
        rgb.put_pixel(2, 1, Rgb([255, 0, 51]));
        let image = HdrImage::from_dynamic(&DynamicImage::ImageRgb8(rgb)).unwrap();
        assert_eq!(image.width(), 3);
        let p = image.pixel(2, 1);
        assert!((p[0] - 1.0).abs() < 1e-6);
        assert!((p[2] - 0.2).abs() < 1e-6);
        assert_eq!(image.max_channel(), 1.0);
    }

    #[test]
    fn test_to_rgb8_clamps() {
        let mut image = HdrImage::with_size(2, 1, 1.0).unwrap();
        image.set_pixel(0, 0, [2.0, -1.0, 0.5]);
        let rgb = image.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 0, 128]);
    }

    #[test]
    fn test_ldr_round_trip() {
        let mut image = HdrImage::with_size(4, 4, 1.0).unwrap();
        image.set_pixel(1, 2, [0.2, 0.4, 0.6]);
        let back = HdrImage::from_dynamic(&DynamicImage::ImageRgb8(image.to_rgb8())).unwrap();
        for (a, b) in image.to_rgb_f32().iter().zip(back.to_rgb_f32()) {
            assert!((a - b).abs() <= 0.5 / 255.0 + 1e-6);
        }
    }
}
