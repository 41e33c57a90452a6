//! Portable float map (PFM) reading and writing.
//!
//! Header: `PF` (colour) or `Pf` (grey), dimensions, then a scale whose sign
//! gives the byte order (negative = little-endian). Rows of raw `f32`
//! samples follow, bottom row first.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::header::HeaderReader;
use super::{IoError, IoResult};
use crate::hdr_image::HdrImage;
use crate::pixel::row_pixels;

/// Channel layout of a PFM file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PfmChannels {
    /// `Pf`
    Grey,
    /// `PF`
    Colour,
}

impl PfmChannels {
    fn count(self) -> usize {
        match self {
            Self::Grey => 1,
            Self::Colour => 3,
        }
    }

    fn magic(self) -> &'static str {
        match self {
            Self::Grey => "Pf",
            Self::Colour => "PF",
        }
    }
}

fn decode<R: BufRead>(mut reader: R) -> IoResult<HdrImage> {
    let magic = reader.read_magic()?;
    let channels = match &magic {
        b"PF" => PfmChannels::Colour,
        b"Pf" => PfmChannels::Grey,
        _ => {
            return Err(IoError::Header(format!(
                "unknown magic {:?}",
                String::from_utf8_lossy(&magic)
            )))
        }
    };
    let width: usize = reader.read_value("width")?;
    let height: usize = reader.read_value("height")?;
    let scale: f32 = reader.read_value("scale")?;
    if width == 0 || height == 0 {
        return Err(IoError::Header(format!("empty image {width}x{height}")));
    }
    if scale == 0.0 || !scale.is_finite() {
        return Err(IoError::Header(format!("invalid scale {scale}")));
    }
    let little_endian = scale < 0.0;
    log::debug!(
        "Reading {} {}x{} ({} endian)",
        channels.magic(),
        width,
        height,
        if little_endian { "little" } else { "big" }
    );

    let n = channels.count();
    let mut image = HdrImage::with_size(width, height, scale.abs())?;
    let mut bytes = vec![0u8; width * n * 4];

    for file_row in 0..height {
        reader.read_exact(&mut bytes)?;
        let y = height - 1 - file_row;
        for (x, px) in bytes.chunks_exact(n * 4).enumerate() {
            let mut values = [0.0f32; 3];
            for (value, raw) in values.iter_mut().zip(px.chunks_exact(4)) {
                let raw = [raw[0], raw[1], raw[2], raw[3]];
                *value = if little_endian {
                    f32::from_le_bytes(raw)
                } else {
                    f32::from_be_bytes(raw)
                };
            }
            if n == 1 {
                values = [values[0]; 3];
            }
            image.set_pixel(x, y, values);
        }
    }

    image.refresh_channel_bounds();
    if image.min_channel() < 0.0 {
        let max = image.max_channel();
        image.normalise(max);
    }
    Ok(image)
}

fn encode<W: Write>(image: &HdrImage, mut writer: W) -> IoResult<()> {
    if image.is_empty() {
        return Err(IoError::EmptyImage);
    }
    let max = image.max_channel();
    let scale = if max > 0.0 { -max } else { -1.0 };
    write!(
        writer,
        "PF\n{} {}\n{}\n",
        image.width(),
        image.height(),
        scale
    )?;

    let mut line = Vec::with_capacity(image.width() * 12);
    for y in (0..image.height()).rev() {
        line.clear();
        for rgb in row_pixels(image.row(y), image.width()) {
            for value in rgb {
                line.extend_from_slice(&value.to_le_bytes());
            }
        }
        writer.write_all(&line)?;
    }
    writer.flush()?;
    Ok(())
}

impl HdrImage {
    /// Replace this image with a PFM read from `reader`.
    ///
    /// Bounds are refreshed from the data; if any sample is negative the
    /// image is renormalised onto `[0, max]`.
    pub fn read_pfm<R: BufRead>(&mut self, reader: R) -> IoResult<()> {
        match decode(reader) {
            Ok(image) => {
                *self = image;
                Ok(())
            }
            Err(e) => {
                self.clear();
                log::error!("Failed to read PFM: {}", e);
                Err(e)
            }
        }
    }

    pub fn load_pfm(&mut self, path: impl AsRef<Path>) -> IoResult<()> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => self.read_pfm(BufReader::new(file)),
            Err(e) => {
                self.clear();
                log::error!("Failed to open {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    }

    /// Write this image as a little-endian colour PFM with scale `-max_channel`.
    pub fn write_pfm<W: Write>(&self, writer: W) -> IoResult<()> {
        encode(self, writer).inspect_err(|e| log::error!("Failed to write PFM: {}", e))
    }

    pub fn save_pfm(&self, path: impl AsRef<Path>) -> IoResult<()> {
        let path = path.as_ref();
        let file = File::create(path).inspect_err(|e| {
            log::error!("Failed to create {}: {}", path.display(), e);
        })?;
        self.write_pfm(BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_image() -> HdrImage {
        let mut image = HdrImage::with_size(5, 3, 1.0).unwrap();
        for y in 0..3 {
            for x in 0..5 {
                let v = 0.01 + (x * 3 + y) as f32 * 1.37;
                image.set_pixel(x, y, [v, v * 10.0, v / 7.0]);
            }
        }
        image.refresh_channel_bounds();
        image
    }

    #[test]
    fn test_round_trip_is_exact() {
        let image = sample_image();
        let mut bytes = Vec::new();
        image.write_pfm(&mut bytes).unwrap();

        let mut loaded = HdrImage::new();
        loaded.read_pfm(Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.to_rgb_f32(), image.to_rgb_f32());
        assert_eq!(loaded.max_channel(), image.max_channel());
    }

    #[test]
    fn test_header_and_row_order() {
        let mut image = HdrImage::with_size(1, 2, 2.0).unwrap();
        image.set_pixel(0, 0, [1.0, 1.0, 1.0]);
        image.set_pixel(0, 1, [2.0, 2.0, 2.0]);
        let mut bytes = Vec::new();
        image.write_pfm(&mut bytes).unwrap();

        let header = b"PF\n1 2\n-2\n";
        assert!(bytes.starts_with(header));
        // Bottom row (y = 1) comes first
        let first = &bytes[header.len()..header.len() + 4];
        assert_eq!(first, &2.0f32.to_le_bytes());
    }

    #[test]
    fn test_big_endian_grey() {
        let mut data = b"Pf\n2 1\n1.0\n".to_vec();
        data.extend_from_slice(&0.5f32.to_be_bytes());
        data.extend_from_slice(&4.0f32.to_be_bytes());

        let mut image = HdrImage::new();
        image.read_pfm(Cursor::new(data)).unwrap();
        assert_eq!(image.pixel(0, 0), [0.5, 0.5, 0.5]);
        assert_eq!(image.pixel(1, 0), [4.0, 4.0, 4.0]);
        assert_eq!(image.max_channel(), 4.0);
    }

    #[test]
    fn test_negative_samples_are_renormalised() {
        let mut data = b"PF\n1 1\n-1\n".to_vec();
        for v in [-1.0f32, 0.0, 3.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let mut image = HdrImage::new();
        image.read_pfm(Cursor::new(data)).unwrap();
        assert_eq!(image.pixel(0, 0), [0.0, 0.75, 3.0]);
        assert_eq!(image.min_channel(), 0.0);
        assert_eq!(image.max_channel(), 3.0);
    }

    #[test]
    fn test_bad_scale_and_truncation() {
        let mut image = HdrImage::with_size(1, 1, 1.0).unwrap();
        assert!(matches!(
            image.read_pfm(Cursor::new(&b"PF\n1 1\n0\n"[..])),
            Err(IoError::Header(_))
        ));
        assert!(image.is_empty());

        let mut data = b"PF\n2 2\n-1\n".to_vec();
        data.extend_from_slice(&[0u8; 10]);
        assert!(matches!(image.read_pfm(Cursor::new(data)), Err(IoError::Io(_))));
        assert!(image.is_empty());
    }

    #[test]
    fn test_write_empty_fails() {
        let mut sink = Vec::new();
        assert!(matches!(HdrImage::new().write_pfm(&mut sink), Err(IoError::EmptyImage)));
    }
}
