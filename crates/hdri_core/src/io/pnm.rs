//! Portable anymap (PNM) reading and writing.
//!
//! Readers accept the grey and colour maps in ASCII (`P2`, `P3`) and binary
//! (`P5`, `P6`) form. Samples are stored as read, in units of the header's
//! maxval; a maxval above 255 means 16-bit big-endian binary samples.
//! Writers always emit the binary variants.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::header::HeaderReader;
use super::{IoError, IoResult};
use crate::hdr_image::HdrImage;
use crate::pixel::row_pixels;

/// The six PNM flavours, by magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnmFormat {
    /// `P1`
    AsciiBitmap,
    /// `P2`
    AsciiGreymap,
    /// `P3`
    AsciiColormap,
    /// `P4`
    BinaryBitmap,
    /// `P5`
    BinaryGreymap,
    /// `P6`
    BinaryColormap,
}

impl PnmFormat {
    pub fn from_magic(magic: [u8; 2]) -> Option<Self> {
        match &magic {
            b"P1" => Some(Self::AsciiBitmap),
            b"P2" => Some(Self::AsciiGreymap),
            b"P3" => Some(Self::AsciiColormap),
            b"P4" => Some(Self::BinaryBitmap),
            b"P5" => Some(Self::BinaryGreymap),
            b"P6" => Some(Self::BinaryColormap),
            _ => None,
        }
    }

    pub fn magic(self) -> &'static str {
        match self {
            Self::AsciiBitmap => "P1",
            Self::AsciiGreymap => "P2",
            Self::AsciiColormap => "P3",
            Self::BinaryBitmap => "P4",
            Self::BinaryGreymap => "P5",
            Self::BinaryColormap => "P6",
        }
    }

    pub fn is_binary(self) -> bool {
        matches!(self, Self::BinaryBitmap | Self::BinaryGreymap | Self::BinaryColormap)
    }

    pub fn channels(self) -> usize {
        match self {
            Self::AsciiColormap | Self::BinaryColormap => 3,
            _ => 1,
        }
    }
}

/// Parsed PNM header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PnmHeader {
    pub format: PnmFormat,
    pub width: usize,
    pub height: usize,
    pub maxval: u32,
}

fn read_header<R: BufRead>(reader: &mut R) -> IoResult<PnmHeader> {
    let magic = reader.read_magic()?;
    let format = PnmFormat::from_magic(magic).ok_or_else(|| {
        IoError::Header(format!("unknown magic {:?}", String::from_utf8_lossy(&magic)))
    })?;
    if matches!(format, PnmFormat::AsciiBitmap | PnmFormat::BinaryBitmap) {
        return Err(IoError::Unsupported(format!("{} bitmaps", format.magic())));
    }

    let width: usize = reader.read_value("width")?;
    let height: usize = reader.read_value("height")?;
    let maxval: u32 = reader.read_value("maxval")?;
    if width == 0 || height == 0 {
        return Err(IoError::Header(format!("empty image {width}x{height}")));
    }
    if maxval == 0 || maxval > u16::MAX as u32 {
        return Err(IoError::Header(format!("maxval {maxval} out of range")));
    }
    Ok(PnmHeader {
        format,
        width,
        height,
        maxval,
    })
}

fn decode<R: BufRead>(mut reader: R) -> IoResult<(HdrImage, PnmHeader)> {
    let header = read_header(&mut reader)?;
    let PnmHeader {
        format,
        width,
        height,
        maxval,
    } = header;
    let channels = format.channels();
    let wide = maxval > 255;
    log::debug!(
        "Reading {} {}x{} maxval {}",
        format.magic(),
        width,
        height,
        maxval
    );

    let mut image = HdrImage::with_size(width, height, maxval as f32)?;
    let mut samples = vec![0u32; width * channels];
    let mut bytes = vec![0u8; width * channels * if wide { 2 } else { 1 }];

    for y in 0..height {
        if format.is_binary() {
            reader.read_exact(&mut bytes)?;
            if wide {
                for (sample, pair) in samples.iter_mut().zip(bytes.chunks_exact(2)) {
                    *sample = u16::from_be_bytes([pair[0], pair[1]]) as u32;
                }
            } else {
                for (sample, &byte) in samples.iter_mut().zip(&bytes) {
                    *sample = byte as u32;
                }
            }
        } else {
            for sample in samples.iter_mut() {
                *sample = reader.read_value("sample")?;
            }
        }

        for (x, px) in samples.chunks_exact(channels).enumerate() {
            if let Some(&bad) = px.iter().find(|&&s| s > maxval) {
                return Err(IoError::Data(format!(
                    "sample {bad} at ({x}, {y}) exceeds maxval {maxval}"
                )));
            }
            let rgb = if channels == 3 {
                [px[0] as f32, px[1] as f32, px[2] as f32]
            } else {
                [px[0] as f32; 3]
            };
            image.set_pixel(x, y, rgb);
        }
    }

    image.refresh_channel_bounds();
    Ok((image, header))
}

fn encode<W: Write>(image: &HdrImage, format: PnmFormat, mut writer: W) -> IoResult<()> {
    if image.is_empty() {
        return Err(IoError::EmptyImage);
    }
    if !matches!(format, PnmFormat::BinaryGreymap | PnmFormat::BinaryColormap) {
        return Err(IoError::Unsupported(format!(
            "writing {}; only P5 and P6 are written",
            format.magic()
        )));
    }

    let maxval = image.max_channel().round().clamp(1.0, u16::MAX as f32) as u32;
    let wide = maxval > 255;
    write!(
        writer,
        "{}\n{} {}\n{}\n",
        format.magic(),
        image.width(),
        image.height(),
        maxval
    )?;

    let quantize = |v: f32| v.round().clamp(0.0, maxval as f32) as u16;
    let mut line = Vec::with_capacity(image.width() * 3 * 2);
    for row in image.rows() {
        line.clear();
        for rgb in row_pixels(row, image.width()) {
            let values = if format == PnmFormat::BinaryColormap {
                [quantize(rgb[0]), quantize(rgb[1]), quantize(rgb[2])]
            } else {
                [quantize((rgb[0] + rgb[1] + rgb[2]) / 3.0), 0, 0]
            };
            for &value in &values[..format.channels()] {
                if wide {
                    line.extend_from_slice(&value.to_be_bytes());
                } else {
                    line.push(value as u8);
                }
            }
        }
        writer.write_all(&line)?;
    }
    writer.flush()?;
    Ok(())
}

impl HdrImage {
    /// Replace this image with a PNM read from `reader`.
    pub fn read_pnm<R: BufRead>(&mut self, reader: R) -> IoResult<PnmHeader> {
        match decode(reader) {
            Ok((image, header)) => {
                *self = image;
                Ok(header)
            }
            Err(e) => {
                self.clear();
                log::error!("Failed to read PNM: {}", e);
                Err(e)
            }
        }
    }

    /// Replace this image with the PNM file at `path`.
    pub fn load_pnm(&mut self, path: impl AsRef<Path>) -> IoResult<PnmHeader> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => self.read_pnm(BufReader::new(file)),
            Err(e) => {
                self.clear();
                log::error!("Failed to open {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    }

    /// Write this image as binary PNM (`P5` or `P6`).
    ///
    /// The maxval is the rounded cached maximum (clamped to 1..=65535);
    /// samples are rounded. Greymaps store `(r + g + b) / 3`.
    pub fn write_pnm<W: Write>(&self, writer: W, format: PnmFormat) -> IoResult<()> {
        encode(self, format, writer).inspect_err(|e| log::error!("Failed to write PNM: {}", e))
    }

    pub fn save_pnm(&self, path: impl AsRef<Path>, format: PnmFormat) -> IoResult<()> {
        let path = path.as_ref();
        let file = File::create(path).inspect_err(|e| {
            log::error!("Failed to create {}: {}", path.display(), e);
        })?;
        self.write_pnm(BufWriter::new(file), format)
    }
}
