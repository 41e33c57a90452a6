//! HDRI Core - blocked HDR image store and radiometric operations.
//!
//! This crate provides:
//!
//! - **Image store**: [`HdrImage`], rows of 8-pixel [`PixelBlock`]s with
//!   cached channel bounds
//! - **Processing**: tone mapping, median filtering, drawing, luminance CDFs
//! - **Exposure fusion**: [`create_hdr`] with pluggable [`CameraWeight`]s
//! - **File I/O**: PNM (`P2`, `P3`, `P5`, `P6`), PFM, and LDR formats through
//!   the `image` crate
//!
//! # Example
//!
//! ```ignore
//! use hdri_core::{create_hdr, HdrImage, PolynomialWeight};
//!
//! let short = HdrImage::load_ldr("short.png")?;
//! let long = HdrImage::load_ldr("long.png")?;
//! let mut hdr = create_hdr(&[0.5, 2.0], &[short, long], &PolynomialWeight::default())?;
//! hdr.save_pfm("merged.pfm")?;
//! ```

mod cdf;
mod draw;
mod filter;
pub mod fusion;
mod hdr_image;
pub mod io;
mod ops;
pub mod pixel;

pub use fusion::{
    create_hdr, CameraWeight, FusionError, FusionResult, PolynomialWeight, TrigWeight, HDR_HT,
    HDR_LT,
};
pub use hdr_image::{Channel, HdrImage, ImageError, ImageResult, DEFAULT_ROW_ALIGNMENT};
pub use io::{IoError, IoResult, PfmChannels, PnmFormat, PnmHeader};
pub use ops::{row_solid_angle_weight, DEFAULT_HISTOGRAM_BINS};
pub use pixel::{PixelBlock, BLOCK_WIDTH};

/// Re-export the geometry types used by drawing and rendering.
pub use hdri_math::{Interval, Sphere};
