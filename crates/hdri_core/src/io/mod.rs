//! PNM / PFM file I/O and LDR interop through the `image` crate.
//!
//! Readers replace the target image. On any failure the target is left
//! empty, the error is logged and returned.

mod header;
mod ldr;
mod pfm;
mod pnm;

use thiserror::Error;

use crate::hdr_image::ImageError;

pub use pfm::PfmChannels;
pub use pnm::{PnmFormat, PnmHeader};

/// Errors that can occur while reading or writing image files.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header: {0}")]
    Header(String),

    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("Invalid sample data: {0}")]
    Data(String),

    #[error("Cannot write an empty image")]
    EmptyImage,

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),
}

pub type IoResult<T> = Result<T, IoError>;
