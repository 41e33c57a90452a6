//! The blocked HDR image store.
//!
//! Pixels live in one contiguous `Vec<PixelBlock>` of `height * row_stride`
//! blocks. Rows are addressed by index arithmetic; `row_stride` is the
//! number of blocks per row padded so that each row spans a multiple of the
//! configured byte alignment.

use rayon::prelude::*;
use thiserror::Error;

use crate::pixel::{blocks_for_width, row_pixel, set_row_pixel, PixelBlock, BLOCK_WIDTH};

/// Default row alignment in bytes (one cache line).
pub const DEFAULT_ROW_ALIGNMENT: usize = 64;

/// Errors reported by image operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("Operation on an empty image")]
    Empty,

    #[error("Row alignment must be a power of two >= {min}, got {alignment}")]
    Alignment { alignment: usize, min: usize },

    #[error("Image dimensions {width}x{height} overflow")]
    Dimensions { width: usize, height: usize },

    #[error("Failed to allocate {blocks} pixel blocks")]
    Allocation { blocks: usize },

    #[error("Median radius must be odd, got {0}")]
    InvalidRadius(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

pub type ImageResult<T> = Result<T, ImageError>;

/// Selects which channels a statistic looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    Red,
    Green,
    Blue,
    #[default]
    All,
}

impl Channel {
    /// Picks the requested value(s) out of a pixel, folding with `f` for `All`.
    #[inline]
    pub(crate) fn select(self, rgb: [f32; 3], f: impl Fn(f32, f32) -> f32) -> f32 {
        match self {
            Channel::Red => rgb[0],
            Channel::Green => rgb[1],
            Channel::Blue => rgb[2],
            Channel::All => f(f(rgb[0], rgb[1]), rgb[2]),
        }
    }
}

/// A high dynamic range RGB image stored in 8-pixel blocks.
///
/// `min_channel`/`max_channel` are cached hints of the value range. Not every
/// mutation maintains them; operations document when they refresh them.
#[derive(Debug, Clone, PartialEq)]
pub struct HdrImage {
    width: usize,
    height: usize,
    row_stride: usize,
    blocks: Vec<PixelBlock>,
    min_channel: f32,
    max_channel: f32,
}

impl Default for HdrImage {
    fn default() -> Self {
        Self::new()
    }
}

impl HdrImage {
    /// Create an empty image.
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            row_stride: 0,
            blocks: Vec::new(),
            min_channel: 0.0,
            max_channel: 0.0,
        }
    }

    /// Create a zero-filled image of the given size.
    pub fn with_size(width: usize, height: usize, max_channel: f32) -> ImageResult<Self> {
        let mut image = Self::new();
        image.create(width, height, max_channel)?;
        Ok(image)
    }

    /// (Re)allocate storage with the default row alignment.
    pub fn create(&mut self, width: usize, height: usize, max_channel: f32) -> ImageResult<()> {
        self.create_aligned(width, height, max_channel, DEFAULT_ROW_ALIGNMENT)
    }

    /// (Re)allocate storage for a `width` x `height` image.
    ///
    /// Pixels are zeroed, `min_channel` is reset to 0 and `max_channel` to
    /// `max_channel`. On failure the image is left empty.
    pub fn create_aligned(
        &mut self,
        width: usize,
        height: usize,
        max_channel: f32,
        alignment: usize,
    ) -> ImageResult<()> {
        self.clear();

        let min = std::mem::size_of::<usize>();
        if !alignment.is_power_of_two() || alignment < min {
            return Err(ImageError::Alignment { alignment, min });
        }

        // Smallest block count whose byte size is a multiple of the alignment
        let block_bytes = std::mem::size_of::<PixelBlock>();
        let common = 1usize << block_bytes.trailing_zeros().min(alignment.trailing_zeros());
        let step = alignment / common;

        let overflow = ImageError::Dimensions { width, height };
        let row_stride = blocks_for_width(width)
            .checked_next_multiple_of(step)
            .ok_or(overflow.clone())?;
        let total = row_stride
            .checked_mul(height)
            .filter(|n| n.checked_mul(block_bytes).is_some())
            .ok_or(overflow)?;

        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(total)
            .map_err(|_| ImageError::Allocation { blocks: total })?;
        blocks.resize(total, PixelBlock::ZERO);

        log::debug!(
            "Allocated {}x{} image, stride {} blocks ({} bytes/row)",
            width,
            height,
            row_stride,
            row_stride * block_bytes
        );

        self.width = width;
        self.height = height;
        self.row_stride = row_stride;
        self.blocks = blocks;
        self.min_channel = 0.0;
        self.max_channel = max_channel;
        Ok(())
    }

    /// Release storage and return to the empty state.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Move the contents out, leaving this image empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn swap(&mut self, other: &mut HdrImage) {
        std::mem::swap(self, other);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Blocks per row, including alignment padding.
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Blocks holding actual pixels in each row.
    pub fn blocks_per_row(&self) -> usize {
        blocks_for_width(self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.blocks.is_empty()
    }

    pub fn same_size(&self, other: &HdrImage) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn min_channel(&self) -> f32 {
        self.min_channel
    }

    pub fn max_channel(&self) -> f32 {
        self.max_channel
    }

    /// Overwrite the cached channel bounds without touching pixels.
    pub fn set_channel_bounds(&mut self, min: f32, max: f32) {
        self.min_channel = min;
        self.max_channel = max;
    }

    pub(crate) fn ensure_not_empty(&self) -> ImageResult<()> {
        if self.is_empty() {
            Err(ImageError::Empty)
        } else {
            Ok(())
        }
    }

    /// Read pixel (x, y) as `[r, g, b]`.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [f32; 3] {
        debug_assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        self.blocks[y * self.row_stride + x / BLOCK_WIDTH].get(x % BLOCK_WIDTH)
    }

    /// Write pixel (x, y).
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [f32; 3]) {
        debug_assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        self.blocks[y * self.row_stride + x / BLOCK_WIDTH].set(x % BLOCK_WIDTH, rgb);
    }

    /// Row `y` without stride padding.
    #[inline]
    pub fn row(&self, y: usize) -> &[PixelBlock] {
        debug_assert!(y < self.height, "row {y} out of bounds");
        let start = y * self.row_stride;
        &self.blocks[start..start + self.blocks_per_row()]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [PixelBlock] {
        debug_assert!(y < self.height, "row {y} out of bounds");
        let start = y * self.row_stride;
        let len = self.blocks_per_row();
        &mut self.blocks[start..start + len]
    }

    /// Iterate rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[PixelBlock]> + '_ {
        let len = self.blocks_per_row();
        self.blocks
            .chunks_exact(self.row_stride.max(1))
            .map(move |row| &row[..len])
    }

    /// Parallel iterator over rows.
    pub fn par_rows(&self) -> impl IndexedParallelIterator<Item = &[PixelBlock]> + '_ {
        let len = self.blocks_per_row();
        self.blocks
            .par_chunks_exact(self.row_stride.max(1))
            .map(move |row| &row[..len])
    }

    /// Parallel iterator over mutable rows. Rows are disjoint, so workers
    /// never share output storage.
    pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = &mut [PixelBlock]> + '_ {
        let len = self.blocks_per_row();
        self.blocks
            .par_chunks_exact_mut(self.row_stride.max(1))
            .map(move |row| &mut row[..len])
    }

    /// Raw storage including padding, for handing to external consumers.
    pub fn as_block_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.blocks)
    }

    /// Flatten to row-major `[r, g, b]` float triples.
    pub fn to_rgb_f32(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.width * self.height * 3);
        for row in self.rows() {
            for x in 0..self.width {
                out.extend_from_slice(&row_pixel(row, x));
            }
        }
        out
    }

    /// Build an image from row-major `[r, g, b]` float triples.
    ///
    /// Channel bounds are refreshed from the data.
    pub fn from_rgb_f32(width: usize, height: usize, data: &[f32]) -> ImageResult<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(3))
            .ok_or(ImageError::Dimensions { width, height })?;
        if data.len() != expected {
            return Err(ImageError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let mut image = Self::with_size(width, height, 1.0)?;
        if width > 0 {
            image
                .par_rows_mut()
                .zip(data.par_chunks_exact(width * 3))
                .for_each(|(row, src)| {
                    for (x, rgb) in src.chunks_exact(3).enumerate() {
                        set_row_pixel(row, x, [rgb[0], rgb[1], rgb[2]]);
                    }
                });
        }
        image.refresh_channel_bounds();
        Ok(image)
    }
}
