//! Eight-pixel SIMD-friendly storage block.
//!
//! Rows are stored as runs of [`PixelBlock`]s. Per-row loops go over the
//! whole blocks first and then the remainder lanes of the last block, so the
//! hot path works on full `[f32; 8]` lanes the compiler can vectorize.
//! Lanes past the row width may hold stale data and are never read.

use bytemuck::{Pod, Zeroable};

/// Number of pixels in a block.
pub const BLOCK_WIDTH: usize = 8;

/// Eight pixels of planar red, green and blue samples.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PixelBlock {
    pub r: [f32; BLOCK_WIDTH],
    pub g: [f32; BLOCK_WIDTH],
    pub b: [f32; BLOCK_WIDTH],
}

impl PixelBlock {
    pub const ZERO: PixelBlock = PixelBlock {
        r: [0.0; BLOCK_WIDTH],
        g: [0.0; BLOCK_WIDTH],
        b: [0.0; BLOCK_WIDTH],
    };

    /// A block with every lane set to `rgb`.
    pub fn splat(rgb: [f32; 3]) -> Self {
        Self {
            r: [rgb[0]; BLOCK_WIDTH],
            g: [rgb[1]; BLOCK_WIDTH],
            b: [rgb[2]; BLOCK_WIDTH],
        }
    }

    #[inline]
    pub fn get(&self, lane: usize) -> [f32; 3] {
        [self.r[lane], self.g[lane], self.b[lane]]
    }

    #[inline]
    pub fn set(&mut self, lane: usize, rgb: [f32; 3]) {
        self.r[lane] = rgb[0];
        self.g[lane] = rgb[1];
        self.b[lane] = rgb[2];
    }

    /// Sum of the three channels at `lane`.
    #[inline]
    pub fn channel_sum(&self, lane: usize) -> f32 {
        self.r[lane] + self.g[lane] + self.b[lane]
    }

    /// Applies `f` to every channel of the first `lanes` lanes.
    #[inline]
    pub fn map_lanes(&mut self, lanes: usize, f: impl Fn(f32) -> f32) {
        for plane in [&mut self.r, &mut self.g, &mut self.b] {
            for value in &mut plane[..lanes] {
                *value = f(*value);
            }
        }
    }
}

impl Default for PixelBlock {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Number of blocks needed to hold `width` pixels.
#[inline]
pub fn blocks_for_width(width: usize) -> usize {
    width.div_ceil(BLOCK_WIDTH)
}

/// Applies `f` to every channel of the first `width` pixels of a row.
pub fn map_row(row: &mut [PixelBlock], width: usize, f: impl Fn(f32) -> f32 + Copy) {
    let whole = width / BLOCK_WIDTH;
    let rest = width % BLOCK_WIDTH;
    for block in &mut row[..whole] {
        block.map_lanes(BLOCK_WIDTH, f);
    }
    if rest > 0 {
        row[whole].map_lanes(rest, f);
    }
}

/// Iterates the first `width` pixels of a row as `[r, g, b]` triples.
pub fn row_pixels(row: &[PixelBlock], width: usize) -> impl Iterator<Item = [f32; 3]> + '_ {
    row.iter()
        .enumerate()
        .flat_map(move |(i, block)| {
            let lanes = width.saturating_sub(i * BLOCK_WIDTH).min(BLOCK_WIDTH);
            (0..lanes).map(move |lane| block.get(lane))
        })
}

/// Writes `rgb` into pixel `x` of a row.
#[inline]
pub fn set_row_pixel(row: &mut [PixelBlock], x: usize, rgb: [f32; 3]) {
    row[x / BLOCK_WIDTH].set(x % BLOCK_WIDTH, rgb);
}

/// Reads pixel `x` of a row.
#[inline]
pub fn row_pixel(row: &[PixelBlock], x: usize) -> [f32; 3] {
    row[x / BLOCK_WIDTH].get(x % BLOCK_WIDTH)
}
