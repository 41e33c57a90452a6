//! Seedable uniform random sources.
//!
//! The renderer only needs a reseedable stream of 31-bit integers and a
//! uniform draw in `[a, b)` built on top of it. Two classic linear
//! congruential generators are provided, plus an adapter for any `rand` RNG.

use rand::{RngCore, SeedableRng};

/// A reseedable source of uniformly distributed numbers.
pub trait UniformSampler {
    /// Reset the stream from `seed`.
    fn seed(&mut self, seed: u64);

    /// The seed the stream was last reset from.
    fn base_seed(&self) -> u64;

    /// Next integer, uniform in `[0, 2^31)`.
    fn next_u31(&mut self) -> u32;

    /// Uniform float in `[a, b)`.
    fn uniform(&mut self, a: f32, b: f32) -> f32 {
        // 24 bits fill an f32 mantissa exactly
        let unit = (self.next_u31() >> 7) as f32 * (1.0 / (1u32 << 24) as f32);
        let value = a + (b - a) * unit;
        if value < b || a >= b {
            value
        } else {
            a
        }
    }
}

const MASK_31: u64 = 0x7FFF_FFFF;

/// Haynes' 64-bit LCG (`a = 6364136223846793005`, `c = 1`), truncated to
/// 31 bits of state per draw.
#[derive(Debug, Clone)]
pub struct Haynes {
    state: u64,
    seed: u64,
}

impl Haynes {
    pub const MULTIPLIER: u64 = 6364136223846793005;
    pub const INCREMENT: u64 = 1;

    pub fn new(seed: u64) -> Self {
        let mut rng = Self { state: 0, seed: 0 };
        rng.seed(seed);
        rng
    }
}

impl Default for Haynes {
    fn default() -> Self {
        Self::new(0)
    }
}

impl UniformSampler for Haynes {
    fn seed(&mut self, seed: u64) {
        self.seed = seed;
        self.state = Self::MULTIPLIER
            .wrapping_mul(seed)
            .wrapping_add(Self::INCREMENT);
    }

    fn base_seed(&self) -> u64 {
        self.seed
    }

    fn next_u31(&mut self) -> u32 {
        self.state = Self::MULTIPLIER
            .wrapping_mul(self.state)
            .wrapping_add(Self::INCREMENT)
            & MASK_31;
        self.state as u32
    }
}

/// Park and Miller's minimal standard generator (`a = 16807`, `m = 2^31 - 1`).
#[derive(Debug, Clone)]
pub struct ParkMiller {
    state: u64,
    seed: u64,
}

impl ParkMiller {
    pub const MULTIPLIER: u64 = 16807;
    pub const MODULUS: u64 = MASK_31;

    pub fn new(seed: u64) -> Self {
        let mut rng = Self { state: 1, seed: 0 };
        rng.seed(seed);
        rng
    }
}

impl Default for ParkMiller {
    fn default() -> Self {
        Self::new(1)
    }
}

impl UniformSampler for ParkMiller {
    fn seed(&mut self, seed: u64) {
        self.seed = seed;
        // Zero is a fixed point of the recurrence
        self.state = match seed % Self::MODULUS {
            0 => 1,
            s => s,
        };
    }

    fn base_seed(&self) -> u64 {
        self.seed
    }

    fn next_u31(&mut self) -> u32 {
        self.state = self.state * Self::MULTIPLIER % Self::MODULUS;
        self.state as u32
    }
}

/// Adapts any seedable `rand` generator (e.g. `StdRng`) to [`UniformSampler`].
#[derive(Debug, Clone)]
pub struct RandSampler<R> {
    rng: R,
    seed: u64,
}

impl<R: RngCore + SeedableRng> RandSampler<R> {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: R::seed_from_u64(seed),
            seed,
        }
    }
}

impl<R: RngCore + SeedableRng> UniformSampler for RandSampler<R> {
    fn seed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = R::seed_from_u64(seed);
    }

    fn base_seed(&self) -> u64 {
        self.seed
    }

    fn next_u31(&mut self) -> u32 {
        self.rng.next_u32() >> 1
    }
}
