//! Direction sampling proportional to a Phong lobe.
//!
//! Each sample chooses the diffuse lobe with probability `kd` and the
//! specular lobe with probability `ks`; draws that land in the remaining
//! `1 - kd - ks` are rejected and redrawn.

use std::f32::consts::{PI, TAU};

use crate::importance::{SamplingError, SamplingResult};
use crate::sampler::{Haynes, UniformSampler};

/// Polar angles `(theta, phi)` of a sampled direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LobeSample {
    pub theta: f32,
    pub phi: f32,
}

impl LobeSample {
    /// Row index of this sample in an equirectangular map of `height` rows.
    pub fn theta_index(&self, height: usize) -> usize {
        ((self.theta / PI * height as f32) as usize).min(height.saturating_sub(1))
    }

    /// Column index of this sample in an equirectangular map of `width` columns.
    pub fn phi_index(&self, width: usize) -> usize {
        ((self.phi / TAU * width as f32) as usize).min(width.saturating_sub(1))
    }
}

/// Phong lobe sampler.
#[derive(Debug, Clone)]
pub struct PhongSampler {
    s: f32,
    ks: f32,
    kd: f32,
    samples: Vec<LobeSample>,
}

impl PhongSampler {
    pub fn new(s: f32, ks: f32, kd: f32) -> Self {
        Self {
            s,
            ks,
            kd,
            samples: Vec::new(),
        }
    }

    /// Draw `n` samples from a [`Haynes`] stream seeded with `seed`,
    /// replacing any previous set.
    ///
    /// Fails when the coefficients are not energy conserving or select
    /// neither lobe.
    pub fn generate(&mut self, n: usize, seed: u64) -> SamplingResult<()> {
        self.samples.clear();
        let total = self.kd + self.ks;
        if !(self.kd >= 0.0 && self.ks >= 0.0 && total > 0.0 && total <= 1.0) {
            return Err(SamplingError::InvalidLobes {
                kd: self.kd,
                ks: self.ks,
            });
        }
        self.samples
            .try_reserve_exact(n)
            .map_err(|_| SamplingError::Allocation { samples: n })?;

        let mut rng = Haynes::new(seed);
        for _ in 0..n {
            let sample = self.sample(&mut rng);
            self.samples.push(sample);
        }
        Ok(())
    }

    fn sample(&self, rng: &mut impl UniformSampler) -> LobeSample {
        loop {
            let pick = rng.uniform(0.0, 1.0);
            if pick < self.kd {
                return self.diffuse(rng);
            }
            if pick < self.kd + self.ks {
                return self.specular(rng);
            }
        }
    }

    fn diffuse(&self, rng: &mut impl UniformSampler) -> LobeSample {
        let theta = (1.0 - rng.uniform(0.0, 1.0).sqrt()).acos();
        let phi = TAU * rng.uniform(0.0, 1.0);
        LobeSample { theta, phi }
    }

    fn specular(&self, rng: &mut impl UniformSampler) -> LobeSample {
        let theta = (1.0 - rng.uniform(0.0, 1.0)).powf(1.0 / (self.s + 1.0)).acos();
        let phi = TAU * rng.uniform(0.0, 1.0);
        LobeSample { theta, phi }
    }

    pub fn is_initialised(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn samples(&self) -> &[LobeSample] {
        &self.samples
    }
}
