//! Phong and Blinn-Phong reflectance.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Phong-family BRDF: a Lambertian term `kd / PI` plus a specular lobe of
/// exponent `s` around the direction `w0`.
///
/// Importance sampling expects `kd + ks <= 1`, which the type does not
/// enforce; see [`BrdfModel::is_energy_conserving`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrdfModel {
    w0: Vec3,
    s: f32,
    ks: f32,
    kd: f32,
}

impl Default for BrdfModel {
    fn default() -> Self {
        Self {
            w0: Vec3::Z,
            s: 10.0,
            ks: 0.5,
            kd: 0.5,
        }
    }
}

impl BrdfModel {
    pub fn new(w0: Vec3, s: f32, ks: f32, kd: f32) -> Self {
        Self { w0, s, ks, kd }
    }

    pub fn w0(&self) -> Vec3 {
        self.w0
    }

    pub fn s(&self) -> f32 {
        self.s
    }

    pub fn ks(&self) -> f32 {
        self.ks
    }

    pub fn kd(&self) -> f32 {
        self.kd
    }

    pub fn set_w0(&mut self, w0: Vec3) {
        self.w0 = w0;
    }

    pub fn set_s(&mut self, s: f32) {
        self.s = s;
    }

    pub fn set_ks(&mut self, ks: f32) {
        self.ks = ks;
    }

    pub fn set_kd(&mut self, kd: f32) {
        self.kd = kd;
    }

    pub fn is_energy_conserving(&self) -> bool {
        self.kd + self.ks <= 1.0
    }

    #[inline]
    fn specular(&self, cos_lobe: f32, n_dot_wi: f32) -> f32 {
        let diffuse = self.kd / PI;
        if n_dot_wi <= 0.0 {
            return diffuse;
        }
        diffuse + self.ks * cos_lobe.max(0.0).powf(self.s) / n_dot_wi
    }

    /// `kd/PI + ks * (wr.w0)^s / (n.wi)`.
    ///
    /// Negative cosines are clamped to zero; grazing or back-facing `wi`
    /// (`n.wi <= 0`) leaves only the diffuse term.
    #[inline]
    pub fn phong(&self, wi: Vec3, wr: Vec3, n: Vec3) -> f32 {
        self.specular(wr.dot(self.w0), n.dot(wi))
    }

    /// `kd/PI + ks * (n.wh)^s / (n.wi)` with the half vector
    /// `wh = normalize(wi + w0)`.
    #[inline]
    pub fn blinn_phong(&self, wi: Vec3, _wr: Vec3, n: Vec3) -> f32 {
        let wh = (wi + self.w0).normalize_or_zero();
        self.specular(n.dot(wh), n.dot(wi))
    }
}
