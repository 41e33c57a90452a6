//! JSON render job files.
//!
//! ```json
//! {
//!   "width": 512,
//!   "height": 512,
//!   "sphere": { "center": [256, 256, 0], "radius": 240 },
//!   "brdf": { "w0": [0.0, 0.0, 1.0], "s": 20.0, "ks": 0.4, "kd": 0.5 },
//!   "render": { "samples": 256, "seed": 7, "workers": 8 }
//! }
//! ```
//!
//! Every field is optional.

use std::path::Path;

use anyhow::{Context, Result};
use hdri_math::IVec3;
use hdri_renderer::{BrdfModel, RenderConfig, Sphere};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderJob {
    pub width: usize,
    pub height: usize,
    /// Defaults to the largest sphere centered in the image
    pub sphere: Option<Sphere>,
    pub brdf: BrdfModel,
    pub render: RenderConfig,
}

impl Default for RenderJob {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            sphere: None,
            brdf: BrdfModel::default(),
            render: RenderConfig::default(),
        }
    }
}

impl RenderJob {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid render job")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn sphere(&self) -> Sphere {
        self.sphere.unwrap_or_else(|| {
            let radius = (self.width.min(self.height) / 2).saturating_sub(1) as i32;
            Sphere::new(
                IVec3::new((self.width / 2) as i32, (self.height / 2) as i32, 0),
                radius,
            )
        })
    }
}
