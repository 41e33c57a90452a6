//! Load and save images by file extension.

use std::path::Path;

use anyhow::{Context, Result};
use hdri_core::{HdrImage, PnmFormat};

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Load an image. PNM and LDR files are scaled to `[0, 1]`; PFM is kept as is.
pub fn load(path: &Path) -> Result<HdrImage> {
    let mut image = HdrImage::new();
    match extension(path).as_str() {
        "pfm" => {
            image
                .load_pfm(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
        }
        "pgm" | "ppm" | "pnm" => {
            let header = image
                .load_pnm(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            image.scale(1.0 / header.maxval as f32);
        }
        _ => {
            image = HdrImage::load_ldr(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
        }
    }
    log::info!(
        "Loaded {} ({}x{}, range [{}, {}])",
        path.display(),
        image.width(),
        image.height(),
        image.min_channel(),
        image.max_channel()
    );
    Ok(image)
}

/// Save an image. PFM keeps full range; PNM and LDR formats clip to `[0, 1]`.
pub fn save(image: &HdrImage, path: &Path) -> Result<()> {
    let ext = extension(path);
    match ext.as_str() {
        "pfm" => image.save_pfm(path),
        "pgm" | "ppm" | "pnm" => {
            let mut out = image.clone();
            out.truncate(0.0, 1.0)?;
            out.scale(255.0);
            let format = if ext == "pgm" {
                PnmFormat::BinaryGreymap
            } else {
                PnmFormat::BinaryColormap
            };
            out.save_pnm(path, format)
        }
        _ => image.save_ldr(path),
    }
    .with_context(|| format!("Failed to save {}", path.display()))?;
    log::info!("Saved {}", path.display());
    Ok(())
}
