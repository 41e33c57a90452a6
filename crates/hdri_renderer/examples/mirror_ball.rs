//! Mirror ball example.
//!
//! Builds a synthetic sky, renders a glossy ball lit by it and saves the
//! tone mapped result as a binary PPM.

use hdri_core::PnmFormat;
use hdri_renderer::{
    latlong_to_sphere, render, BrdfModel, Haynes, HdrImage, IVec3, RenderConfig, Sphere, Vec3,
};

fn build_sky(width: usize, height: usize) -> HdrImage {
    let mut sky = HdrImage::with_size(width, height, 1.0).expect("sky allocation");
    for y in 0..height {
        let t = y as f32 / height as f32;
        for x in 0..width {
            let ground = if t > 0.5 { 0.3 } else { 1.0 };
            sky.set_pixel(x, y, [0.4 * ground, 0.6 * ground, (1.0 - t) * ground + 0.1]);
        }
    }
    // A small, very bright sun
    for y in 8..12 {
        for x in 40..44 {
            sky.set_pixel(x, y, [50.0, 45.0, 30.0]);
        }
    }
    sky.refresh_channel_bounds();
    sky
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let sky = build_sky(128, 64);
    let config = RenderConfig {
        samples: 128,
        ..RenderConfig::default()
    };
    let brdf = BrdfModel::new(config.view, 20.0, 0.4, 0.5);
    let sphere = Sphere::new(IVec3::new(100, 100, 0), 90);

    let start = std::time::Instant::now();
    let mut glossy = HdrImage::with_size(400, 200, 1.0).expect("image allocation");
    render(
        &mut glossy,
        &sphere,
        &sky,
        config.view,
        config.samples,
        &brdf,
        &Haynes::new(config.seed),
        config.workers,
    )
    .expect("render failed");

    let mirror_sphere = Sphere::new(IVec3::new(300, 100, 0), 90);
    latlong_to_sphere(&mut glossy, &mirror_sphere, Vec3::Z, &sky, 0, 0);
    println!("Rendered in {:?}", start.elapsed());

    glossy.refresh_channel_bounds();
    glossy.linear_tone_map(0.0);
    glossy.normalise(255.0);
    glossy
        .save_pnm("mirror_ball.ppm", PnmFormat::BinaryColormap)
        .expect("Failed to save image");
    println!("Saved to mirror_ball.ppm");
}
