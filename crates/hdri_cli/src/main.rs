//! `hdri` - exposure fusion, tone mapping and environment rendering from the
//! command line.

mod files;
mod job;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hdri_core::{create_hdr, CameraWeight, Channel, HdrImage, PolynomialWeight, TrigWeight};
use hdri_renderer::{
    latlong_to_sphere, render, render_biased, Haynes, ParkMiller, RandSampler, UniformSampler,
};
use rand::rngs::StdRng;

use job::RenderJob;

#[derive(Parser, Debug)]
#[command(
    name = "hdri",
    version,
    about = "High dynamic range image tools",
    long_about = "Merge bracketed exposures, tone map HDR images and render \
                  spheres lit by lat-long environment maps."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge bracketed exposures into one HDR image
    Fuse {
        /// Input exposures, in the same order as --times
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Exposure time of each input
        #[arg(short, long, value_delimiter = ',', required = true)]
        times: Vec<f32>,

        /// Camera response weighting
        #[arg(short, long, value_enum, default_value_t = WeightKind::Poly)]
        weight: WeightKind,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Map an HDR image into displayable range
    Tonemap {
        input: PathBuf,

        #[arg(short, long, value_enum, default_value_t = ToneMode::Linear)]
        mode: ToneMode,

        /// Exposure adjustment for linear mapping
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        stops: f32,

        /// Histogram bins for histogram equalisation
        #[arg(long, default_value_t = hdri_core::DEFAULT_HISTOGRAM_BINS)]
        bins: usize,

        /// Display gamma; values map to `x^(1/gamma)`
        #[arg(short, long, default_value_t = 2.2)]
        gamma: f32,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render a sphere lit by a lat-long environment map
    Render {
        /// Lat-long environment map
        #[arg(short, long)]
        env: PathBuf,

        /// JSON render job (sphere, brdf and render settings)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        size: Option<(usize, usize)>,

        #[arg(long)]
        samples: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        workers: Option<usize>,

        /// Share one set of environment samples between all pixels
        #[arg(long)]
        biased: bool,

        /// Show the environment reflected in a perfect mirror instead
        #[arg(long, conflicts_with = "biased")]
        mirror: bool,

        #[arg(long, value_enum, default_value_t = SamplerKind::Haynes)]
        sampler: SamplerKind,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Median filter an image
    Median {
        input: PathBuf,

        /// Odd window size
        #[arg(short, long, default_value_t = 3)]
        radius: usize,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert between image formats by extension
    Convert { input: PathBuf, output: PathBuf },

    /// Print dimensions and channel statistics
    Info { input: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WeightKind {
    /// Polynomial hat `x²(1 - x)²`
    Poly,
    /// Raised cosine `sin(2 PI x - PI/2) + 1`
    Trig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ToneMode {
    Linear,
    Histeq,
    Gamma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SamplerKind {
    Haynes,
    ParkMiller,
    Std,
}

fn parse_size(text: &str) -> Result<(usize, usize), String> {
    let (w, h) = text
        .split_once(|c| c == 'x' || c == 'X')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{text}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid size '{text}': {e}"))
    };
    let size = (parse(w)?, parse(h)?);
    if size.0 == 0 || size.1 == 0 {
        return Err(format!("size must be non-zero, got '{text}'"));
    }
    Ok(size)
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Fuse {
            inputs,
            times,
            weight,
            output,
        } => fuse(&inputs, &times, weight, &output),
        Command::Tonemap {
            input,
            mode,
            stops,
            bins,
            gamma,
            output,
        } => tonemap(&input, mode, stops, bins, gamma, &output),
        Command::Render {
            env,
            config,
            size,
            samples,
            seed,
            workers,
            biased,
            mirror,
            sampler,
            output,
        } => {
            let mut job = match config {
                Some(path) => RenderJob::load(&path)?,
                None => RenderJob::default(),
            };
            if let Some((width, height)) = size {
                job.width = width;
                job.height = height;
            }
            if let Some(samples) = samples {
                job.render.samples = samples;
            }
            if let Some(seed) = seed {
                job.render.seed = seed;
            }
            if let Some(workers) = workers {
                job.render.workers = workers;
            }
            job.render.biased |= biased;
            run_render(&env, &job, mirror, sampler, &output)
        }
        Command::Median {
            input,
            radius,
            output,
        } => {
            let mut image = files::load(&input)?;
            image.median(radius)?;
            files::save(&image, &output)
        }
        Command::Convert { input, output } => {
            let image = files::load(&input)?;
            files::save(&image, &output)
        }
        Command::Info { input } => info(&input),
    }
}

fn fuse(inputs: &[PathBuf], times: &[f32], weight: WeightKind, output: &Path) -> Result<()> {
    if inputs.len() != times.len() {
        bail!(
            "{} inputs but {} exposure times",
            inputs.len(),
            times.len()
        );
    }
    let images = inputs
        .iter()
        .map(|path| files::load(path))
        .collect::<Result<Vec<_>>>()?;

    let weight: Box<dyn CameraWeight> = match weight {
        WeightKind::Poly => Box::new(PolynomialWeight::default()),
        WeightKind::Trig => Box::new(TrigWeight),
    };
    let hdr = create_hdr(times, &images, weight.as_ref()).context("Exposure fusion failed")?;
    log::info!(
        "Fused {} exposures, dynamic range {}",
        images.len(),
        hdr.dynamic_range(Channel::All)
    );
    files::save(&hdr, output)
}

fn tonemap(
    input: &Path,
    mode: ToneMode,
    stops: f32,
    bins: usize,
    gamma: f32,
    output: &Path,
) -> Result<()> {
    let mut image = files::load(input)?;
    match mode {
        ToneMode::Linear => image.linear_tone_map(stops),
        ToneMode::Histeq => image.hist_eq_tone_map(bins)?,
        ToneMode::Gamma => {
            image.normalise(1.0);
            image.gamma(gamma)?;
        }
    }
    files::save(&image, output)
}

fn run_render(
    env_path: &Path,
    job: &RenderJob,
    mirror: bool,
    sampler: SamplerKind,
    output: &Path,
) -> Result<()> {
    let env = files::load(env_path)?;
    let sphere = job.sphere();
    if !sphere.fits_within(job.width, job.height) {
        log::warn!(
            "Sphere {:?} does not fit a {}x{} image, nothing will be drawn",
            sphere,
            job.width,
            job.height
        );
    }

    let mut image = HdrImage::with_size(job.width, job.height, 0.0)?;
    let config = &job.render;
    if mirror {
        latlong_to_sphere(&mut image, &sphere, config.view, &env, 0, 0);
    } else {
        match sampler {
            SamplerKind::Haynes => shade(&mut image, &env, job, Haynes::new(config.seed))?,
            SamplerKind::ParkMiller => {
                shade(&mut image, &env, job, ParkMiller::new(config.seed))?
            }
            SamplerKind::Std => shade(
                &mut image,
                &env,
                job,
                RandSampler::<StdRng>::new(config.seed),
            )?,
        }
    }
    files::save(&image, output)
}

fn shade<R: UniformSampler + Clone + Send + Sync>(
    image: &mut HdrImage,
    env: &HdrImage,
    job: &RenderJob,
    mut rng: R,
) -> Result<()> {
    let sphere = job.sphere();
    let config = &job.render;
    if config.biased {
        render_biased(
            image,
            &sphere,
            env,
            config.view,
            config.samples,
            &job.brdf,
            &mut rng,
        )?;
    } else {
        render(
            image,
            &sphere,
            env,
            config.view,
            config.samples,
            &job.brdf,
            &rng,
            config.workers,
        )?;
    }
    Ok(())
}

fn info(input: &Path) -> Result<()> {
    let image = files::load(input)?;
    println!("{}", input.display());
    println!("  size:      {} x {}", image.width(), image.height());
    println!(
        "  storage:   {} blocks per row, stride {}",
        image.blocks_per_row(),
        image.row_stride()
    );
    for (name, channel) in [
        ("red", Channel::Red),
        ("green", Channel::Green),
        ("blue", Channel::Blue),
        ("all", Channel::All),
    ] {
        println!(
            "  {name:<6}     min {:<12} max {:<12} range {}",
            image.min_pixel_value(channel),
            image.max_pixel_value(channel),
            image.dynamic_range(channel)
        );
    }
    println!("  radiance:  {}", image.integrate());
    Ok(())
}
