//! tilescale CLI - upscale an image tile-by-tile through a generative model

use clap::Parser;
use image::{DynamicImage, RgbImage};
use std::path::PathBuf;
use tilescale::{
    ModelOptions, OnnxModel, RemoteModel, Seed, TilescaleError, UpscaleModel, Upscaler,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tilescale", about = "Upscale images tile-by-tile through a generative model")]
struct Args {
    /// Input image file
    input: PathBuf,
    /// Output image file (defaults to `<input>_up.png`)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Tile grid dimension: the image is split into grid x grid tiles
    #[arg(short, long, default_value = "1")]
    grid: u32,
    /// Generation prompt
    #[arg(short, long, default_value = "")]
    prompt: String,
    /// Negative prompt
    #[arg(short = 'n', long, default_value = "")]
    negative_prompt: String,
    /// Generation seed; -1 draws a random seed shared by all tiles of the run
    #[arg(short, long, default_value = "-1", allow_hyphen_values = true)]
    seed: i64,
    /// Path to a local ONNX super-resolution model
    #[arg(short, long, conflicts_with = "endpoint")]
    model: Option<PathBuf>,
    /// URL of a diffusion upscaling server
    #[arg(short, long)]
    endpoint: Option<String>,
    /// Run the ONNX model on CUDA when available
    #[arg(long)]
    cuda: bool,
    /// Guidance scale override (backend default when omitted)
    #[arg(long)]
    guidance: Option<f32>,
    /// Inference step override (backend default when omitted)
    #[arg(long)]
    steps: Option<u32>,
    /// Disable xformers memory efficient attention
    #[arg(long)]
    no_xformers: bool,
    /// Disable sequential CPU offload
    #[arg(long)]
    no_cpu_offload: bool,
    /// Disable attention slicing
    #[arg(long)]
    no_attention_slicing: bool,
    /// Only log warnings
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), TilescaleError> {
    let args = Args::parse();

    let level = if args.quiet {
        "warn"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let options = ModelOptions {
        xformers: !args.no_xformers,
        cpu_offload: !args.no_cpu_offload,
        attention_slicing: !args.no_attention_slicing,
        guidance_scale: args.guidance,
        steps: args.steps,
    };

    let image = image::open(&args.input)?;
    let output_path = args.output.clone().unwrap_or_else(|| {
        let stem = args.input.file_stem().unwrap_or_default().to_string_lossy();
        args.input.with_file_name(format!("{stem}_up.png"))
    });

    let upscaled = if let Some(model_path) = &args.model {
        run(OnnxModel::load(model_path, args.cuda, &options)?, &args, options, &image)?
    } else if let Some(endpoint) = &args.endpoint {
        run(RemoteModel::new(endpoint.clone(), options), &args, options, &image)?
    } else {
        return Err(TilescaleError::Model(
            "no backend selected: pass --model or --endpoint".into(),
        ));
    };

    upscaled.save(&output_path)?;
    println!("{}", output_path.display());
    Ok(())
}

fn run<M: UpscaleModel>(
    model: M,
    args: &Args,
    options: ModelOptions,
    image: &DynamicImage,
) -> Result<RgbImage, TilescaleError> {
    Upscaler::new(model)
        .with_grid(args.grid, args.grid)
        .with_prompt(args.prompt.clone())
        .with_negative_prompt(args.negative_prompt.clone())
        .with_seed(Seed::from_sentinel(args.seed))
        .with_options(options)
        .upscale(image)
}
