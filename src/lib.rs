//! Tiled image upscaling through generative super-resolution models.
//!
//! The pipeline squares the source image onto a background-matched canvas,
//! cuts it into a grid of tiles, runs every tile through an [`UpscaleModel`],
//! and reassembles the upscaled tiles into one image with the original
//! aspect ratio.

pub mod merge;
pub mod model;
pub mod onnx;
pub mod remote;
pub mod tile;

pub use merge::{reassemble, UpscaledTile};
pub use model::{GenerationRequest, ModelOptions, Seed, UpscaleModel};
pub use onnx::OnnxModel;
pub use remote::RemoteModel;
pub use tile::{tile, Tile};

use image::{DynamicImage, RgbImage};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum TilescaleError {
    #[error("Invalid grid: {rows}x{cols} tiles over a {width}x{height} image")]
    InvalidGrid { rows: u32, cols: u32, width: u32, height: u32 },
    #[error("Tile count mismatch: expected {expected} upscaled tiles, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("Non-uniform upscaled tile {index}: {width}x{height}, expected {expected}x{expected}")]
    NonUniformTileSize { index: usize, expected: u32, width: u32, height: u32 },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Model error: {0}")]
    Model(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TilescaleError>;

/// Main pipeline: tile the source, upscale every tile, reassemble.
pub struct Upscaler<M> {
    model: M,
    rows: u32,
    cols: u32,
    prompt: String,
    negative_prompt: String,
    seed: Seed,
    options: ModelOptions,
}

impl<M: UpscaleModel> Upscaler<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            rows: 1,
            cols: 1,
            prompt: String::new(),
            negative_prompt: String::new(),
            seed: Seed::Random,
            options: ModelOptions::default(),
        }
    }

    pub fn with_grid(mut self, rows: u32, cols: u32) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the full pipeline on `image`.
    ///
    /// Tiles are submitted in row-major order and every tile of the run
    /// shares one resolved seed, so the generator state stays coherent
    /// across the grid. Any tile failure aborts the run before a merge
    /// happens.
    pub fn upscale(&mut self, image: &DynamicImage) -> Result<RgbImage> {
        let (width, height) = (image.width(), image.height());
        let tiles = tile::tile(image, self.rows, self.cols, true)?;

        let request = GenerationRequest {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            seed: self.seed.resolve(),
            guidance_scale: self.options.guidance_scale,
            steps: self.options.steps,
        };
        info!(
            width,
            height,
            rows = self.rows,
            cols = self.cols,
            seed = request.seed,
            "upscaling"
        );

        let mut upscaled = Vec::with_capacity(tiles.len());
        for t in &tiles {
            debug!(index = t.index, "submitting tile to model");
            let image = self.model.generate(&t.to_rgb(), &request)?;
            upscaled.push(UpscaledTile { index: t.index, image });
        }

        merge::reassemble(&tiles, &upscaled, width, height, self.cols, self.rows)
    }
}
