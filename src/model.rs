//! The upscaling model seam: request/option types and the backend trait.

use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbImage;
use serde::Serialize;

use crate::Result;

/// One generative super-resolution backend.
///
/// A backend receives an RGB tile and returns the upscaled RGB tile. Outputs
/// must be square, with one uniform side length across every call of a run,
/// scaled from the input by a backend-determined factor (e.g. 4x). The same
/// resolved seed is handed to every call of a run so tiles stay spatially
/// coherent.
pub trait UpscaleModel {
    fn generate(&mut self, tile: &RgbImage, request: &GenerationRequest) -> Result<RgbImage>;
}

/// Per-run generation parameters, resolved before the first tile is submitted.
#[derive(Clone, Debug, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    /// Already resolved: a [`Seed::Random`] draw happens once per run.
    pub seed: u64,
    /// `None` leaves the backend's default guidance in place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f32>,
    /// `None` leaves the backend's default step count in place.
    #[serde(rename = "num_inference_steps", skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
}

/// Runtime configuration handed opaquely to the backend.
///
/// The memory toggles are requests, not guarantees: a backend that cannot
/// honor one falls back to its default behavior and logs a warning.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ModelOptions {
    pub xformers: bool,
    pub cpu_offload: bool,
    pub attention_slicing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            xformers: true,
            cpu_offload: true,
            attention_slicing: true,
            guidance_scale: None,
            steps: None,
        }
    }
}

/// Seed selection. The wire sentinel `-1` maps to [`Seed::Random`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Seed {
    /// Draw a fresh seed once per run, shared across all tiles of that run.
    Random,
    Fixed(u64),
}

impl Seed {
    /// Interpret the caller-facing integer: negative means "pick one for me".
    pub fn from_sentinel(raw: i64) -> Self {
        if raw < 0 {
            Seed::Random
        } else {
            Seed::Fixed(raw as u64)
        }
    }

    /// Resolve to a concrete seed. Random draws land in `0..10_000_000`.
    pub fn resolve(self) -> u64 {
        match self {
            Seed::Fixed(seed) => seed,
            Seed::Random => {
                let nanos = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.subsec_nanos() as u64 ^ d.as_secs())
                    .unwrap_or(0);
                nanos % 10_000_000
            }
        }
    }
}

/// A requested runtime option the backend cannot provide.
///
/// Recoverable by definition: the backend catches this, logs a warning, and
/// continues with its default behavior. It never aborts a run.
#[derive(Debug)]
pub struct OptionUnavailable {
    pub option: &'static str,
    pub reason: String,
}

impl std::fmt::Display for OptionUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} unavailable: {}", self.option, self.reason)
    }
}
