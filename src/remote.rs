//! HTTP backend for a diffusion upscaling server.

use std::io::Cursor;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbImage};
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::model::{GenerationRequest, ModelOptions, UpscaleModel};
use crate::{Result, TilescaleError};

/// Timeout per tile; diffusion sampling can take minutes on CPU hosts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Submits tiles to a diffusion upscaling server over HTTP.
///
/// Each tile goes out as a base64 PNG together with the generation request
/// and the runtime option toggles; the server answers with a base64 image.
/// Option toggles the server could not honor come back in a `warnings` array
/// and are logged, never fatal.
pub struct RemoteModel {
    client: Client,
    endpoint: String,
    options: ModelOptions,
}

impl RemoteModel {
    pub fn new(endpoint: impl Into<String>, options: ModelOptions) -> Self {
        Self { client: Client::new(), endpoint: endpoint.into(), options }
    }
}

impl UpscaleModel for RemoteModel {
    fn generate(&mut self, tile: &RgbImage, request: &GenerationRequest) -> Result<RgbImage> {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(tile.clone())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let body = serde_json::json!({
            "image": STANDARD.encode(&png),
            "request": request,
            "options": self.options,
        });

        debug!(endpoint = %self.endpoint, seed = request.seed, "posting tile");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .map_err(|e| TilescaleError::Model(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TilescaleError::Model(format!(
                "server returned {}: {}",
                response.status(),
                response.text().unwrap_or_default()
            )));
        }

        let reply: serde_json::Value = response
            .json()
            .map_err(|e| TilescaleError::Model(e.to_string()))?;
        if let Some(warnings) = reply["warnings"].as_array() {
            for warning in warnings {
                warn!(%warning, "server degraded a requested option");
            }
        }

        let encoded = reply["image"]
            .as_str()
            .ok_or_else(|| TilescaleError::Model("response is missing the image field".into()))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| TilescaleError::Model(e.to_string()))?;
        Ok(image::load_from_memory(&bytes)?.to_rgb8())
    }
}
