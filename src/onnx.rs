//! Local super-resolution backend using ONNX Runtime.

use std::path::Path;

use image::{Rgb, RgbImage};
use ndarray::ArrayView4;
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::{debug, warn};

use crate::model::{GenerationRequest, ModelOptions, OptionUnavailable, UpscaleModel};
use crate::{Result, TilescaleError};

/// Runs a single-image super-resolution network (e.g. a Real-ESRGAN x4
/// export) through an `ort::Session`. Input is NCHW float RGB in `[0, 1]`,
/// output NCHW at a model-determined integer scale.
///
/// Diffusion-side requests — prompt conditioning, xformers, CPU offload,
/// attention slicing — have no ONNX Runtime counterpart; asking for them
/// degrades to default behavior with a warning rather than failing the run.
pub struct OnnxModel {
    session: Session,
    prompt_warned: bool,
}

impl OnnxModel {
    pub fn load(model_path: impl AsRef<Path>, cuda: bool, options: &ModelOptions) -> Result<Self> {
        let mut builder = Session::builder()
            .map_err(|e| TilescaleError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| TilescaleError::Model(e.to_string()))?;

        if cuda {
            match probe_cuda() {
                Ok(()) => {
                    builder = builder
                        .with_execution_providers([CUDAExecutionProvider::default().build()])
                        .map_err(|e| TilescaleError::Model(e.to_string()))?;
                }
                Err(unavailable) => warn!("{unavailable}; falling back to CPU"),
            }
        }
        for unavailable in unsupported_toggles(options) {
            warn!("{unavailable}; using default behavior");
        }

        let session = builder
            .commit_from_file(model_path.as_ref())
            .map_err(|e| TilescaleError::Model(e.to_string()))?;
        debug!(model = %model_path.as_ref().display(), "ONNX session ready");
        Ok(Self { session, prompt_warned: false })
    }
}

fn probe_cuda() -> std::result::Result<(), OptionUnavailable> {
    let cuda = CUDAExecutionProvider::default();
    if cuda.is_available().unwrap_or(false) {
        Ok(())
    } else {
        Err(OptionUnavailable {
            option: "CUDA execution provider",
            reason: "runtime not present".into(),
        })
    }
}

fn unsupported_toggles(options: &ModelOptions) -> Vec<OptionUnavailable> {
    let mut out = Vec::new();
    let not_ort = |option| OptionUnavailable {
        option,
        reason: "not an ONNX Runtime feature".into(),
    };
    if options.xformers {
        out.push(not_ort("xformers memory efficient attention"));
    }
    if options.cpu_offload {
        out.push(not_ort("sequential CPU offload"));
    }
    if options.attention_slicing {
        out.push(not_ort("attention slicing"));
    }
    out
}

impl UpscaleModel for OnnxModel {
    fn generate(&mut self, tile: &RgbImage, request: &GenerationRequest) -> Result<RgbImage> {
        if !self.prompt_warned
            && !(request.prompt.is_empty() && request.negative_prompt.is_empty())
        {
            warn!("prompt conditioning unavailable: the ONNX backend ignores prompts");
            self.prompt_warned = true;
        }

        let (w, h) = tile.dimensions();
        let mut planes = Vec::with_capacity(3 * (w * h) as usize);
        for c in 0..3usize {
            for y in 0..h {
                for x in 0..w {
                    planes.push(tile.get_pixel(x, y)[c] as f32 / 255.0);
                }
            }
        }

        let input = Tensor::from_array(([1usize, 3, h as usize, w as usize], planes))
            .map_err(|e| TilescaleError::Model(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| TilescaleError::Model(e.to_string()))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| TilescaleError::Model(e.to_string()))?;

        if shape.len() != 4 || shape[1] != 3 {
            return Err(TilescaleError::Model(format!(
                "unexpected output shape {shape:?}"
            )));
        }
        let (oh, ow) = (shape[2] as usize, shape[3] as usize);
        let view = ArrayView4::from_shape((1, 3, oh, ow), data)
            .map_err(|e| TilescaleError::Model(e.to_string()))?;

        let mut out = RgbImage::new(ow as u32, oh as u32);
        for y in 0..oh {
            for x in 0..ow {
                out.put_pixel(
                    x as u32,
                    y as u32,
                    Rgb([
                        (view[[0, 0, y, x]].clamp(0.0, 1.0) * 255.0) as u8,
                        (view[[0, 1, y, x]].clamp(0.0, 1.0) * 255.0) as u8,
                        (view[[0, 2, y, x]].clamp(0.0, 1.0) * 255.0) as u8,
                    ]),
                );
            }
        }
        debug!(in_side = w, out_side = ow, "tile upscaled");
        Ok(out)
    }
}
