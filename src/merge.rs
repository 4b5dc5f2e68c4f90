//! Reassembly: validates the upscaled tile set, infers the scale factor,
//! merges the tiles back into a grid canvas and center-crops the result to
//! the original aspect ratio.

use image::{imageops, GenericImage, RgbImage};
use tracing::debug;

use crate::tile::Tile;
use crate::{Result, TilescaleError};

/// A model output keyed to its grid position.
///
/// `index` — not list position — decides where the tile lands, so results may
/// be collected in any order (e.g. by a parallel dispatcher) without
/// corrupting the layout.
#[derive(Clone, Debug)]
pub struct UpscaledTile {
    pub index: usize,
    pub image: RgbImage,
}

/// Merge `upscaled` back into one image and crop it to
/// `round(W * scale) x round(H * scale)`.
///
/// The scale factor is inferred from the first tile pair (`side / tsize`) and
/// every upscaled tile must be square with that same side. The crop box is
/// centered against the squared scaled size `round(max(W, H) * scale)` —
/// the same geometry the padding offsets came from — and intersected with the
/// merged canvas, so grids whose dimensions do not divide evenly lose at most
/// `cols - 1` / `rows - 1` source pixels at the trailing edge instead of
/// shifting content.
pub fn reassemble(
    tiles: &[Tile],
    upscaled: &[UpscaledTile],
    original_width: u32,
    original_height: u32,
    cols: u32,
    rows: u32,
) -> Result<RgbImage> {
    if upscaled.is_empty() || upscaled.len() != tiles.len() {
        return Err(TilescaleError::TileCountMismatch {
            expected: tiles.len(),
            actual: upscaled.len(),
        });
    }
    let expected = rows as usize * cols as usize;
    if tiles.len() != expected {
        return Err(TilescaleError::TileCountMismatch { expected, actual: tiles.len() });
    }

    let tsize = tiles[0].image.width();
    let side = upscaled[0].image.width();
    for ut in upscaled {
        if ut.image.width() != side || ut.image.height() != side {
            return Err(TilescaleError::NonUniformTileSize {
                index: ut.index,
                expected: side,
                width: ut.image.width(),
                height: ut.image.height(),
            });
        }
    }

    let scale = side as f64 / tsize as f64;
    debug!(tsize, side, scale, "inferred scale factor");

    let mut merged = RgbImage::new(cols * side, rows * side);
    for ut in upscaled {
        let row = ut.index as u32 / cols;
        let col = ut.index as u32 % cols;
        merged.copy_from(&ut.image, col * side, row * side)?;
    }

    let max_dim = original_width.max(original_height);
    let squared_scaled = (max_dim as f64 * scale).round() as i64;
    let target_w = (original_width as f64 * scale).round() as i64;
    let target_h = (original_height as f64 * scale).round() as i64;
    let left = (squared_scaled - target_w) / 2;
    let upper = (squared_scaled - target_h) / 2;
    debug!(
        merged_w = merged.width(),
        merged_h = merged.height(),
        target_w,
        target_h,
        left,
        upper,
        "cropping merged canvas"
    );

    let mut out = RgbImage::new(target_w as u32, target_h as u32);
    let x0 = left.max(0);
    let y0 = upper.max(0);
    let x1 = (left + target_w).min(merged.width() as i64);
    let y1 = (upper + target_h).min(merged.height() as i64);
    if x1 > x0 && y1 > y0 {
        let view = imageops::crop_imm(
            &merged,
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        )
        .to_image();
        out.copy_from(&view, (x0 - left) as u32, (y0 - upper) as u32)?;
    }
    Ok(out)
}
