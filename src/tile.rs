//! Tile splitting: squares the source onto a background-matched canvas and
//! cuts it into a row-major grid of independent tiles.

use std::collections::HashMap;

use image::{imageops, DynamicImage, GenericImage, Rgb, RgbImage, Rgba, RgbaImage};
use tracing::{debug, trace};

use crate::{Result, TilescaleError};

/// One rectangular sub-region of the squared source image.
///
/// `index` is the row-major position (`row * cols + col`) and is what the
/// reassembly step keys on, so a result list may arrive in any order.
#[derive(Clone, Debug)]
pub struct Tile {
    pub index: usize,
    pub row: u32,
    pub col: u32,
    pub image: RgbaImage,
}

impl Tile {
    /// Alpha-dropping copy for model backends that take RGB input.
    pub fn to_rgb(&self) -> RgbImage {
        let mut out = RgbImage::new(self.image.width(), self.image.height());
        for (x, y, px) in self.image.enumerate_pixels() {
            out.put_pixel(x, y, Rgb([px[0], px[1], px[2]]));
        }
        out
    }
}

/// Dominant background color: the most frequent exact RGBA value along the
/// one-pixel border, ties broken by channel value for determinism.
pub fn determine_bg_color(image: &RgbaImage) -> Rgba<u8> {
    let (w, h) = image.dimensions();
    let mut counts: HashMap<[u8; 4], u32> = HashMap::new();
    for x in 0..w {
        *counts.entry(image.get_pixel(x, 0).0).or_insert(0) += 1;
        *counts.entry(image.get_pixel(x, h - 1).0).or_insert(0) += 1;
    }
    for y in 0..h {
        *counts.entry(image.get_pixel(0, y).0).or_insert(0) += 1;
        *counts.entry(image.get_pixel(w - 1, y).0).or_insert(0) += 1;
    }
    let (color, _) = counts
        .into_iter()
        .max_by_key(|&(color, count)| (count, color))
        .expect("image has at least one border pixel");
    Rgba(color)
}

/// Pad a rectangular image to a `max(W,H)` square, background-filled, with
/// the source centered along its shorter axis (floor offset). Squaring an
/// already-square image is a plain copy.
pub fn square(image: &RgbaImage) -> Result<RgbaImage> {
    let (w, h) = image.dimensions();
    if w == h {
        return Ok(image.clone());
    }
    let max_dim = w.max(h);
    let min_dim = w.min(h);
    let bg = determine_bg_color(image);
    debug!(max_dim, bg = ?bg.0, "squaring onto background canvas");

    let mut canvas = RgbaImage::from_pixel(max_dim, max_dim, bg);
    let offset = (max_dim - min_dim) / 2;
    // Wider than tall: center vertically. Taller (or square): center horizontally.
    let (dx, dy) = if w > h { (0, offset) } else { (offset, 0) };
    canvas.copy_from(image, dx, dy)?;
    Ok(canvas)
}

/// Split `image` into `rows * cols` tiles, row outer, col inner.
///
/// With `square_first` the image is padded to a square before the tile size
/// is computed, so `tile_w = floor(max_dim / cols)` and
/// `tile_h = floor(max_dim / rows)`. Dimensions that do not divide evenly
/// lose up to `cols - 1` / `rows - 1` trailing pixels to flooring; that is
/// accepted behavior, not an error.
pub fn tile(image: &DynamicImage, rows: u32, cols: u32, square_first: bool) -> Result<Vec<Tile>> {
    let (width, height) = (image.width(), image.height());
    if rows == 0 || cols == 0 || width == 0 || height == 0 {
        return Err(TilescaleError::InvalidGrid { rows, cols, width, height });
    }

    let canvas = image.to_rgba8();
    let canvas = if square_first { square(&canvas)? } else { canvas };

    let tile_w = canvas.width() / cols;
    let tile_h = canvas.height() / rows;
    if tile_w == 0 || tile_h == 0 {
        return Err(TilescaleError::InvalidGrid { rows, cols, width, height });
    }
    debug!(rows, cols, tile_w, tile_h, "cutting tile grid");

    let mut tiles = Vec::with_capacity(rows as usize * cols as usize);
    for row in 0..rows {
        for col in 0..cols {
            let cut =
                imageops::crop_imm(&canvas, col * tile_w, row * tile_h, tile_w, tile_h).to_image();
            let index = (row * cols + col) as usize;
            trace!(index, row, col, "cut tile");
            tiles.push(Tile { index, row, col, image: cut });
        }
    }
    Ok(tiles)
}
