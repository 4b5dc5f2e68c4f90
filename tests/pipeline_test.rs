//! End-to-end pipeline scenarios with a deterministic mock backend.

use std::cell::RefCell;
use std::rc::Rc;

use image::{DynamicImage, Rgb, RgbImage};
use tilescale::{GenerationRequest, Seed, UpscaleModel, Upscaler};

/// Pixel-replicating stand-in for a generative x-factor upscaler.
struct MockModel {
    factor: u32,
}

impl UpscaleModel for MockModel {
    fn generate(&mut self, tile: &RgbImage, _request: &GenerationRequest) -> tilescale::Result<RgbImage> {
        let (w, h) = tile.dimensions();
        let mut out = RgbImage::new(w * self.factor, h * self.factor);
        for (x, y, px) in out.enumerate_pixels_mut() {
            *px = *tile.get_pixel(x / self.factor, y / self.factor);
        }
        Ok(out)
    }
}

/// Records the seed and tile size of every call, for contract assertions.
struct RecordingModel {
    inner: MockModel,
    calls: Rc<RefCell<Vec<(u64, u32)>>>,
}

impl UpscaleModel for RecordingModel {
    fn generate(&mut self, tile: &RgbImage, request: &GenerationRequest) -> tilescale::Result<RgbImage> {
        self.calls.borrow_mut().push((request.seed, tile.width()));
        self.inner.generate(tile, request)
    }
}

fn solid(w: u32, h: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(color)))
}

#[test]
fn square_input_grid_two_times_four() {
    // 512x512, 2x2 grid -> four 256px tiles; 4x model -> merged 2048x2048,
    // already square, so no crop applies.
    let image = solid(512, 512, [40, 80, 120]);
    let out = Upscaler::new(MockModel { factor: 4 })
        .with_grid(2, 2)
        .upscale(&image)
        .unwrap();
    assert_eq!(out.dimensions(), (2048, 2048));
    assert_eq!(out.get_pixel(0, 0).0, [40, 80, 120]);
    assert_eq!(out.get_pixel(2047, 2047).0, [40, 80, 120]);
}

#[test]
fn portrait_input_is_squared_then_cropped_back() {
    // 512x768 squares to 768x768 (horizontal offset 128), 2x2 grid of 384px
    // tiles, 4x model -> merged 3072x3072, final crop 2048x3072.
    let image = solid(512, 768, [200, 10, 10]);
    let out = Upscaler::new(MockModel { factor: 4 })
        .with_grid(2, 2)
        .upscale(&image)
        .unwrap();
    assert_eq!(out.dimensions(), (2048, 3072));
    // padding matched the border color, so no seam is distinguishable
    assert_eq!(out.get_pixel(0, 0).0, [200, 10, 10]);
    assert_eq!(out.get_pixel(2047, 3071).0, [200, 10, 10]);
}

#[test]
fn identity_model_round_trips_a_square_image() {
    let mut pattern = RgbImage::new(64, 64);
    for (x, y, px) in pattern.enumerate_pixels_mut() {
        *px = Rgb([x as u8, y as u8, (x ^ y) as u8]);
    }
    let image = DynamicImage::ImageRgb8(pattern.clone());
    let out = Upscaler::new(MockModel { factor: 1 })
        .with_grid(1, 1)
        .upscale(&image)
        .unwrap();
    assert_eq!(out, pattern);
}

#[test]
fn aspect_ratio_survives_odd_dimensions() {
    // 301 does not divide by 2: tiles floor to 150, the merged canvas ends up
    // 900 wide against a squared scaled size of 903.
    let image = solid(301, 200, [5, 5, 5]);
    let out = Upscaler::new(MockModel { factor: 3 })
        .with_grid(2, 2)
        .upscale(&image)
        .unwrap();
    assert_eq!(out.dimensions(), (903, 600));
    let ratio = out.width() as f64 / out.height() as f64;
    assert!((ratio - 301.0 / 200.0).abs() < 1.0 / 200.0);
}

#[test]
fn uneven_grid_still_yields_the_exact_target_size() {
    let image = solid(310, 310, [9, 9, 9]);
    let out = Upscaler::new(MockModel { factor: 4 })
        .with_grid(3, 3)
        .upscale(&image)
        .unwrap();
    assert_eq!(out.dimensions(), (1240, 1240));
}

#[test]
fn one_resolved_seed_is_shared_across_all_tiles() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let model = RecordingModel { inner: MockModel { factor: 2 }, calls: calls.clone() };
    Upscaler::new(model)
        .with_grid(2, 2)
        .with_seed(Seed::Random)
        .upscale(&solid(128, 128, [0, 0, 0]))
        .unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 4);
    let first_seed = calls[0].0;
    assert!(calls.iter().all(|&(seed, tsize)| seed == first_seed && tsize == 64));
}

#[test]
fn fixed_seed_reaches_the_model_unchanged() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let model = RecordingModel { inner: MockModel { factor: 2 }, calls: calls.clone() };
    Upscaler::new(model)
        .with_grid(2, 2)
        .with_seed(Seed::Fixed(1234))
        .upscale(&solid(64, 64, [0, 0, 0]))
        .unwrap();
    assert!(calls.borrow().iter().all(|&(seed, _)| seed == 1234));
}
