#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imagetruth::{ComputeDevice, ModelState, ScoreError, SimilarityModel};

/// Sees only the dominant colour of an image: descriptions naming that colour
/// score high, everything else low.
#[derive(Debug, Default)]
pub struct ColorModel {
    calls: AtomicUsize,
}

impl ColorModel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn dominant_color(image: &DynamicImage) -> &'static str {
        let rgb = image.to_rgb8();
        let mut sums = [0u64; 3];
        for pixel in rgb.pixels() {
            for c in 0..3 {
                sums[c] += pixel[c] as u64;
            }
        }
        let (idx, _) = sums
            .iter()
            .enumerate()
            .max_by_key(|(_, s)| **s)
            .unwrap();
        ["red", "green", "blue"][idx]
    }
}

impl SimilarityModel for ColorModel {
    fn variant(&self) -> &str {
        "fake-color"
    }

    fn device(&self) -> ComputeDevice {
        ComputeDevice::Cpu
    }

    fn logits_per_image(
        &self,
        image: &DynamicImage,
        descriptions: &[String],
    ) -> Result<Vec<f32>, ScoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let color = Self::dominant_color(image);
        Ok(descriptions
            .iter()
            .map(|d| {
                if d.to_lowercase().contains(color) {
                    28.0
                } else {
                    18.0
                }
            })
            .collect())
    }
}

/// Always fails inside the forward pass.
#[derive(Debug, Default)]
pub struct BrokenModel;

impl SimilarityModel for BrokenModel {
    fn variant(&self) -> &str {
        "fake-broken"
    }

    fn device(&self) -> ComputeDevice {
        ComputeDevice::Cuda(0)
    }

    fn logits_per_image(
        &self,
        _image: &DynamicImage,
        _descriptions: &[String],
    ) -> Result<Vec<f32>, ScoreError> {
        Err(ScoreError::Inference("CUDA out of memory".to_string()))
    }
}

pub fn ready(model: Arc<dyn SimilarityModel>) -> Arc<ModelState> {
    Arc::new(ModelState::ready(model))
}

pub fn solid_image(color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 12, Rgb(color)))
}

pub fn png_bytes(color: [u8; 3]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    solid_image(color)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// PNG of pseudo-random pixels, which barely compresses. Mostly red.
pub fn noisy_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut seed: u32 = 0x9e37_79b9;
    let img = RgbImage::from_fn(width, height, |_, _| {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let [a, b, c, _] = seed.to_le_bytes();
        Rgb([a | 0x80, b & 0x7f, c & 0x7f])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn descriptions(a: &str, b: &str, c: &str) -> [String; 3] {
    [a.to_string(), b.to_string(), c.to_string()]
}
