use image::{imageops::FilterType, DynamicImage};
use ndarray::Array3;

/// Input resolution of the ViT-B/32 vision tower.
pub const CLIP_IMAGE_SIZE: u32 = 224;

/// Per-channel mean of the CLIP training set (RGB).
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

/// Per-channel standard deviation of the CLIP training set (RGB).
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Preprocess an image into the `[3, size, size]` CHW layout CLIP expects.
///
/// The shorter side is scaled to `size` with a bicubic filter and the result is
/// center-cropped, then each channel is scaled to `[0, 1]` and normalized with
/// [`CLIP_MEAN`] and [`CLIP_STD`].
pub fn clip_input(img: &DynamicImage, size: u32) -> Array3<f32> {
    let rgb = img
        .resize_to_fill(size, size, FilterType::CatmullRom)
        .to_rgb8();
    let side = size as usize;

    Array3::from_shape_fn((3, side, side), |(c, y, x)| {
        let pixel = rgb.get_pixel(x as u32, y as u32);
        (pixel[c] as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c]
    })
}
