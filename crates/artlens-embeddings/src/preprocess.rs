//! Image preprocessing shared by ingestion and query.
//!
//! Resize the short side to 256, center-crop 224x224, scale to [0, 1] and
//! normalize with the ImageNet channel statistics. Output is CHW.
//!
//! Images more elongated than [`MAX_ASPECT_RATIO`] are first cropped to
//! their central span along the long axis, which keeps the resize bounded
//! without changing the pixels that reach the center crop.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};

/// Short side after the first resize
pub const RESIZE_SHORT_SIDE: u32 = 256;

/// Square side fed to the network
pub const CROP_SIZE: u32 = 224;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Longest-to-shortest side ratio kept before resizing.
///
/// The resized long side is then at most `4 * RESIZE_SHORT_SIDE`.
pub const MAX_ASPECT_RATIO: u32 = 4;

/// Crop the long axis to at most `MAX_ASPECT_RATIO` times the short side,
/// centered.
fn limit_aspect(rgb: RgbImage) -> RgbImage {
    let (w, h) = rgb.dimensions();
    let max_long = w.min(h).max(1).saturating_mul(MAX_ASPECT_RATIO);

    if w > max_long {
        imageops::crop_imm(&rgb, (w - max_long) / 2, 0, max_long, h).to_image()
    } else if h > max_long {
        imageops::crop_imm(&rgb, 0, (h - max_long) / 2, w, max_long).to_image()
    } else {
        rgb
    }
}

/// Preprocess one image into a flat CHW buffer of `3 * CROP_SIZE * CROP_SIZE` floats.
pub fn preprocess(image: &DynamicImage) -> Vec<f32> {
    let rgb = limit_aspect(image.to_rgb8());
    let (w, h) = rgb.dimensions();

    let scale = RESIZE_SHORT_SIDE as f32 / w.min(h).max(1) as f32;
    let new_w = ((w as f32) * scale).round().max(RESIZE_SHORT_SIDE as f32) as u32;
    let new_h = ((h as f32) * scale).round().max(RESIZE_SHORT_SIDE as f32) as u32;
    let resized = imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);

    let start_x = (new_w - CROP_SIZE) / 2;
    let start_y = (new_h - CROP_SIZE) / 2;

    let size = CROP_SIZE as usize;
    let plane = size * size;
    let mut data = vec![0.0f32; 3 * plane];

    for y in 0..size {
        for x in 0..size {
            let px = resized.get_pixel(start_x + x as u32, start_y + y as u32);
            let idx = y * size + x;
            for c in 0..3 {
                data[c * plane + idx] = (px[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(w: u32, h: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(color)))
    }

    #[test]
    fn test_output_shape() {
        let data = preprocess(&solid(640, 480, [10, 20, 30]));
        assert_eq!(data.len(), 3 * 224 * 224);
    }

    #[test]
    fn test_small_image_is_upscaled() {
        let data = preprocess(&solid(32, 16, [0, 0, 0]));
        assert_eq!(data.len(), 3 * 224 * 224);
    }

    #[test]
    fn test_solid_color_normalization() {
        let data = preprocess(&solid(300, 300, [255, 0, 128]));
        let plane = 224 * 224;

        let r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let g = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        let b = (128.0 / 255.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];

        assert!((data[0] - r).abs() < 1e-4);
        assert!((data[plane] - g).abs() < 1e-4);
        assert!((data[2 * plane + 1000] - b).abs() < 1e-4);
    }

    #[test]
    fn test_center_crop_discards_edges() {
        // Left and right thirds red, middle green: after resizing to 768x256
        // the central 224 columns are entirely green.
        let mut img = RgbImage::from_pixel(900, 300, Rgb([255, 0, 0]));
        for y in 0..300 {
            for x in 300..600 {
                img.put_pixel(x, y, Rgb([0, 255, 0]));
            }
        }
        let data = preprocess(&DynamicImage::ImageRgb8(img));
        let plane = 224 * 224;
        let green = (1.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((data[plane] - green).abs() < 1e-4);
        assert!((data[plane + 223] - green).abs() < 1e-4);
    }

    #[test]
    fn test_extreme_aspect_ratio_is_bounded() {
        let data = preprocess(&solid(1, 60_000, [50, 60, 70]));
        assert_eq!(data.len(), 3 * 224 * 224);

        let data = preprocess(&solid(60_000, 1, [50, 60, 70]));
        assert_eq!(data.len(), 3 * 224 * 224);
    }

    #[test]
    fn test_limit_aspect_keeps_center() {
        let tall = RgbImage::from_pixel(10, 2000, Rgb([1, 2, 3]));
        assert_eq!(limit_aspect(tall).dimensions(), (10, 40));

        let wide = RgbImage::from_pixel(2000, 10, Rgb([1, 2, 3]));
        assert_eq!(limit_aspect(wide).dimensions(), (40, 10));

        let normal = RgbImage::from_pixel(300, 500, Rgb([1, 2, 3]));
        assert_eq!(limit_aspect(normal).dimensions(), (300, 500));
    }

    #[test]
    fn test_elongated_image_keeps_center_content() {
        // Red top and bottom, green band through the middle wide enough to
        // cover the span that survives the crop.
        let mut img = RgbImage::from_pixel(10, 2000, Rgb([255, 0, 0]));
        for y in 900..1100 {
            for x in 0..10 {
                img.put_pixel(x, y, Rgb([0, 255, 0]));
            }
        }
        let data = preprocess(&DynamicImage::ImageRgb8(img));
        let plane = 224 * 224;
        let green = (1.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        let no_red = (0.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!(data[plane..2 * plane].iter().all(|v| (v - green).abs() < 1e-4));
        assert!(data[..plane].iter().all(|v| (v - no_red).abs() < 1e-4));
    }

    #[test]
    fn test_deterministic() {
        let mut img = RgbImage::new(333, 517);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8]);
        }
        let img = DynamicImage::ImageRgb8(img);

        let a = preprocess(&img);
        let b = preprocess(&img);
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
    }
}
