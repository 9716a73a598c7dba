// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for YOLO-style detectors

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Padding colour used by YOLO letterboxing
pub const LETTERBOX_FILL: u8 = 114;

/// Geometry needed to map model-space boxes back to the source image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Source-to-model scale factor
    pub scale: f32,
    /// Horizontal padding (model pixels) on the left
    pub pad_x: f32,
    /// Vertical padding (model pixels) on the top
    pub pad_y: f32,
    /// Source image dimensions
    pub orig_width: u32,
    pub orig_height: u32,
}

impl Letterbox {
    /// Map a model-space x coordinate back to source pixels
    pub fn unmap_x(&self, x: f32) -> f32 {
        ((x - self.pad_x) / self.scale).clamp(0.0, self.orig_width as f32)
    }

    /// Map a model-space y coordinate back to source pixels
    pub fn unmap_y(&self, y: f32) -> f32 {
        ((y - self.pad_y) / self.scale).clamp(0.0, self.orig_height as f32)
    }
}

/// Resize with aspect ratio preservation and centre padding
///
/// Returns the padded square image and the letterbox geometry.
/// Callers must reject zero-size images beforehand.
pub fn letterbox(image: &DynamicImage, target_size: u32) -> (RgbImage, Letterbox) {
    let (orig_w, orig_h) = image.dimensions();

    let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);

    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

    let resized = image
        .resize_exact(new_w, new_h, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let mut output = RgbImage::from_pixel(
        target_size,
        target_size,
        Rgb([LETTERBOX_FILL, LETTERBOX_FILL, LETTERBOX_FILL]),
    );

    let offset_x = (target_size - new_w) / 2;
    let offset_y = (target_size - new_h) / 2;
    image::imageops::replace(&mut output, &resized, offset_x as i64, offset_y as i64);

    (
        output,
        Letterbox {
            scale,
            pad_x: offset_x as f32,
            pad_y: offset_y as f32,
            orig_width: orig_w,
            orig_height: orig_h,
        },
    )
}

/// Preprocess an image for detection
///
/// Steps:
/// 1. Letterbox to `target_size` x `target_size`
/// 2. Convert to RGB
/// 3. Scale pixels to [0, 1]
/// 4. Convert to NCHW tensor format [1, 3, H, W]
pub fn preprocess_for_detection(image: &DynamicImage, target_size: u32) -> (Array4<f32>, Letterbox) {
    let (rgb, geometry) = letterbox(image, target_size);
    let size = target_size as usize;

    let mut tensor = Array4::zeros((1, 3, size, size));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, geometry)
}
