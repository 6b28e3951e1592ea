//! Preprocessing Pipeline
//!
//! The same transform is applied for every crop:
//! RGB conversion -> 224x224 triangle-filter resize -> [0, 1] -> ImageNet
//! normalization -> `[1, 3, 224, 224]` CHW tensor.

use std::path::{Path, PathBuf};

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat};

use crate::utils::error::{CropDocError, Result};

/// Model input side length
pub const IMAGE_SIZE: usize = 224;

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Accepted file extensions (lowercase)
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Load a JPEG or PNG image from disk
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CropDocError::UnsupportedImageFormat(if ext.is_empty() {
            format!("{:?} has no extension", path)
        } else {
            ext
        }));
    }

    image::open(path).map_err(|e| CropDocError::ImageLoadError(path.to_path_buf(), e.to_string()))
}

/// Decode an in-memory JPEG or PNG image (camera captures, uploads)
pub fn load_image_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    let format = image::guess_format(bytes)
        .map_err(|_| CropDocError::UnsupportedImageFormat("unrecognized image data".to_string()))?;

    match format {
        ImageFormat::Jpeg | ImageFormat::Png => image::load_from_memory_with_format(bytes, format)
            .map_err(|e| CropDocError::ImageLoadError(PathBuf::from("<memory>"), e.to_string())),
        other => Err(CropDocError::UnsupportedImageFormat(format!("{:?}", other))),
    }
}

/// Normalized CHW pixel data for `image`, length `3 * 224 * 224`
///
/// Alpha is discarded and grayscale is expanded to three channels before
/// resizing.
pub fn image_to_chw(image: &DynamicImage) -> Vec<f32> {
    let rgb = imageops::resize(
        &image.to_rgb8(),
        IMAGE_SIZE as u32,
        IMAGE_SIZE as u32,
        FilterType::Triangle,
    );
    let num_pixels = IMAGE_SIZE * IMAGE_SIZE;

    let mut chw = vec![0.0f32; 3 * num_pixels];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            chw[c * num_pixels + i] =
                (pixel[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    chw
}

/// Single-image batch `[1, 3, 224, 224]` on `device`
pub fn preprocess<B: Backend>(image: &DynamicImage, device: &B::Device) -> Tensor<B, 4> {
    let data = TensorData::new(image_to_chw(image), [1, 3, IMAGE_SIZE, IMAGE_SIZE]);
    Tensor::from_data(data, device)
}
