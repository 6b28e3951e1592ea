//! Inference module: preprocessing and single-image prediction
//!
//! This module provides:
//! - Image loading from files (JPEG/PNG) and from raw capture bytes
//! - The fixed 224x224 ImageNet-normalized preprocessing transform
//! - Arg-max prediction with softmax confidences
//!
//! Inference is read-only over the model: no gradients, no batching and no
//! retries. A malformed input tensor is a surfaced error.

pub mod predictor;
pub mod preprocess;

// Re-export main types for convenience
pub use predictor::{argmax_first, predict, predict_image, softmax, top_k, ClassScore, Prediction};
pub use preprocess::{
    image_to_chw, load_image, load_image_bytes, preprocess, IMAGENET_MEAN,
    IMAGENET_STD, IMAGE_SIZE,
};
