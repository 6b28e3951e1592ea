//! Backend Selection
//!
//! Inference never needs gradients, so the backend is a plain (non-autodiff)
//! burn backend:
//! - CUDA when built with the `cuda` feature
//! - NdArray (CPU) otherwise
//!
//! Without autodiff, burn's `Dropout` is the identity and `BatchNorm` uses its
//! running statistics, which is exactly evaluation mode.

use burn::tensor::backend::Backend;

#[cfg(feature = "cuda")]
pub type InferenceBackend = burn_cuda::Cuda;

#[cfg(not(feature = "cuda"))]
pub type InferenceBackend = burn_ndarray::NdArray;

/// Get the default device for the inference backend
pub fn default_device() -> <InferenceBackend as Backend>::Device {
    <InferenceBackend as Backend>::Device::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }

    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_available() {
        let _device = default_device();
        assert!(!backend_name().is_empty());
    }

    #[test]
    fn test_backend_has_no_autodiff() {
        assert!(!InferenceBackend::ad_enabled());
    }
}
