//! Error Handling Module
//!
//! Defines the error type shared by the registry, model builder, preprocessing
//! and inference stages. Uses thiserror for ergonomic error definitions.
//!
//! Advice-service failures are not represented here: they are recoverable and
//! are downgraded to an [`crate::advice::AdviceOutcome`] instead.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for cropdoc operations
#[derive(Error, Debug)]
pub enum CropDocError {
    /// The requested crop has no registry entry
    #[error("Unknown crop '{0}'")]
    UnknownCrop(String),

    /// A head-architecture tag that does not name a known head
    #[error("Unknown head type '{0}'")]
    UnknownHeadType(String),

    /// The weights file for a crop does not exist
    #[error("Weights file not found: {0}")]
    WeightsNotFound(PathBuf),

    /// The weights file extension has no matching recorder
    #[error("Unsupported weights format: {0}")]
    UnsupportedWeightsFormat(PathBuf),

    /// The weights file exists but could not be decoded
    #[error("Failed to load weights from '{path}': {reason}")]
    WeightLoad { path: PathBuf, reason: String },

    /// Serialized parameters do not match the constructed network
    #[error("Weight shape mismatch for crop '{crop}': {detail}")]
    WeightShapeMismatch { crop: String, detail: String },

    /// Error loading or processing an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoadError(PathBuf, String),

    /// Image bytes or extension outside the accepted JPEG/PNG set
    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error with inference
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Where an error sits in the failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unknown crop, unknown head, missing or mismatched weights. Fatal to
    /// that crop's usability, never retried.
    Configuration,
    /// Unreadable or unsupported image, malformed tensor.
    Input,
    /// Failures of the remote advice service. These surface as
    /// `AdviceError` and are downgraded to an unavailable outcome, so no
    /// `CropDocError` variant carries them.
    ExternalService,
    /// Everything else.
    Internal,
}

impl CropDocError {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            CropDocError::UnknownCrop(_)
            | CropDocError::UnknownHeadType(_)
            | CropDocError::WeightsNotFound(_)
            | CropDocError::UnsupportedWeightsFormat(_)
            | CropDocError::WeightLoad { .. }
            | CropDocError::WeightShapeMismatch { .. }
            | CropDocError::Config(_) => ErrorCategory::Configuration,
            CropDocError::ImageLoadError(..)
            | CropDocError::UnsupportedImageFormat(_)
            | CropDocError::InvalidInput(_) => ErrorCategory::Input,
            CropDocError::Inference(_)
            | CropDocError::Io(_)
            | CropDocError::Serialization(_) => ErrorCategory::Internal,
        }
    }

    /// True for errors that make a crop unusable until its configuration is fixed
    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

impl From<serde_json::Error> for CropDocError {
    fn from(err: serde_json::Error) -> Self {
        CropDocError::Serialization(err.to_string())
    }
}

/// Convenience Result type for cropdoc operations
pub type Result<T> = std::result::Result<T, CropDocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CropDocError::UnknownCrop("Banana".to_string());
        assert_eq!(format!("{}", err), "Unknown crop 'Banana'");
    }

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("/path/to/leaf.jpg");
        let err = CropDocError::ImageLoadError(path, "file not found".to_string());
        assert!(format!("{}", err).contains("leaf.jpg"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            CropDocError::UnknownCrop("x".into()).category(),
            ErrorCategory::Configuration
        );
        assert!(CropDocError::WeightShapeMismatch {
            crop: "Rice".into(),
            detail: "head.output.weight".into(),
        }
        .is_configuration_error());
        assert_eq!(
            CropDocError::UnsupportedImageFormat("gif".into()).category(),
            ErrorCategory::Input
        );
        assert!(!CropDocError::InvalidInput("shape".into()).is_configuration_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: CropDocError = parse.unwrap_err().into();
        assert!(matches!(err, CropDocError::Serialization(_)));
    }
}
