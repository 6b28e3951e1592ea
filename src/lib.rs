//! # CropDoc
//!
//! Crop leaf disease classification with the Burn framework.
//!
//! ## Features
//!
//! - **Per-crop models**: a shared ResNet backbone with a crop-specific classifier head
//! - **Weight verification**: every weights file is checked against the network built for its crop
//! - **Static remedies** for every predicted disease, plain text or structured records
//! - **AI advice** from an OpenAI-compatible chat service, optional and never fatal
//!
//! ## Modules
//!
//! - `registry`: The crop table (weights file, labels, head type per crop)
//! - `model`: ResNet backbone, classifier heads, weight loading and the model cache
//! - `inference`: Image loading, preprocessing and arg-max prediction
//! - `remedy`: Remedy records, lookup and markdown rendering
//! - `advice`: The AI advice collaborator
//! - `pipeline`: `CropDoctor`, which wires everything together
//! - `config`, `utils`: Configuration, errors and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cropdoc::backend::{default_device, InferenceBackend};
//! use cropdoc::{AppConfig, CropDoctor};
//!
//! let config = AppConfig::default().with_env_overrides();
//! let doctor = CropDoctor::<InferenceBackend>::from_config(&config, default_device())?;
//!
//! let diagnosis = doctor.diagnose_file("Potato", "leaf.jpg".as_ref())?;
//! println!("{}", diagnosis.prediction.display());
//! ```

pub mod advice;
pub mod backend;
pub mod config;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod remedy;
pub mod utils;

// Re-export commonly used items for convenience
pub use advice::{AdviceConfig, AdviceOutcome, AdviceService, AdviceSession};
pub use config::{AppConfig, BackboneDepth};
pub use inference::predictor::{ClassScore, Prediction};
pub use model::{LoadedModel, ModelBuilder, ModelCache};
pub use pipeline::{CropDoctor, Diagnosis};
pub use registry::{CropProfile, CropRegistry, HeadType};
pub use remedy::{RemedyLookup, RemedyRecord, RemedyTable};
pub use utils::error::{CropDocError, Result};

/// Side length of the square model input
pub const IMAGE_SIZE: usize = inference::preprocess::IMAGE_SIZE;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
