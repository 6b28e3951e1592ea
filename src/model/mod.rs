//! Model module for the crop classifiers, built with the Burn framework
//!
//! This module provides:
//! - The ResNet backbone shared by every crop
//! - The per-crop classifier heads
//! - Weight loading with structural shape verification
//! - A single-flight cache of loaded models
//!
//! ## Architecture
//!
//! Every crop model is `ResNetBackbone -> ClassifierHead`. The backbone is
//! always built with random parameters; all parameters, backbone included,
//! come from the crop's weights file.

pub mod builder;
pub mod cache;
pub mod head;
pub mod network;
pub mod resnet;
pub mod shapes;

// Re-export main types for convenience
pub use builder::{LoadedModel, ModelBuilder, WeightsFormat};
pub use cache::ModelCache;
pub use head::ClassifierHead;
pub use network::CropNetwork;
pub use resnet::{ResNetBackbone, ResNetConfig, FEATURE_WIDTH};
pub use shapes::ShapeCollector;
