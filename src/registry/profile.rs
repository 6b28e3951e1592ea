//! Crop profiles and classifier head variants

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::{CropDocError, Result};

/// Classifier head attached to the shared backbone.
///
/// Every weights file was produced by exactly one of these; picking the wrong
/// one for a file surfaces as a shape mismatch at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadType {
    /// `dense(features -> classes)`
    SingleLinear,
    /// `dense(features -> 512) -> relu -> dropout(0.3) -> dense(512 -> classes)`
    DeepNarrow,
    /// `dense(features -> 256) -> relu -> dropout(0.4) -> dense(256 -> classes)`
    DeepSmall,
}

/// Concrete layer plan for a [`HeadType`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadLayout {
    Linear,
    Mlp { hidden: usize, dropout: f64 },
}

impl HeadType {
    /// All recognized head types
    pub const ALL: [HeadType; 3] = [
        HeadType::SingleLinear,
        HeadType::DeepNarrow,
        HeadType::DeepSmall,
    ];

    /// Layer plan for this head
    pub fn layout(&self) -> HeadLayout {
        match self {
            HeadType::SingleLinear => HeadLayout::Linear,
            HeadType::DeepNarrow => HeadLayout::Mlp {
                hidden: 512,
                dropout: 0.3,
            },
            HeadType::DeepSmall => HeadLayout::Mlp {
                hidden: 256,
                dropout: 0.4,
            },
        }
    }

    /// Canonical snake-case tag
    pub fn as_str(&self) -> &'static str {
        match self {
            HeadType::SingleLinear => "single_linear",
            HeadType::DeepNarrow => "deep_narrow",
            HeadType::DeepSmall => "deep_small",
        }
    }
}

impl fmt::Display for HeadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeadType {
    type Err = CropDocError;

    /// Accepts the canonical tags plus the legacy tags found in older crop tables.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "single_linear" | "linear" => Ok(HeadType::SingleLinear),
            "deep_narrow" | "custom_sequential_peanut" => Ok(HeadType::DeepNarrow),
            "deep_small" | "custom_sequential_new_crop" => Ok(HeadType::DeepSmall),
            _ => Err(CropDocError::UnknownHeadType(s.to_string())),
        }
    }
}

/// Static description of how to build and interpret one crop's model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropProfile {
    /// Unique registry key, e.g. `"Potato"`
    pub crop_id: String,
    /// Weights file; relative paths resolve against the weights directory
    pub weights_path: PathBuf,
    /// Class labels in output-index order
    pub labels: Vec<String>,
    /// Head attached to the backbone
    pub head_type: HeadType,
}

impl CropProfile {
    /// Create a profile
    pub fn new(
        crop_id: impl Into<String>,
        weights_path: impl Into<PathBuf>,
        labels: Vec<String>,
        head_type: HeadType,
    ) -> Self {
        Self {
            crop_id: crop_id.into(),
            weights_path: weights_path.into(),
            labels,
            head_type,
        }
    }

    /// Number of output classes. Always equal to `labels.len()`.
    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    /// Label for an output index
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Whether `label` is one of this crop's classes
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Absolute location of the weights file
    pub fn resolve_weights_path(&self, weights_dir: &Path) -> PathBuf {
        if self.weights_path.is_absolute() {
            self.weights_path.clone()
        } else {
            weights_dir.join(&self.weights_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_layouts() {
        assert_eq!(HeadType::SingleLinear.layout(), HeadLayout::Linear);
        assert_eq!(
            HeadType::DeepNarrow.layout(),
            HeadLayout::Mlp {
                hidden: 512,
                dropout: 0.3
            }
        );
        assert_eq!(
            HeadType::DeepSmall.layout(),
            HeadLayout::Mlp {
                hidden: 256,
                dropout: 0.4
            }
        );
    }

    #[test]
    fn test_head_type_from_legacy_tags() {
        assert_eq!(
            "custom_sequential_peanut".parse::<HeadType>().unwrap(),
            HeadType::DeepNarrow
        );
        assert_eq!(
            "custom_sequential_new_crop".parse::<HeadType>().unwrap(),
            HeadType::DeepSmall
        );
        for head in HeadType::ALL {
            assert_eq!(head.as_str().parse::<HeadType>().unwrap(), head);
        }
    }

    #[test]
    fn test_unknown_head_type() {
        let err = "transformer".parse::<HeadType>().unwrap_err();
        assert!(matches!(err, CropDocError::UnknownHeadType(ref t) if t == "transformer"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_head_type_serde() {
        let json = serde_json::to_string(&HeadType::DeepSmall).unwrap();
        assert_eq!(json, "\"deep_small\"");
        assert!(serde_json::from_str::<HeadType>("\"wide\"").is_err());
    }

    #[test]
    fn test_profile_num_classes_tracks_labels() {
        let profile = CropProfile::new(
            "Rice",
            "rice.mpk",
            vec!["a".into(), "b".into(), "c".into()],
            HeadType::DeepSmall,
        );
        assert_eq!(profile.num_classes(), 3);
        assert_eq!(profile.label(2), Some("c"));
        assert_eq!(profile.label(3), None);
        assert!(profile.has_label("b"));
    }

    #[test]
    fn test_resolve_weights_path() {
        let profile = CropProfile::new("Rice", "rice.mpk", vec!["a".into()], HeadType::SingleLinear);
        assert_eq!(
            profile.resolve_weights_path(Path::new("/models")),
            PathBuf::from("/models/rice.mpk")
        );

        let absolute = CropProfile::new("Rice", "/opt/rice.mpk", vec!["a".into()], HeadType::SingleLinear);
        assert_eq!(
            absolute.resolve_weights_path(Path::new("/models")),
            PathBuf::from("/opt/rice.mpk")
        );
    }
}
