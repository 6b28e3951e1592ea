//! Application Configuration
//!
//! Resolved once at startup: defaults, then an optional JSON file, then
//! environment variables, then command-line flags.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::advice::AdviceConfig;
use crate::model::ResNetConfig;
use crate::utils::error::{CropDocError, Result};
use crate::utils::logging::LogLevel;

/// Overrides the weights directory
pub const ENV_WEIGHTS_DIR: &str = "CROPDOC_WEIGHTS_DIR";
/// Advice service API key
pub const ENV_ADVICE_API_KEY: &str = "ADVICE_API_KEY";
/// Advice service base URL
pub const ENV_ADVICE_BASE_URL: &str = "ADVICE_BASE_URL";
/// Advice service model name
pub const ENV_ADVICE_MODEL: &str = "ADVICE_MODEL";

/// Depth of the shared backbone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackboneDepth {
    #[default]
    ResNet50,
    ResNet101,
    ResNet152,
}

impl BackboneDepth {
    pub fn to_config(self) -> ResNetConfig {
        match self {
            BackboneDepth::ResNet50 => ResNetConfig::resnet50(),
            BackboneDepth::ResNet101 => ResNetConfig::resnet101(),
            BackboneDepth::ResNet152 => ResNetConfig::resnet152(),
        }
    }
}

impl fmt::Display for BackboneDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackboneDepth::ResNet50 => "resnet50",
            BackboneDepth::ResNet101 => "resnet101",
            BackboneDepth::ResNet152 => "resnet152",
        };
        f.write_str(name)
    }
}

impl FromStr for BackboneDepth {
    type Err = CropDocError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "resnet50" => Ok(BackboneDepth::ResNet50),
            "resnet101" => Ok(BackboneDepth::ResNet101),
            "resnet152" => Ok(BackboneDepth::ResNet152),
            _ => Err(CropDocError::Config(format!("unknown backbone '{}'", s))),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory that relative weights paths resolve against
    pub weights_dir: PathBuf,

    /// Backbone shared by every crop model
    pub backbone: BackboneDepth,

    /// Replacement remedy table (JSON); the bundled table when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remedies_path: Option<PathBuf>,

    /// AI advice settings
    pub advice: AdviceConfig,

    /// Minimum log level
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            weights_dir: PathBuf::from("weights"),
            backbone: BackboneDepth::default(),
            remedies_path: None,
            advice: AdviceConfig::default(),
            log_level: LogLevel::Info,
        }
    }
}

impl AppConfig {
    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CropDocError::Config(format!("cannot read config {:?}: {}", path, e))
        })?;
        serde_json::from_str(&json)
            .map_err(|e| CropDocError::Config(format!("invalid config {:?}: {}", path, e)))
    }

    /// Apply environment overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup. Blank values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get(ENV_WEIGHTS_DIR) {
            self.weights_dir = PathBuf::from(dir);
        }
        if let Some(key) = get(ENV_ADVICE_API_KEY) {
            self.advice.api_key = Some(key);
        }
        if let Some(url) = get(ENV_ADVICE_BASE_URL) {
            self.advice.base_url = url;
        }
        if let Some(model) = get(ENV_ADVICE_MODEL) {
            self.advice.model = model;
        }
        self
    }
}
