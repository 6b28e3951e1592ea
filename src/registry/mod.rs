//! Model Registry
//!
//! Maps a crop identifier to everything needed to build and interpret its
//! classifier: weights location, ordered labels and head architecture.
//!
//! The registry is immutable once built. The built-in table lives in
//! [`table`]; other tables can be supplied through
//! [`CropRegistry::from_profiles`] without touching inference code.

pub mod profile;
pub mod table;

use std::collections::{BTreeMap, HashSet};

pub use profile::{CropProfile, HeadLayout, HeadType};
pub use table::BUILTIN_CROPS;

use crate::utils::error::{CropDocError, Result};

/// Immutable crop table, iterated in insertion order
#[derive(Debug, Clone)]
pub struct CropRegistry {
    profiles: Vec<CropProfile>,
    index: BTreeMap<String, usize>,
}

impl CropRegistry {
    /// Registry over the built-in crop table
    pub fn builtin() -> Self {
        let profiles = BUILTIN_CROPS.iter().map(|row| row.to_profile()).collect();
        Self::index_profiles(profiles)
    }

    /// Registry over an arbitrary table
    ///
    /// Rejects duplicate crop ids and crops without labels.
    pub fn from_profiles(profiles: Vec<CropProfile>) -> Result<Self> {
        let mut seen = HashSet::new();
        for profile in &profiles {
            if profile.crop_id.trim().is_empty() {
                return Err(CropDocError::Config("crop id must not be empty".to_string()));
            }
            if !seen.insert(profile.crop_id.as_str()) {
                return Err(CropDocError::Config(format!(
                    "duplicate crop id '{}'",
                    profile.crop_id
                )));
            }
            if profile.labels.is_empty() {
                return Err(CropDocError::Config(format!(
                    "crop '{}' has no labels",
                    profile.crop_id
                )));
            }
        }
        Ok(Self::index_profiles(profiles))
    }

    fn index_profiles(profiles: Vec<CropProfile>) -> Self {
        let index = profiles
            .iter()
            .enumerate()
            .map(|(i, p)| (p.crop_id.clone(), i))
            .collect();
        Self { profiles, index }
    }

    /// Look up a crop. Exact, case-sensitive match.
    pub fn resolve(&self, crop_id: &str) -> Result<&CropProfile> {
        self.index
            .get(crop_id)
            .map(|&i| &self.profiles[i])
            .ok_or_else(|| CropDocError::UnknownCrop(crop_id.to_string()))
    }

    /// Whether `crop_id` is registered
    pub fn contains(&self, crop_id: &str) -> bool {
        self.index.contains_key(crop_id)
    }

    /// Registered crop ids in table order
    pub fn crop_ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.crop_id.as_str())
    }

    /// All profiles in table order
    pub fn profiles(&self) -> &[CropProfile] {
        &self.profiles
    }

    /// Number of registered crops
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for CropRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
