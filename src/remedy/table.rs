//! Remedy table and lookup

use std::collections::BTreeMap;
use std::path::Path;

use crate::registry::CropRegistry;
use crate::utils::error::{CropDocError, Result};

use super::record::RemedyRecord;

/// Remedy table bundled with the crate: crop -> label -> record
const BUILTIN_REMEDIES: &str = include_str!("../../assets/remedies.json");

/// Outcome of a remedy lookup
///
/// A miss is an expected, user-visible condition, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemedyLookup<'a> {
    Available(&'a RemedyRecord),
    Unavailable,
}

impl<'a> RemedyLookup<'a> {
    pub fn record(&self) -> Option<&'a RemedyRecord> {
        match self {
            RemedyLookup::Available(record) => Some(record),
            RemedyLookup::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RemedyLookup::Available(_))
    }
}

/// Static advice per crop and label
#[derive(Debug, Clone, Default)]
pub struct RemedyTable {
    crops: BTreeMap<String, BTreeMap<String, RemedyRecord>>,
}

impl RemedyTable {
    /// The bundled table
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_REMEDIES)
    }

    /// Parse a `{crop: {label: record}}` JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let crops = serde_json::from_str(json)?;
        Ok(Self { crops })
    }

    /// Load a `{crop: {label: record}}` JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Add or replace one record
    pub fn insert(&mut self, crop_id: &str, label: &str, record: RemedyRecord) {
        self.crops
            .entry(crop_id.to_string())
            .or_default()
            .insert(label.to_string(), record);
    }

    /// Look up the advice for `label` on `crop_id`
    ///
    /// Unknown crops, unknown labels and empty records all resolve to
    /// [`RemedyLookup::Unavailable`].
    pub fn resolve_remedy(&self, crop_id: &str, label: &str) -> RemedyLookup<'_> {
        match self.crops.get(crop_id).and_then(|labels| labels.get(label)) {
            Some(record) if !record.is_empty() => RemedyLookup::Available(record),
            _ => RemedyLookup::Unavailable,
        }
    }

    /// Labels with advice for `crop_id`
    pub fn labels(&self, crop_id: &str) -> Vec<&str> {
        self.crops
            .get(crop_id)
            .map(|labels| labels.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Registered `(crop, label)` pairs without usable advice
    pub fn missing(&self, registry: &CropRegistry) -> Vec<(String, String)> {
        registry
            .profiles()
            .iter()
            .flat_map(|profile| {
                profile
                    .labels
                    .iter()
                    .filter(|label| !self.resolve_remedy(&profile.crop_id, label).is_available())
                    .map(|label| (profile.crop_id.clone(), label.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Fail if any registered label lacks advice
    pub fn ensure_covers(&self, registry: &CropRegistry) -> Result<()> {
        let missing = self.missing(registry);
        if missing.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = missing
            .iter()
            .map(|(crop, label)| format!("{crop}/{label}"))
            .collect();
        Err(CropDocError::Config(format!(
            "no remedy for {}",
            names.join(", ")
        )))
    }
}
