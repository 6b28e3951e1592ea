//! Composition root
//!
//! [`CropDoctor`] owns every collaborator of a diagnosis: the crop registry,
//! the model cache, the remedy table and the advice service. It is built
//! once at startup and shared by reference.

use std::path::Path;
use std::sync::Arc;

use burn::tensor::backend::Backend;
use image::DynamicImage;
use tracing::{info, warn};

use crate::advice::{AdviceService, AdviceSession};
use crate::config::AppConfig;
use crate::inference::{load_image, predict_image, Prediction};
use crate::model::{ModelBuilder, ModelCache};
use crate::registry::{CropProfile, CropRegistry};
use crate::remedy::{RemedyLookup, RemedyRecord, RemedyTable};
use crate::utils::error::Result;

/// A prediction together with its static remedy
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub prediction: Prediction,

    /// `None` when the table has no advice for the predicted label
    pub remedy: Option<RemedyRecord>,
}

impl Diagnosis {
    pub fn label(&self) -> &str {
        &self.prediction.predicted_label
    }

    pub fn has_remedy(&self) -> bool {
        self.remedy.is_some()
    }
}

/// Crop disease diagnosis service
pub struct CropDoctor<B: Backend> {
    registry: Arc<CropRegistry>,
    cache: ModelCache<B>,
    remedies: RemedyTable,
    advice: AdviceService,
}

impl<B: Backend> CropDoctor<B> {
    pub fn new(
        registry: Arc<CropRegistry>,
        builder: ModelBuilder<B>,
        remedies: RemedyTable,
        advice: AdviceService,
    ) -> Self {
        for (crop, label) in remedies.missing(&registry) {
            warn!("No remedy entry for {} / {}", crop, label);
        }

        Self {
            cache: ModelCache::new(Arc::clone(&registry), builder),
            registry,
            remedies,
            advice,
        }
    }

    /// Wire up the built-in crop table with the configured backbone,
    /// weights directory, remedy table and advice service
    pub fn from_config(config: &AppConfig, device: B::Device) -> Result<Self> {
        let registry = Arc::new(CropRegistry::builtin());
        let builder = ModelBuilder::new(config.backbone.to_config(), &config.weights_dir, device);

        let remedies = match &config.remedies_path {
            Some(path) => {
                info!("Loading remedy table from {:?}", path);
                RemedyTable::load(path)?
            }
            None => RemedyTable::builtin()?,
        };

        info!(
            "CropDoctor ready: {} crops, {} backbone, weights in {:?}",
            registry.len(),
            config.backbone,
            config.weights_dir
        );

        Ok(Self::new(
            registry,
            builder,
            remedies,
            AdviceService::from_config(&config.advice),
        ))
    }

    /// Registered crop profiles, in table order
    pub fn crops(&self) -> &[CropProfile] {
        self.registry.profiles()
    }

    pub fn registry(&self) -> &CropRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ModelCache<B> {
        &self.cache
    }

    pub fn advice(&self) -> &AdviceService {
        &self.advice
    }

    /// Classify `image` with the crop's model and look up the remedy
    ///
    /// The first call for a crop builds its model; later calls reuse it.
    pub fn diagnose(&self, crop_id: &str, image: &DynamicImage) -> Result<Diagnosis> {
        let model = self.cache.get_or_build(crop_id)?;
        let prediction = predict_image(&model, image)?;
        let remedy = self
            .remedy(crop_id, &prediction.predicted_label)
            .record()
            .cloned();

        info!(
            "{}: {} ({:.1}%){}",
            crop_id,
            prediction.predicted_label,
            prediction.confidence * 100.0,
            if remedy.is_some() { "" } else { ", no remedy on file" }
        );

        Ok(Diagnosis { prediction, remedy })
    }

    /// Load a JPEG/PNG file and diagnose it
    pub fn diagnose_file(&self, crop_id: &str, path: &Path) -> Result<Diagnosis> {
        // Fail on an unknown crop before touching the file
        self.registry.resolve(crop_id)?;
        let image = load_image(path)?;
        self.diagnose(crop_id, &image)
    }

    /// Static advice for a crop and label
    pub fn remedy(&self, crop_id: &str, label: &str) -> RemedyLookup<'_> {
        self.remedies.resolve_remedy(crop_id, label)
    }

    /// Start an AI advice conversation about a prediction
    pub fn advice_session(&self, prediction: &Prediction) -> AdviceSession {
        self.advice
            .session(&prediction.crop_id, &prediction.predicted_label)
    }
}
