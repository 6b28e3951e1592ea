//! Per-crop model cache
//!
//! Each crop gets its own slot. A slot is locked for the whole build, so
//! concurrent first requests for one crop build exactly once while requests
//! for other crops proceed independently. Failed builds are not cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use burn::tensor::backend::Backend;
use tracing::{debug, info};

use super::builder::{LoadedModel, ModelBuilder};
use crate::registry::CropRegistry;
use crate::utils::error::Result;

type Slot<B> = Arc<Mutex<Option<Arc<LoadedModel<B>>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking builder leaves its slot empty, which is a valid state
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Single-flight cache of loaded models, keyed by crop id
pub struct ModelCache<B: Backend> {
    registry: Arc<CropRegistry>,
    builder: ModelBuilder<B>,
    slots: Mutex<HashMap<String, Slot<B>>>,
    loads: AtomicUsize,
}

impl<B: Backend> ModelCache<B> {
    pub fn new(registry: Arc<CropRegistry>, builder: ModelBuilder<B>) -> Self {
        Self {
            registry,
            builder,
            slots: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Loaded model for `crop_id`, building it on first use
    ///
    /// Unknown crops fail before any slot is created.
    pub fn get_or_build(&self, crop_id: &str) -> Result<Arc<LoadedModel<B>>> {
        let profile = self.registry.resolve(crop_id)?;

        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(crop_id.to_string()).or_default())
        };

        let mut entry = lock(&slot);
        if let Some(model) = entry.as_ref() {
            debug!("Model cache hit for {}", crop_id);
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(self.builder.build(profile)?);
        self.loads.fetch_add(1, Ordering::SeqCst);
        info!("Cached {} model", crop_id);

        *entry = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Already-built model for `crop_id`, without building
    pub fn get(&self, crop_id: &str) -> Option<Arc<LoadedModel<B>>> {
        let slot = lock(&self.slots).get(crop_id).cloned()?;
        let entry = lock(&slot);
        entry.clone()
    }

    /// Number of successful weight loads since creation
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Crop ids with a built model
    pub fn cached_crops(&self) -> Vec<String> {
        let slots: Vec<(String, Slot<B>)> = lock(&self.slots)
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        let mut crops: Vec<String> = slots
            .into_iter()
            .filter(|(_, slot)| lock(slot).is_some())
            .map(|(crop, _)| crop)
            .collect();
        crops.sort();
        crops
    }

    pub fn registry(&self) -> &CropRegistry {
        &self.registry
    }

    pub fn builder(&self) -> &ModelBuilder<B> {
        &self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResNetConfig;
    use crate::registry::{CropProfile, HeadType};
    use crate::utils::error::CropDocError;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn cache_with_weights(dir: &TempDir) -> ModelCache<TestBackend> {
        let registry = CropRegistry::from_profiles(vec![
            CropProfile::new(
                "Rice",
                "rice.mpk",
                vec!["Bacterialblight".into(), "Brownspot".into(), "Leafsmut".into()],
                HeadType::DeepSmall,
            ),
            CropProfile::new("Okra", "okra.mpk", vec!["healthy".into()], HeadType::SingleLinear),
        ])
        .unwrap();

        let builder =
            ModelBuilder::new(ResNetConfig::new([1, 1, 1, 1]), dir.path(), Default::default());
        builder
            .write_random_weights(registry.resolve("Rice").unwrap())
            .unwrap();

        ModelCache::new(Arc::new(registry), builder)
    }

    #[test]
    fn test_second_call_returns_same_instance() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_weights(&dir);

        let first = cache.get_or_build("Rice").unwrap();
        let second = cache.get_or_build("Rice").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.load_count(), 1);
        assert_eq!(cache.cached_crops(), vec!["Rice".to_string()]);
    }

    #[test]
    fn test_concurrent_first_requests_build_once() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(cache_with_weights(&dir));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_build("Rice").map(|_| ()).is_ok())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.load_count(), 1);
    }

    #[test]
    fn test_unknown_crop_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_weights(&dir);

        let err = cache.get_or_build("Banana").unwrap_err();
        assert!(matches!(err, CropDocError::UnknownCrop(_)));
        assert!(cache.get("Banana").is_none());
        assert_eq!(cache.load_count(), 0);
    }

    #[test]
    fn test_failed_build_is_retried_on_next_call() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_weights(&dir);

        // No weights written for Okra yet
        assert!(matches!(
            cache.get_or_build("Okra"),
            Err(CropDocError::WeightsNotFound(_))
        ));
        assert!(cache.get("Okra").is_none());

        let profile = cache.registry().resolve("Okra").unwrap().clone();
        cache.builder().write_random_weights(&profile).unwrap();

        assert!(cache.get_or_build("Okra").is_ok());
        assert_eq!(cache.load_count(), 1);
    }
}
