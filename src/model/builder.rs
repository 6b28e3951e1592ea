//! Architecture Builder
//!
//! Turns a [`CropProfile`] into a [`LoadedModel`]: builds the shared backbone
//! with random parameters, attaches the profile's head, then overwrites every
//! parameter from the crop's weights file.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use std::time::Instant;

use burn::{
    module::Module,
    record::CompactRecorder,
    tensor::backend::Backend,
};
use tracing::{debug, info};

use super::network::CropNetwork;
use super::resnet::ResNetConfig;
use crate::registry::CropProfile;
use crate::utils::error::{CropDocError, Result};

/// On-disk weights formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsFormat {
    /// burn `CompactRecorder` record (`.mpk`)
    Burn,
    /// PyTorch `state_dict` (`.pt` / `.pth`)
    PyTorch,
}

impl WeightsFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("mpk") => Ok(WeightsFormat::Burn),
            Some("pt") | Some("pth") => Ok(WeightsFormat::PyTorch),
            _ => Err(CropDocError::UnsupportedWeightsFormat(path.to_path_buf())),
        }
    }
}

/// A crop's network with its weights loaded, ready for inference
///
/// Never mutated after construction. The network sits behind a mutex only
/// because burn modules are `Send` but not `Sync`; callers take a cheap clone
/// (parameters are reference counted) and run the forward pass unlocked.
#[derive(Debug)]
pub struct LoadedModel<B: Backend> {
    profile: CropProfile,
    network: Mutex<CropNetwork<B>>,
    device: B::Device,
    weights_path: PathBuf,
}

impl<B: Backend> LoadedModel<B> {
    pub fn new(
        profile: CropProfile,
        network: CropNetwork<B>,
        device: B::Device,
        weights_path: PathBuf,
    ) -> Self {
        Self {
            profile,
            network: Mutex::new(network),
            device,
            weights_path,
        }
    }

    pub fn profile(&self) -> &CropProfile {
        &self.profile
    }

    pub fn crop_id(&self) -> &str {
        &self.profile.crop_id
    }

    pub fn labels(&self) -> &[String] {
        &self.profile.labels
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }

    /// Snapshot of the network for one forward pass
    pub fn network(&self) -> CropNetwork<B> {
        match self.network.lock() {
            Ok(guard) => guard.clone(),
            // Nothing mutates the network, so a poisoned lock still holds valid parameters
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Builds crop networks on one device with one backbone depth
#[derive(Debug, Clone)]
pub struct ModelBuilder<B: Backend> {
    backbone: ResNetConfig,
    weights_dir: PathBuf,
    device: B::Device,
}

impl<B: Backend> ModelBuilder<B> {
    pub fn new(backbone: ResNetConfig, weights_dir: impl Into<PathBuf>, device: B::Device) -> Self {
        Self {
            backbone,
            weights_dir: weights_dir.into(),
            device,
        }
    }

    pub fn backbone(&self) -> &ResNetConfig {
        &self.backbone
    }

    pub fn weights_dir(&self) -> &Path {
        &self.weights_dir
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Randomly initialized network for `profile`
    pub fn init_network(&self, profile: &CropProfile) -> CropNetwork<B> {
        CropNetwork::new(
            &self.backbone,
            profile.head_type,
            profile.num_classes(),
            &self.device,
        )
    }

    /// Build the network for `profile` and load its weights
    pub fn build(&self, profile: &CropProfile) -> Result<LoadedModel<B>> {
        let path = profile.resolve_weights_path(&self.weights_dir);
        if !path.is_file() {
            return Err(CropDocError::WeightsNotFound(path));
        }
        let format = WeightsFormat::from_path(&path)?;

        info!(
            "Building {} model ({} head, {} classes) from {:?}",
            profile.crop_id,
            profile.head_type,
            profile.num_classes(),
            path
        );
        let start = Instant::now();

        let fresh = self.init_network(profile);
        let expected = fresh.parameter_shapes();

        let network = match format {
            WeightsFormat::Burn => self.load_burn(fresh, &path, profile)?,
            WeightsFormat::PyTorch => self.load_pytorch(fresh, &path, profile)?,
        };

        if let Some(detail) = expected.first_mismatch(&network.parameter_shapes()) {
            return Err(CropDocError::WeightShapeMismatch {
                crop: profile.crop_id.clone(),
                detail,
            });
        }

        debug!(
            "Loaded {} tensors for {} in {:.1} ms",
            expected.len(),
            profile.crop_id,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(LoadedModel::new(
            profile.clone(),
            network,
            self.device.clone(),
            path,
        ))
    }

    fn load_burn(
        &self,
        network: CropNetwork<B>,
        path: &Path,
        profile: &CropProfile,
    ) -> Result<CropNetwork<B>> {
        let recorder = CompactRecorder::new();
        guard_load(profile, || network.load_file(path, &recorder, &self.device))?.map_err(|e| {
            CropDocError::WeightLoad {
                path: path.to_path_buf(),
                reason: format!("{:?}", e),
            }
        })
    }

    #[cfg(feature = "pytorch")]
    fn load_pytorch(
        &self,
        network: CropNetwork<B>,
        path: &Path,
        profile: &CropProfile,
    ) -> Result<CropNetwork<B>> {
        use burn::record::{FullPrecisionSettings, Recorder};
        use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

        // torchvision state_dict keys -> CropNetwork paths
        let args = LoadArgs::new(path.to_path_buf())
            .with_key_remap(r"^fc\.0\.(.+)$", "head.hidden.$1")
            .with_key_remap(r"^fc\.3\.(.+)$", "head.output.$1")
            .with_key_remap(r"^fc\.(weight|bias)$", "head.output.$1")
            .with_key_remap(r"^(.+)\.downsample\.0\.(.+)$", "$1.downsample.conv.$2")
            .with_key_remap(r"^(.+)\.downsample\.1\.(.+)$", "$1.downsample.bn.$2")
            .with_key_remap(r"^(conv1|bn1|layer[1-4])\.(.+)$", "backbone.$1.$2");

        let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
            .load(args, &self.device)
            .map_err(|e| CropDocError::WeightLoad {
                path: path.to_path_buf(),
                reason: format!("{:?}", e),
            })?;

        guard_load(profile, || network.load_record(record))
    }

    #[cfg(not(feature = "pytorch"))]
    fn load_pytorch(
        &self,
        _network: CropNetwork<B>,
        path: &Path,
        _profile: &CropProfile,
    ) -> Result<CropNetwork<B>> {
        tracing::warn!("PyTorch weights require the `pytorch` feature: {:?}", path);
        Err(CropDocError::UnsupportedWeightsFormat(path.to_path_buf()))
    }

    /// Write a randomly initialized `.mpk` for `profile` to its weights path
    ///
    /// Produces a file that loads cleanly, for smoke testing without trained weights.
    pub fn write_random_weights(&self, profile: &CropProfile) -> Result<PathBuf> {
        let path = profile.resolve_weights_path(&self.weights_dir);
        if WeightsFormat::from_path(&path)? != WeightsFormat::Burn {
            return Err(CropDocError::UnsupportedWeightsFormat(path));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        self.save(&self.init_network(profile), &path)?;
        info!("Wrote random {} weights to {:?}", profile.crop_id, path);
        Ok(path)
    }

    /// Save a network as a burn record
    pub fn save(&self, network: &CropNetwork<B>, path: &Path) -> Result<()> {
        let recorder = CompactRecorder::new();
        network
            .clone()
            .save_file(path, &recorder)
            .map_err(|e| CropDocError::WeightLoad {
                path: path.to_path_buf(),
                reason: format!("failed to save: {:?}", e),
            })
    }
}

thread_local! {
    static SILENCE_PANICS: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Wrap the process panic hook so panics on a thread inside [`guard_load`]
/// are not printed; every other panic still reaches the previous hook
fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !SILENCE_PANICS.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

/// Record loading may panic on malformed tensors; report that as a shape mismatch
fn guard_load<T>(profile: &CropProfile, load: impl FnOnce() -> T) -> Result<T> {
    install_quiet_hook();
    SILENCE_PANICS.with(|silence| silence.set(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(load));
    SILENCE_PANICS.with(|silence| silence.set(false));

    outcome.map_err(|payload| {
        let detail = payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "record does not fit the network".to_string());
        CropDocError::WeightShapeMismatch {
            crop: profile.crop_id.clone(),
            detail,
        }
    })
}
