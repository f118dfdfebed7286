//! Randomly initialised stand-ins for pretrained backbone weights.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use gaze_net_core::models::{ResNet, VggFeatures};
use gaze_net_core::{Backbone, FrozenWeights, WeightsProvider};

/// Builds a frozen weight set with the names and shapes of `backbone`.
///
/// Convolutions get random values; batch norms start at identity
/// statistics. Names follow torchvision, VGG weights carry the `features.`
/// prefix.
///
/// # Errors
///
/// Returns an error if the backbone cannot be instantiated.
pub fn synthetic_weights(backbone: Backbone) -> Result<FrozenWeights> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    if backbone == Backbone::Vgg19 {
        VggFeatures::vgg19(vb.pp("features"))?;
    } else {
        ResNet::for_backbone(backbone, vb)?;
    }

    let tensors: HashMap<_, _> = varmap
        .data()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|(name, var)| (name.clone(), var.as_tensor().clone()))
        .collect();
    Ok(FrozenWeights::from_tensors(tensors)?)
}

/// File name the model store uses for `backbone`.
#[must_use]
pub fn weights_filename(backbone: Backbone) -> String {
    format!("{}.safetensors", backbone.name())
}

/// Writes synthetic weights for each backbone into `dir` as safetensors
/// files, laid out like an installed model store.
///
/// # Errors
///
/// Returns an error if a weight set cannot be built or written.
pub fn install_synthetic_weights(dir: &Path, backbones: &[Backbone]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    backbones
        .iter()
        .map(|&backbone| {
            let path = dir.join(weights_filename(backbone));
            let tensors = synthetic_weights(backbone)?.into_tensors();
            candle_core::safetensors::save(&tensors, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}

/// `WeightsProvider` serving synthetic weights, built once per backbone.
#[derive(Default)]
pub struct SyntheticWeights {
    cache: Mutex<HashMap<Backbone, FrozenWeights>>,
}

impl SyntheticWeights {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WeightsProvider for SyntheticWeights {
    fn load(&self, backbone: Backbone, device: &Device) -> Result<FrozenWeights> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let weights = match cache.get(&backbone) {
            Some(w) => w.clone(),
            None => {
                let w = synthetic_weights(backbone)?;
                cache.insert(backbone, w.clone());
                w
            }
        };
        Ok(weights.to_device(device)?)
    }

    fn is_available(&self, _backbone: Backbone) -> bool {
        true
    }
}
