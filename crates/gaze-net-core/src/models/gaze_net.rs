//! Gaze direction regressor.
//!
//! A frozen ResNet body feeds adaptive average pooling, a trainable
//! projection (`fc`, standing in for the backbone's classification layer) and
//! a trainable two-unit head. The frozen and trainable halves live in
//! different containers: backbone tensors come from [`FrozenWeights`] and are
//! never variables, while `fc` and `head` are variables in a `VarMap` owned by
//! the model.

use std::sync::PoisonError;

use candle_core::{DType, Device, Module, Tensor, Var, D};
use candle_nn::{linear, Linear, VarBuilder, VarMap};
use tracing::{debug, info};

use super::ResNet;
use crate::domain::{Backbone, GazeNetConfig};
use crate::error::{Error, Result};
use crate::inference::{device_label, select_device, FrozenWeights};
use crate::ports::WeightsProvider;

/// Trainable variable names, in optimizer order.
const TRAINABLE_NAMES: [&str; 4] = ["fc.weight", "fc.bias", "head.weight", "head.bias"];

/// Frozen ResNet backbone plus trainable gaze head.
pub struct GazeNet {
    backbone: ResNet,
    fc: Linear,
    head: Linear,
    varmap: VarMap,
    trainable: Vec<Var>,
    kind: Backbone,
    head_feat_in: usize,
    device: Device,
}

impl std::fmt::Debug for GazeNet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GazeNet")
            .field("backbone", &self.kind)
            .field("head_feat_in", &self.head_feat_in)
            .field("device", &device_label(&self.device))
            .finish_non_exhaustive()
    }
}

impl GazeNet {
    /// Width of the gaze output (x, y).
    pub const OUTPUT_DIM: usize = 2;

    /// Builds the model from already-loaded pretrained weights.
    ///
    /// The weights are moved onto the device selected by `config.use_gpu`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for an unsupported extractor or
    /// a zero `head_feat_in`, and [`Error::Tensor`] if the weights do not
    /// match the backbone.
    pub fn new(config: &GazeNetConfig, weights: &FrozenWeights) -> Result<Self> {
        let kind = config.validate()?;
        let device = select_device(config.use_gpu);
        Self::build(kind, config.head_feat_in, weights, device)
    }

    /// Builds the model, loading the backbone weights from `provider`.
    ///
    /// The configuration is validated before anything is loaded.
    ///
    /// # Errors
    ///
    /// See [`GazeNet::new`]; provider failures surface as [`Error::Weights`].
    pub fn from_provider(config: &GazeNetConfig, provider: &dyn WeightsProvider) -> Result<Self> {
        let kind = config.validate()?;
        let device = select_device(config.use_gpu);
        let weights = provider.load(kind, &device)?;
        Self::build(kind, config.head_feat_in, &weights, device)
    }

    fn build(
        kind: Backbone,
        head_feat_in: usize,
        weights: &FrozenWeights,
        device: Device,
    ) -> Result<Self> {
        debug!(
            "Building GazeNet: backbone={kind}, head_feat_in={head_feat_in}, device={}",
            device_label(&device)
        );

        let weights = weights.to_device(&device)?;
        let backbone = ResNet::for_backbone(kind, weights.var_builder(&device))?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let fc = linear(backbone.out_channels(), head_feat_in, vb.pp("fc"))?;
        let head = linear(head_feat_in, Self::OUTPUT_DIM, vb.pp("head"))?;

        let trainable = {
            let data = varmap.data().lock().unwrap_or_else(PoisonError::into_inner);
            TRAINABLE_NAMES
                .iter()
                .map(|name| {
                    data.get(*name).cloned().ok_or_else(|| {
                        Error::Tensor(candle_core::Error::Msg(format!(
                            "trainable variable '{name}' was not created"
                        )))
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        let model = Self {
            backbone,
            fc,
            head,
            varmap,
            trainable,
            kind,
            head_feat_in,
            device,
        };
        info!(
            "GazeNet ready: {} frozen / {} trainable parameters",
            model.frozen_parameter_count(),
            model.trainable_parameter_count()
        );
        Ok(model)
    }

    /// Computes `(N, head_feat_in)` embeddings for an `(N, 3, H, W)` batch.
    ///
    /// # Errors
    ///
    /// Returns an error if a tensor operation fails, e.g. on a malformed input.
    pub fn embed(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let features = self.backbone.forward(x)?;
        // Adaptive average pooling to 1x1, then flatten
        let pooled = features.mean(D::Minus1)?.mean(D::Minus1)?;
        self.fc.forward(&pooled)
    }

    /// The trainable parameters: the replaced final layer followed by the head.
    #[must_use]
    pub fn trainable_parameters(&self) -> &[Var] {
        &self.trainable
    }

    /// The variable map backing the trainable parameters.
    #[must_use]
    pub const fn trainable_varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// The frozen backbone parameters.
    #[must_use]
    pub fn frozen_parameters(&self) -> Vec<&Tensor> {
        self.backbone.parameters()
    }

    /// Element count of the frozen backbone parameters.
    #[must_use]
    pub fn frozen_parameter_count(&self) -> usize {
        self.frozen_parameters().iter().map(|t| t.elem_count()).sum()
    }

    /// Element count of the trainable parameters.
    #[must_use]
    pub fn trainable_parameter_count(&self) -> usize {
        self.trainable.iter().map(|v| v.elem_count()).sum()
    }

    /// The backbone this model was built on.
    #[must_use]
    pub const fn backbone(&self) -> Backbone {
        self.kind
    }

    /// Embedding width.
    #[must_use]
    pub const fn head_feat_in(&self) -> usize {
        self.head_feat_in
    }

    /// Device holding every tensor of the model.
    #[must_use]
    pub const fn device(&self) -> &Device {
        &self.device
    }
}

impl Module for GazeNet {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let features = self.embed(x)?;
        self.head.forward(&features)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::testing::{synthetic_weights, RecordingProvider};

    fn resnet18() -> GazeNet {
        GazeNet::new(
            &GazeNetConfig::new("resnet18", 16),
            &synthetic_weights(Backbone::Resnet18),
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_extractor_is_invalid_configuration() {
        let weights = synthetic_weights(Backbone::Resnet18);
        for name in ["resnet34", "vgg19", ""] {
            let err = GazeNet::new(&GazeNetConfig::new(name, 16), &weights)
                .err()
                .unwrap();
            assert!(err.is_invalid_configuration(), "{name}: {err}");
        }
    }

    #[test]
    fn test_invalid_extractor_fails_before_loading() {
        let provider = RecordingProvider::default();
        let result = GazeNet::from_provider(&GazeNetConfig::new("alexnet", 8), &provider);
        assert!(result.err().unwrap().is_invalid_configuration());
        assert_eq!(provider.load_count(), 0);
    }

    #[test]
    fn test_provider_is_asked_for_backbone() {
        let provider = RecordingProvider::default();
        let model = GazeNet::from_provider(&GazeNetConfig::new("resnet18", 8), &provider).unwrap();
        assert_eq!(provider.loaded(), vec![Backbone::Resnet18]);
        assert_eq!(model.backbone(), Backbone::Resnet18);
    }

    #[test]
    fn test_backbone_frozen_head_trainable() {
        let model = resnet18();
        assert!(!model.frozen_parameters().is_empty());
        assert!(model.frozen_parameters().iter().all(|t| !t.is_variable()));
        assert!(model
            .trainable_parameters()
            .iter()
            .all(|v| v.as_tensor().is_variable()));
    }

    #[test]
    fn test_trainable_set_is_fc_plus_head() {
        let model = resnet18();
        let shapes: Vec<Vec<usize>> = model
            .trainable_parameters()
            .iter()
            .map(|v| v.dims().to_vec())
            .collect();
        assert_eq!(shapes, vec![vec![16, 512], vec![16], vec![2, 16], vec![2]]);
        assert_eq!(model.trainable_parameter_count(), 512 * 16 + 16 + 16 * 2 + 2);
        assert_eq!(model.trainable_varmap().all_vars().len(), 4);
    }

    #[test]
    fn test_forward_shape_for_any_resolution() {
        let model = resnet18();
        for (n, h, w) in [(1, 32, 32), (3, 64, 48), (2, 97, 131)] {
            let x = Tensor::zeros((n, 3, h, w), DType::F32, &Device::Cpu).unwrap();
            assert_eq!(model.forward(&x).unwrap().dims(), &[n, 2]);
            assert_eq!(model.embed(&x).unwrap().dims(), &[n, 16]);
        }
    }

    #[test]
    fn test_forward_is_deterministic() {
        let model = resnet18();
        let x = Tensor::rand(0f32, 1f32, (2, 3, 32, 32), &Device::Cpu).unwrap();
        let a = model.forward(&x).unwrap().to_vec2::<f32>().unwrap();
        let b = model.forward(&x).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_channel_count_propagates_tensor_error() {
        let model = resnet18();
        let x = Tensor::zeros((1, 1, 32, 32), DType::F32, &Device::Cpu).unwrap();
        assert!(model.forward(&x).is_err());
    }

    #[test]
    fn test_mismatched_weights_are_tensor_errors() {
        let weights = synthetic_weights(Backbone::Resnet18);
        let err = GazeNet::new(&GazeNetConfig::new("resnet50", 8), &weights)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Tensor(_)));
    }

    #[test]
    fn test_debug_names_backbone_and_width() {
        let text = format!("{:?}", resnet18());
        assert!(text.contains("Resnet18"), "{text}");
        assert!(text.contains("head_feat_in: 16"), "{text}");
        assert!(text.contains("\"cpu\""), "{text}");
    }

    #[test]
    fn test_head_updates_change_output() {
        let model = resnet18();
        let x = Tensor::rand(0f32, 1f32, (1, 3, 32, 32), &Device::Cpu).unwrap();
        let before = model.forward(&x).unwrap().to_vec2::<f32>().unwrap();

        let bias = &model.trainable_parameters()[3];
        bias.set(&(bias.as_tensor() + 1.0).unwrap()).unwrap();

        let after = model.forward(&x).unwrap().to_vec2::<f32>().unwrap();
        assert!((after[0][0] - before[0][0] - 1.0).abs() < 1e-4);
        assert!((after[0][1] - before[0][1] - 1.0).abs() < 1e-4);
    }
}
