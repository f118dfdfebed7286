//! Style feature extractor.
//!
//! Wraps the frozen VGG-19 feature stack and taps the activations of the
//! configured content and style layers. Loss terms built on those
//! activations belong to the caller.

use candle_core::{Device, Tensor};
use tracing::{debug, info};

use super::VggFeatures;
use crate::domain::StyleTransferConfig;
use crate::error::{Error, Result};
use crate::inference::{device_label, select_device, FrozenWeights};
use crate::ports::WeightsProvider;

/// Activations captured at the configured taps, in configuration order.
#[derive(Debug, Clone)]
pub struct StyleFeatures {
    /// `(layer name, activation)` for each content layer.
    pub content: Vec<(String, Tensor)>,
    /// `(layer name, activation)` for each style layer.
    pub style: Vec<(String, Tensor)>,
}

/// Frozen VGG-19 features with named content and style taps.
pub struct StyleTransfer {
    features: VggFeatures,
    content_layers: Vec<String>,
    style_layers: Vec<String>,
    device: Device,
}

impl std::fmt::Debug for StyleTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleTransfer")
            .field("content_layers", &self.content_layers)
            .field("style_layers", &self.style_layers)
            .field("device", &device_label(&self.device))
            .finish_non_exhaustive()
    }
}

impl StyleTransfer {
    /// Builds the extractor from pretrained VGG-19 weights (`features.*`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the extractor is not `vgg19`
    /// or a layer name does not exist in the stack, and [`Error::Tensor`] if
    /// the weights do not match.
    pub fn new(config: &StyleTransferConfig, weights: &FrozenWeights) -> Result<Self> {
        config.validate()?;
        let device = select_device(config.use_gpu);
        Self::build(config, weights, device)
    }

    /// Builds the extractor, loading weights from `provider` after the
    /// configuration has been validated.
    ///
    /// # Errors
    ///
    /// See [`StyleTransfer::new`]; provider failures surface as [`Error::Weights`].
    pub fn from_provider(
        config: &StyleTransferConfig,
        provider: &dyn WeightsProvider,
    ) -> Result<Self> {
        let backbone = config.validate()?;
        let device = select_device(config.use_gpu);
        let weights = provider.load(backbone, &device)?;
        Self::build(config, &weights, device)
    }

    fn build(config: &StyleTransferConfig, weights: &FrozenWeights, device: Device) -> Result<Self> {
        debug!("Building StyleTransfer on {}", device_label(&device));

        let weights = weights.to_device(&device)?;
        let features = VggFeatures::vgg19(weights.var_builder(&device).pp("features"))?;

        for name in config.content_layers.iter().chain(&config.style_layers) {
            if features.position(name).is_none() {
                return Err(Error::InvalidConfiguration(format!(
                    "unknown vgg19 layer '{name}' (expected conv_N, relu_N or pool_N)"
                )));
            }
        }

        let model = Self {
            features,
            content_layers: config.content_layers.clone(),
            style_layers: config.style_layers.clone(),
            device,
        };
        info!(
            "StyleTransfer ready: {} frozen parameters, content={:?}, style={:?}",
            model.frozen_parameter_count(),
            model.content_layers,
            model.style_layers
        );
        Ok(model)
    }

    /// Runs `x` through the frozen stack and collects the tapped activations.
    ///
    /// # Errors
    ///
    /// Returns an error if a tensor operation fails, e.g. on a malformed input.
    pub fn extract(&self, x: &Tensor) -> candle_core::Result<StyleFeatures> {
        let names: Vec<&str> = self
            .content_layers
            .iter()
            .chain(&self.style_layers)
            .map(String::as_str)
            .collect();
        let taps = self.features.activations(x, &names)?;

        let collect = |layers: &[String]| -> candle_core::Result<Vec<(String, Tensor)>> {
            layers
                .iter()
                .map(|name| {
                    taps.get(name)
                        .cloned()
                        .map(|t| (name.clone(), t))
                        .ok_or_else(|| candle_core::Error::Msg(format!("layer '{name}' not tapped")))
                })
                .collect()
        };

        Ok(StyleFeatures {
            content: collect(&self.content_layers)?,
            style: collect(&self.style_layers)?,
        })
    }

    /// Content layer names.
    #[must_use]
    pub fn content_layers(&self) -> &[String] {
        &self.content_layers
    }

    /// Style layer names.
    #[must_use]
    pub fn style_layers(&self) -> &[String] {
        &self.style_layers
    }

    /// Every layer name of the underlying stack.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.features.layer_names()
    }

    /// The frozen feature-stack parameters.
    #[must_use]
    pub fn frozen_parameters(&self) -> Vec<&Tensor> {
        self.features.parameters()
    }

    /// Element count of the frozen parameters.
    #[must_use]
    pub fn frozen_parameter_count(&self) -> usize {
        self.frozen_parameters().iter().map(|t| t.elem_count()).sum()
    }

    /// Device holding the feature stack.
    #[must_use]
    pub const fn device(&self) -> &Device {
        &self.device
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::OnceLock;

    use candle_core::DType;

    use super::*;
    use crate::domain::{default_content_layers, default_style_layers, Backbone};
    use crate::models::testing::{synthetic_weights, RecordingProvider};

    fn vgg_weights() -> &'static FrozenWeights {
        static WEIGHTS: OnceLock<FrozenWeights> = OnceLock::new();
        WEIGHTS.get_or_init(|| synthetic_weights(Backbone::Vgg19))
    }

    #[test]
    fn test_vgg19_builds_frozen_with_default_layers() {
        let model = StyleTransfer::new(&StyleTransferConfig::new("vgg19"), vgg_weights()).unwrap();
        assert_eq!(model.content_layers(), default_content_layers().as_slice());
        assert_eq!(model.style_layers(), default_style_layers().as_slice());
        assert_eq!(model.frozen_parameter_count(), 20_024_384);
        assert!(model.frozen_parameters().iter().all(|t| !t.is_variable()));
    }

    #[test]
    fn test_other_extractors_rejected_before_loading() {
        let provider = RecordingProvider::default();
        for name in ["resnet18", "resnet50", "vgg16"] {
            let err = StyleTransfer::from_provider(&StyleTransferConfig::new(name), &provider)
                .unwrap_err();
            assert!(err.is_invalid_configuration(), "{name}: {err}");
        }
        assert_eq!(provider.load_count(), 0);
    }

    #[test]
    fn test_unknown_layer_rejected() {
        let config = StyleTransferConfig::new("vgg19").with_style_layers(["conv_1", "conv_99"]);
        let err = StyleTransfer::new(&config, vgg_weights()).unwrap_err();
        assert!(err.is_invalid_configuration());
        assert!(err.to_string().contains("conv_99"));
    }

    #[test]
    fn test_extract_returns_taps_in_order() {
        let config = StyleTransferConfig::new("vgg19")
            .with_content_layers(["conv_4"])
            .with_style_layers(["relu_3", "conv_1", "pool_4"]);
        let model = StyleTransfer::new(&config, vgg_weights()).unwrap();

        let x = Tensor::zeros((2, 3, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let features = model.extract(&x).unwrap();

        assert_eq!(features.content.len(), 1);
        assert_eq!(features.content[0].0, "conv_4");
        assert_eq!(features.content[0].1.dims(), &[2, 128, 16, 16]);

        let style: Vec<(&str, Vec<usize>)> = features
            .style
            .iter()
            .map(|(n, t)| (n.as_str(), t.dims().to_vec()))
            .collect();
        assert_eq!(
            style,
            vec![
                ("relu_3", vec![2, 128, 16, 16]),
                ("conv_1", vec![2, 64, 32, 32]),
                ("pool_4", vec![2, 128, 8, 8]),
            ]
        );
    }

    #[test]
    fn test_shared_layer_tapped_for_both_roles() {
        let model = StyleTransfer::new(&StyleTransferConfig::new("vgg19"), vgg_weights()).unwrap();
        let x = Tensor::zeros((1, 3, 16, 16), DType::F32, &Device::Cpu).unwrap();
        let features = model.extract(&x).unwrap();
        assert_eq!(features.content[0].1.dims(), features.style[0].1.dims());
        assert_eq!(features.style.len(), 5);
    }
}
