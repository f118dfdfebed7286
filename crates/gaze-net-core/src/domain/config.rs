//! Model configuration.
//!
//! Both configurations deserialize from the `[gaze]` and `[style]` sections of
//! the TOML config file. The backbone is kept as a free-form name so that an
//! unsupported value is reported by the model constructor rather than by the
//! config parser.

use serde::{Deserialize, Serialize};

use super::Backbone;
use crate::error::{Error, Result};

/// Default embedding width produced by the replaced final layer.
pub const DEFAULT_HEAD_FEAT_IN: usize = 128;

/// Content taps used when `content_layers` is omitted.
#[must_use]
pub fn default_content_layers() -> Vec<String> {
    vec!["conv_1".to_string()]
}

/// Style taps used when `style_layers` is omitted.
#[must_use]
pub fn default_style_layers() -> Vec<String> {
    (1..=5).map(|i| format!("conv_{i}")).collect()
}

const fn default_head_feat_in() -> usize {
    DEFAULT_HEAD_FEAT_IN
}

fn default_gaze_extractor() -> String {
    Backbone::Resnet18.name().to_string()
}

fn default_style_extractor() -> String {
    Backbone::Vgg19.name().to_string()
}

/// Configuration for the gaze regressor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazeNetConfig {
    /// Backbone name: `resnet18` or `resnet50`.
    #[serde(default = "default_gaze_extractor")]
    pub feature_extractor: String,
    /// Width of the embedding fed into the gaze head.
    #[serde(default = "default_head_feat_in")]
    pub head_feat_in: usize,
    /// Place the model on a GPU when one is available.
    #[serde(default)]
    pub use_gpu: bool,
}

impl Default for GazeNetConfig {
    fn default() -> Self {
        Self {
            feature_extractor: default_gaze_extractor(),
            head_feat_in: DEFAULT_HEAD_FEAT_IN,
            use_gpu: false,
        }
    }
}

impl GazeNetConfig {
    /// Creates a CPU configuration for the given backbone and embedding width.
    #[must_use]
    pub fn new(feature_extractor: impl Into<String>, head_feat_in: usize) -> Self {
        Self {
            feature_extractor: feature_extractor.into(),
            head_feat_in,
            use_gpu: false,
        }
    }

    /// Requests GPU placement.
    #[must_use]
    pub const fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    /// Resolves the backbone and checks the embedding width.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the extractor is not a ResNet
    /// or `head_feat_in` is zero.
    pub fn validate(&self) -> Result<Backbone> {
        let backbone: Backbone = self.feature_extractor.parse()?;
        if !backbone.is_resnet() {
            return Err(Error::InvalidConfiguration(format!(
                "feature extractor '{backbone}' is not supported by GazeNet (expected resnet18 or resnet50)"
            )));
        }
        if self.head_feat_in == 0 {
            return Err(Error::InvalidConfiguration(
                "head_feat_in must be a positive integer".to_string(),
            ));
        }
        Ok(backbone)
    }
}

/// Configuration for the style feature extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleTransferConfig {
    /// Backbone name; only `vgg19` is supported.
    #[serde(default = "default_style_extractor")]
    pub feature_extractor: String,
    /// Layers whose activations carry content.
    #[serde(default = "default_content_layers")]
    pub content_layers: Vec<String>,
    /// Layers whose activations carry style.
    #[serde(default = "default_style_layers")]
    pub style_layers: Vec<String>,
    /// Place the model on a GPU when one is available.
    #[serde(default)]
    pub use_gpu: bool,
}

impl Default for StyleTransferConfig {
    fn default() -> Self {
        Self::new(default_style_extractor())
    }
}

impl StyleTransferConfig {
    /// Creates a configuration with the default content and style layers.
    #[must_use]
    pub fn new(feature_extractor: impl Into<String>) -> Self {
        Self {
            feature_extractor: feature_extractor.into(),
            content_layers: default_content_layers(),
            style_layers: default_style_layers(),
            use_gpu: false,
        }
    }

    /// Replaces the content layers.
    #[must_use]
    pub fn with_content_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_layers = layers.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the style layers.
    #[must_use]
    pub fn with_style_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.style_layers = layers.into_iter().map(Into::into).collect();
        self
    }

    /// Requests GPU placement.
    #[must_use]
    pub const fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    /// Resolves the backbone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for anything other than `vgg19`.
    pub fn validate(&self) -> Result<Backbone> {
        let backbone: Backbone = self.feature_extractor.parse()?;
        if backbone != Backbone::Vgg19 {
            return Err(Error::InvalidConfiguration(format!(
                "feature extractor '{backbone}' is not supported by StyleTransfer (expected vgg19)"
            )));
        }
        Ok(backbone)
    }
}
