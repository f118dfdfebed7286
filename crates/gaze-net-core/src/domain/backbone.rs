//! Supported pretrained feature extractors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A pretrained feature extractor known to the model store.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backbone {
    /// ResNet-18 (basic blocks, 512-wide embedding).
    Resnet18,
    /// ResNet-50 (bottleneck blocks, 2048-wide embedding).
    Resnet50,
    /// VGG-19 convolutional feature stack.
    Vgg19,
}

impl Backbone {
    /// Every supported backbone, in model-store order.
    pub const ALL: [Self; 3] = [Self::Resnet18, Self::Resnet50, Self::Vgg19];

    /// Canonical configuration name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Resnet18 => "resnet18",
            Self::Resnet50 => "resnet50",
            Self::Vgg19 => "vgg19",
        }
    }

    /// Channel count of the final feature map, i.e. the input width of the
    /// classification layer this backbone originally carried.
    #[must_use]
    pub const fn feature_dim(self) -> usize {
        match self {
            Self::Resnet18 | Self::Vgg19 => 512,
            Self::Resnet50 => 2048,
        }
    }

    /// Returns true for the residual backbones usable by `GazeNet`.
    #[must_use]
    pub const fn is_resnet(self) -> bool {
        matches!(self, Self::Resnet18 | Self::Resnet50)
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backbone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "unknown feature extractor '{s}' (expected one of: resnet18, resnet50, vgg19)"
                ))
            })
    }
}
