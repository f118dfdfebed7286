//! Test support utilities for gaze-net.
//!
//! Provides synthetic pretrained weights, mock ports and synthetic image
//! builders so models can be exercised without downloading real weights.
//!
//! # Example
//!
//! ```
//! use gaze_net_core::{Backbone, GazeNet, GazeNetConfig};
//! use gaze_net_test_support::SyntheticWeights;
//!
//! let provider = SyntheticWeights::new();
//! let model = GazeNet::from_provider(&GazeNetConfig::new("resnet18", 8), &provider).unwrap();
//! assert_eq!(model.backbone(), Backbone::Resnet18);
//! ```

mod builders;
mod mocks;
mod weights;

pub use builders::SyntheticImageBuilder;
pub use mocks::{MockImageSource, MockWeightsProvider};
pub use weights::{install_synthetic_weights, synthetic_weights, weights_filename, SyntheticWeights};
