//! Gaze Net Core - model definitions on top of frozen pretrained backbones.
//!
//! This crate contains the configuration types, the pretrained-weights port,
//! the candle inference helpers, and the two model compositions:
//! a gaze-direction regressor (`GazeNet`) and a style feature extractor
//! (`StyleTransfer`).

pub mod domain;
mod error;
pub mod inference;
pub mod models;
pub mod ports;

pub use domain::{Backbone, GazeNetConfig, ImageInfo, StyleTransferConfig};
pub use error::{Error, Result};
pub use inference::{select_device, FrozenWeights};
pub use models::{GazeNet, StyleFeatures, StyleTransfer};
pub use ports::{ImageSource, WeightsProvider};
