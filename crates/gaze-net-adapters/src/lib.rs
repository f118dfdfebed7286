//! Gaze Net Adapters - External adapters for gaze-net.
//!
//! This crate provides adapters for:
//! - Filesystem image source
//! - Pretrained model downloading, caching and loading

pub mod fs;
pub mod models;

pub use fs::FsImageSource;
pub use models::{default_models_dir, ModelInfo, ModelStore, ProgressCallback, MODELS};
