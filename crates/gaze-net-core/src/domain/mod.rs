//! Core domain types: backbone names, model configuration and image records.

mod backbone;
mod config;
mod image;

pub use backbone::Backbone;
pub use config::{
    default_content_layers, default_style_layers, GazeNetConfig, StyleTransferConfig,
    DEFAULT_HEAD_FEAT_IN,
};
pub use image::ImageInfo;
