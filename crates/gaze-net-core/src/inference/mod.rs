//! Inference plumbing using Candle.
//!
//! Provides device selection, safetensors loading into frozen weight sets,
//! and image-to-tensor preprocessing for the backbones.

mod device;
mod loader;
pub mod preprocess;
mod weights;

pub use device::{device_label, select_device};
pub use loader::load_safetensors;
pub use preprocess::{image_to_tensor, stack_batch, IMAGENET_MEAN, IMAGENET_STD};
pub use weights::FrozenWeights;
