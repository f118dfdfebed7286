//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the model core and external adapters.

mod image_source;
mod weights;

pub use image_source::ImageSource;
pub use weights::WeightsProvider;
