//! Pretrained weights port.

use candle_core::Device;

use crate::domain::Backbone;
use crate::inference::FrozenWeights;

/// Supplies frozen pretrained weights for a backbone.
///
/// Tensor names follow the torchvision layout (`conv1.weight`,
/// `layer1.0.bn1.running_mean`, `features.0.bias`, ...).
pub trait WeightsProvider: Send + Sync {
    /// Loads the weights for `backbone` onto `device`.
    ///
    /// # Errors
    ///
    /// Returns an error if the weights are missing or cannot be decoded.
    fn load(&self, backbone: Backbone, device: &Device) -> anyhow::Result<FrozenWeights>;

    /// Returns true if weights for `backbone` can be loaded without a download.
    fn is_available(&self, backbone: Backbone) -> bool;
}
