//! Model definitions.
//!
//! - [`ResNet`] / [`VggFeatures`]: pretrained backbone architectures
//! - [`GazeNet`]: frozen ResNet + trainable gaze head
//! - [`StyleTransfer`]: frozen VGG-19 with content/style taps

mod gaze_net;
mod resnet;
mod style_transfer;
mod vgg;

pub use gaze_net::GazeNet;
pub use resnet::ResNet;
pub use style_transfer::{StyleFeatures, StyleTransfer};
pub use vgg::VggFeatures;

#[cfg(test)]
pub(crate) mod testing {
    //! Randomly initialised stand-ins for pretrained weights.
    //!
    //! Mirrors `gaze_net_test_support::synthetic_weights`. Unit tests cannot
    //! use that crate: it links a second copy of this one, whose
    //! `FrozenWeights` is a different type.

    use std::sync::{Mutex, PoisonError};

    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};

    use super::{ResNet, VggFeatures};
    use crate::domain::Backbone;
    use crate::inference::FrozenWeights;
    use crate::ports::WeightsProvider;

    /// Builds a weight set with the names and shapes of `backbone`.
    #[allow(clippy::expect_used)]
    pub fn synthetic_weights(backbone: Backbone) -> FrozenWeights {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        match backbone {
            Backbone::Vgg19 => {
                VggFeatures::vgg19(vb.pp("features")).expect("build vgg19");
            }
            other => {
                ResNet::for_backbone(other, vb).expect("build resnet");
            }
        }
        let tensors = varmap
            .data()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, var)| (name.clone(), var.as_tensor().clone()))
            .collect();
        FrozenWeights::from_tensors(tensors).expect("freeze synthetic weights")
    }

    /// Provider serving synthetic weights and recording each request.
    #[derive(Default)]
    pub struct RecordingProvider {
        loaded: Mutex<Vec<Backbone>>,
    }

    impl RecordingProvider {
        pub fn loaded(&self) -> Vec<Backbone> {
            self.loaded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn load_count(&self) -> usize {
            self.loaded().len()
        }
    }

    impl WeightsProvider for RecordingProvider {
        fn load(&self, backbone: Backbone, device: &Device) -> anyhow::Result<FrozenWeights> {
            self.loaded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(backbone);
            Ok(synthetic_weights(backbone).to_device(device)?)
        }

        fn is_available(&self, _backbone: Backbone) -> bool {
            true
        }
    }
}
