//! VGG-19 convolutional feature stack.
//!
//! Mirrors torchvision's `vgg19().features`: sixteen 3x3 convolutions, each
//! followed by a ReLU, with 2x2 max pooling closing each of the five blocks.
//! Weights are read from `<prefix>.<index>.weight` / `.bias` using torchvision's
//! sequential indices.
//!
//! Layers are also addressable by name: `conv_i`, `relu_i` and `pool_i`, where
//! `i` counts convolutions seen so far (1-based).

use std::collections::HashMap;

use candle_core::{Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};

/// Layer configuration: output channels per conv, `None` for max pooling.
const VGG19_CFG: [Option<usize>; 21] = [
    Some(64),
    Some(64),
    None,
    Some(128),
    Some(128),
    None,
    Some(256),
    Some(256),
    Some(256),
    Some(256),
    None,
    Some(512),
    Some(512),
    Some(512),
    Some(512),
    None,
    Some(512),
    Some(512),
    Some(512),
    Some(512),
    None,
];

enum Layer {
    Conv(Conv2d),
    Relu,
    Pool,
}

impl Module for Layer {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Conv(conv) => conv.forward(x),
            Self::Relu => x.relu(),
            Self::Pool => x.max_pool2d(2),
        }
    }
}

/// The VGG-19 feature stack with named layers.
pub struct VggFeatures {
    layers: Vec<(String, Layer)>,
}

impl VggFeatures {
    /// Builds the stack from `vb`, which should point at the `features` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has the wrong shape.
    pub fn vgg19(vb: VarBuilder) -> candle_core::Result<Self> {
        let mut layers = Vec::with_capacity(37);
        let mut in_channels = 3;
        let mut conv_count = 0;

        for entry in VGG19_CFG {
            let index = layers.len();
            match entry {
                Some(out_channels) => {
                    conv_count += 1;
                    let conv = conv2d(
                        in_channels,
                        out_channels,
                        3,
                        Conv2dConfig {
                            padding: 1,
                            ..Conv2dConfig::default()
                        },
                        vb.pp(index.to_string()),
                    )?;
                    layers.push((format!("conv_{conv_count}"), Layer::Conv(conv)));
                    layers.push((format!("relu_{conv_count}"), Layer::Relu));
                    in_channels = out_channels;
                }
                None => layers.push((format!("pool_{conv_count}"), Layer::Pool)),
            }
        }

        Ok(Self { layers })
    }

    /// Layer names in execution order.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|(name, _)| name.as_str())
    }

    /// Position of a named layer in the stack.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|(n, _)| n == name)
    }

    /// Convolution weights and biases.
    #[must_use]
    pub fn parameters(&self) -> Vec<&Tensor> {
        self.layers
            .iter()
            .filter_map(|(_, layer)| match layer {
                Layer::Conv(conv) => Some(conv),
                _ => None,
            })
            .flat_map(|conv| std::iter::once(conv.weight()).chain(conv.bias()))
            .collect()
    }

    /// Runs `x` through the stack and returns the activations of the named
    /// layers. Evaluation stops after the deepest requested layer.
    ///
    /// Names that are not part of the stack are ignored; callers validate
    /// them up front with [`VggFeatures::position`].
    ///
    /// # Errors
    ///
    /// Returns an error if a tensor operation fails (for example on an input
    /// that does not have three channels).
    pub fn activations(
        &self,
        x: &Tensor,
        names: &[&str],
    ) -> candle_core::Result<HashMap<String, Tensor>> {
        let Some(last) = names.iter().filter_map(|n| self.position(n)).max() else {
            return Ok(HashMap::new());
        };

        let mut taps = HashMap::with_capacity(names.len());
        let mut h = x.clone();
        for (name, layer) in &self.layers[..=last] {
            h = layer.forward(&h)?;
            if names.contains(&name.as_str()) {
                taps.insert(name.clone(), h.clone());
            }
        }
        Ok(taps)
    }
}

impl Module for VggFeatures {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        self.layers
            .iter()
            .try_fold(x.clone(), |h, (_, layer)| layer.forward(&h))
    }
}
