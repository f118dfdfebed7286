//! Frozen weight sets.
//!
//! Pretrained tensors are held as plain (non-variable) tensors, so nothing
//! built from them can ever show up in an optimizer's variable list.

use std::collections::HashMap;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

/// An immutable, named collection of pretrained tensors.
#[derive(Debug, Clone, Default)]
pub struct FrozenWeights {
    tensors: HashMap<String, Tensor>,
}

impl FrozenWeights {
    /// Freezes a tensor map.
    ///
    /// Variables are copied into fresh storage so later optimizer steps on
    /// the source cannot reach the frozen copy.
    ///
    /// # Errors
    ///
    /// Returns an error if copying a variable fails.
    pub fn from_tensors(tensors: HashMap<String, Tensor>) -> candle_core::Result<Self> {
        let tensors = tensors
            .into_iter()
            .map(|(name, tensor)| {
                let tensor = if tensor.is_variable() {
                    tensor.copy()?
                } else {
                    tensor
                };
                Ok((name, tensor.detach()))
            })
            .collect::<candle_core::Result<_>>()?;
        Ok(Self { tensors })
    }

    /// Number of named tensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Returns true if the set holds no tensors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Looks up a tensor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Iterates over `(name, tensor)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.tensors.iter().map(|(name, t)| (name.as_str(), t))
    }

    /// Tensor names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Total element count across all tensors.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.tensors.values().map(Tensor::elem_count).sum()
    }

    /// Copies every tensor onto `device`. Tensors already there are shared.
    ///
    /// # Errors
    ///
    /// Returns an error if a transfer fails.
    pub fn to_device(&self, device: &Device) -> candle_core::Result<Self> {
        let tensors = self
            .tensors
            .iter()
            .map(|(name, t)| Ok((name.clone(), t.to_device(device)?)))
            .collect::<candle_core::Result<_>>()?;
        Ok(Self { tensors })
    }

    /// Builds a read-only `VarBuilder` over the frozen tensors.
    #[must_use]
    pub fn var_builder(&self, device: &Device) -> VarBuilder<'static> {
        VarBuilder::from_tensors(self.tensors.clone(), DType::F32, device)
    }

    /// Consumes the set, returning the underlying tensor map.
    #[must_use]
    pub fn into_tensors(self) -> HashMap<String, Tensor> {
        self.tensors
    }
}
