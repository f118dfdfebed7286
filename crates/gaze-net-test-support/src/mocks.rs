//! Mock implementations of core port traits.

use std::sync::{Arc, Mutex, PoisonError};

use candle_core::Device;
use gaze_net_core::domain::ImageInfo;
use gaze_net_core::ports::{ImageSource, WeightsProvider};
use gaze_net_core::{Backbone, FrozenWeights};

use crate::weights::SyntheticWeights;

/// Mock implementation of `ImageSource` for testing.
///
/// Yields pre-built images and tracks iteration for assertions.
pub struct MockImageSource {
    images: Vec<ImageInfo>,
    iteration_count: Arc<Mutex<usize>>,
}

impl MockImageSource {
    /// Creates a new mock source with the given images.
    #[must_use]
    pub fn new(images: Vec<ImageInfo>) -> Self {
        Self {
            images,
            iteration_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates an empty mock source.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(vec![])
    }

    /// Returns the number of times the source has been iterated.
    #[must_use]
    pub fn iteration_count(&self) -> usize {
        *self
            .iteration_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ImageSource for MockImageSource {
    fn images(&self) -> Box<dyn Iterator<Item = anyhow::Result<ImageInfo>> + Send + '_> {
        let count = Arc::clone(&self.iteration_count);
        if let Ok(mut c) = count.lock() {
            *c += 1;
        }
        Box::new(self.images.iter().cloned().map(Ok))
    }

    fn count_hint(&self) -> Option<usize> {
        Some(self.images.len())
    }
}

/// Mock implementation of `WeightsProvider` for testing.
///
/// Serves synthetic weights for the backbones it is told to offer, fails
/// for the rest, and records every load request.
pub struct MockWeightsProvider {
    available: Vec<Backbone>,
    inner: SyntheticWeights,
    requests: Arc<Mutex<Vec<Backbone>>>,
}

impl MockWeightsProvider {
    /// Creates a provider offering every backbone.
    #[must_use]
    pub fn new() -> Self {
        Self::offering(&Backbone::ALL)
    }

    /// Creates a provider offering only `backbones`.
    #[must_use]
    pub fn offering(backbones: &[Backbone]) -> Self {
        Self {
            available: backbones.to_vec(),
            inner: SyntheticWeights::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns every requested backbone, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<Backbone> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of load requests.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests().len()
    }
}

impl Default for MockWeightsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightsProvider for MockWeightsProvider {
    fn load(&self, backbone: Backbone, device: &Device) -> anyhow::Result<FrozenWeights> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(backbone);
        if !self.available.contains(&backbone) {
            anyhow::bail!("Weights for {backbone} not found");
        }
        self.inner.load(backbone, device)
    }

    fn is_available(&self, backbone: Backbone) -> bool {
        self.available.contains(&backbone)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_image_source_empty() {
        let source = MockImageSource::empty();
        assert_eq!(source.count_hint(), Some(0));
        assert_eq!(source.images().count(), 0);
        assert_eq!(source.iteration_count(), 1);
    }

    #[test]
    fn test_mock_image_source_with_images() {
        let img = image::DynamicImage::new_rgb8(100, 100);
        let info = ImageInfo::new("test.jpg", img);
        let source = MockImageSource::new(vec![info]);

        assert_eq!(source.count_hint(), Some(1));
        assert_eq!(source.images().count(), 1);
    }

    #[test]
    fn test_mock_provider_records_and_fails_unavailable() {
        let provider = MockWeightsProvider::offering(&[Backbone::Resnet18]);
        assert!(provider.is_available(Backbone::Resnet18));
        assert!(!provider.is_available(Backbone::Vgg19));

        assert!(provider.load(Backbone::Vgg19, &Device::Cpu).is_err());
        assert!(provider.load(Backbone::Resnet18, &Device::Cpu).is_ok());
        assert_eq!(provider.requests(), vec![Backbone::Vgg19, Backbone::Resnet18]);
    }
}
