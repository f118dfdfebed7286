//! Synthetic image builders for testing.

// Allow common image code patterns
#![allow(clippy::cast_possible_truncation)]

use candle_core::{DType, Device, Tensor};
use gaze_net_core::domain::ImageInfo;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// Builder for creating synthetic test images and input batches.
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    // === Images ===

    /// Creates a high-contrast checkerboard pattern.
    #[must_use]
    pub fn checkerboard(width: u32, height: u32) -> ImageInfo {
        Self::checkerboard_with_cell_size(width, height, 8)
    }

    /// Creates a checkerboard with custom cell size.
    #[must_use]
    pub fn checkerboard_with_cell_size(width: u32, height: u32, cell_size: u32) -> ImageInfo {
        let img = GrayImage::from_fn(width, height, |x, y| {
            if (x / cell_size + y / cell_size) % 2 == 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        ImageInfo::new("synthetic://checkerboard", DynamicImage::ImageLuma8(img))
    }

    /// Creates a uniform gray image.
    #[must_use]
    pub fn uniform_gray(width: u32, height: u32, value: u8) -> ImageInfo {
        let img = GrayImage::from_fn(width, height, |_, _| Luma([value]));
        ImageInfo::new("synthetic://uniform_gray", DynamicImage::ImageLuma8(img))
    }

    /// Creates a smooth horizontal gradient.
    #[must_use]
    pub fn horizontal_gradient(width: u32, height: u32) -> ImageInfo {
        let img = GrayImage::from_fn(width, height, |x, _| {
            let val = ((u32::from(u8::MAX) * x) / width.max(1)) as u8;
            Luma([val])
        });
        ImageInfo::new("synthetic://horizontal_gradient", DynamicImage::ImageLuma8(img))
    }

    /// Creates a uniform RGB image.
    #[must_use]
    pub fn rgb_uniform(width: u32, height: u32, r: u8, g: u8, b: u8) -> ImageInfo {
        let img = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
        ImageInfo::new("synthetic://rgb_uniform", DynamicImage::ImageRgb8(img))
    }

    /// Creates a dark image with a bright blob, a crude stand-in for an eye
    /// looking towards `(cx, cy)` (normalized coordinates).
    #[must_use]
    pub fn pupil(width: u32, height: u32, cx: f32, cy: f32) -> ImageInfo {
        let px = cx.clamp(0.0, 1.0) * width as f32;
        let py = cy.clamp(0.0, 1.0) * height as f32;
        let radius = (width.min(height) as f32 / 8.0).max(1.0);
        let img = RgbImage::from_fn(width, height, |x, y| {
            let d = (x as f32 - px).hypot(y as f32 - py);
            if d <= radius {
                Rgb([230, 230, 230])
            } else {
                Rgb([20, 20, 20])
            }
        });
        ImageInfo::new("synthetic://pupil", DynamicImage::ImageRgb8(img))
    }

    // === Tensors ===

    /// Creates an all-zero `(batch, 3, height, width)` input batch.
    ///
    /// # Errors
    ///
    /// Returns an error if tensor creation fails.
    pub fn zero_batch(batch: usize, height: usize, width: usize) -> candle_core::Result<Tensor> {
        Tensor::zeros((batch, 3, height, width), DType::F32, &Device::Cpu)
    }

    /// Creates a uniform random `(batch, 3, height, width)` input batch in `[0, 1)`.
    ///
    /// # Errors
    ///
    /// Returns an error if tensor creation fails.
    pub fn random_batch(batch: usize, height: usize, width: usize) -> candle_core::Result<Tensor> {
        Tensor::rand(0f32, 1f32, (batch, 3, height, width), &Device::Cpu)
    }
}
