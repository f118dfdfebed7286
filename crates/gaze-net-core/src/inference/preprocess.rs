//! Image preprocessing for the ImageNet-trained backbones.

// Allow common image code patterns
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use candle_core::{DType, Device, Tensor};
use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::{Error, Result};

/// Per-channel mean of the ImageNet training set (RGB).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel standard deviation of the ImageNet training set (RGB).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Converts an image into a normalized `(3, height, width)` tensor.
///
/// The image is converted to RGB, optionally resized to `size`
/// (`(width, height)`), scaled to `[0, 1]` and normalized with the ImageNet
/// statistics.
///
/// # Errors
///
/// Returns an error if the image is empty or tensor creation fails.
pub fn image_to_tensor(
    image: &DynamicImage,
    size: Option<(u32, u32)>,
    device: &Device,
) -> Result<Tensor> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::InvalidInput("image has zero width or height".to_string()));
    }

    let image = match size {
        Some((w, h)) if (w, h) != (image.width(), image.height()) => {
            image.resize_exact(w, h, FilterType::Triangle)
        }
        _ => image.clone(),
    };

    let rgb = image.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);

    let mean = Tensor::new(&IMAGENET_MEAN, device)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&IMAGENET_STD, device)?.reshape((3, 1, 1))?;

    let tensor = Tensor::from_vec(rgb.into_raw(), (height, width, 3), device)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?;
    let tensor = (tensor / 255.0)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)?;
    Ok(tensor)
}

/// Stacks `(3, H, W)` tensors into an `(N, 3, H, W)` batch.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `images` is empty or the tensors do not
/// share a shape.
pub fn stack_batch(images: &[Tensor]) -> Result<Tensor> {
    let Some(first) = images.first() else {
        return Err(Error::InvalidInput("cannot build an empty batch".to_string()));
    };
    if let Some(other) = images.iter().find(|t| t.dims() != first.dims()) {
        return Err(Error::InvalidInput(format!(
            "batch images must share a shape, got {:?} and {:?}",
            first.dims(),
            other.dims()
        )));
    }
    Ok(Tensor::stack(images, 0)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    #[test]
    fn test_tensor_shape_is_chw() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(6, 4));
        let t = image_to_tensor(&img, None, &Device::Cpu).unwrap();
        assert_eq!(t.dims(), &[3, 4, 6]);
    }

    #[test]
    fn test_resize_applies_width_then_height() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let t = image_to_tensor(&img, Some((8, 5)), &Device::Cpu).unwrap();
        assert_eq!(t.dims(), &[3, 5, 8]);
    }

    #[test]
    fn test_normalization_of_mean_colour_is_zero() {
        let px = IMAGENET_MEAN.map(|m| (m * 255.0).round() as u8);
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb(px)));
        let t = image_to_tensor(&img, None, &Device::Cpu).unwrap();
        let max = t.abs().unwrap().flatten_all().unwrap().max(0).unwrap().to_scalar::<f32>().unwrap();
        assert!(max < 0.01, "expected near-zero tensor, got max {max}");
    }

    #[test]
    fn test_white_pixel_red_channel() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 255, 255])));
        let t = image_to_tensor(&img, None, &Device::Cpu).unwrap();
        let red = t.flatten_all().unwrap().to_vec1::<f32>().unwrap()[0];
        let expected = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((red - expected).abs() < 1e-5);
    }

    #[test]
    fn test_empty_image_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 3));
        assert!(matches!(
            image_to_tensor(&img, None, &Device::Cpu),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_stack_batch() {
        let a = Tensor::zeros((3, 4, 4), DType::F32, &Device::Cpu).unwrap();
        let b = Tensor::ones((3, 4, 4), DType::F32, &Device::Cpu).unwrap();
        let batch = stack_batch(&[a, b]).unwrap();
        assert_eq!(batch.dims(), &[2, 3, 4, 4]);
    }

    #[test]
    fn test_stack_batch_rejects_mixed_shapes() {
        let a = Tensor::zeros((3, 4, 4), DType::F32, &Device::Cpu).unwrap();
        let b = Tensor::zeros((3, 4, 5), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(stack_batch(&[a, b]), Err(Error::InvalidInput(_))));
        assert!(matches!(stack_batch(&[]), Err(Error::InvalidInput(_))));
    }
}
