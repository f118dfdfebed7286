//! ResNet feature extractor.
//!
//! Implements the torchvision ResNet-18 and ResNet-50 bodies (stem plus the
//! four residual stages) so that torchvision/timm weights load by name. The
//! global pooling and classification layer are left to the caller.

use candle_core::{Module, Tensor};
use candle_nn::{batch_norm, conv2d_no_bias, BatchNorm, Conv2d, Conv2dConfig, VarBuilder};

use crate::domain::Backbone;

/// Batch norm epsilon used by torchvision.
const BN_EPS: f64 = 1e-5;

/// Channel widths of the four residual stages.
const STAGE_PLANES: [usize; 4] = [64, 128, 256, 512];

/// A convolution followed by an inference-mode batch norm.
struct ConvBn {
    conv: Conv2d,
    bn: BatchNorm,
}

impl ConvBn {
    #[allow(clippy::too_many_arguments)]
    fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        conv_vb: VarBuilder,
        bn_vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let conv = conv2d_no_bias(
            in_channels,
            out_channels,
            kernel_size,
            Conv2dConfig {
                stride,
                padding,
                ..Conv2dConfig::default()
            },
            conv_vb,
        )?;
        let bn = batch_norm(out_channels, BN_EPS, bn_vb)?;
        Ok(Self { conv, bn })
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = vec![self.conv.weight()];
        if let Some((weight, bias)) = self.bn.weight_and_bias() {
            params.push(weight);
            params.push(bias);
        }
        params
    }
}

impl Module for ConvBn {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        // Backbone weights are frozen, so batch norm always uses running stats
        self.conv.forward(x)?.apply_t(&self.bn, false)
    }
}

/// Residual block: basic (two 3x3 convs) or bottleneck (1x1, 3x3, 1x1).
struct Block {
    convs: Vec<ConvBn>,
    downsample: Option<ConvBn>,
}

impl Block {
    fn basic(
        in_channels: usize,
        planes: usize,
        stride: usize,
        vb: &VarBuilder,
    ) -> candle_core::Result<Self> {
        let convs = vec![
            ConvBn::new(in_channels, planes, 3, stride, 1, vb.pp("conv1"), vb.pp("bn1"))?,
            ConvBn::new(planes, planes, 3, 1, 1, vb.pp("conv2"), vb.pp("bn2"))?,
        ];
        let downsample = Self::downsample(in_channels, planes, stride, vb)?;
        Ok(Self { convs, downsample })
    }

    fn bottleneck(
        in_channels: usize,
        planes: usize,
        stride: usize,
        vb: &VarBuilder,
    ) -> candle_core::Result<Self> {
        let out_channels = planes * 4;
        // torchvision v1.5: the stride sits on the 3x3 conv
        let convs = vec![
            ConvBn::new(in_channels, planes, 1, 1, 0, vb.pp("conv1"), vb.pp("bn1"))?,
            ConvBn::new(planes, planes, 3, stride, 1, vb.pp("conv2"), vb.pp("bn2"))?,
            ConvBn::new(planes, out_channels, 1, 1, 0, vb.pp("conv3"), vb.pp("bn3"))?,
        ];
        let downsample = Self::downsample(in_channels, out_channels, stride, vb)?;
        Ok(Self { convs, downsample })
    }

    fn downsample(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        vb: &VarBuilder,
    ) -> candle_core::Result<Option<ConvBn>> {
        if stride == 1 && in_channels == out_channels {
            return Ok(None);
        }
        let vb = vb.pp("downsample");
        ConvBn::new(in_channels, out_channels, 1, stride, 0, vb.pp("0"), vb.pp("1")).map(Some)
    }

    fn parameters(&self) -> impl Iterator<Item = &Tensor> {
        self.convs
            .iter()
            .chain(self.downsample.iter())
            .flat_map(ConvBn::parameters)
    }
}

impl Module for Block {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let last = self.convs.len() - 1;
        let mut h = x.clone();
        for (i, conv) in self.convs.iter().enumerate() {
            h = conv.forward(&h)?;
            if i < last {
                h = h.relu()?;
            }
        }

        let residual = match &self.downsample {
            Some(ds) => ds.forward(x)?,
            None => x.clone(),
        };

        (h + residual)?.relu()
    }
}

/// ResNet body producing an `(N, C, H/32, W/32)` feature map.
pub struct ResNet {
    stem: ConvBn,
    stages: Vec<Vec<Block>>,
    out_channels: usize,
}

impl ResNet {
    /// Builds ResNet-18 (basic blocks, `[2, 2, 2, 2]`).
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has the wrong shape.
    pub fn resnet18(vb: VarBuilder) -> candle_core::Result<Self> {
        Self::build(&vb, [2, 2, 2, 2], false)
    }

    /// Builds ResNet-50 (bottleneck blocks, `[3, 4, 6, 3]`).
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has the wrong shape.
    pub fn resnet50(vb: VarBuilder) -> candle_core::Result<Self> {
        Self::build(&vb, [3, 4, 6, 3], true)
    }

    /// Builds the body for a residual backbone.
    ///
    /// # Errors
    ///
    /// Returns an error if `backbone` is not a ResNet or a weight cannot be read.
    pub fn for_backbone(backbone: Backbone, vb: VarBuilder) -> candle_core::Result<Self> {
        match backbone {
            Backbone::Resnet18 => Self::resnet18(vb),
            Backbone::Resnet50 => Self::resnet50(vb),
            other => candle_core::bail!("{other} is not a ResNet backbone"),
        }
    }

    fn build(vb: &VarBuilder, depths: [usize; 4], bottleneck: bool) -> candle_core::Result<Self> {
        let stem = ConvBn::new(3, 64, 7, 2, 3, vb.pp("conv1"), vb.pp("bn1"))?;
        let expansion = if bottleneck { 4 } else { 1 };

        let mut in_channels = 64;
        let mut stages = Vec::with_capacity(depths.len());
        for (idx, (&depth, &planes)) in depths.iter().zip(STAGE_PLANES.iter()).enumerate() {
            let stage_vb = vb.pp(format!("layer{}", idx + 1));
            let first_stride = if idx == 0 { 1 } else { 2 };

            let mut blocks = Vec::with_capacity(depth);
            for b in 0..depth {
                let stride = if b == 0 { first_stride } else { 1 };
                let block_vb = stage_vb.pp(b.to_string());
                let block = if bottleneck {
                    Block::bottleneck(in_channels, planes, stride, &block_vb)?
                } else {
                    Block::basic(in_channels, planes, stride, &block_vb)?
                };
                blocks.push(block);
                in_channels = planes * expansion;
            }
            stages.push(blocks);
        }

        Ok(Self {
            stem,
            stages,
            out_channels: in_channels,
        })
    }

    /// Channel count of the output feature map.
    #[must_use]
    pub const fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Learnable tensors (conv weights, batch norm affine terms).
    ///
    /// Batch norm running statistics are buffers and are not included.
    #[must_use]
    pub fn parameters(&self) -> Vec<&Tensor> {
        self.stem
            .parameters()
            .into_iter()
            .chain(self.stages.iter().flatten().flat_map(Block::parameters))
            .collect()
    }
}

impl Module for ResNet {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        // Stem: 7x7/2 conv, then 3x3/2 max pool with padding 1.
        // Zero padding is equivalent to -inf padding after the ReLU.
        let mut h = self
            .stem
            .forward(x)?
            .relu()?
            .pad_with_zeros(2, 1, 1)?
            .pad_with_zeros(3, 1, 1)?
            .max_pool2d_with_stride(3, 2)?;

        for block in self.stages.iter().flatten() {
            h = block.forward(&h)?;
        }
        Ok(h)
    }
}
