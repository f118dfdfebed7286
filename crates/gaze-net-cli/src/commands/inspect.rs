//! Inspect command - build a model and run a probe batch through it.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use candle_core::{DType, Device, Module, Tensor};
use clap::{Args, Subcommand};
use gaze_net_adapters::FsImageSource;
use gaze_net_core::domain::{default_content_layers, default_style_layers, DEFAULT_HEAD_FEAT_IN};
use gaze_net_core::inference::{device_label, image_to_tensor, stack_batch};
use gaze_net_core::{
    Backbone, GazeNet, GazeNetConfig, ImageSource, StyleTransfer, StyleTransferConfig,
    WeightsProvider,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::Context;
use crate::output::{timestamp, JsonOutput};

/// Default probe resolution.
const DEFAULT_SIZE: u32 = 224;

/// Arguments for the inspect command
#[derive(Args)]
pub struct InspectArgs {
    #[command(subcommand)]
    pub command: InspectCommand,
}

/// Inspect subcommands
#[derive(Subcommand)]
pub enum InspectCommand {
    /// Build a GazeNet and report parameter counts and gaze outputs
    Gaze(GazeArgs),
    /// Build a StyleTransfer extractor and report tap shapes
    Style(StyleArgs),
}

/// Probe input resolution.
#[derive(Args, Clone, Copy)]
pub struct ProbeSize {
    /// Probe height in pixels (images are resized to it)
    #[arg(long, default_value_t = DEFAULT_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Probe width in pixels (images are resized to it)
    #[arg(long, default_value_t = DEFAULT_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,
}

/// GPU placement flags. Unset means "defer to the config file".
#[derive(Args, Clone, Copy)]
pub struct GpuFlags {
    /// Place the model on a GPU when one is available
    #[arg(long, overrides_with = "no_gpu")]
    pub gpu: bool,

    /// Keep the model on the CPU even if the config requests a GPU
    #[arg(long, overrides_with = "gpu")]
    pub no_gpu: bool,
}

impl GpuFlags {
    /// Resolves placement: CLI > config file > CPU.
    fn resolve(self, config: Option<bool>) -> bool {
        if self.gpu {
            true
        } else if self.no_gpu {
            false
        } else {
            config.unwrap_or(false)
        }
    }
}

/// Arguments for `inspect gaze`.
#[derive(Args, Clone)]
pub struct GazeArgs {
    /// Images or directories to run through the model (a zero batch when omitted)
    pub images: Vec<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Backbone (resnet18 or resnet50)
    #[arg(long, value_name = "NAME")]
    pub feature_extractor: Option<String>,

    /// Embedding width between the backbone and the head
    #[arg(long, value_name = "N")]
    pub head_feat_in: Option<usize>,

    #[command(flatten)]
    pub gpu: GpuFlags,

    #[command(flatten)]
    pub size: ProbeSize,

    /// Number of zero images in the probe batch (ignored when images are given)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch: u32,
}

impl GazeArgs {
    /// Resolves the model configuration: CLI > config file > defaults.
    fn model_config(&self, ctx: &Context) -> GazeNetConfig {
        let section = &ctx.config.gaze;
        let feature_extractor = self
            .feature_extractor
            .clone()
            .or_else(|| section.feature_extractor.clone())
            .unwrap_or_else(|| GazeNetConfig::default().feature_extractor);
        let head_feat_in = self
            .head_feat_in
            .or(section.head_feat_in)
            .unwrap_or(DEFAULT_HEAD_FEAT_IN);
        let use_gpu = self.gpu.resolve(section.use_gpu);

        GazeNetConfig::new(feature_extractor, head_feat_in).with_gpu(use_gpu)
    }
}

/// Arguments for `inspect style`.
#[derive(Args, Clone)]
pub struct StyleArgs {
    /// Content tap layer (repeatable, e.g. conv_4)
    #[arg(long = "content-layer", value_name = "LAYER")]
    pub content_layers: Vec<String>,

    /// Style tap layer (repeatable, e.g. relu_1)
    #[arg(long = "style-layer", value_name = "LAYER")]
    pub style_layers: Vec<String>,

    #[command(flatten)]
    pub gpu: GpuFlags,

    #[command(flatten)]
    pub size: ProbeSize,
}

impl StyleArgs {
    /// Resolves the model configuration: CLI > config file > defaults.
    fn model_config(&self, ctx: &Context) -> StyleTransferConfig {
        let section = &ctx.config.style;
        let pick = |cli: &[String], file: Option<&Vec<String>>, default: fn() -> Vec<String>| {
            if cli.is_empty() {
                file.cloned().unwrap_or_else(default)
            } else {
                cli.to_vec()
            }
        };
        let feature_extractor = section
            .feature_extractor
            .clone()
            .unwrap_or_else(|| StyleTransferConfig::default().feature_extractor);

        StyleTransferConfig::new(feature_extractor)
            .with_content_layers(pick(
                &self.content_layers,
                section.content_layers.as_ref(),
                default_content_layers,
            ))
            .with_style_layers(pick(
                &self.style_layers,
                section.style_layers.as_ref(),
                default_style_layers,
            ))
            .with_gpu(self.gpu.resolve(section.use_gpu))
    }
}

/// Gaze model report.
#[derive(Debug, Serialize)]
struct GazeReport {
    generated_at: String,
    backbone: String,
    device: &'static str,
    head_feat_in: usize,
    frozen_parameters: usize,
    trainable_parameters: usize,
    trainable_tensors: Vec<Vec<usize>>,
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    outputs: Vec<GazeOutput>,
}

/// Gaze prediction for one batch item.
#[derive(Debug, Serialize)]
struct GazeOutput {
    source: String,
    gaze: [f32; 2],
}

/// Style extractor report.
#[derive(Debug, Serialize)]
struct StyleReport {
    generated_at: String,
    backbone: String,
    device: &'static str,
    frozen_parameters: usize,
    input_shape: Vec<usize>,
    content: Vec<TapReport>,
    style: Vec<TapReport>,
}

/// Activation shape at one tap.
#[derive(Debug, Serialize)]
struct TapReport {
    layer: String,
    shape: Vec<usize>,
}

/// Run the inspect command.
pub fn run(args: &InspectArgs, ctx: &Context) -> Result<()> {
    match args.command {
        InspectCommand::Gaze(ref gaze) => inspect_gaze(gaze, ctx),
        InspectCommand::Style(ref style) => inspect_style(style, ctx),
    }
}

fn inspect_gaze(args: &GazeArgs, ctx: &Context) -> Result<()> {
    let config = args.model_config(ctx);
    info!(
        "Building GazeNet ({}, head_feat_in={})",
        config.feature_extractor, config.head_feat_in
    );
    let backbone = config.validate().context("Failed to build GazeNet")?;
    ensure_installed(ctx, backbone)?;
    let model = GazeNet::from_provider(&config, &ctx.store).context("Failed to build GazeNet")?;

    let (input, sources) = if args.images.is_empty() {
        let n = args.batch as usize;
        let input = zero_probe(n, args.size, model.device())?;
        (input, (0..n).map(|i| format!("probe[{i}]")).collect())
    } else {
        load_batch(args, model.device())?
    };

    let output = model.forward(&input).context("Forward pass failed")?;
    let rows = output
        .to_dtype(DType::F32)?
        .to_device(&Device::Cpu)?
        .to_vec2::<f32>()?;

    let outputs = sources
        .into_iter()
        .zip(rows)
        .map(|(source, row)| GazeOutput {
            source,
            gaze: [row[0], row[1]],
        })
        .collect();

    let report = GazeReport {
        generated_at: timestamp()?,
        backbone: model.backbone().to_string(),
        device: device_label(model.device()),
        head_feat_in: model.head_feat_in(),
        frozen_parameters: model.frozen_parameter_count(),
        trainable_parameters: model.trainable_parameter_count(),
        trainable_tensors: model
            .trainable_parameters()
            .iter()
            .map(|v| v.dims().to_vec())
            .collect(),
        input_shape: input.dims().to_vec(),
        output_shape: output.dims().to_vec(),
        outputs,
    };

    JsonOutput::stdout(ctx.pretty).write(&report)
}

fn inspect_style(args: &StyleArgs, ctx: &Context) -> Result<()> {
    let config = args.model_config(ctx);
    info!(
        "Building StyleTransfer (content={:?}, style={:?})",
        config.content_layers, config.style_layers
    );
    let backbone = config.validate().context("Failed to build StyleTransfer")?;
    ensure_installed(ctx, backbone)?;
    let model = StyleTransfer::from_provider(&config, &ctx.store)
        .context("Failed to build StyleTransfer")?;

    let input = zero_probe(1, args.size, model.device())?;
    let features = model.extract(&input).context("Forward pass failed")?;

    let taps = |taps: &[(String, Tensor)]| -> Vec<TapReport> {
        taps.iter()
            .map(|(layer, t)| TapReport {
                layer: layer.clone(),
                shape: t.dims().to_vec(),
            })
            .collect()
    };

    let report = StyleReport {
        generated_at: timestamp()?,
        backbone: config.feature_extractor.clone(),
        device: device_label(model.device()),
        frozen_parameters: model.frozen_parameter_count(),
        input_shape: input.dims().to_vec(),
        content: taps(&features.content),
        style: taps(&features.style),
    };

    JsonOutput::stdout(ctx.pretty).write(&report)
}

/// Fails with a fetch hint when the weights for `backbone` are not on disk.
fn ensure_installed(ctx: &Context, backbone: Backbone) -> Result<()> {
    if ctx.store.is_available(backbone) {
        return Ok(());
    }
    anyhow::bail!(
        "Weights for {backbone} are not installed in {}. Run `gaze-net models fetch {backbone}`.",
        ctx.store.dir().display()
    )
}

/// Builds an all-zero `(n, 3, height, width)` batch.
fn zero_probe(n: usize, size: ProbeSize, device: &Device) -> Result<Tensor> {
    let shape = (n, 3, size.height as usize, size.width as usize);
    debug!("Probe batch {shape:?}");
    Ok(Tensor::zeros(shape, DType::F32, device)?)
}

/// Loads the requested images resized to the probe size and stacks them.
fn load_batch(args: &GazeArgs, device: &Device) -> Result<(Tensor, Vec<String>)> {
    let source = FsImageSource::new(args.images.clone(), args.recursive);
    let size = (args.size.width, args.size.height);

    let expected = source.count_hint().unwrap_or(0);
    if expected == 0 {
        anyhow::bail!("No supported images found");
    }
    debug!("Found {expected} images");

    let mut tensors = Vec::with_capacity(expected);
    let mut sources = Vec::with_capacity(expected);
    for (index, image) in source.images().enumerate() {
        let image = match image {
            Ok(img) => img,
            Err(e) => {
                warn!("Skipping image {index}: {e:#}");
                continue;
            }
        };
        let tensor = image_to_tensor(&image.image, Some(size), device)
            .with_context(|| format!("Failed to preprocess {}", image.path))?;
        tensors.push(tensor);
        sources.push(image.path);
    }

    if tensors.is_empty() {
        anyhow::bail!("No images could be loaded");
    }

    info!("Loaded {} images", tensors.len());
    Ok((stack_batch(&tensors)?, sources))
}
