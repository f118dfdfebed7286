//! Models command - manage pretrained backbone weights.

use anyhow::Result;
use clap::{Args, Subcommand};
use gaze_net_adapters::ProgressCallback;
use gaze_net_core::Backbone;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};

use super::Context;

/// Arguments for the models command
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Models subcommands
#[derive(Subcommand)]
pub enum ModelsCommand {
    /// Download pretrained weights (all known backbones by default)
    Fetch {
        /// Backbones to fetch (resnet18, resnet50, vgg19)
        backbones: Vec<Backbone>,
    },
    /// List known models and whether they are installed
    List,
    /// Print model directory path
    Path,
}

/// Run the models command.
pub fn run(args: &ModelsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ModelsCommand::Fetch { ref backbones } => fetch_models(backbones, ctx),
        ModelsCommand::List => {
            list_models(ctx);
            Ok(())
        }
        ModelsCommand::Path => {
            println!("{}", ctx.store.dir().display());
            Ok(())
        }
    }
}

fn fetch_models(backbones: &[Backbone], ctx: &Context) -> Result<()> {
    let pb = Arc::new(ProgressBar::new(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
            .map_err(|e| anyhow::anyhow!("Invalid progress template: {e}"))?
            .progress_chars("#>-"),
    );

    let current_model: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
    let pb_clone = Arc::clone(&pb);
    let model_clone = Arc::clone(&current_model);

    let progress: ProgressCallback =
        Box::new(move |name: &str, downloaded: u64, total: Option<u64>| {
            let is_new_model = {
                let mut current = model_clone
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if *current == name {
                    false
                } else {
                    *current = name.to_string();
                    true
                }
            };
            if is_new_model {
                pb_clone.reset();
                if let Some(t) = total {
                    pb_clone.set_length(t);
                }
                pb_clone.set_message(name.to_string());
            }
            pb_clone.set_position(downloaded);
        });

    if backbones.is_empty() {
        ctx.store.fetch_all(Some(&progress))?;
    } else {
        ctx.store.fetch(backbones, Some(&progress))?;
    }

    pb.finish_with_message("Models ready");
    Ok(())
}

fn list_models(ctx: &Context) {
    let models = ctx.store.list();

    println!("Models directory: {}", ctx.store.dir().display());
    println!();

    for (info, installed) in &models {
        let status = if *installed { "✓" } else { "✗" };
        println!("  {status} {} ({})", info.backbone, info.filename);
    }

    println!();
    let installed_count = models.iter().filter(|(_, installed)| *installed).count();
    println!("{}/{} models installed", installed_count, models.len());
}
