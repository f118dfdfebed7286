//! CLI command definitions and handlers.

pub mod inspect;
pub mod models;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gaze_net_adapters::{default_models_dir, ModelStore};

use crate::config::AppConfig;

/// gaze-net - frozen-backbone gaze regression and style feature extraction
#[derive(Parser)]
#[command(name = "gaze-net")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR", global = true)]
    pub models_dir: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Manage pretrained backbone weights
    Models(models::ModelsArgs),
    /// Build a model and report its structure and a probe forward pass
    Inspect(inspect::InspectArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Command completed.
    Success = 0,
    /// Command failed.
    Error = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}

/// Settings shared by every command after CLI flags and config files are merged.
pub struct Context {
    /// Merged file configuration.
    pub config: AppConfig,
    /// Pretrained model store.
    pub store: ModelStore,
    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Context {
    /// Layers global CLI flags over the file configuration.
    pub fn new(cli: &Cli, config: AppConfig) -> Self {
        // Models directory: CLI > config > default
        let dir = cli
            .models_dir
            .clone()
            .or_else(|| config.models.dir.clone())
            .unwrap_or_else(default_models_dir);
        let pretty = cli.pretty || config.output.pretty.unwrap_or(false);

        Self {
            config,
            store: ModelStore::new(dir),
            pretty,
        }
    }
}
