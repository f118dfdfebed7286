//! Pretrained model store: downloading, caching and loading backbone weights.

use anyhow::{Context, Result};
use candle_core::Device;
use gaze_net_core::inference::load_safetensors;
use gaze_net_core::{Backbone, FrozenWeights, WeightsProvider};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Download chunk size.
const CHUNK_SIZE: usize = 64 * 1024;

/// Pretrained model metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Backbone the weights belong to.
    pub backbone: Backbone,
    /// Download URL (torchvision weights in safetensors format).
    pub url: &'static str,
    /// Expected SHA256 hash. `None` skips verification.
    pub sha256: Option<&'static str>,
    /// Filename in the models directory.
    pub filename: &'static str,
}

/// Known pretrained backbones.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        backbone: Backbone::Resnet18,
        url: "https://huggingface.co/timm/resnet18.tv_in1k/resolve/main/model.safetensors",
        sha256: None,
        filename: "resnet18.safetensors",
    },
    ModelInfo {
        backbone: Backbone::Resnet50,
        url: "https://huggingface.co/timm/resnet50.tv_in1k/resolve/main/model.safetensors",
        sha256: None,
        filename: "resnet50.safetensors",
    },
    ModelInfo {
        backbone: Backbone::Vgg19,
        url: "https://huggingface.co/timm/vgg19.tv_in1k/resolve/main/model.safetensors",
        sha256: None,
        filename: "vgg19.safetensors",
    },
];

/// Download progress callback: `(model name, bytes downloaded, total bytes)`.
pub type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

/// Returns the default models directory.
///
/// Uses `XDG_DATA_HOME/gaze-net/models` or `~/.local/share/gaze-net/models`.
#[must_use]
pub fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gaze-net")
        .join("models")
}

/// Looks up the metadata for a backbone.
#[must_use]
pub fn model_info(backbone: Backbone) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.backbone == backbone)
}

/// On-disk store of pretrained backbone weights.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(default_models_dir())
    }
}

impl ModelStore {
    /// Creates a store rooted at `dir`. Nothing is touched on disk.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The models directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the weights file for `backbone`.
    #[must_use]
    pub fn path(&self, backbone: Backbone) -> Option<PathBuf> {
        model_info(backbone).map(|m| self.dir.join(m.filename))
    }

    /// Lists every known model with its installed status.
    #[must_use]
    pub fn list(&self) -> Vec<(&'static ModelInfo, bool)> {
        MODELS
            .iter()
            .map(|m| (m, self.dir.join(m.filename).exists()))
            .collect()
    }

    /// Returns true if every known model is installed.
    #[must_use]
    pub fn all_installed(&self) -> bool {
        self.list().iter().all(|(_, installed)| *installed)
    }

    /// Downloads the given backbones unless already present.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The models directory cannot be created
    /// - A download fails
    /// - A checksum doesn't match
    pub fn fetch(&self, backbones: &[Backbone], progress: Option<&ProgressCallback>) -> Result<()> {
        fs::create_dir_all(&self.dir).context("Failed to create models directory")?;

        for &backbone in backbones {
            let model = model_info(backbone)
                .with_context(|| format!("No download known for {backbone}"))?;
            let path = self.dir.join(model.filename);
            if path.exists() {
                debug!("Model {} already exists", model.backbone);
            } else {
                download_model(model, &path, progress)?;
            }
        }

        Ok(())
    }

    /// Downloads every known backbone unless already present.
    ///
    /// # Errors
    ///
    /// See [`ModelStore::fetch`].
    pub fn fetch_all(&self, progress: Option<&ProgressCallback>) -> Result<()> {
        let all: Vec<Backbone> = MODELS.iter().map(|m| m.backbone).collect();
        self.fetch(&all, progress)
    }
}

impl WeightsProvider for ModelStore {
    fn load(&self, backbone: Backbone, device: &Device) -> Result<FrozenWeights> {
        let path = self
            .path(backbone)
            .with_context(|| format!("No weights file known for {backbone}"))?;
        if !path.exists() {
            anyhow::bail!(
                "Weights for {backbone} not found at {}. Run `gaze-net models fetch`.",
                path.display()
            );
        }
        info!("Loading {backbone} weights from {}", path.display());
        load_safetensors(&path, device)
            .with_context(|| format!("Failed to load {backbone} weights"))
    }

    fn is_available(&self, backbone: Backbone) -> bool {
        self.path(backbone).is_some_and(|p| p.exists())
    }
}

/// Downloads a model from its URL.
fn download_model(model: &ModelInfo, path: &Path, progress: Option<&ProgressCallback>) -> Result<()> {
    let name = model.backbone.name();
    info!("Downloading model: {name}");

    let mut response = reqwest::blocking::get(model.url)
        .with_context(|| format!("Failed to download {name}"))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status: {}", response.status());
    }

    let total = response.content_length();
    install_stream(model, &mut response, path, total, progress)
}

/// Streams `reader` into a `.part` file next to `path` and renames it into
/// place once the checksum has been verified. The `.part` file never
/// outlives a failure.
fn install_stream(
    model: &ModelInfo,
    reader: &mut dyn Read,
    path: &Path,
    total: Option<u64>,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    let name = model.backbone.name();
    let tmp_path = path.with_extension("part");

    let result = stream_to_file(reader, &tmp_path, name, total, progress).and_then(
        |(downloaded, hash)| {
            verify_checksum(model, &hash, path)?;
            fs::rename(&tmp_path, path).with_context(|| format!("Failed to install {name}"))?;
            Ok(downloaded)
        },
    );

    match result {
        Ok(downloaded) => {
            info!("Downloaded {name} ({downloaded} bytes)");
            Ok(())
        }
        Err(e) => {
            remove_partial(&tmp_path);
            Err(e)
        }
    }
}

/// Copies `reader` to `tmp_path`, returning the byte count and SHA256 hash.
fn stream_to_file(
    reader: &mut dyn Read,
    tmp_path: &Path,
    name: &str,
    total: Option<u64>,
    progress: Option<&ProgressCallback>,
) -> Result<(u64, String)> {
    let mut file = fs::File::create(tmp_path)
        .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut downloaded = 0u64;

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read response for {name}"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        downloaded += n as u64;
        if let Some(cb) = progress {
            cb(name, downloaded, total);
        }
    }
    file.flush()
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

    Ok((downloaded, format!("{:x}", hasher.finalize())))
}

/// Removes a partial download, logging rather than failing.
fn remove_partial(tmp_path: &Path) {
    match fs::remove_file(tmp_path) {
        Ok(()) => debug!("Removed partial download {}", tmp_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove partial download {}: {e}",
            tmp_path.display()
        ),
    }
}

/// Compares a computed hash against the expected one, if any.
fn verify_checksum(model: &ModelInfo, hash: &str, path: &Path) -> Result<()> {
    let Some(expected) = model.sha256 else {
        debug!(
            "Skipping checksum verification for {} (no checksum pinned)",
            model.backbone
        );
        return Ok(());
    };

    if hash != expected {
        anyhow::bail!(
            "Checksum mismatch for {}: expected {}, got {}. \
             Try deleting {} and re-running to download a fresh copy.",
            model.backbone,
            expected,
            hash,
            path.display()
        );
    }
    Ok(())
}
