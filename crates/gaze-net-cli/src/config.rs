//! Configuration file support for gaze-net.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/gaze-net/config.toml` (lowest priority)
//! - Project-local: `.gaze-net.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use gaze_net_core::Backbone;
use serde::Deserialize;
use tracing::{debug, info};

/// Project-local config file name.
const PROJECT_CONFIG: &str = ".gaze-net.toml";

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gaze regressor settings.
    pub gaze: GazeSection,
    /// Style feature extractor settings.
    pub style: StyleSection,
    /// Model settings.
    pub models: ModelsSection,
    /// Output formatting settings.
    pub output: OutputSection,
}

/// Gaze regressor configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GazeSection {
    /// Backbone name (`resnet18` or `resnet50`).
    pub feature_extractor: Option<String>,
    /// Embedding width between the backbone and the head.
    pub head_feat_in: Option<usize>,
    /// Request GPU placement.
    pub use_gpu: Option<bool>,
}

/// Style feature extractor configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct StyleSection {
    /// Backbone name (only `vgg19`).
    pub feature_extractor: Option<String>,
    /// Content tap layer names.
    pub content_layers: Option<Vec<String>>,
    /// Style tap layer names.
    pub style_layers: Option<Vec<String>>,
    /// Request GPU placement.
    pub use_gpu: Option<bool>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsSection {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/gaze-net/config.toml`
    /// 2. Project-local: `.gaze-net.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are logged as warnings.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        if let Err(e) = config.validate() {
            eprintln!("warning: {e}");
        }

        config
    }

    /// Checks values that can be judged without loading any weights.
    fn validate(&self) -> Result<(), String> {
        if let Some(ref name) = self.gaze.feature_extractor {
            match name.parse::<Backbone>() {
                Ok(b) if b.is_resnet() => {}
                _ => {
                    return Err(format!(
                        "gaze.feature_extractor must be 'resnet18' or 'resnet50', got '{name}'"
                    ))
                }
            }
        }
        if self.gaze.head_feat_in == Some(0) {
            return Err("gaze.head_feat_in must be positive, got 0".to_string());
        }
        if let Some(ref name) = self.style.feature_extractor {
            if name.parse::<Backbone>().ok() != Some(Backbone::Vgg19) {
                return Err(format!(
                    "style.feature_extractor must be 'vgg19', got '{name}'"
                ));
            }
        }
        if self.style.content_layers.as_ref().is_some_and(Vec::is_empty) {
            return Err("style.content_layers must not be empty".to_string());
        }
        if self.style.style_layers.as_ref().is_some_and(Vec::is_empty) {
            return Err("style.style_layers must not be empty".to_string());
        }

        Ok(())
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        // Gaze
        self.gaze.feature_extractor = other
            .gaze
            .feature_extractor
            .or_else(|| self.gaze.feature_extractor.take());
        self.gaze.head_feat_in = other.gaze.head_feat_in.or(self.gaze.head_feat_in);
        self.gaze.use_gpu = other.gaze.use_gpu.or(self.gaze.use_gpu);

        // Style
        self.style.feature_extractor = other
            .style
            .feature_extractor
            .or_else(|| self.style.feature_extractor.take());
        self.style.content_layers = other
            .style
            .content_layers
            .or_else(|| self.style.content_layers.take());
        self.style.style_layers = other
            .style
            .style_layers
            .or_else(|| self.style.style_layers.take());
        self.style.use_gpu = other.style.use_gpu.or(self.style.use_gpu);

        // Models
        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());

        // Output
        self.output.pretty = other.output.pretty.or(self.output.pretty);
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gaze-net").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.gaze-net.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG))
        .find(|path| path.exists())
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.gaze.feature_extractor.is_none());
        assert!(config.style.content_layers.is_none());
        assert!(config.models.dir.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: AppConfig = toml::from_str("").expect("parse empty config");
        assert!(config.gaze.head_feat_in.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r"
[gaze]
feature_extractor = 'resnet50'
head_feat_in = 64
use_gpu = false

[style]
feature_extractor = 'vgg19'
content_layers = ['conv_4']
style_layers = ['conv_1', 'relu_2']

[models]
dir = '/opt/gaze-net/models'

[output]
pretty = true
";
        let config: AppConfig = toml::from_str(toml).expect("parse full config");

        assert_eq!(config.gaze.feature_extractor.as_deref(), Some("resnet50"));
        assert_eq!(config.gaze.head_feat_in, Some(64));
        assert_eq!(config.gaze.use_gpu, Some(false));
        assert_eq!(config.style.content_layers, Some(vec!["conv_4".to_string()]));
        assert_eq!(
            config.style.style_layers,
            Some(vec!["conv_1".to_string(), "relu_2".to_string()])
        );
        assert_eq!(
            config.models.dir,
            Some(PathBuf::from("/opt/gaze-net/models"))
        );
        assert_eq!(config.output.pretty, Some(true));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_preserves_base_when_override_is_none() {
        let mut base: AppConfig = toml::from_str(
            r"
[gaze]
feature_extractor = 'resnet18'
head_feat_in = 32

[style]
content_layers = ['conv_2']
",
        )
        .expect("parse base");

        let override_config: AppConfig = toml::from_str(
            r"
[gaze]
head_feat_in = 256
",
        )
        .expect("parse override");

        base.merge(override_config);

        assert_eq!(base.gaze.head_feat_in, Some(256));
        assert_eq!(base.gaze.feature_extractor.as_deref(), Some("resnet18"));
        assert_eq!(base.style.content_layers, Some(vec!["conv_2".to_string()]));
    }

    #[test]
    fn test_merge_replaces_layer_lists_whole() {
        let mut base: AppConfig = toml::from_str(
            r"
[style]
style_layers = ['conv_1', 'conv_2', 'conv_3']
",
        )
        .expect("parse base");

        let override_config: AppConfig = toml::from_str(
            r"
[style]
style_layers = ['pool_4']
",
        )
        .expect("parse override");

        base.merge(override_config);
        assert_eq!(base.style.style_layers, Some(vec!["pool_4".to_string()]));
    }

    #[test]
    fn test_merge_empty_override_preserves_base() {
        let mut base: AppConfig = toml::from_str(
            r"
[output]
pretty = true
",
        )
        .expect("parse base");

        base.merge(AppConfig::default());
        assert_eq!(base.output.pretty, Some(true));
    }

    #[test]
    fn test_invalid_field_type_handled() {
        let toml = r#"
[gaze]
head_feat_in = "wide"
"#;
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err(), "type mismatch should return error");
    }

    #[test]
    fn test_validate_rejects_non_resnet_gaze_backbone() {
        let mut config = AppConfig::default();
        config.gaze.feature_extractor = Some("vgg19".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.contains("gaze.feature_extractor"));
    }

    #[test]
    fn test_validate_rejects_zero_width() {
        let mut config = AppConfig::default();
        config.gaze.head_feat_in = Some(0);

        let err = config.validate().unwrap_err();
        assert!(err.contains("gaze.head_feat_in"));
    }

    #[test]
    fn test_validate_rejects_non_vgg_style_backbone() {
        let mut config = AppConfig::default();
        config.style.feature_extractor = Some("resnet18".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.contains("style.feature_extractor"));
    }

    #[test]
    fn test_validate_rejects_empty_layer_list() {
        let mut config = AppConfig::default();
        config.style.style_layers = Some(vec![]);

        let err = config.validate().unwrap_err();
        assert!(err.contains("style.style_layers"));
    }

    #[test]
    fn test_find_config_in_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(PROJECT_CONFIG), "").unwrap();

        let found = find_config_in_parents(&nested).unwrap();
        assert_eq!(found, dir.path().join(PROJECT_CONFIG));
    }

    #[test]
    fn test_load_file_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gaze\nhead_feat_in = 3").unwrap();
        assert!(load_file(&path).is_none());
    }
}
