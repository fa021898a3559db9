use crate::embed::DEFAULT_MODEL;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub model_name: String,
    pub batch_size: Option<usize>,
    pub max_length: Option<usize>,
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            batch_size: None,
            max_length: None,
            cache_dir: None,
            show_download_progress: false,
        }
    }
}

/// Values given on the command line; `None` leaves the file/default value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model_name: Option<String>,
    pub batch_size: Option<usize>,
    pub max_length: Option<usize>,
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
}

impl BridgeConfig {
    /// Reads `path` if given (must exist), otherwise the per-user config file
    /// if one is present, then applies `overrides` on top.
    pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => match default_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        Ok(base.with_overrides(overrides))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(name) = overrides.model_name {
            self.model_name = name;
        }
        if overrides.batch_size.is_some() {
            self.batch_size = overrides.batch_size;
        }
        if overrides.max_length.is_some() {
            self.max_length = overrides.max_length;
        }
        if overrides.cache_dir.is_some() {
            self.cache_dir = overrides.cache_dir;
        }
        self.show_download_progress |= overrides.show_download_progress;
        self
    }
}

pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "embed-bridge").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_to_minilm() {
        let config = BridgeConfig::default();
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.batch_size, None);
        assert!(!config.show_download_progress);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_config("batch_size = 32\n");
        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.batch_size, Some(32));
        assert_eq!(config.cache_dir, None);
    }

    #[test]
    fn full_file_sets_every_field() {
        let file = write_config(
            "model_name = \"bge-small-en-v1.5\"\nbatch_size = 4\nmax_length = 64\n\
             cache_dir = \"/var/cache/models\"\nshow_download_progress = true\n",
        );
        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(
            config,
            BridgeConfig {
                model_name: "bge-small-en-v1.5".into(),
                batch_size: Some(4),
                max_length: Some(64),
                cache_dir: Some(PathBuf::from("/var/cache/models")),
                show_download_progress: true,
            }
        );
    }

    #[test]
    fn cli_overrides_file() {
        let file = write_config(
            "model_name = \"bge-small-en-v1.5\"\nbatch_size = 8\nmax_length = 128\n",
        );
        let overrides = Overrides {
            model_name: Some("all-MiniLM-L12-v2".into()),
            batch_size: Some(64),
            ..Overrides::default()
        };
        let config = BridgeConfig::resolve(Some(file.path()), overrides).unwrap();
        assert_eq!(config.model_name, "all-MiniLM-L12-v2");
        assert_eq!(config.batch_size, Some(64));
        assert_eq!(config.max_length, Some(128));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = BridgeConfig::resolve(Some(&missing), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = write_config("batch_size = \"lots\"\n");
        let err = BridgeConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }
}
