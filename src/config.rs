//! Runtime configuration
//!
//! Resolution order: built-in defaults, then the JSON config file
//! (`$FLOWDRAFT_CONFIG`, else `<config dir>/flowdraft/config.json`), then
//! environment variables. A missing or unreadable file falls back to the
//! defaults with a warning.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528:free";

pub const ENV_CONFIG: &str = "FLOWDRAFT_CONFIG";
pub const ENV_API_KEY: &str = "FLOWDRAFT_API_KEY";
pub const ENV_OPENROUTER_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_MODEL: &str = "FLOWDRAFT_MODEL";
pub const ENV_ENDPOINT: &str = "FLOWDRAFT_ENDPOINT";
pub const ENV_STORE_DIR: &str = "FLOWDRAFT_STORE_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings for the chat-completions generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 4000,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generator: GeneratorConfig,
    /// Directory for saved flowcharts; `None` means the platform data dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
}

/// `~/.config/flowdraft/config.json` or the platform equivalent
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("flowdraft").join("config.json"))
}

/// `~/.local/share/flowdraft/flowcharts` or the platform equivalent
pub fn default_store_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flowdraft")
        .join("flowcharts")
}

impl Config {
    /// Load from the usual locations and apply environment overrides
    pub fn load() -> Self {
        let path = std::env::var_os(ENV_CONFIG)
            .map(PathBuf::from)
            .or_else(default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => match Self::from_file(&path) {
                Ok(config) => {
                    info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("{e}; falling back to defaults");
                    Self::default()
                }
            },
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay values from `lookup`; blank values are ignored
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY).or_else(|| get(ENV_OPENROUTER_KEY)) {
            self.generator.api_key = Some(key);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.generator.model = model;
        }
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            self.generator.endpoint = endpoint;
        }
        if let Some(dir) = get(ENV_STORE_DIR) {
            self.store_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(default_store_dir)
    }

    /// Whether a generator key is available
    pub fn generator_configured(&self) -> bool {
        self.generator
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.generator.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.generator.model, DEFAULT_MODEL);
        assert_eq!(config.generator.max_tokens, 4000);
        assert!(!config.generator_configured());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"generator": {"model": "local/llama"}}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.generator.model, "local/llama");
        assert_eq!(config.generator.endpoint, DEFAULT_ENDPOINT);
        assert!(config.store_dir.is_none());
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_OPENROUTER_KEY, "or-key"),
            (ENV_MODEL, "other/model"),
            (ENV_STORE_DIR, "/tmp/flows"),
            (ENV_ENDPOINT, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.generator.api_key.as_deref(), Some("or-key"));
        assert_eq!(config.generator.model, "other/model");
        assert_eq!(config.generator.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/flows"));
        assert!(config.generator_configured());
    }

    #[test]
    fn test_flowdraft_key_wins() {
        let mut config = Config::default();
        config.apply_env(|k| match k {
            ENV_API_KEY => Some("primary".into()),
            ENV_OPENROUTER_KEY => Some("fallback".into()),
            _ => None,
        });
        assert_eq!(config.generator.api_key.as_deref(), Some("primary"));
    }
}
