//! Configuration loader and validator.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{GenerationSettings, Language, ModelTier, Tone};

/// Environment variables consulted, in order, when `gemini.api_key` is blank.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub gemini: Gemini,
    pub defaults: Defaults,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// Content service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gemini {
    #[serde(default)]
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub temperature: f32,
}

/// Batch settings used when the front end does not override them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Defaults {
    pub tone: Tone,
    pub language: Language,
    pub model_tier: ModelTier,
    pub generate_images: bool,
    pub thread_mode: bool,
}

impl App {
    /// Data dir with a leading `~/` expanded against `$HOME`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(rest) = self.data_dir.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return Path::new(&home).join(rest);
            }
        }
        PathBuf::from(&self.data_dir)
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    pub fn history_path(&self) -> PathBuf {
        self.app.resolved_data_dir().join("history.json")
    }

    /// Configured key, falling back to the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        let configured = self.gemini.api_key.trim();
        if !configured.is_empty() {
            return Some(configured.to_string());
        }
        api_key_from_env()
    }

    pub fn default_settings(&self) -> GenerationSettings {
        GenerationSettings {
            tone: self.defaults.tone,
            language: self.defaults.language,
            model_tier: self.defaults.model_tier,
        }
    }
}

pub fn api_key_from_env() -> Option<String> {
    API_KEY_ENV_VARS.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if reqwest::Url::parse(&cfg.gemini.base_url).is_err() {
        return Err(ConfigError::Invalid("gemini.base_url must be a valid URL"));
    }
    if cfg.gemini.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("gemini.timeout_seconds must be > 0"));
    }
    if !(0.0..=2.0).contains(&cfg.gemini.temperature) {
        return Err(ConfigError::Invalid("gemini.temperature must be within 0.0..=2.0"));
    }
    Ok(())
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

gemini:
  # Leave empty to read GEMINI_API_KEY or API_KEY from the environment.
  api_key: ""
  base_url: "https://generativelanguage.googleapis.com/"
  timeout_seconds: 120
  temperature: 0.7

defaults:
  tone: Professional
  language: English
  model_tier: flash-2.5
  generate_images: true
  thread_mode: false
"#
}
