//! User configuration, stored as TOML in the platform config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::utils::AppPaths;

pub const DEFAULT_BASE_URL: &str = "https://api.intelligence.io.solutions/api/v1";
pub const DEFAULT_UPLOAD_SERVER_URL: &str = "http://localhost:5000";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Dark,
    Light,
}

impl ThemeName {
    pub fn toggled(self) -> Self {
        match self {
            ThemeName::Dark => ThemeName::Light,
            ThemeName::Light => ThemeName::Dark,
        }
    }
}

impl std::fmt::Display for ThemeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ThemeName::Dark => "dark",
            ThemeName::Light => "light",
        })
    }
}

impl std::str::FromStr for ThemeName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dark" => Ok(ThemeName::Dark),
            "light" => Ok(ThemeName::Light),
            other => Err(Error::Configuration(format!("Unknown theme: {other}"))),
        }
    }
}

/// Layout metrics in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    pub line_height: f32,
    pub char_width: f32,
    pub padding: f32,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            line_height: 1.0,
            char_width: 1.0,
            padding: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub seed: u64,
    pub system_prompt: String,
    pub model: Option<String>,
    pub vision_models: Vec<String>,
    pub theme: ThemeName,
    pub collapsed_line_limit: usize,
    pub page_size: usize,
    pub window_capacity: usize,
    pub history_file: Option<PathBuf>,
    pub upload_server_url: String,
    pub upload_dir: Option<PathBuf>,
    pub font: FontSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 60,
            temperature: 0.7,
            max_completion_tokens: 2000,
            seed: 42,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: None,
            vision_models: vec![
                "meta-llama/Llama-3.2-90B-Vision-Instruct".to_string(),
                "Qwen/Qwen2-VL-7B-Instruct".to_string(),
            ],
            theme: ThemeName::Dark,
            collapsed_line_limit: 5,
            page_size: 20,
            window_capacity: crate::window::DEFAULT_WINDOW_CAPACITY,
            history_file: None,
            upload_server_url: DEFAULT_UPLOAD_SERVER_URL.to_string(),
            upload_dir: None,
            font: FontSettings::default(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf, Error> {
        AppPaths::config_file().ok_or_else(|| {
            Error::Configuration("Could not determine config directory".to_string())
        })
    }

    /// Load config from disk, or return defaults if not found
    pub fn load() -> Result<Self, Error> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config file at {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), Error> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {e}")))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn history_path(&self) -> PathBuf {
        self.history_file
            .clone()
            .unwrap_or_else(AppPaths::default_history_file)
    }

    pub fn upload_path(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(AppPaths::default_upload_dir)
    }

    /// URL prefix under which the upload sidecar serves files.
    pub fn uploads_prefix(&self) -> String {
        format!("{}/uploads/", self.upload_server_url.trim_end_matches('/'))
    }

    pub fn is_vision_model(&self, model: &str) -> bool {
        self.vision_models.iter().any(|m| m == model)
    }
}
