use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::background;

/// Environment variables checked for the API key, in order
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(skip)]
    pub config_path: PathBuf,

    /// Key as written in the file, kept so an environment key is never persisted
    #[serde(skip)]
    file_api_key: Option<String>,
    #[serde(skip)]
    env_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_background")]
    pub background: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: String,
    #[serde(default = "default_display")]
    pub display: DisplayMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Terminal,
    Viewer,
    None,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Terminal => "terminal",
            DisplayMode::Viewer => "viewer",
            DisplayMode::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "terminal" => Some(DisplayMode::Terminal),
            "viewer" => Some(DisplayMode::Viewer),
            "none" => Some(DisplayMode::None),
            _ => None,
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["terminal", "viewer", "none"]
    }
}

// Default value functions
fn default_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_background() -> String {
    background::default_background().id.to_string()
}

fn default_output_directory() -> String {
    "./idphoto-output".to_string()
}

fn default_display() -> DisplayMode {
    DisplayMode::Terminal
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            model: default_model(),
            base_url: default_base_url(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            background: default_background(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            display: default_display(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "idphoto", "idphoto-cli")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, creating it if absent
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::config_path()?)
    }

    /// Load config from `config_path`, creating it with defaults if absent.
    ///
    /// The API key from the environment overrides the file. A missing key is
    /// not an error; generation is simply disabled.
    pub fn load_or_create_at(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .context("Failed to read config file")?;
            let mut config: Config = toml::from_str(&content)
                .context("Failed to parse config file")?;
            config.config_path = config_path.to_path_buf();
            config
        } else {
            let config = Config {
                config_path: config_path.to_path_buf(),
                ..Default::default()
            };
            config.save()?;
            config
        };

        config.file_api_key = config.api.key.clone();
        if let Some(key) = env_api_key() {
            config.api.key = Some(key.clone());
            config.env_api_key = Some(key);
        }

        if !is_builtin_background(&config.defaults.background) {
            tracing::warn!(
                "Unknown default background '{}', using '{}'",
                config.defaults.background,
                default_background()
            );
            config.defaults.background = default_background();
        }

        if config.api_key().is_none() {
            tracing::warn!("No API key configured, background replacement is disabled");
        }

        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let mut on_disk = self.clone();
        if self.env_api_key.is_some() && self.api.key == self.env_api_key {
            on_disk.api.key = self.file_api_key.clone();
        }

        let content = toml::to_string_pretty(&on_disk)
            .context("Failed to serialize config")?;
        fs::write(&self.config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get API key (from config or environment)
    pub fn api_key(&self) -> Option<&str> {
        self.api.key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Set a config value by key path (e.g., "api.key", "defaults.background")
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api.key" => self.api.key = Some(value.to_string()),
            "api.model" => self.api.model = value.to_string(),
            "api.base_url" => self.api.base_url = value.to_string(),
            "defaults.background" => {
                if is_builtin_background(value) {
                    self.defaults.background = value.to_string();
                } else {
                    let valid: Vec<_> = background::list_backgrounds().iter().map(|b| b.id).collect();
                    anyhow::bail!("Unknown background. Valid values: {}", valid.join(", "));
                }
            }
            "output.directory" => self.output.directory = value.to_string(),
            "output.display" => {
                self.output.display = DisplayMode::parse(value).with_context(|| {
                    format!(
                        "Invalid display mode. Valid values: {}",
                        DisplayMode::variants().join(", ")
                    )
                })?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    /// Get a config value by key path
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "api.key" => self.api.key.clone().map(|_| "****".to_string()), // Mask API key
            "api.model" => Some(self.api.model.clone()),
            "api.base_url" => Some(self.api.base_url.clone()),
            "defaults.background" => Some(self.defaults.background.clone()),
            "output.directory" => Some(self.output.directory.clone()),
            "output.display" => Some(self.output.display.as_str().to_string()),
            _ => None,
        }
    }

    /// Get all config keys
    pub fn keys() -> &'static [&'static str] {
        &[
            "api.key",
            "api.model",
            "api.base_url",
            "defaults.background",
            "output.directory",
            "output.display",
        ]
    }

    /// Available models
    pub fn models() -> &'static [&'static str] {
        &["gemini-2.5-flash-image", "gemini-3-pro-image-preview"]
    }
}

/// Defaults must name a catalog entry; the custom upload needs an image first
fn is_builtin_background(id: &str) -> bool {
    background::find(id).is_some_and(|b| !b.is_custom())
}

fn env_api_key() -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|key| !key.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.model, "gemini-2.5-flash-image");
        assert_eq!(config.defaults.background, "white");
        assert_eq!(config.output.display, DisplayMode::Terminal);
        assert!(config.api.key.is_none());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("defaults.background", "grad-blue").unwrap();
        config.set("output.display", "none").unwrap();
        config.set("api.key", "secret").unwrap();

        assert_eq!(config.get("defaults.background").as_deref(), Some("grad-blue"));
        assert_eq!(config.get("output.display").as_deref(), Some("none"));
        // Keys are never echoed back
        assert_eq!(config.get("api.key").as_deref(), Some("****"));
        assert!(config.has_api_key());
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("defaults.background", "purple").is_err());
        assert!(config.set("defaults.background", "custom-upload").is_err());
        assert!(config.set("output.display", "hologram").is_err());
        assert!(config.set("tui.theme", "dark").is_err());
        assert_eq!(config.defaults.background, "white");
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let mut config = Config::default();
        config.api.key = Some("  ".to_string());
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_every_key_is_readable() {
        let mut config = Config::default();
        config.api.key = Some("k".to_string());
        for key in Config::keys() {
            assert!(config.get(key).is_some(), "{}", key);
        }
    }

    #[test]
    fn test_load_creates_then_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::load_or_create_at(&path).unwrap();
        assert!(path.exists());

        config.set("defaults.background", "office").unwrap();
        config.set("output.directory", "/tmp/photos").unwrap();
        config.save().unwrap();

        let reloaded = Config::load_or_create_at(&path).unwrap();
        assert_eq!(reloaded.defaults.background, "office");
        assert_eq!(reloaded.output.directory, "/tmp/photos");
        assert_eq!(reloaded.config_path, path);
    }

    #[test]
    fn test_environment_key_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config {
            config_path: path.clone(),
            ..Default::default()
        };
        config.api.key = Some("from-env".to_string());
        config.env_api_key = Some("from-env".to_string());

        config.save().unwrap();
        assert!(!fs::read_to_string(&path).unwrap().contains("from-env"));

        // An explicitly set key is written
        config.set("api.key", "from-user").unwrap();
        config.save().unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("from-user"));
    }

    #[test]
    fn test_unknown_default_background_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[defaults]\nbackground = \"purple\"\n").unwrap();

        let config = Config::load_or_create_at(&path).unwrap();
        assert_eq!(config.defaults.background, "white");
        assert_eq!(config.api.model, "gemini-2.5-flash-image");
    }
}
