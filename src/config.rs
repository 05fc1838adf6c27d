//! Configuration management
//!
//! Manages the model endpoint, the history database location and matcher
//! tuning. Stored as TOML in the platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Local model service settings
    #[serde(default)]
    pub model: ModelConfig,
    /// History database settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Answer reuse tuning
    #[serde(default)]
    pub matcher: MatcherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_host")]
    pub host: String,
    /// Model name passed to the chat endpoint
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Upper bound on a single model call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Text placed before an injected earlier answer
    #[serde(default = "default_context_label")]
    pub context_label: String,
}

pub const DEFAULT_HOST: &str = "http://localhost:11434";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_model_name() -> String {
    "mistral".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

pub fn default_context_label() -> String {
    "A previously approved answer to a similar question is provided below. \
     Use it as guidance if it is relevant."
        .to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            name: default_model_name(),
            timeout_secs: default_timeout_secs(),
            context_label: default_context_label(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file; defaults to `chat_history.db` in the data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Configured path, or the default under the data directory
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("chat_history.db")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Minimum overlap ratio for an earlier answer to be reused
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    crate::memory::DEFAULT_OVERLAP_THRESHOLD
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

impl Config {
    /// Load configuration from file, writing defaults on first run
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Parse a configuration file
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "chat-curator", "chat-curator")
        .context("Failed to get project directories")
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Configuration ({})", config_path()?.display());
    println!("  model.host:          {}", config.model.host);
    println!("  model.name:          {}", config.model.name);
    println!("  model.timeout_secs:  {}", config.model.timeout_secs);
    println!("  store.database_path: {}", config.store.resolved_path()?.display());
    println!("  matcher.threshold:   {}", config.matcher.threshold);

    Ok(())
}

/// Set the model name
pub fn set_model(model: &str) -> Result<()> {
    let mut config = Config::load()?;
    config.model.name = model.to_string();
    config.save()?;
    println!("✅ Model set to: {}", model);
    Ok(())
}

/// Set the model service host
pub fn set_host(host: &str) -> Result<()> {
    let mut config = Config::load()?;
    config.model.host = host.trim_end_matches('/').to_string();
    config.save()?;
    println!("✅ Model host set to: {}", config.model.host);
    Ok(())
}

/// Reset configuration to defaults
pub fn reset_config() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults.");
    Ok(())
}
