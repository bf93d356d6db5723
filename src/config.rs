//! Configuration management
//!
//! Server binding, completion service settings, history cap and the
//! vocabulary log location. Stored as TOML in the project config directory;
//! environment variables and CLI flags override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::agent::conversation::DEFAULT_MAX_TURNS;
use crate::agent::llm::{DEFAULT_MODEL, OPENAI_BASE_URL};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat completion service
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Conversation history
    #[serde(default)]
    pub conversation: ConversationConfig,
    /// Vocabulary log
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Response length cap in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    OPENAI_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Turns kept per learner, system prompt included
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON document holding every learner's vocabulary
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("vocabulary.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Config {
    /// Load configuration from the default file, then apply env overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from `path`; a missing file is created with defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Write configuration to `path`, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Apply `HOST`, `PORT`, `TUTOR_STORE_PATH`, `OPENAI_BASE_URL` and
    /// `OPENAI_MODEL` from `lookup`. Unparsable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(path) = lookup("TUTOR_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.completion.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.completion.model = model;
        }
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "french-tutor", "french-tutor")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Print the effective configuration
pub fn show_config(config: &Config) -> Result<()> {
    let path = config_path()?;
    println!("Config file: {}", path.display());
    println!();
    println!("[server]      {}:{}", config.server.host, config.server.port);
    println!("[completion]  {} ({})", config.completion.model, config.completion.base_url);
    println!(
        "              temperature {}, max_tokens {}, timeout {}s",
        config.completion.temperature, config.completion.max_tokens, config.completion.timeout_secs
    );
    println!("[conversation] max_turns {}", config.conversation.max_turns);
    println!("[store]       {}", config.store.path.display());
    println!();
    println!("API key: {}", if crate::security::keyring::has_api_key() { "configured" } else { "not set" });
    Ok(())
}
