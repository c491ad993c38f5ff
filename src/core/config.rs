//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.susu/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::attachment::DEFAULT_MAX_ATTACHMENT_BYTES;
use crate::inference::{ModelDescriptor, default_models};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SusuConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_model: Option<String>,
    pub max_attachment_bytes: Option<u64>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub referer: Option<String>,
    pub app_title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub name: Option<String>,
    pub provider: Option<String>,
    #[serde(default)]
    pub supports_images: bool,
}

impl ModelEntry {
    fn to_descriptor(&self) -> ModelDescriptor {
        let provider = self
            .provider
            .clone()
            .or_else(|| self.id.split('/').next().map(str::to_string))
            .unwrap_or_default();
        ModelDescriptor {
            id: self.id.clone(),
            display_name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            provider,
            supports_images: self.supports_images,
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_OPENROUTER_BASE_URL: &str = crate::inference::providers::openrouter::DEFAULT_BASE_URL;
pub const DEFAULT_REFERER: &str = "https://github.com/susu-chat/susu";
pub const DEFAULT_APP_TITLE: &str = "Susu";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub model_id: String,
    pub models: Vec<ModelDescriptor>,
    pub max_attachment_bytes: u64,
    pub api_key: Option<String>,
    pub base_url: String,
    pub referer: String,
    pub app_title: String,
    pub data_dir: Option<PathBuf>,
}

impl ResolvedConfig {
    /// The API key, or the startup error explaining how to set one.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}

/// Values given on the command line. `None` means "not specified".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub data_dir: Option<PathBuf>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(
        "no API key configured; set OPENROUTER_API_KEY or [openrouter] api_key in ~/.susu/config.toml"
    )]
    MissingApiKey,
}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.susu/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".susu").join("config.toml"))
}

/// Load config from `~/.susu/config.toml`.
pub fn load_config() -> Result<SusuConfig, ConfigError> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            warn!("Could not determine home directory, using default config");
            Ok(SusuConfig::default())
        }
    }
}

/// Load config from a specific path.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `SusuConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config_from(path: &Path) -> Result<SusuConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(SusuConfig::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: SusuConfig = toml::from_str(&contents)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config.general);
    Ok(config)
}

const DEFAULT_CONFIG: &str = r#"# Susu Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_model = "openai/gpt-4o-mini"   # Or set SUSU_MODEL, or pass --model
# max_attachment_bytes = 20971520        # Files larger than this are refused
# data_dir = "/home/me/.susu"            # Or set SUSU_DATA_DIR, or pass --data-dir

# [openrouter]
# api_key = "sk-or-..."                  # Or set OPENROUTER_API_KEY env var
# base_url = "https://openrouter.ai/api/v1"
# referer = "https://github.com/susu-chat/susu"
# app_title = "Susu"

# Listing any [[models]] replaces the built-in catalog.
# [[models]]
# id = "openai/gpt-4o-mini"
# name = "GPT-4o Mini"
# provider = "OpenAI"
# supports_images = true

# [[models]]
# id = "deepseek/deepseek-chat"
# name = "DeepSeek V3"
# provider = "DeepSeek"
"#;

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, DEFAULT_CONFIG) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &SusuConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

/// Same as [`resolve`], reading environment variables through `env`.
pub fn resolve_with_env(
    config: &SusuConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let models = if config.models.is_empty() {
        default_models()
    } else {
        config.models.iter().map(ModelEntry::to_descriptor).collect()
    };

    // Model: CLI → env → config → first in catalog
    let model_id = cli
        .model
        .clone()
        .or_else(|| env("SUSU_MODEL"))
        .or_else(|| config.general.default_model.clone())
        .or_else(|| models.first().map(|m| m.id.clone()))
        .unwrap_or_default();
    if !models.iter().any(|m| m.id == model_id) {
        warn!("Model '{}' is not in the catalog, using the first entry", model_id);
    }

    // API key: env → config
    let api_key = env("OPENROUTER_API_KEY")
        .or_else(|| env("VITE_OPEN_ROUTER_API_KEY"))
        .or_else(|| config.openrouter.api_key.clone());

    // Base URL: env → config → default
    let base_url = env("OPENROUTER_BASE_URL")
        .or_else(|| config.openrouter.base_url.clone())
        .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string());

    // Data dir: CLI → env → config → (FileStorage default)
    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| env("SUSU_DATA_DIR").map(PathBuf::from))
        .or_else(|| config.general.data_dir.clone());

    ResolvedConfig {
        model_id,
        models,
        max_attachment_bytes: config
            .general
            .max_attachment_bytes
            .unwrap_or(DEFAULT_MAX_ATTACHMENT_BYTES),
        api_key,
        base_url,
        referer: config
            .openrouter
            .referer
            .clone()
            .unwrap_or_else(|| DEFAULT_REFERER.to_string()),
        app_title: config
            .openrouter
            .app_title
            .clone()
            .unwrap_or_else(|| DEFAULT_APP_TITLE.to_string()),
        data_dir,
    }
}
