//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.galley/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::strings::Language;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GalleyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub language: Option<Language>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UiConfig {
    pub redraw_interval_ms: Option<u64>,
    pub markdown: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    pub path: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REDRAW_INTERVAL_MS: u64 = 50;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub language: Language,
    pub redraw_interval: Duration,
    pub markdown: bool,
    pub session_path: Option<PathBuf>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns `~/.galley`, the home of config, session and log files.
pub fn galley_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".galley"))
}

/// Returns the path to `~/.galley/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    galley_dir().map(|d| d.join("config.toml"))
}

/// Load config from `~/.galley/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `GalleyConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<GalleyConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(GalleyConfig::default());
        }
    };
    load_config_from(&path)
}

fn load_config_from(path: &Path) -> Result<GalleyConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(GalleyConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: GalleyConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Galley Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [server]
# base_url = "http://127.0.0.1:8000"   # Or set GALLEY_SERVER_URL, or pass --server

# [general]
# language = "es"                      # "es" or "en"; or set GALLEY_LANG

# [ui]
# redraw_interval_ms = 50              # 0 redraws on every streamed chunk
# markdown = true                      # false shows replies as plain text

# [session]
# path = "/home/me/.galley/session.json"
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_server` is the `--server` flag (None = not specified).
pub fn resolve(config: &GalleyConfig, cli_server: Option<&str>) -> ResolvedConfig {
    resolve_with_env(config, cli_server, |key| std::env::var(key).ok())
}

fn resolve_with_env(
    config: &GalleyConfig,
    cli_server: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Server: CLI → env → config → default
    let base_url = cli_server
        .map(|s| s.to_string())
        .or_else(|| env("GALLEY_SERVER_URL"))
        .or_else(|| config.server.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    // Language: env → config → default. Unknown env values are ignored.
    let language = env("GALLEY_LANG")
        .and_then(|v| {
            let parsed = Language::parse(&v);
            if parsed.is_none() {
                warn!("Ignoring unknown GALLEY_LANG value: {}", v);
            }
            parsed
        })
        .or(config.general.language)
        .unwrap_or_default();

    let redraw_interval = Duration::from_millis(
        config
            .ui
            .redraw_interval_ms
            .unwrap_or(DEFAULT_REDRAW_INTERVAL_MS),
    );

    ResolvedConfig {
        base_url,
        language,
        redraw_interval,
        markdown: config.ui.markdown.unwrap_or(true),
        session_path: config.session.path.as_ref().map(PathBuf::from),
    }
}
