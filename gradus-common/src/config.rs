//! Configuration loading for the Gradus backend connection
//!
//! Settings resolve in priority order: environment variable, then TOML
//! config file, then compiled default. A value found in more than one
//! source logs a warning naming the winner.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::{Error, Result};

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8474";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_BACKEND_URL: &str = "GRADUS_BACKEND_URL";
const ENV_API_TOKEN: &str = "GRADUS_API_TOKEN";
const ENV_REQUEST_TIMEOUT_SECS: &str = "GRADUS_REQUEST_TIMEOUT_SECS";

/// Logging section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "gradus_review=debug"
    pub level: Option<String>,
}

/// On-disk TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the persistence/notification backend
    pub backend_url: Option<String>,
    /// Bearer token presented to the backend
    pub api_token: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("parse {} failed: {}", path.display(), e)))
    }
}

/// Resolved backend connection settings
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl BackendSettings {
    /// Resolve settings from environment and the default config file location
    pub fn resolve() -> Self {
        let toml = default_config_path()
            .and_then(|path| TomlConfig::load(&path).ok())
            .unwrap_or_default();
        Self::resolve_from(&toml)
    }

    /// Resolve settings from environment and an already-loaded TOML config.
    ///
    /// Environment wins over TOML, TOML wins over the compiled default.
    pub fn resolve_from(toml: &TomlConfig) -> Self {
        let base_url = pick_string(
            ENV_BACKEND_URL,
            toml.backend_url.as_deref(),
            "backend_url",
        )
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let api_token = pick_string(ENV_API_TOKEN, toml.api_token.as_deref(), "api_token");

        let timeout_secs = std::env::var(ENV_REQUEST_TIMEOUT_SECS)
            .ok()
            .and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    warn!(
                        "ignoring non-numeric {}={:?}",
                        ENV_REQUEST_TIMEOUT_SECS, raw
                    );
                    None
                }
            })
            .or(toml.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Self {
            base_url,
            api_token,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Pick a string setting: ENV first, then TOML. Warn when both are set.
fn pick_string(env_var: &str, toml_value: Option<&str>, key: &str) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| !v.trim().is_empty());
    let toml_value = toml_value.map(str::to_string).filter(|v| !v.trim().is_empty());

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both {} and TOML config; using environment",
            key, env_var
        );
    }

    env_value.or(toml_value)
}

/// Default configuration file path for the platform.
///
/// Linux prefers `~/.config/gradus/config.toml`, falling back to
/// `/etc/gradus/config.toml`; other platforms use the user config dir.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("gradus").join("config.toml"));

    if let Some(path) = &user_config {
        if path.exists() {
            return user_config;
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/gradus/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}
