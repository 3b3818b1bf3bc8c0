//! Configuration loading for Parley.
//!
//! Reads `config.toml` from the data directory (`~/.parley/` by default)
//! and deserializes it into [`GatewayConfig`]. Falls back to defaults when
//! the file is missing or malformed.
//!
//! The engine API key never lives in the config file; it comes from the
//! `GEMINI_API_KEY` environment variable and is wrapped in
//! [`secrecy::SecretString`] so it cannot leak through Debug or logs.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use parley_types::config::GatewayConfig;

/// Resolve the data directory: `PARLEY_DATA_DIR` env var, falling back to
/// `~/.parley`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARLEY_DATA_DIR")
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".parley"))
        .unwrap_or_else(|| PathBuf::from(".parley"))
}

/// Load gateway configuration from `{data_dir}/config.toml`.
///
/// - Missing file: returns [`GatewayConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> GatewayConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GatewayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GatewayConfig::default();
        }
    };

    match toml::from_str::<GatewayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GatewayConfig::default()
        }
    }
}

/// Database URL for the configured persistence mode.
///
/// Returns `None` when persistence is disabled -- the gateway then runs in
/// cache-only mode and history lives only as long as the process.
pub fn database_url(config: &GatewayConfig, data_dir: &Path) -> Option<String> {
    if !config.persistence.enabled {
        return None;
    }
    let path = match &config.persistence.database_path {
        Some(path) => PathBuf::from(path),
        None => data_dir.join("parley.db"),
    };
    Some(format!("sqlite://{}?mode=rwc", path.display()))
}

/// Read the engine API key from the `GEMINI_API_KEY` environment variable.
pub fn engine_api_key() -> Option<SecretString> {
    std::env::var("GEMINI_API_KEY")
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}
