//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXLITE_CONFIG` (environment variable)
//! 2. `~/.config/mboxlite/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxlite\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags override config values.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::lighten::quotes::DEFAULT_BLOCKSIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Quote-stripping policy.
    pub strip: StripConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Quote-stripping policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    /// Minimum number of consecutive quoted lines that gets a run deleted.
    pub blocksize: usize,
    /// Whether a `<` within the first three characters disqualifies a line
    /// from quoted classification.
    pub exclude_angle: bool,
    /// Whether `On ... wrote:` attribution lines count as quoted.
    pub strip_attribution: bool,
    /// Only delete a quoted run that reaches the end of the body.
    pub trailing_only: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            blocksize: DEFAULT_BLOCKSIZE,
            exclude_angle: true,
            strip_attribution: true,
            trailing_only: false,
        }
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXLITE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mboxlite").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxlite")
}
