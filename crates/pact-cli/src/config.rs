//! Configuration file management for pact.
//!
//! Provides a TOML-based config file at `~/.config/pact/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use pact_core::config::ValidatorConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub validator: ValidatorSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ValidatorSection {
    /// Per-condition timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Destination of the append-only audit log.
    pub log_file: Option<PathBuf>,
    /// Reserved retry policy hook (accepted, not consulted).
    pub max_retries: Option<u32>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the pact config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/pact` or `~/.config/pact`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("pact");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("pact")
}

/// Return the path to the pact config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

// -----------------------------------------------------------------------
// Resolution
// -----------------------------------------------------------------------

/// Resolve the validator configuration using the chain:
/// CLI flag > env var > config file > default.
///
/// - Timeout: `cli_timeout_ms` > `PACT_TIMEOUT_MS` > `validator.timeout_ms` > 30000
/// - Log file: `cli_log_file` > `PACT_LOG_FILE` > `validator.log_file` > temp path
/// - Max retries: `PACT_MAX_RETRIES` > `validator.max_retries` > 3
pub fn resolve(cli_timeout_ms: Option<u64>, cli_log_file: Option<PathBuf>) -> ValidatorConfig {
    let file_config = load_config().ok();
    let section = file_config.map(|c| c.validator).unwrap_or_default();
    let mut config = ValidatorConfig::default();

    let timeout_ms = cli_timeout_ms
        .or_else(|| env_u64("PACT_TIMEOUT_MS"))
        .or(section.timeout_ms);
    if let Some(ms) = timeout_ms {
        config = config.timeout(Duration::from_millis(ms));
    }

    let log_file = cli_log_file
        .or_else(|| std::env::var("PACT_LOG_FILE").ok().map(PathBuf::from))
        .or(section.log_file);
    if let Some(path) = log_file {
        config = config.log_file(path);
    }

    let max_retries = env_u64("PACT_MAX_RETRIES")
        .map(|n| n as u32)
        .or(section.max_retries);
    if let Some(n) = max_retries {
        config = config.max_retries(n);
    }

    config
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
