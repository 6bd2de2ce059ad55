//! Operator configuration file handling.
//!
//! TOML, generated with defaults on `init`. This file holds deployment
//! settings only (paths, logging, the signing-page URL). Consensus
//! parameters - threshold, signer set, timelock delay - live on the
//! multi-sig contract and are changed by governance itself, never by
//! editing this file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";
/// Default database filename, relative to the working directory.
const DEFAULT_DATABASE_PATH: &str = "governance.db";
/// Default base URL of the hosted signing page.
const DEFAULT_SIGNING_BASE_URL: &str = "https://sign.bbsns.example";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Operator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub signing: SigningConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the governance database (proposals, votes, sessions).
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Base URL of the signing page opened by the secondary context.
    pub base_url: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SIGNING_BASE_URL.to_string(),
        }
    }
}

/// Chain connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChainConfig {
    /// RPC endpoint of the chain node (unset = in-process mock).
    pub rpc_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl GovernanceConfig {
    /// Load from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Write the default configuration to `path` (no overwrite).
    pub fn write_default(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::default();
        if !path.exists() {
            fs::write(path, toml::to_string_pretty(&config)?)?;
        }
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
