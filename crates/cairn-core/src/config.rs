//! Configuration system for Cairn.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CAIRN_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/cairn/config.toml
//!   3. ~/.config/cairn/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
    pub relay: RelayConfig,
    pub indexer: IndexerConfig,
    pub confirmation: ConfirmationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Endpoint that accepts bundle submissions.
    pub endpoint: String,
    /// Platform label sent alongside every submission.
    pub platform_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// GraphQL endpoint for ledger record queries.
    pub endpoint: String,
}

/// Tuning for the confirmation poll loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Maximum indexer queries before a poll times out.
    pub max_attempts: u32,
    /// Delay between non-terminal polls, in milliseconds.
    pub polling_interval_ms: u64,
    /// One-time sleep before the first poll — the minimum expected
    /// indexing latency. In milliseconds.
    pub initial_backoff_ms: u64,
}

impl ConfirmationConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Deterministic worst-case wall clock for one poll session.
    pub fn worst_case(&self) -> Duration {
        self.initial_backoff() + self.polling_interval() * self.max_attempts
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9040/relay".to_owned(),
            platform_label: "cairn".to_owned(),
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9041/graphql".to_owned(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            polling_interval_ms: 3_000,
            initial_backoff_ms: 5_000,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_or_tmp().join(".config"))
        .join("cairn")
}

fn home_or_tmp() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CairnConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            CairnConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CAIRN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&CairnConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply CAIRN_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CAIRN_RELAY__ENDPOINT") {
            self.relay.endpoint = v;
        }
        if let Ok(v) = std::env::var("CAIRN_RELAY__PLATFORM_LABEL") {
            self.relay.platform_label = v;
        }
        if let Ok(v) = std::env::var("CAIRN_INDEXER__ENDPOINT") {
            self.indexer.endpoint = v;
        }
        if let Ok(v) = std::env::var("CAIRN_CONFIRMATION__MAX_ATTEMPTS") {
            if let Ok(n) = v.parse() {
                self.confirmation.max_attempts = n;
            }
        }
        if let Ok(v) = std::env::var("CAIRN_CONFIRMATION__POLLING_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                self.confirmation.polling_interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("CAIRN_CONFIRMATION__INITIAL_BACKOFF_MS") {
            if let Ok(n) = v.parse() {
                self.confirmation.initial_backoff_ms = n;
            }
        }
    }
}
