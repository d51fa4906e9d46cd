//! Worker configuration loaded from TOML.
//!
//! ```toml
//! [client]
//! index_type = "u32"
//! version_type = "u32"
//!
//! [keys]
//! version = "v/_number"
//!
//! [worker]
//! max_messages_per_round = 100
//! round_interval = "500ms"
//!
//! [identity]
//! attestor_seed = "0x..."
//! ```

use rollup_client::ClientConfig;
use rollup_types::{AttestorKey, ReservedKeys};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level worker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub client: ClientConfig,
    pub keys: KeysConfig,
    pub worker: WorkerSettings,
    pub identity: IdentityConfig,
}

impl WorkerConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: WorkerConfig = toml::from_str(contents)?;
        config.worker.round_interval()?;
        Ok(config)
    }
}

/// Reserved key layout, as UTF-8 strings.
#[derive(Debug, Clone, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_version_key")]
    pub version: String,
    #[serde(default = "default_queue_head_key")]
    pub queue_head: String,
    #[serde(default = "default_queue_tail_key")]
    pub queue_tail: String,
    #[serde(default = "default_message_prefix")]
    pub message_prefix: String,
}

fn default_version_key() -> String {
    "v/_number".to_string()
}

fn default_queue_head_key() -> String {
    "q/_head".to_string()
}

fn default_queue_tail_key() -> String {
    "q/_tail".to_string()
}

fn default_message_prefix() -> String {
    "q/".to_string()
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            version: default_version_key(),
            queue_head: default_queue_head_key(),
            queue_tail: default_queue_tail_key(),
            message_prefix: default_message_prefix(),
        }
    }
}

impl KeysConfig {
    pub fn reserved_keys(&self) -> ReservedKeys {
        ReservedKeys {
            version: self.version.as_bytes().to_vec(),
            queue_head: self.queue_head.as_bytes().to_vec(),
            queue_tail: self.queue_tail.as_bytes().to_vec(),
            message_prefix: self.message_prefix.as_bytes().to_vec(),
        }
    }
}

/// Round driver settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// Upper bound on messages drained per round.
    #[serde(default = "default_max_messages_per_round")]
    pub max_messages_per_round: usize,

    /// Skip the round without a session when the queue is empty.
    #[serde(default = "default_skip_if_empty")]
    pub skip_if_empty: bool,

    /// Pause between rounds, e.g. "500ms" or "2s".
    #[serde(default = "default_round_interval")]
    pub round_interval: String,
}

fn default_max_messages_per_round() -> usize {
    100
}

fn default_skip_if_empty() -> bool {
    true
}

fn default_round_interval() -> String {
    "1s".to_string()
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_messages_per_round: default_max_messages_per_round(),
            skip_if_empty: default_skip_if_empty(),
            round_interval: default_round_interval(),
        }
    }
}

impl WorkerSettings {
    pub fn round_interval(&self) -> Result<Duration, ConfigError> {
        humantime::parse_duration(&self.round_interval).map_err(|e| ConfigError::Invalid {
            field: "worker.round_interval",
            reason: e.to_string(),
        })
    }

    pub fn with_max_messages_per_round(mut self, max: usize) -> Self {
        self.max_messages_per_round = max.max(1);
        self
    }

    pub fn with_skip_if_empty(mut self, skip: bool) -> Self {
        self.skip_if_empty = skip;
        self
    }
}

/// Signing identities as hex-encoded 32-byte seeds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    pub attestor_seed: Option<String>,
    /// Separate paying identity; enables meta-transactions.
    pub sender_seed: Option<String>,
}

impl IdentityConfig {
    pub fn attestor(&self) -> Result<Option<AttestorKey>, ConfigError> {
        parse_seed("identity.attestor_seed", self.attestor_seed.as_deref())
    }

    pub fn sender(&self) -> Result<Option<AttestorKey>, ConfigError> {
        parse_seed("identity.sender_seed", self.sender_seed.as_deref())
    }
}

fn parse_seed(field: &'static str, seed: Option<&str>) -> Result<Option<AttestorKey>, ConfigError> {
    seed.map(|s| {
        AttestorKey::from_hex_seed(s).map_err(|e| ConfigError::Invalid {
            field,
            reason: e.to_string(),
        })
    })
    .transpose()
}
