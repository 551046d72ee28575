// crates/duel-client/src/types.rs

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signal_queue::DEFAULT_QUEUE_CAPACITY;

/// Configuration for the session client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_addr: String,
    pub media: MediaKind,
    pub session_mode: SessionMode,
    /// When false, capture is refused and the session runs board-only.
    pub capture_enabled: bool,
    pub reconnect: ReconnectPolicy,
    pub signal_queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3000".to_string(),
            media: MediaKind::Audio,
            session_mode: SessionMode::Linked,
            capture_enabled: true,
            reconnect: ReconnectPolicy::default(),
            signal_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ClientConfig {
    /// Load from a TOML file; missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

/// What the peer channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// How the second participant finds the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Share the bare session id.
    Direct,
    /// Share a `duel://` link.
    Linked,
}

/// Reconnect behavior of the server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Cap on the doubling of `base_delay_ms`.
    pub max_backoff_exponent: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            base_delay_ms: 1000,
            max_backoff_exponent: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> std::time::Duration {
        let exponent = attempt.saturating_sub(1).min(self.max_backoff_exponent);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        std::time::Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}
