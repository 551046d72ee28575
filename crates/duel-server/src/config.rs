//! Configuration for the duel TCP server.
//!
//! Defaults can be overridden via environment variables:
//!
//! - `DUEL_BIND_ADDR`    (default: "0.0.0.0")
//! - `DUEL_PORT`         (default: "3000")
//! - `DUEL_MAX_CLIENTS`  (default: "1024")
//! - `DUEL_MAX_SESSIONS` (default: "4096")
//! - `DUEL_REJOIN_WINDOW_SECS` (default: "120")

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use duel_core::registry::{DEFAULT_MAX_SESSIONS, DEFAULT_REJOIN_WINDOW};
use thiserror::Error;

/// An environment variable that could not be parsed.
#[derive(Debug, Error)]
#[error("{key}={value:?} is not valid: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,

    /// Maximum number of open sessions.
    pub max_sessions: usize,

    /// How long a session without live participants waits for a rejoin.
    pub rejoin_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            max_clients: 1024,
            max_sessions: DEFAULT_MAX_SESSIONS,
            rejoin_window: DEFAULT_REJOIN_WINDOW,
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to [`Config::default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            bind_addr: env::var("DUEL_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: read_env_or_default("DUEL_PORT", defaults.port)?,
            max_clients: read_env_or_default("DUEL_MAX_CLIENTS", defaults.max_clients)?,
            max_sessions: read_env_or_default("DUEL_MAX_SESSIONS", defaults.max_sessions)?,
            rejoin_window: Duration::from_secs(read_env_or_default(
                "DUEL_REJOIN_WINDOW_SECS",
                defaults.rejoin_window.as_secs(),
            )?),
        })
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn read_env_or_default<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(value) => value.parse::<T>().map_err(|e| ConfigError {
            key,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
