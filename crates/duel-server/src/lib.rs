//! duel-server
//!
//! Multi-client async TCP server coordinating two-player duel sessions.

pub mod config;
pub mod types;
pub mod server;

// these are internal modules, not re-exported
mod client;
mod coordinator_task;
