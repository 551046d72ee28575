//! duel-client
//!
//! Console participant for duel sessions: server connection with
//! reconnects, session state reconciliation and the peer media lifecycle.

pub mod app;
pub mod lifecycle;
pub mod link;
pub mod network;
pub mod peer;
pub mod signal_queue;
pub mod types;

pub use app::{ClientEffect, Intent, MoveError, SessionClient};
pub use lifecycle::{LifecycleAction, LifecycleError, LifecycleState, PeerConnectionLifecycle};
pub use network::{ConnectionEvent, ServerConnection};
pub use types::{ClientConfig, MediaKind, ReconnectPolicy, SessionMode};
