//! Shared types for the duel TCP server.
//!
//! This module defines:
//! - channel aliases between connection tasks and the coordinator loop
//! - `CoordinatorRequest`: what flows from connections to the coordinator
//! - the registry of connected clients

use std::collections::HashMap;
use std::sync::Arc;

use duel_core::{InputMessage, OutputMessage};
use tokio::sync::mpsc;
use tokio::sync::RwLock;

pub use duel_core::ConnectionId;

/// Outbound messages from the coordinator to a given client.
pub type OutboundTx = mpsc::UnboundedSender<OutputMessage>;
pub type OutboundRx = mpsc::UnboundedReceiver<OutputMessage>;

/// Registry of connected clients and their outbound channels.
pub type ClientRegistry = Arc<RwLock<HashMap<ConnectionId, OutboundTx>>>;

/// Work item for the coordinator task.
#[derive(Debug)]
pub enum CoordinatorRequest {
    /// A decoded request from a connection.
    Message {
        connection_id: ConnectionId,
        msg: InputMessage,
    },

    /// The connection's transport is gone.
    Disconnected { connection_id: ConnectionId },
}

/// Channel from connections → coordinator task.
pub type CoordinatorTx = mpsc::UnboundedSender<CoordinatorRequest>;
pub type CoordinatorRx = mpsc::UnboundedReceiver<CoordinatorRequest>;
