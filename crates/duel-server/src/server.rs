//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Accepts new TCP connections.
//! - Assigns each connection a `ConnectionId`.
//! - Spawns:
//!   - a per-connection task to handle I/O,
//!   - a single coordinator task that owns `SessionCoordinator`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use duel_core::{ChessValidator, SessionCoordinator};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client;
use crate::config::Config;
use crate::coordinator_task;
use crate::types::{
    ClientRegistry, ConnectionId, CoordinatorRx, CoordinatorTx, OutboundRx, OutboundTx,
};

/// Process-wide counter for assigning unique `ConnectionId`s.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Bind the configured address and serve until the listener fails.
pub async fn run(config: Config) -> Result<()> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    serve(listener, config).await
}

/// Serve on an already-bound listener.
pub async fn serve(listener: TcpListener, config: Config) -> Result<()> {
    // Shared registry of clients → outbound channels.
    let clients: ClientRegistry = Arc::new(tokio::sync::RwLock::new(Default::default()));

    // Channel from connections → coordinator task.
    let (coordinator_tx, coordinator_rx): (CoordinatorTx, CoordinatorRx) =
        mpsc::unbounded_channel();

    // Spawn the central coordinator task.
    {
        let clients_clone = clients.clone();
        let coordinator = SessionCoordinator::with_max_sessions(ChessValidator, config.max_sessions)
            .with_rejoin_window(config.rejoin_window);
        let sweep_every = coordinator_task::sweep_interval(config.rejoin_window);
        tokio::spawn(async move {
            coordinator_task::run_coordinator_loop(
                coordinator_rx,
                clients_clone,
                coordinator,
                sweep_every,
            )
            .await;
        });
    }

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let current_clients = clients.read().await.len();

        if current_clients >= config.max_clients {
            warn!(
                "Rejecting connection from {}: max_clients ({}) reached",
                peer_addr, config.max_clients
            );
            // Just drop the stream; client will see connection closed.
            continue;
        }

        if let Err(e) = stream.set_nodelay(true) {
            warn!("set_nodelay failed for {}: {}", peer_addr, e);
        }

        let connection_id = next_connection_id();
        info!("Accepted connection {} from {}", connection_id, peer_addr);

        // Create outbound channel for this client.
        let (out_tx, out_rx): (OutboundTx, OutboundRx) = mpsc::unbounded_channel();

        // Register before the task starts so no delivery can miss it.
        clients.write().await.insert(connection_id, out_tx.clone());

        let clients_clone = clients.clone();
        let coordinator_tx_clone = coordinator_tx.clone();

        tokio::spawn(async move {
            match client::run_client(
                connection_id,
                stream,
                coordinator_tx_clone,
                out_tx,
                out_rx,
                clients_clone,
            )
            .await
            {
                Ok(()) => info!("Connection {} closed", connection_id),
                Err(e) => warn!("Connection {} error: {:#}", connection_id, e),
            }
        });
    }
}
