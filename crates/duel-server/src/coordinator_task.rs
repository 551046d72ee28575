//! Central coordinator loop.
//!
//! This task owns the `SessionCoordinator` and processes every
//! `CoordinatorRequest` one at a time, which serializes all session
//! mutation. Deliveries produced by one request are pushed onto the
//! recipients' outbound channels before the next request is read, so both
//! participants hold `start` before either can act on the Active session.
//! Between requests it periodically expires sessions nobody came back to.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use duel_core::{ConnectionId, Delivery, MoveValidator, SessionCoordinator};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::types::{ClientRegistry, CoordinatorRequest, CoordinatorRx, OutboundTx};

/// How often idle sessions are swept for a given rejoin window.
pub fn sweep_interval(rejoin_window: Duration) -> Duration {
    (rejoin_window / 4).clamp(Duration::from_millis(100), Duration::from_secs(30))
}

/// Run the central coordinator processing loop.
///
/// - `rx`: receives requests from all connection tasks.
/// - `clients`: registry of connected clients and their outbound channels.
/// - `sweep_every`: period of the idle-session sweep.
pub async fn run_coordinator_loop<V: MoveValidator>(
    mut rx: CoordinatorRx,
    clients: ClientRegistry,
    mut coordinator: SessionCoordinator<V>,
    sweep_every: Duration,
) {
    let mut sweep = time::interval(sweep_every);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let req = tokio::select! {
            req = rx.recv() => match req {
                Some(req) => req,
                None => break,
            },
            _ = sweep.tick() => {
                for session_id in coordinator.expire_idle(Instant::now()) {
                    info!(session = %session_id, "idle session expired");
                }
                continue;
            }
        };

        let deliveries = match req {
            CoordinatorRequest::Message { connection_id, msg } => {
                debug!(connection = %connection_id, ?msg, "request");
                coordinator.process_message(connection_id, msg)
            }
            CoordinatorRequest::Disconnected { connection_id } => {
                coordinator.connection_closed(connection_id)
            }
        };

        if deliveries.is_empty() {
            continue;
        }

        // Sends are non-blocking; holding the read guard keeps the whole
        // batch routed against one view of the registry.
        let guard = clients.read().await;
        for delivery in deliveries {
            route_delivery(delivery, &guard);
        }
    }

    info!("Coordinator loop shutting down (request channel closed)");
}

/// Route a single `Delivery` to its connection, if still connected.
fn route_delivery(delivery: Delivery, clients: &HashMap<ConnectionId, OutboundTx>) {
    let Delivery { to, msg } = delivery;
    match clients.get(&to) {
        Some(tx) => {
            if tx.send(msg).is_err() {
                debug!(connection = %to, "outbound channel closed");
            }
        }
        None => debug!(connection = %to, "delivery for departed connection dropped"),
    }
}
