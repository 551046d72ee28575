//! Session coordinator.
//!
//! Owns the [`SessionRegistry`], the [`SignalRelay`] and the
//! [`GameStateReplicator`], and routes each [`InputMessage`] to the right
//! one. Callers feed requests one at a time; every delivery produced by a
//! request is returned together, so routing them before the next request
//! keeps per-session mutation serialized and `start` atomic with the
//! Active transition.
//!
//! Routing policy:
//! - errors go only to the requesting connection,
//! - `start`, `move`, `turn`, `ended` go to the session's participants,
//! - `signal` goes to the other participant only.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::SessionError;
use crate::ids::{ConnectionId, SessionId};
use crate::messages::{Delivery, InputMessage, MoveRequest, OutputMessage, SignalRequest};
use crate::registry::{SessionRegistry, DEFAULT_MAX_SESSIONS};
use crate::relay::SignalRelay;
use crate::replicator::GameStateReplicator;
use crate::session::Session;
use crate::validator::MoveValidator;

#[derive(Debug)]
pub struct SessionCoordinator<V> {
    registry: SessionRegistry,
    relay: SignalRelay,
    replicator: GameStateReplicator<V>,
}

impl<V: MoveValidator> SessionCoordinator<V> {
    pub fn new(validator: V) -> Self {
        SessionCoordinator::with_max_sessions(validator, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_max_sessions(validator: V, max_sessions: usize) -> Self {
        SessionCoordinator {
            registry: SessionRegistry::with_capacity(max_sessions),
            relay: SignalRelay::new(),
            replicator: GameStateReplicator::new(validator),
        }
    }

    /// Keep idle sessions for `window` before [`expire_idle`](Self::expire_idle)
    /// drops them.
    pub fn with_rejoin_window(mut self, window: Duration) -> Self {
        self.registry.set_rejoin_window(window);
        self
    }

    /// Process a single request from `from` and return every delivery it
    /// caused.
    pub fn process_message(&mut self, from: ConnectionId, msg: InputMessage) -> Vec<Delivery> {
        let mut out = Vec::new();

        let result = match msg {
            InputMessage::CreateChallenge(req) => self
                .registry
                .create_for(from, req.session_id, &mut out)
                .map(drop),
            InputMessage::JoinChallenge(req) => {
                self.registry.join(&req.session_id, from, &mut out).map(drop)
            }
            InputMessage::Move(req) => self.process_move(from, req, &mut out),
            InputMessage::Signal(req) => self.process_signal(from, req, &mut out),
            InputMessage::Leave => self.registry.leave(from, &mut out).map(drop),
            InputMessage::Rejoin(req) => self
                .registry
                .rejoin(&req.session_id, &req.token, from, &mut out)
                .map(drop),
        };

        if let Err(err) = result {
            debug!(connection = %from, %err, "request rejected");
            out.push(Delivery::new(from, OutputMessage::error(&err)));
        }

        out
    }

    /// The transport of `connection_id` went away.
    pub fn connection_closed(&mut self, connection_id: ConnectionId) -> Vec<Delivery> {
        let mut out = Vec::new();
        self.registry.disconnect(connection_id, &mut out);
        out
    }

    /// Drop sessions idle past the rejoin window; returns their ids.
    pub fn expire_idle(&mut self, now: Instant) -> Vec<SessionId> {
        self.registry.expire_idle(now)
    }

    fn process_move(
        &mut self,
        from: ConnectionId,
        req: MoveRequest,
        out: &mut Vec<Delivery>,
    ) -> Result<(), SessionError> {
        let session = member_session(&mut self.registry, from, &req.session_id)?;
        self.replicator
            .submit_move(session, from, &req.san, out)
            .map(drop)
    }

    fn process_signal(
        &mut self,
        from: ConnectionId,
        req: SignalRequest,
        out: &mut Vec<Delivery>,
    ) -> Result<(), SessionError> {
        let session = member_session(&mut self.registry, from, &req.session_id)?;
        let sender = session
            .participant_by_connection(from)
            .map(|p| p.role)
            .ok_or(SessionError::NotInSession)?;

        // Drops are logged by the relay and never reported back.
        if let Ok(delivery) = self.relay.relay(session, sender, req.to, req.data) {
            out.push(delivery);
        }
        Ok(())
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn relay(&self) -> &SignalRelay {
        &self.relay
    }

    /// For tests or admin queries: look up a session.
    pub fn session(&self, session_id: &SessionId) -> Option<&Session> {
        self.registry.session(session_id)
    }
}

/// The session `from` belongs to, provided it is `claimed`.
fn member_session<'a>(
    registry: &'a mut SessionRegistry,
    from: ConnectionId,
    claimed: &SessionId,
) -> Result<&'a mut Session, SessionError> {
    match registry.session_of(from) {
        Some(current) if current == claimed => {}
        _ => return Err(SessionError::NotInSession),
    }
    registry
        .session_mut(claimed)
        .ok_or_else(|| SessionError::SessionNotFound(claimed.clone()))
}
