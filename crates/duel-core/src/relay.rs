//! Pass-through for peer-negotiation payloads.
//!
//! The relay resolves the other participant of a session and forwards the
//! payload untouched, tagged with the sender's role. Nothing is queued:
//! if the session is not Active or the recipient is offline the payload is
//! dropped and logged. Ordering and retry belong to the client.

use tracing::warn;

use crate::ids::{ConnectionId, SessionId};
use crate::messages::{Delivery, OutputMessage};
use crate::role::Role;
use crate::session::{Session, SessionState};

/// Why a payload was not forwarded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RelayDrop {
    SessionNotActive,
    RecipientOffline,
    Misaddressed,
}

#[derive(Debug, Default)]
pub struct SignalRelay {
    relayed: u64,
    dropped: u64,
}

impl SignalRelay {
    pub fn new() -> Self {
        SignalRelay::default()
    }

    /// Forward `payload` from `from` to the other participant of `session`.
    ///
    /// `to` is the recipient the client addressed; it must be the sender's
    /// peer.
    pub fn relay(
        &mut self,
        session: &Session,
        from: Role,
        to: Role,
        payload: String,
    ) -> Result<Delivery, RelayDrop> {
        let result = Self::route(session, from, to);

        match result {
            Ok(recipient) => {
                self.relayed += 1;
                Ok(Delivery::new(recipient, OutputMessage::signal(from, payload)))
            }
            Err(reason) => {
                self.dropped += 1;
                log_drop(session.id(), from, reason);
                Err(reason)
            }
        }
    }

    fn route(session: &Session, from: Role, to: Role) -> Result<ConnectionId, RelayDrop> {
        if session.state() != SessionState::Active {
            return Err(RelayDrop::SessionNotActive);
        }
        if to != from.peer() {
            return Err(RelayDrop::Misaddressed);
        }
        match session.participant_by_role(to) {
            Some(p) if p.live => Ok(p.connection_id),
            _ => Err(RelayDrop::RecipientOffline),
        }
    }

    /// Payloads forwarded so far.
    pub fn relayed(&self) -> u64 {
        self.relayed
    }

    /// Payloads dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

fn log_drop(session_id: &SessionId, from: Role, reason: RelayDrop) {
    warn!(session = %session_id, %from, ?reason, "signal dropped");
}
