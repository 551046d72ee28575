//! Session and participant state.
//!
//! A [`Session`] holds at most two participants. It is owned by the
//! [`SessionRegistry`](crate::registry::SessionRegistry) and mutated only
//! by the registry (admission, liveness) and the
//! [`GameStateReplicator`](crate::replicator::GameStateReplicator)
//! (position, turn).

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::ids::{ConnectionId, ParticipantToken, SessionId};
use crate::messages::SessionSnapshot;
use crate::role::{Color, Role};

/// Standard chess starting position.
pub const INITIAL_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Number of participant slots per session.
pub const MAX_PARTICIPANTS: usize = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    AwaitingSecond,
    Active,
    Ended,
}

impl SessionState {
    pub fn as_u8(self) -> u8 {
        match self {
            SessionState::AwaitingSecond => 0,
            SessionState::Active => 1,
            SessionState::Ended => 2,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(SessionState::AwaitingSecond),
            1 => Some(SessionState::Active),
            2 => Some(SessionState::Ended),
            _ => None,
        }
    }
}

/// One admitted participant. Role and color never change after admission.
#[derive(Debug, Clone)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub role: Role,
    pub color: Color,
    /// False while the participant's transport is down.
    pub live: bool,
    pub(crate) token: ParticipantToken,
}

impl Participant {
    pub fn token(&self) -> &ParticipantToken {
        &self.token
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    pub(crate) participants: Vec<Participant>,
    pub(crate) position: String,
    pub(crate) turn: Color,
    pub(crate) move_count: u32,
    pub(crate) state: SessionState,
    /// Since when nobody live has been in the session.
    pub(crate) idle_since: Option<Instant>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Session {
            id,
            participants: Vec::with_capacity(MAX_PARTICIPANTS),
            position: INITIAL_POSITION.to_string(),
            turn: Color::White,
            move_count: 0,
            state: SessionState::AwaitingSecond,
            idle_since: Some(Instant::now()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    /// Number of accepted moves so far.
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= MAX_PARTICIPANTS
    }

    pub fn participant_by_connection(&self, connection_id: ConnectionId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.connection_id == connection_id)
    }

    pub fn participant_by_role(&self, role: Role) -> Option<&Participant> {
        self.participants.iter().find(|p| p.role == role)
    }

    pub(crate) fn participant_by_role_mut(&mut self, role: Role) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.role == role)
    }

    /// Connections of participants whose transport is currently up.
    pub fn live_connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.participants
            .iter()
            .filter(|p| p.live)
            .map(|p| p.connection_id)
    }

    pub fn any_live(&self) -> bool {
        self.participants.iter().any(|p| p.live)
    }

    /// When the session last had a live participant, if it has none now.
    pub fn idle_since(&self) -> Option<Instant> {
        self.idle_since
    }

    /// Admit a connection into the next free slot.
    ///
    /// Returns `None` when both slots are taken.
    pub(crate) fn admit(&mut self, connection_id: ConnectionId) -> Option<&Participant> {
        let role = Role::for_slot(self.participants.len())?;
        self.participants.push(Participant {
            connection_id,
            role,
            color: role.color(),
            live: true,
            token: ParticipantToken::generate(),
        });
        self.idle_since = None;
        self.participants.last()
    }

    /// Full-state view for the participant playing `role`.
    pub fn snapshot_for(&self, role: Role) -> SessionSnapshot {
        let peer_online = self
            .participant_by_role(role.peer())
            .map(|p| p.live)
            .unwrap_or(false);

        SessionSnapshot {
            session_id: self.id.clone(),
            role,
            color: role.color(),
            turn: self.turn,
            position: self.position.clone(),
            state: self.state,
            peer_online,
        }
    }
}
