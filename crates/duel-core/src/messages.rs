//! Message types used by the session core.
//!
//! These are **transport-agnostic** logical messages:
//! - [`InputMessage`]: what a client asks of the coordinator.
//! - [`OutputMessage`]: what the coordinator tells a client.
//!
//! Every output is addressed through a [`Delivery`], so the networking
//! layer only has to look up the recipient's channel.
//!
//! Note: binary / JSON encoders live in the `duel-protocol` crate.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SessionError};
use crate::ids::{ConnectionId, ParticipantToken, SessionId};
use crate::role::{Color, Role};
use crate::session::SessionState;

/// A request from one client connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InputMessage {
    /// Open a new session; the id is generated unless the client proposes one.
    CreateChallenge(CreateChallenge),

    /// Take a slot in an existing session.
    JoinChallenge(JoinChallenge),

    /// Submit a move in SAN.
    Move(MoveRequest),

    /// Opaque peer-negotiation payload for the other participant.
    Signal(SignalRequest),

    /// Explicitly leave the current session.
    Leave,

    /// Reclaim a slot after a transport drop.
    Rejoin(Rejoin),
}

/// An event for one client connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutputMessage {
    Created(Created),
    Role(RoleAssigned),
    Start(Start),
    Move(MoveApplied),
    Turn(TurnChanged),
    Signal(SignalRelayed),
    PeerDisconnected(PeerPresence),
    PeerReconnected(PeerPresence),
    Ended(Ended),
    Sync(SessionSnapshot),
    Error(ErrorReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChallenge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinChallenge {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub session_id: SessionId,
    pub san: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRequest {
    pub session_id: SessionId,
    pub to: Role,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejoin {
    pub session_id: SessionId,
    pub token: ParticipantToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub session_id: SessionId,
}

/// Role/color assignment; the token reclaims the slot on reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssigned {
    pub session_id: SessionId,
    pub role: Role,
    pub color: Color,
    pub token: ParticipantToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Start {
    pub session_id: SessionId,
    pub turn: Color,
    pub position: String,
}

/// An accepted move, echoed to both participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveApplied {
    pub session_id: SessionId,
    pub san: String,
    pub position: String,
    pub turn: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnChanged {
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRelayed {
    pub from: Role,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPresence {
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ended {
    pub session_id: SessionId,
    /// Role of the participant that left.
    pub left: Role,
}

/// Full state a participant needs after reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub role: Role,
    pub color: Color,
    pub turn: Color,
    pub position: String,
    pub state: SessionState,
    pub peer_online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

/// An output addressed to a single connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub msg: OutputMessage,
}

impl Delivery {
    pub fn new(to: ConnectionId, msg: OutputMessage) -> Self {
        Delivery { to, msg }
    }
}

// -----------------------------------------------------------------------------
// Convenience constructors
// -----------------------------------------------------------------------------

impl OutputMessage {
    pub fn start(session_id: SessionId, turn: Color, position: impl Into<String>) -> Self {
        OutputMessage::Start(Start {
            session_id,
            turn,
            position: position.into(),
        })
    }

    pub fn move_applied(
        session_id: SessionId,
        san: impl Into<String>,
        position: impl Into<String>,
        turn: Color,
    ) -> Self {
        OutputMessage::Move(MoveApplied {
            session_id,
            san: san.into(),
            position: position.into(),
            turn,
        })
    }

    pub fn turn(color: Color) -> Self {
        OutputMessage::Turn(TurnChanged { color })
    }

    pub fn signal(from: Role, data: impl Into<String>) -> Self {
        OutputMessage::Signal(SignalRelayed {
            from,
            data: data.into(),
        })
    }

    /// Error report for a failed request.
    pub fn error(err: &SessionError) -> Self {
        OutputMessage::Error(ErrorReport {
            kind: err.kind(),
            message: err.to_string(),
        })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        OutputMessage::Error(ErrorReport {
            kind: ErrorKind::BadRequest,
            message: message.into(),
        })
    }
}
