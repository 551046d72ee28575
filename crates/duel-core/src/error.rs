//! Error types for the session core.
//!
//! Registry and replicator failures are reported only to the requesting
//! connection; none of them mutate session state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::SessionId;
use crate::role::Color;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session {0} already has two participants")]
    SessionFull(SessionId),

    #[error("session {0} already exists")]
    SessionExists(SessionId),

    #[error("connection already belongs to session {0}")]
    AlreadyInSession(SessionId),

    #[error("connection is not part of a session")]
    NotInSession,

    #[error("session limit reached ({0})")]
    CapacityExhausted(usize),

    #[error("participant token rejected for session {0}")]
    InvalidToken(SessionId),

    #[error("session {0} is not active")]
    SessionNotActive(SessionId),

    #[error("not your turn: {turn} to move")]
    TurnViolation { turn: Color },

    #[error("illegal move {san}: {reason}")]
    IllegalMove { san: String, reason: String },
}

/// Wire-level classification of a [`SessionError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    SessionNotFound,
    SessionFull,
    SessionExists,
    AlreadyInSession,
    NotInSession,
    CapacityExhausted,
    InvalidToken,
    SessionNotActive,
    TurnViolation,
    IllegalMove,
    /// Request could not be decoded.
    BadRequest,
}

impl ErrorKind {
    pub fn as_u8(self) -> u8 {
        match self {
            ErrorKind::SessionNotFound => 0,
            ErrorKind::SessionFull => 1,
            ErrorKind::SessionExists => 2,
            ErrorKind::AlreadyInSession => 3,
            ErrorKind::NotInSession => 4,
            ErrorKind::CapacityExhausted => 5,
            ErrorKind::InvalidToken => 6,
            ErrorKind::SessionNotActive => 7,
            ErrorKind::TurnViolation => 8,
            ErrorKind::IllegalMove => 9,
            ErrorKind::BadRequest => 10,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        let kind = match v {
            0 => ErrorKind::SessionNotFound,
            1 => ErrorKind::SessionFull,
            2 => ErrorKind::SessionExists,
            3 => ErrorKind::AlreadyInSession,
            4 => ErrorKind::NotInSession,
            5 => ErrorKind::CapacityExhausted,
            6 => ErrorKind::InvalidToken,
            7 => ErrorKind::SessionNotActive,
            8 => ErrorKind::TurnViolation,
            9 => ErrorKind::IllegalMove,
            10 => ErrorKind::BadRequest,
            _ => return None,
        };
        Some(kind)
    }

    /// Only a missing session ends the client's attempt outright.
    pub fn is_terminal(self) -> bool {
        matches!(self, ErrorKind::SessionNotFound)
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::SessionNotFound(_) => ErrorKind::SessionNotFound,
            SessionError::SessionFull(_) => ErrorKind::SessionFull,
            SessionError::SessionExists(_) => ErrorKind::SessionExists,
            SessionError::AlreadyInSession(_) => ErrorKind::AlreadyInSession,
            SessionError::NotInSession => ErrorKind::NotInSession,
            SessionError::CapacityExhausted(_) => ErrorKind::CapacityExhausted,
            SessionError::InvalidToken(_) => ErrorKind::InvalidToken,
            SessionError::SessionNotActive(_) => ErrorKind::SessionNotActive,
            SessionError::TurnViolation { .. } => ErrorKind::TurnViolation,
            SessionError::IllegalMove { .. } => ErrorKind::IllegalMove,
        }
    }
}
