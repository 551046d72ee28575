//! Role (Initiator / Receiver) and Color (White / Black) of a participant.
//!
//! Both are fixed by join order: the first joiner is the initiator and
//! plays white, the second is the receiver and plays black.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side originates peer-channel negotiation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Initiator,
    Receiver,
}

impl Role {
    /// Role assigned to the participant in slot `index` (0 or 1).
    pub fn for_slot(index: usize) -> Option<Self> {
        match index {
            0 => Some(Role::Initiator),
            1 => Some(Role::Receiver),
            _ => None,
        }
    }

    /// The color that goes with this role.
    pub fn color(self) -> Color {
        match self {
            Role::Initiator => Color::White,
            Role::Receiver => Color::Black,
        }
    }

    /// The other participant's role.
    pub fn peer(self) -> Self {
        match self {
            Role::Initiator => Role::Receiver,
            Role::Receiver => Role::Initiator,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Initiator => "initiator",
            Role::Receiver => "receiver",
        }
    }

    /// Compact wire representation (`0` / `1`).
    pub fn as_u8(self) -> u8 {
        match self {
            Role::Initiator => 0,
            Role::Receiver => 1,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Role::Initiator),
            1 => Some(Role::Receiver),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Board color; decides who owns the current turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Color::White),
            1 => Some(Color::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
