//! Low-level wire types and constants.
//!
//! This module defines:
//! - Message type IDs for input and output messages.
//! - Protocol versioning.
//! - Size limits for variable-length fields and frames.
//!
//! The actual encode/decode logic lives in `binary_codec`.

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Input message types (client → server).
///
/// These IDs are used in the first byte of each binary frame.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WireInputType {
    CreateChallenge = 0,
    JoinChallenge = 1,
    Move = 2,
    Signal = 3,
    Leave = 4,
    Rejoin = 5,
}

impl WireInputType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(WireInputType::CreateChallenge),
            1 => Some(WireInputType::JoinChallenge),
            2 => Some(WireInputType::Move),
            3 => Some(WireInputType::Signal),
            4 => Some(WireInputType::Leave),
            5 => Some(WireInputType::Rejoin),
            _ => None,
        }
    }
}

/// Output message types (server → client).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WireOutputType {
    Created = 10,
    Role = 11,
    Start = 12,
    Move = 13,
    Turn = 14,
    Signal = 15,
    PeerDisconnected = 16,
    PeerReconnected = 17,
    Ended = 18,
    Sync = 19,
    Error = 20,
}

impl WireOutputType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            10 => Some(WireOutputType::Created),
            11 => Some(WireOutputType::Role),
            12 => Some(WireOutputType::Start),
            13 => Some(WireOutputType::Move),
            14 => Some(WireOutputType::Turn),
            15 => Some(WireOutputType::Signal),
            16 => Some(WireOutputType::PeerDisconnected),
            17 => Some(WireOutputType::PeerReconnected),
            18 => Some(WireOutputType::Ended),
            19 => Some(WireOutputType::Sync),
            20 => Some(WireOutputType::Error),
            _ => None,
        }
    }
}

/// Fixed header: type, version, two reserved bytes.
pub const HEADER_LEN: usize = 4;

/// Length prefix in front of every frame on a stream (u32 BE).
pub const FRAME_PREFIX_LEN: usize = 4;

/// Longest SAN / token / session id / position / error text.
pub const MAX_SHORT_STR: usize = 512;

/// Longest opaque signal payload.
pub const MAX_SIGNAL_LEN: usize = 64 * 1024;

/// Largest frame body accepted from a stream.
pub const MAX_FRAME_LEN: usize = MAX_SIGNAL_LEN + 1024;
