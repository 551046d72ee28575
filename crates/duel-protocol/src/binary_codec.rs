//! Binary encoding/decoding for duel-core messages.
//!
//! This module converts between:
//! - raw binary frames (`&[u8]`)
//! - high-level `duel_core::InputMessage` / `OutputMessage`
//!
//! Framing model (single-message buffer):
//!
//! ```text
//! [0]   : msg_type (WireInputType / WireOutputType as u8)
//! [1]   : version  (PROTOCOL_VERSION)
//! [2..4]: reserved = 0
//! [4..] : body (depends on msg_type)
//!
//! str16 = u16 BE length + UTF-8 bytes   (length <= MAX_SHORT_STR)
//! str32 = u32 BE length + UTF-8 bytes   (length <= MAX_SIGNAL_LEN)
//!
//! Input (client → server)
//! -----------------------
//! CreateChallenge (0): has_id u8, [session_id str16]
//! JoinChallenge   (1): session_id str16
//! Move            (2): session_id str16, san str16
//! Signal          (3): session_id str16, to u8, data str32
//! Leave           (4): no body
//! Rejoin          (5): session_id str16, token str16
//!
//! Output (server → client)
//! ------------------------
//! Created          (10): session_id str16
//! Role             (11): session_id str16, role u8, color u8, token str16
//! Start            (12): session_id str16, turn u8, position str16
//! Move             (13): session_id str16, san str16, position str16, turn u8
//! Turn             (14): color u8
//! Signal           (15): from u8, data str32
//! PeerDisconnected (16): role u8
//! PeerReconnected  (17): role u8
//! Ended            (18): session_id str16, left u8
//! Sync             (19): session_id str16, role u8, color u8, turn u8,
//!                        position str16, state u8, peer_online u8
//! Error            (20): kind u8, message str16
//! ```
//!
//! On a stream every message is preceded by a u32 BE body length
//! ([`encode_frame`], [`frame_len`], [`peek_frame`]).

use duel_core::{
    Color, CreateChallenge, Created, Ended, ErrorKind, ErrorReport, InputMessage, JoinChallenge,
    MoveApplied, MoveRequest, OutputMessage, ParticipantToken, PeerPresence, Rejoin, Role,
    RoleAssigned, SessionId, SessionSnapshot, SessionState, SignalRelayed, SignalRequest, Start,
    TurnChanged,
};
use thiserror::Error;

use crate::wire_types::{
    FRAME_PREFIX_LEN, HEADER_LEN, MAX_FRAME_LEN, MAX_SHORT_STR, MAX_SIGNAL_LEN, PROTOCOL_VERSION,
    WireInputType, WireOutputType,
};

/// Errors that can arise when encoding/decoding a binary frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("buffer truncated")]
    Truncated,
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),
    #[error("protocol version mismatch: got {0}, expected {PROTOCOL_VERSION}")]
    VersionMismatch(u8),
    #[error("string field too long or not UTF-8")]
    InvalidString,
    #[error("invalid field: {0}")]
    InvalidField(&'static str),
    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),
    #[error("malformed JSON message: {0}")]
    Json(String),
}

// ============================================================================
// INPUT: client → server
// ============================================================================

/// Decode a single input message from a binary buffer.
pub fn decode_input(buf: &[u8]) -> Result<InputMessage, ProtocolError> {
    let msg_type = check_header(buf)?;
    let wire_type =
        WireInputType::from_u8(msg_type).ok_or(ProtocolError::UnknownMessageType(msg_type))?;

    let mut r = Reader::new(&buf[HEADER_LEN..]);

    let msg = match wire_type {
        WireInputType::CreateChallenge => {
            let session_id = match r.u8()? {
                0 => None,
                1 => Some(r.session_id()?),
                _ => return Err(ProtocolError::InvalidField("has_id")),
            };
            InputMessage::CreateChallenge(CreateChallenge { session_id })
        }
        WireInputType::JoinChallenge => InputMessage::JoinChallenge(JoinChallenge {
            session_id: r.session_id()?,
        }),
        WireInputType::Move => InputMessage::Move(MoveRequest {
            session_id: r.session_id()?,
            san: r.str16()?,
        }),
        WireInputType::Signal => InputMessage::Signal(SignalRequest {
            session_id: r.session_id()?,
            to: r.role()?,
            data: r.str32()?,
        }),
        WireInputType::Leave => InputMessage::Leave,
        WireInputType::Rejoin => InputMessage::Rejoin(Rejoin {
            session_id: r.session_id()?,
            token: ParticipantToken::new(r.str16()?),
        }),
    };

    Ok(msg)
}

/// Encode a single input message; the bytes are appended to `out`.
pub fn encode_input(msg: &InputMessage, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    match msg {
        InputMessage::CreateChallenge(c) => {
            put_header(out, WireInputType::CreateChallenge as u8);
            match &c.session_id {
                Some(id) => {
                    out.push(1);
                    put_str16(out, id.as_str())?;
                }
                None => out.push(0),
            }
        }
        InputMessage::JoinChallenge(j) => {
            put_header(out, WireInputType::JoinChallenge as u8);
            put_str16(out, j.session_id.as_str())?;
        }
        InputMessage::Move(m) => {
            put_header(out, WireInputType::Move as u8);
            put_str16(out, m.session_id.as_str())?;
            put_str16(out, &m.san)?;
        }
        InputMessage::Signal(s) => {
            put_header(out, WireInputType::Signal as u8);
            put_str16(out, s.session_id.as_str())?;
            out.push(s.to.as_u8());
            put_str32(out, &s.data)?;
        }
        InputMessage::Leave => put_header(out, WireInputType::Leave as u8),
        InputMessage::Rejoin(r) => {
            put_header(out, WireInputType::Rejoin as u8);
            put_str16(out, r.session_id.as_str())?;
            put_str16(out, r.token.as_str())?;
        }
    }
    Ok(())
}

// ============================================================================
// OUTPUT: server → client
// ============================================================================

/// Decode a single output message from a binary buffer.
pub fn decode_output(buf: &[u8]) -> Result<OutputMessage, ProtocolError> {
    let msg_type = check_header(buf)?;
    let wire_type =
        WireOutputType::from_u8(msg_type).ok_or(ProtocolError::UnknownMessageType(msg_type))?;

    let mut r = Reader::new(&buf[HEADER_LEN..]);

    let msg = match wire_type {
        WireOutputType::Created => OutputMessage::Created(Created {
            session_id: r.session_id()?,
        }),
        WireOutputType::Role => OutputMessage::Role(RoleAssigned {
            session_id: r.session_id()?,
            role: r.role()?,
            color: r.color()?,
            token: ParticipantToken::new(r.str16()?),
        }),
        WireOutputType::Start => OutputMessage::Start(Start {
            session_id: r.session_id()?,
            turn: r.color()?,
            position: r.str16()?,
        }),
        WireOutputType::Move => OutputMessage::Move(MoveApplied {
            session_id: r.session_id()?,
            san: r.str16()?,
            position: r.str16()?,
            turn: r.color()?,
        }),
        WireOutputType::Turn => OutputMessage::Turn(TurnChanged { color: r.color()? }),
        WireOutputType::Signal => OutputMessage::Signal(SignalRelayed {
            from: r.role()?,
            data: r.str32()?,
        }),
        WireOutputType::PeerDisconnected => {
            OutputMessage::PeerDisconnected(PeerPresence { role: r.role()? })
        }
        WireOutputType::PeerReconnected => {
            OutputMessage::PeerReconnected(PeerPresence { role: r.role()? })
        }
        WireOutputType::Ended => OutputMessage::Ended(Ended {
            session_id: r.session_id()?,
            left: r.role()?,
        }),
        WireOutputType::Sync => OutputMessage::Sync(SessionSnapshot {
            session_id: r.session_id()?,
            role: r.role()?,
            color: r.color()?,
            turn: r.color()?,
            position: r.str16()?,
            state: SessionState::from_u8(r.u8()?).ok_or(ProtocolError::InvalidField("state"))?,
            peer_online: r.u8()? != 0,
        }),
        WireOutputType::Error => OutputMessage::Error(ErrorReport {
            kind: ErrorKind::from_u8(r.u8()?).ok_or(ProtocolError::InvalidField("kind"))?,
            message: r.str16()?,
        }),
    };

    Ok(msg)
}

/// Encode a single output message; the bytes are appended to `out`.
pub fn encode_output(msg: &OutputMessage, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    match msg {
        OutputMessage::Created(c) => {
            put_header(out, WireOutputType::Created as u8);
            put_str16(out, c.session_id.as_str())?;
        }
        OutputMessage::Role(r) => {
            put_header(out, WireOutputType::Role as u8);
            put_str16(out, r.session_id.as_str())?;
            out.push(r.role.as_u8());
            out.push(r.color.as_u8());
            put_str16(out, r.token.as_str())?;
        }
        OutputMessage::Start(s) => {
            put_header(out, WireOutputType::Start as u8);
            put_str16(out, s.session_id.as_str())?;
            out.push(s.turn.as_u8());
            put_str16(out, &s.position)?;
        }
        OutputMessage::Move(m) => {
            put_header(out, WireOutputType::Move as u8);
            put_str16(out, m.session_id.as_str())?;
            put_str16(out, &m.san)?;
            put_str16(out, &m.position)?;
            out.push(m.turn.as_u8());
        }
        OutputMessage::Turn(t) => {
            put_header(out, WireOutputType::Turn as u8);
            out.push(t.color.as_u8());
        }
        OutputMessage::Signal(s) => {
            put_header(out, WireOutputType::Signal as u8);
            out.push(s.from.as_u8());
            put_str32(out, &s.data)?;
        }
        OutputMessage::PeerDisconnected(p) => {
            put_header(out, WireOutputType::PeerDisconnected as u8);
            out.push(p.role.as_u8());
        }
        OutputMessage::PeerReconnected(p) => {
            put_header(out, WireOutputType::PeerReconnected as u8);
            out.push(p.role.as_u8());
        }
        OutputMessage::Ended(e) => {
            put_header(out, WireOutputType::Ended as u8);
            put_str16(out, e.session_id.as_str())?;
            out.push(e.left.as_u8());
        }
        OutputMessage::Sync(s) => {
            put_header(out, WireOutputType::Sync as u8);
            put_str16(out, s.session_id.as_str())?;
            out.push(s.role.as_u8());
            out.push(s.color.as_u8());
            out.push(s.turn.as_u8());
            put_str16(out, &s.position)?;
            out.push(s.state.as_u8());
            out.push(u8::from(s.peer_online));
        }
        OutputMessage::Error(e) => {
            put_header(out, WireOutputType::Error as u8);
            out.push(e.kind.as_u8());
            put_str16(out, truncate_utf8(&e.message, MAX_SHORT_STR))?;
        }
    }
    Ok(())
}

// ============================================================================
// Stream framing
// ============================================================================

/// Prefix `payload` with its u32 BE length and append both to `out`.
pub fn encode_frame(payload: &[u8], out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

/// Body length announced by a frame prefix.
pub fn frame_len(prefix: [u8; FRAME_PREFIX_LEN]) -> Result<usize, ProtocolError> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    Ok(len)
}

/// If `buf` starts with a complete frame, return its total length
/// (prefix included).
pub fn peek_frame(buf: &[u8]) -> Result<Option<usize>, ProtocolError> {
    if buf.len() < FRAME_PREFIX_LEN {
        return Ok(None);
    }
    let prefix = [buf[0], buf[1], buf[2], buf[3]];
    let total = FRAME_PREFIX_LEN + frame_len(prefix)?;
    Ok((buf.len() >= total).then_some(total))
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn check_header(buf: &[u8]) -> Result<u8, ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Err(ProtocolError::Truncated);
    }
    let version = buf[1];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch(version));
    }
    Ok(buf[0])
}

fn put_header(out: &mut Vec<u8>, msg_type: u8) {
    out.push(msg_type);
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&[0, 0]); // reserved
}

fn put_str16(out: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    if s.len() > MAX_SHORT_STR {
        return Err(ProtocolError::InvalidString);
    }
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn put_str32(out: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    if s.len() > MAX_SIGNAL_LEN {
        return Err(ProtocolError::InvalidString);
    }
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Bounds-checked cursor over a message body.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos.checked_add(n).ok_or(ProtocolError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(ProtocolError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn utf8(&mut self, len: usize, max: usize) -> Result<String, ProtocolError> {
        if len > max {
            return Err(ProtocolError::InvalidString);
        }
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| ProtocolError::InvalidString)
    }

    fn str16(&mut self) -> Result<String, ProtocolError> {
        let len = self.u16()? as usize;
        self.utf8(len, MAX_SHORT_STR)
    }

    fn str32(&mut self) -> Result<String, ProtocolError> {
        let len = self.u32()? as usize;
        self.utf8(len, MAX_SIGNAL_LEN)
    }

    fn session_id(&mut self) -> Result<SessionId, ProtocolError> {
        let raw = self.str16()?;
        SessionId::parse(&raw).ok_or(ProtocolError::InvalidField("session_id"))
    }

    fn role(&mut self) -> Result<Role, ProtocolError> {
        Role::from_u8(self.u8()?).ok_or(ProtocolError::InvalidField("role"))
    }

    fn color(&mut self) -> Result<Color, ProtocolError> {
        Color::from_u8(self.u8()?).ok_or(ProtocolError::InvalidField("color"))
    }
}
