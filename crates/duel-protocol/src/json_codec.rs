//! Newline-delimited JSON codec.
//!
//! One message per line, tagged by `type`, so a session can be driven from
//! netcat:
//!
//! ```text
//! {"type":"create-challenge"}
//! {"type":"join-challenge","session_id":"abc123"}
//! {"type":"move","session_id":"abc123","san":"e4"}
//! {"type":"signal","session_id":"abc123","to":"receiver","data":"..."}
//! {"type":"leave"}
//! {"type":"rejoin","session_id":"abc123","token":"..."}
//! ```
//!
//! Server events use the same shape, e.g.
//! `{"type":"move","session_id":"abc123","san":"e4","position":"...","turn":"black"}`.

use duel_core::{InputMessage, OutputMessage};

use crate::binary_codec::{self, ProtocolError};

/// First byte of every JSON-lines message; used for protocol detection.
pub const JSON_LINE_MARKER: u8 = b'{';

/// Parse a single line into an `InputMessage`.
///
/// Returns `Ok(None)` for blank lines or comments (starting with `#`).
/// Strings over the binary protocol's limits are refused the same way the
/// binary decoder refuses them, so every accepted request can be relayed to
/// a binary peer.
pub fn parse_input_line(line: &str) -> Result<Option<InputMessage>, ProtocolError> {
    let msg = parse_line(line)?;
    if let Some(msg) = &msg {
        binary_codec::encode_input(msg, &mut Vec::new())?;
    }
    Ok(msg)
}

/// Parse a single server line into an `OutputMessage`.
pub fn parse_output_line(line: &str) -> Result<Option<OutputMessage>, ProtocolError> {
    parse_line(line)
}

/// Format an `OutputMessage` as a JSON line (no trailing newline).
pub fn format_output_line(msg: &OutputMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Json(e.to_string()))
}

/// Format an `InputMessage` as a JSON line (no trailing newline).
pub fn format_input_line(msg: &InputMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Json(e.to_string()))
}

fn parse_line<T: serde::de::DeserializeOwned>(line: &str) -> Result<Option<T>, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| ProtocolError::Json(e.to_string()))
}
