//! Shareable session links.
//!
//! A session is addressable as `duel://host:port/s/<session-id>`. The
//! path-only form `/s/<session-id>` and a bare session id are accepted too.

use duel_core::SessionId;
use thiserror::Error;

pub const LINK_SCHEME: &str = "duel://";
const SESSION_SEGMENT: &str = "/s/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    /// Server address carried by a full link.
    pub server_addr: Option<String>,
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a session link or id: {0:?}")]
pub struct LinkError(pub String);

pub fn format_link(server_addr: &str, session_id: &SessionId) -> String {
    format!("{LINK_SCHEME}{server_addr}{SESSION_SEGMENT}{session_id}")
}

pub fn parse_link(input: &str) -> Result<SessionTarget, LinkError> {
    let trimmed = input.trim();
    let invalid = || LinkError(trimmed.to_string());

    let (server_addr, raw_id) = if let Some(rest) = trimmed.strip_prefix(LINK_SCHEME) {
        let (host, id) = rest.split_once(SESSION_SEGMENT).ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        (Some(host.to_string()), id)
    } else if let Some(id) = trimmed.strip_prefix(SESSION_SEGMENT) {
        (None, id)
    } else {
        (None, trimmed)
    };

    let session_id = SessionId::parse(raw_id.trim_end_matches('/')).ok_or_else(invalid)?;
    Ok(SessionTarget {
        server_addr,
        session_id,
    })
}
