//! Console media backend.
//!
//! A terminal has no camera, so local capture yields a placeholder stream
//! and the peer runs an offer/answer/candidate exchange without moving any
//! media. It exercises the same ordering the relay must honor: a candidate
//! is rejected until the remote description is known.

use duel_core::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::lifecycle::{MediaStream, PeerEvent, PeerFactory, PeerLink};
use crate::types::MediaKind;

/// Negotiation payload carried inside relayed signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Handshake {
    Offer { media: MediaKind },
    Answer { media: MediaKind },
    Candidate { addr: String },
}

impl Handshake {
    pub fn encode(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| e.to_string())
    }

    pub fn decode(data: &str) -> Result<Self, String> {
        serde_json::from_str(data).map_err(|e| format!("unreadable signal: {e}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("media capture is disabled")]
    Disabled,
}

#[derive(Debug)]
pub struct CapturedStream {
    media: MediaKind,
    live: bool,
}

impl CapturedStream {
    pub fn new(media: MediaKind) -> Self {
        CapturedStream { media, live: true }
    }

    pub fn media(&self) -> MediaKind {
        self.media
    }

    pub fn is_live(&self) -> bool {
        self.live
    }
}

impl MediaStream for CapturedStream {
    fn stop(&mut self) {
        if self.live {
            debug!(media = ?self.media, "capture stopped");
            self.live = false;
        }
    }
}

/// Acquire local media. Refused when capture is turned off in the config.
pub async fn acquire(media: MediaKind, enabled: bool) -> Result<CapturedStream, CaptureError> {
    if !enabled {
        return Err(CaptureError::Disabled);
    }
    tokio::task::yield_now().await;
    Ok(CapturedStream::new(media))
}

#[derive(Debug)]
pub struct HandshakePeer {
    role: Role,
    media: MediaKind,
    remote_described: bool,
    candidates: usize,
    open: bool,
    destroyed: bool,
}

impl HandshakePeer {
    pub fn new(role: Role, media: MediaKind) -> Self {
        HandshakePeer {
            role,
            media,
            remote_described: false,
            candidates: 0,
            open: false,
            destroyed: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn local_candidate(&self) -> Handshake {
        Handshake::Candidate {
            addr: format!("console-{}", self.role),
        }
    }

    fn check_open(&mut self, events: &mut Vec<PeerEvent>) {
        if !self.open && self.remote_described && self.candidates > 0 {
            self.open = true;
            events.push(PeerEvent::Open);
        }
    }
}

impl PeerLink for HandshakePeer {
    fn start(&mut self) -> Result<Vec<PeerEvent>, String> {
        if self.role != Role::Initiator {
            return Ok(Vec::new());
        }
        let offer = Handshake::Offer { media: self.media };
        Ok(vec![
            PeerEvent::Signal(offer.encode()?),
            PeerEvent::Signal(self.local_candidate().encode()?),
        ])
    }

    fn apply_signal(&mut self, data: &str) -> Result<Vec<PeerEvent>, String> {
        if self.destroyed {
            return Err("peer already destroyed".to_string());
        }

        let mut events = Vec::new();
        match Handshake::decode(data)? {
            Handshake::Offer { media } => {
                if self.role == Role::Initiator {
                    return Err("initiator received an offer".to_string());
                }
                if media != self.media {
                    debug!(?media, local = ?self.media, "media kinds differ");
                }
                // A repeated offer renegotiates from scratch.
                self.remote_described = true;
                self.candidates = 0;
                self.open = false;
                let answer = Handshake::Answer { media: self.media };
                events.push(PeerEvent::Signal(answer.encode()?));
                events.push(PeerEvent::Signal(self.local_candidate().encode()?));
            }
            Handshake::Answer { .. } => {
                if self.role == Role::Receiver {
                    return Err("receiver received an answer".to_string());
                }
                self.remote_described = true;
            }
            Handshake::Candidate { addr } => {
                if !self.remote_described {
                    return Err(format!("candidate {addr} before remote description"));
                }
                self.candidates += 1;
            }
        }

        self.check_open(&mut events);
        Ok(events)
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            info!(role = %self.role, "peer destroyed");
            self.destroyed = true;
            self.open = false;
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HandshakeFactory;

impl PeerFactory for HandshakeFactory {
    type Stream = CapturedStream;
    type Peer = HandshakePeer;

    fn create(&mut self, role: Role, stream: &CapturedStream) -> Result<HandshakePeer, String> {
        if !stream.is_live() {
            return Err("capture already stopped".to_string());
        }
        Ok(HandshakePeer::new(role, stream.media()))
    }
}
