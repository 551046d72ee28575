//! Client-side lifecycle of the peer media channel.
//!
//! ```text
//! Idle --session active--> AcquiringMedia --capture granted--> AwaitingPeer
//!      --peer constructed (transport up)--> Negotiating --peer open--> Connected
//! ```
//!
//! Any state may fall to `Failed` (capture denied, negotiation error) or
//! `Closed` (explicit teardown). Neither touches the game session; the board
//! keeps working without media.
//!
//! The lifecycle does no I/O. Each event returns [`LifecycleAction`]s for
//! the owner to carry out (start a capture, send a signal through the relay,
//! report an error).

use duel_core::{Role, SessionId};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::signal_queue::{QueueError, QueuedSignal, SignalQueue};
use crate::types::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    AcquiringMedia,
    AwaitingPeer,
    Negotiating,
    Connected,
    Closed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("media access denied: {0}")]
    MediaAccessDenied(String),
    #[error("peer negotiation failed: {0}")]
    NegotiationFailed(String),
}

/// Something the owner of the lifecycle must do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Start capturing local media and report back through
    /// [`PeerConnectionLifecycle::on_capture_granted`] or
    /// [`PeerConnectionLifecycle::on_capture_denied`].
    AcquireMedia(MediaKind),
    /// Relay an opaque payload to the other participant.
    SendSignal { to: Role, data: String },
    /// The peer channel is open.
    ChannelOpen,
    /// Tell the user; the game session continues.
    Report(LifecycleError),
}

/// A captured local media stream.
pub trait MediaStream {
    /// Stop every track. Called at most once per stream.
    fn stop(&mut self);
}

/// What a peer object reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Outgoing negotiation payload for the remote peer.
    Signal(String),
    Open,
    Closed,
}

/// The local end of the peer channel.
pub trait PeerLink {
    /// Begin negotiation (the initiator sends its offer here).
    fn start(&mut self) -> Result<Vec<PeerEvent>, String>;
    /// Feed one payload from the remote peer.
    fn apply_signal(&mut self, data: &str) -> Result<Vec<PeerEvent>, String>;
    /// Tear the channel down. Called at most once per peer.
    fn destroy(&mut self);
}

pub trait PeerFactory {
    type Stream: MediaStream;
    type Peer: PeerLink;

    fn create(&mut self, role: Role, stream: &Self::Stream) -> Result<Self::Peer, String>;
}

pub struct PeerConnectionLifecycle<F: PeerFactory> {
    factory: F,
    media: MediaKind,
    state: LifecycleState,
    session: Option<(SessionId, Role)>,
    transport_up: bool,
    stream: Option<F::Stream>,
    peer: Option<F::Peer>,
    queue: SignalQueue,
}

impl<F: PeerFactory> PeerConnectionLifecycle<F> {
    pub fn new(factory: F, media: MediaKind, queue_capacity: usize) -> Self {
        PeerConnectionLifecycle {
            factory,
            media,
            state: LifecycleState::Idle,
            session: None,
            transport_up: false,
            stream: None,
            peer: None,
            queue: SignalQueue::with_capacity(queue_capacity),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn media(&self) -> MediaKind {
        self.media
    }

    /// Number of early signals waiting for the peer.
    pub fn queued_signals(&self) -> usize {
        self.queue.len()
    }

    pub fn has_peer(&self) -> bool {
        self.peer.is_some()
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Role and session are known and the session is Active.
    pub fn on_session_active(&mut self, session_id: &SessionId, role: Role) -> Vec<LifecycleAction> {
        if self.state != LifecycleState::Idle {
            debug!(state = ?self.state, "session already driving a lifecycle");
            return Vec::new();
        }

        self.queue.bind(session_id);
        self.session = Some((session_id.clone(), role));
        self.state = LifecycleState::AcquiringMedia;
        vec![LifecycleAction::AcquireMedia(self.media)]
    }

    pub fn on_capture_granted(&mut self, mut stream: F::Stream) -> Vec<LifecycleAction> {
        if self.state != LifecycleState::AcquiringMedia {
            // Torn down while capture was pending.
            debug!(state = ?self.state, "releasing late capture");
            stream.stop();
            return Vec::new();
        }

        self.stream = Some(stream);
        self.state = LifecycleState::AwaitingPeer;
        self.try_construct_peer()
    }

    pub fn on_capture_denied(&mut self, reason: impl Into<String>) -> Vec<LifecycleAction> {
        if self.state != LifecycleState::AcquiringMedia {
            return Vec::new();
        }
        self.fail(LifecycleError::MediaAccessDenied(reason.into()))
    }

    /// The relay transport went up or down. The peer is only constructed
    /// while it is up.
    pub fn on_transport(&mut self, up: bool) -> Vec<LifecycleAction> {
        self.transport_up = up;
        if up && self.state == LifecycleState::AwaitingPeer {
            return self.try_construct_peer();
        }
        Vec::new()
    }

    /// A relayed payload from the other participant.
    pub fn on_signal(
        &mut self,
        session_id: &SessionId,
        from: Role,
        data: String,
    ) -> Vec<LifecycleAction> {
        if let Some((_, role)) = &self.session {
            if from != role.peer() {
                warn!(%from, "signal from unexpected role dropped");
                return Vec::new();
            }
        }

        match self.state {
            LifecycleState::Idle | LifecycleState::AcquiringMedia | LifecycleState::AwaitingPeer => {
                match self.queue.push(session_id, QueuedSignal { from, data }) {
                    Ok(()) => Vec::new(),
                    Err(QueueError::StaleSession(other)) => {
                        debug!(session = %other, "stale signal discarded");
                        Vec::new()
                    }
                    Err(err) => self.fail(LifecycleError::NegotiationFailed(err.to_string())),
                }
            }
            LifecycleState::Negotiating | LifecycleState::Connected => {
                if !self.is_current(session_id) {
                    debug!(session = %session_id, "signal for other session discarded");
                    return Vec::new();
                }
                self.apply_to_peer(&data)
            }
            LifecycleState::Closed | LifecycleState::Failed => {
                debug!(state = ?self.state, "signal after teardown discarded");
                Vec::new()
            }
        }
    }

    /// Explicit teardown (navigation, leave, session end). Safe to call any
    /// number of times.
    pub fn close(&mut self) {
        self.teardown();
        if self.state != LifecycleState::Closed {
            info!(from = ?self.state, "peer channel closed");
            self.state = LifecycleState::Closed;
        }
    }

    /// Back to `Idle` so a new attempt can start, releasing anything held.
    pub fn reset(&mut self) {
        self.teardown();
        self.state = LifecycleState::Idle;
    }

    // -------------------------------------------------------------------------
    // Internal handlers
    // -------------------------------------------------------------------------

    fn try_construct_peer(&mut self) -> Vec<LifecycleAction> {
        if !self.transport_up {
            debug!("transport down; peer construction deferred");
            return Vec::new();
        }

        let Some((_, role)) = self.session.clone() else {
            return Vec::new();
        };
        let Some(stream) = self.stream.as_ref() else {
            return Vec::new();
        };

        let mut peer = match self.factory.create(role, stream) {
            Ok(peer) => peer,
            Err(e) => return self.fail(LifecycleError::NegotiationFailed(e)),
        };

        let started = peer.start();
        self.peer = Some(peer);
        self.state = LifecycleState::Negotiating;

        let mut actions = match started {
            Ok(events) => self.handle_peer_events(events),
            Err(e) => return self.fail(LifecycleError::NegotiationFailed(e)),
        };

        // Early signals go in before any live one, exactly once.
        let early = self.queue.flush().unwrap_or_default();
        if !early.is_empty() {
            debug!(count = early.len(), "flushing early signals");
        }
        for signal in early {
            actions.extend(self.apply_to_peer(&signal.data));
            if self.state == LifecycleState::Failed {
                break;
            }
        }

        actions
    }

    fn apply_to_peer(&mut self, data: &str) -> Vec<LifecycleAction> {
        let result = match self.peer.as_mut() {
            Some(peer) => peer.apply_signal(data),
            None => return Vec::new(),
        };
        match result {
            Ok(events) => self.handle_peer_events(events),
            Err(e) => self.fail(LifecycleError::NegotiationFailed(e)),
        }
    }

    fn handle_peer_events(&mut self, events: Vec<PeerEvent>) -> Vec<LifecycleAction> {
        let mut actions = Vec::new();
        let Some((_, role)) = self.session.clone() else {
            return actions;
        };

        for event in events {
            match event {
                PeerEvent::Signal(data) => actions.push(LifecycleAction::SendSignal {
                    to: role.peer(),
                    data,
                }),
                PeerEvent::Open => {
                    if self.state != LifecycleState::Connected {
                        info!(%role, "peer channel open");
                        self.state = LifecycleState::Connected;
                        actions.push(LifecycleAction::ChannelOpen);
                    }
                }
                PeerEvent::Closed => {
                    self.close();
                    break;
                }
            }
        }
        actions
    }

    fn fail(&mut self, err: LifecycleError) -> Vec<LifecycleAction> {
        warn!(%err, "peer channel failed");
        self.teardown();
        self.state = LifecycleState::Failed;
        vec![LifecycleAction::Report(err)]
    }

    /// Destroy the peer, stop capture and drop queued signals. Each resource
    /// is taken before release, so repeated calls release nothing twice.
    fn teardown(&mut self) {
        if let Some(mut peer) = self.peer.take() {
            peer.destroy();
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.queue.clear();
        self.session = None;
    }

    fn is_current(&self, session_id: &SessionId) -> bool {
        matches!(&self.session, Some((current, _)) if current == session_id)
    }
}
