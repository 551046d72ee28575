// crates/duel-client/src/app.rs

use chrono::{DateTime, Local};
use duel_core::{
    Color, CreateChallenge, ErrorKind, ErrorReport, InputMessage, JoinChallenge, MoveRequest,
    MoveValidator, Outcome, OutputMessage, ParticipantToken, Rejoin, Role, SessionId, SessionState,
    SignalRequest, INITIAL_POSITION,
};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::lifecycle::{LifecycleAction, LifecycleState, PeerConnectionLifecycle, PeerFactory};
use crate::link::format_link;
use crate::network::ConnectionEvent;
use crate::types::{ClientConfig, MediaKind, SessionMode};

/// What this client set out to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Create(Option<SessionId>),
    Join(SessionId),
}

/// Side effects the event loop has to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEffect {
    AcquireMedia(MediaKind),
    Notice(String),
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("no active session")]
    NoActiveSession,
    #[error("not connected to the server")]
    Disconnected,
    #[error("it is {0}'s turn")]
    NotYourTurn(Color),
    #[error("previous move still awaiting confirmation")]
    Pending,
    #[error("illegal move: {0}")]
    Illegal(String),
}

#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub san: String,
    pub color: Color,
    pub timestamp: DateTime<Local>,
}

/// A locally validated move the server has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalMove {
    pub san: String,
    pub position: String,
}

pub struct SessionClient<F: PeerFactory> {
    // Connection state
    pub connected: bool,
    server_addr: String,
    session_mode: SessionMode,
    outbound: UnboundedSender<InputMessage>,
    intent: Option<Intent>,

    // Session state
    session_id: Option<SessionId>,
    role: Option<Role>,
    color: Option<Color>,
    token: Option<ParticipantToken>,
    session_state: Option<SessionState>,
    peer_online: bool,
    last_error: Option<ErrorReport>,

    // Game state
    turn: Color,
    position: String,
    provisional: Option<ProvisionalMove>,
    history: Vec<MoveRecord>,
    validator: Box<dyn MoveValidator + Send>,

    lifecycle: PeerConnectionLifecycle<F>,
}

impl<F: PeerFactory> SessionClient<F> {
    pub fn new(
        config: &ClientConfig,
        intent: Intent,
        outbound: UnboundedSender<InputMessage>,
        validator: Box<dyn MoveValidator + Send>,
        factory: F,
    ) -> Self {
        Self {
            connected: false,
            server_addr: config.server_addr.clone(),
            session_mode: config.session_mode,
            outbound,
            intent: Some(intent),
            session_id: None,
            role: None,
            color: None,
            token: None,
            session_state: None,
            peer_online: false,
            last_error: None,
            turn: Color::White,
            position: INITIAL_POSITION.to_string(),
            provisional: None,
            history: Vec::new(),
            validator,
            lifecycle: PeerConnectionLifecycle::new(
                factory,
                config.media,
                config.signal_queue_capacity,
            ),
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.session_state
    }

    pub fn peer_online(&self) -> bool {
        self.peer_online
    }

    pub fn last_error(&self) -> Option<&ErrorReport> {
        self.last_error.as_ref()
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn provisional(&self) -> Option<&ProvisionalMove> {
        self.provisional.as_ref()
    }

    /// Last position confirmed by the server.
    pub fn position(&self) -> &str {
        &self.position
    }

    /// Position to draw: the pending move if there is one.
    pub fn display_position(&self) -> &str {
        match &self.provisional {
            Some(p) => &p.position,
            None => &self.position,
        }
    }

    pub fn media_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Link or id to hand to the other participant.
    pub fn share_target(&self) -> Option<String> {
        let id = self.session_id.as_ref()?;
        Some(match self.session_mode {
            SessionMode::Direct => id.to_string(),
            SessionMode::Linked => format_link(&self.server_addr, id),
        })
    }

    pub fn can_move(&self) -> bool {
        self.session_state == Some(SessionState::Active)
            && self.connected
            && self.color == Some(self.turn)
            && self.provisional.is_none()
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    pub fn handle_connection_event(&mut self, event: ConnectionEvent) -> Vec<ClientEffect> {
        match event {
            ConnectionEvent::Connected => {
                self.connected = true;
                self.resume_or_start();
                let actions = self.lifecycle.on_transport(true);
                let mut effects = vec![ClientEffect::Notice("connected".to_string())];
                effects.extend(self.apply_actions(actions));
                effects
            }
            ConnectionEvent::ConnectError(reason) => {
                vec![ClientEffect::Notice(format!("cannot reach server: {reason}"))]
            }
            ConnectionEvent::Disconnected => {
                self.connected = false;
                self.provisional = None;
                self.lifecycle.on_transport(false);
                vec![ClientEffect::Notice(
                    "connection lost, reconnecting".to_string(),
                )]
            }
            ConnectionEvent::Message(msg) => self.handle_server_message(msg),
        }
    }

    pub fn handle_server_message(&mut self, msg: OutputMessage) -> Vec<ClientEffect> {
        match msg {
            OutputMessage::Created(created) => {
                info!(session = %created.session_id, "session created");
                let join = JoinChallenge {
                    session_id: created.session_id.clone(),
                };
                self.intent = Some(Intent::Join(created.session_id.clone()));
                self.session_id = Some(created.session_id);
                self.send(InputMessage::JoinChallenge(join));

                let share = self.share_target().unwrap_or_default();
                vec![ClientEffect::Notice(format!("share this with your opponent: {share}"))]
            }

            OutputMessage::Role(assigned) => {
                self.intent = None;
                self.session_id = Some(assigned.session_id);
                self.role = Some(assigned.role);
                self.color = Some(assigned.color);
                self.token = Some(assigned.token);
                self.session_state.get_or_insert(SessionState::AwaitingSecond);
                vec![ClientEffect::Notice(format!(
                    "you are the {}, playing {}",
                    assigned.role, assigned.color
                ))]
            }

            OutputMessage::Start(start) => {
                if !self.is_current(&start.session_id) {
                    return Vec::new();
                }
                self.session_state = Some(SessionState::Active);
                self.turn = start.turn;
                self.position = start.position;
                self.provisional = None;
                self.peer_online = true;

                let mut effects = vec![ClientEffect::Notice(format!(
                    "game started, {} to move",
                    self.turn
                ))];
                effects.extend(self.start_media());
                effects
            }

            OutputMessage::Move(applied) => {
                if !self.is_current(&applied.session_id) {
                    return Vec::new();
                }
                self.position = applied.position;
                self.turn = applied.turn;
                self.provisional = None;
                self.history.push(MoveRecord {
                    san: applied.san.clone(),
                    color: applied.turn.opponent(),
                    timestamp: Local::now(),
                });
                let mut effects = vec![ClientEffect::Notice(format!(
                    "{} played {}",
                    applied.turn.opponent(),
                    applied.san
                ))];
                if let Some(outcome) = self.validator.outcome(&self.position) {
                    self.session_state = Some(SessionState::Ended);
                    effects.push(ClientEffect::Notice(describe(outcome)));
                }
                effects
            }

            OutputMessage::Turn(changed) => {
                self.turn = changed.color;
                Vec::new()
            }

            OutputMessage::Signal(relayed) => {
                let Some(session_id) = self.session_id.clone() else {
                    debug!("signal without a session dropped");
                    return Vec::new();
                };
                let actions = self
                    .lifecycle
                    .on_signal(&session_id, relayed.from, relayed.data);
                self.apply_actions(actions)
            }

            OutputMessage::PeerDisconnected(presence) => {
                self.peer_online = false;
                vec![ClientEffect::Notice(format!(
                    "{} disconnected, waiting for them to return",
                    presence.role
                ))]
            }

            OutputMessage::PeerReconnected(presence) => {
                self.peer_online = true;
                let mut effects = vec![ClientEffect::Notice(format!(
                    "{} is back",
                    presence.role
                ))];
                // The returning side renegotiates from scratch, so do we.
                self.lifecycle.reset();
                effects.extend(self.start_media());
                effects
            }

            OutputMessage::Ended(ended) => {
                if !self.is_current(&ended.session_id) {
                    return Vec::new();
                }
                self.lifecycle.close();
                self.session_state = Some(SessionState::Ended);
                self.token = None;
                self.provisional = None;
                vec![
                    ClientEffect::Notice(format!("session ended: the {} left", ended.left)),
                    ClientEffect::Exit,
                ]
            }

            OutputMessage::Sync(snapshot) => {
                info!(session = %snapshot.session_id, state = ?snapshot.state, "resynchronized");
                self.session_id = Some(snapshot.session_id);
                self.role = Some(snapshot.role);
                self.color = Some(snapshot.color);
                self.turn = snapshot.turn;
                self.position = snapshot.position;
                self.session_state = Some(snapshot.state);
                self.peer_online = snapshot.peer_online;
                self.provisional = None;

                let mut effects = vec![ClientEffect::Notice(format!(
                    "rejoined, {} to move",
                    self.turn
                ))];
                if snapshot.state == SessionState::Active {
                    self.lifecycle.reset();
                    effects.extend(self.start_media());
                }
                effects
            }

            OutputMessage::Error(report) => self.handle_error(report),
        }
    }

    /// Outcome of a capture started for [`ClientEffect::AcquireMedia`].
    pub fn capture_finished(&mut self, result: Result<F::Stream, String>) -> Vec<ClientEffect> {
        let actions = match result {
            Ok(stream) => self.lifecycle.on_capture_granted(stream),
            Err(reason) => self.lifecycle.on_capture_denied(reason),
        };
        self.apply_actions(actions)
    }

    // -------------------------------------------------------------------------
    // User actions
    // -------------------------------------------------------------------------

    /// Validate `san` locally, show it provisionally and send it. The server
    /// echo (or error) settles it.
    pub fn submit_move(&mut self, san: &str) -> Result<(), MoveError> {
        let session_id = match (&self.session_id, self.session_state) {
            (Some(id), Some(SessionState::Active)) => id.clone(),
            _ => return Err(MoveError::NoActiveSession),
        };
        if !self.connected {
            return Err(MoveError::Disconnected);
        }
        if self.color != Some(self.turn) {
            return Err(MoveError::NotYourTurn(self.turn));
        }
        if self.provisional.is_some() {
            return Err(MoveError::Pending);
        }

        let validated = self
            .validator
            .validate(&self.position, san)
            .map_err(|e| MoveError::Illegal(e.reason))?;

        self.provisional = Some(ProvisionalMove {
            san: validated.san.clone(),
            position: validated.position,
        });
        self.send(InputMessage::Move(MoveRequest {
            session_id,
            san: validated.san,
        }));
        Ok(())
    }

    /// Leave the session and release media.
    pub fn leave(&mut self) -> Vec<ClientEffect> {
        self.lifecycle.close();
        if self.session_id.is_none() {
            return Vec::new();
        }
        self.send(InputMessage::Leave);
        self.clear_session();
        vec![ClientEffect::Notice("left the session".to_string())]
    }

    pub fn shutdown(&mut self) {
        self.lifecycle.close();
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn resume_or_start(&mut self) {
        if let (Some(session_id), Some(token)) = (&self.session_id, &self.token) {
            let rejoin = Rejoin {
                session_id: session_id.clone(),
                token: token.clone(),
            };
            self.send(InputMessage::Rejoin(rejoin));
            return;
        }

        match self.intent.clone() {
            Some(Intent::Create(session_id)) => {
                self.send(InputMessage::CreateChallenge(CreateChallenge {
                    session_id,
                }));
            }
            Some(Intent::Join(session_id)) => {
                self.send(InputMessage::JoinChallenge(JoinChallenge { session_id }));
            }
            None => {}
        }
    }

    fn handle_error(&mut self, report: ErrorReport) -> Vec<ClientEffect> {
        warn!(kind = ?report.kind, message = %report.message, "server error");
        let mut effects = vec![ClientEffect::Notice(format!("error: {}", report.message))];

        match report.kind {
            ErrorKind::TurnViolation | ErrorKind::IllegalMove | ErrorKind::SessionNotActive => {
                // Roll back to the last confirmed position.
                self.provisional = None;
            }
            kind if kind.is_terminal() || kind == ErrorKind::InvalidToken => {
                self.lifecycle.close();
                self.clear_session();
                self.intent = None;
                effects.push(ClientEffect::Exit);
            }
            ErrorKind::SessionFull | ErrorKind::SessionExists | ErrorKind::CapacityExhausted => {
                effects.push(ClientEffect::Exit);
            }
            _ => {}
        }

        self.last_error = Some(report);
        effects
    }

    fn start_media(&mut self) -> Vec<ClientEffect> {
        let (Some(session_id), Some(role)) = (self.session_id.clone(), self.role) else {
            return Vec::new();
        };
        let actions = self.lifecycle.on_session_active(&session_id, role);
        self.apply_actions(actions)
    }

    fn apply_actions(&mut self, actions: Vec<LifecycleAction>) -> Vec<ClientEffect> {
        let mut effects = Vec::new();
        for action in actions {
            match action {
                LifecycleAction::AcquireMedia(kind) => effects.push(ClientEffect::AcquireMedia(kind)),
                LifecycleAction::SendSignal { to, data } => {
                    let Some(session_id) = self.session_id.clone() else {
                        continue;
                    };
                    self.send(InputMessage::Signal(SignalRequest {
                        session_id,
                        to,
                        data,
                    }));
                }
                LifecycleAction::ChannelOpen => {
                    effects.push(ClientEffect::Notice("media channel open".to_string()))
                }
                LifecycleAction::Report(err) => effects.push(ClientEffect::Notice(format!(
                    "{err}; continuing without media"
                ))),
            }
        }
        effects
    }

    fn clear_session(&mut self) {
        self.session_id = None;
        self.role = None;
        self.color = None;
        self.token = None;
        self.session_state = None;
        self.peer_online = false;
        self.provisional = None;
        self.turn = Color::White;
        self.position = INITIAL_POSITION.to_string();
        self.history.clear();
    }

    fn is_current(&self, session_id: &SessionId) -> bool {
        self.session_id.as_ref() == Some(session_id)
    }

    fn send(&self, msg: InputMessage) {
        if self.outbound.send(msg).is_err() {
            debug!("connection task gone; request dropped");
        }
    }
}

fn describe(outcome: Outcome) -> String {
    match outcome {
        Outcome::Checkmate { winner } => format!("checkmate, {winner} wins"),
        Outcome::Stalemate => "stalemate, the game is drawn".to_string(),
    }
}
