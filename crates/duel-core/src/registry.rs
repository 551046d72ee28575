//! Server-side authority over sessions and their participants.
//!
//! - Creates sessions and admits at most two participants each.
//! - Assigns role/color by join order.
//! - Emits `start` to both participants in the same call that makes the
//!   session Active.
//! - Tracks which session each connection belongs to (at most one).
//! - Discards sessions nobody joined once their creator disconnects, and
//!   expires sessions left without a live participant for longer than the
//!   rejoin window.
//!
//! Every mutating operation appends the events it produces to an outbox
//! (`&mut Vec<Delivery>`) so the caller can route them before handling the
//! next request.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::SessionError;
use crate::ids::{ConnectionId, ParticipantToken, SessionId};
use crate::messages::{
    Created, Delivery, Ended, OutputMessage, PeerPresence, RoleAssigned, SessionSnapshot,
};
use crate::role::{Color, Role};
use crate::session::{Session, SessionState};

/// Default cap on concurrently open sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 4096;

/// Default time an idle session is kept for a `rejoin`.
pub const DEFAULT_REJOIN_WINDOW: Duration = Duration::from_secs(120);

/// What a joiner learns about its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub session_id: SessionId,
    pub role: Role,
    pub color: Color,
    pub token: ParticipantToken,
    pub position: String,
    /// True when this join made the session Active.
    pub started: bool,
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    by_connection: HashMap<ConnectionId, SessionId>,
    /// Sessions each connection created, joined or not.
    created_by: HashMap<ConnectionId, Vec<SessionId>>,
    max_sessions: usize,
    rejoin_window: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        SessionRegistry::with_capacity(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    pub fn with_capacity(max_sessions: usize) -> Self {
        SessionRegistry {
            sessions: HashMap::new(),
            by_connection: HashMap::new(),
            created_by: HashMap::new(),
            max_sessions,
            rejoin_window: DEFAULT_REJOIN_WINDOW,
        }
    }

    pub fn set_rejoin_window(&mut self, window: Duration) {
        self.rejoin_window = window;
    }

    pub fn rejoin_window(&self) -> Duration {
        self.rejoin_window
    }

    /// Allocate an empty session in `AwaitingSecond`.
    pub fn create(&mut self, requested: Option<SessionId>) -> Result<SessionId, SessionError> {
        if self.sessions.len() >= self.max_sessions {
            self.expire_idle(Instant::now());
        }
        if self.sessions.len() >= self.max_sessions {
            return Err(SessionError::CapacityExhausted(self.max_sessions));
        }

        let id = match requested {
            Some(id) if self.sessions.contains_key(&id) => {
                return Err(SessionError::SessionExists(id));
            }
            Some(id) => id,
            None => loop {
                let candidate = SessionId::generate();
                if !self.sessions.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        self.sessions.insert(id.clone(), Session::new(id.clone()));
        Ok(id)
    }

    /// `create` plus the `created` reply for the requesting connection.
    pub fn create_for(
        &mut self,
        connection_id: ConnectionId,
        requested: Option<SessionId>,
        out: &mut Vec<Delivery>,
    ) -> Result<SessionId, SessionError> {
        let session_id = self.create(requested)?;
        self.created_by
            .entry(connection_id)
            .or_default()
            .push(session_id.clone());
        out.push(Delivery::new(
            connection_id,
            OutputMessage::Created(Created {
                session_id: session_id.clone(),
            }),
        ));
        Ok(session_id)
    }

    /// Admit `connection_id` into `session_id`.
    ///
    /// The first joiner becomes initiator/white and gets only its role.
    /// The second becomes receiver/black; the session turns Active and
    /// both participants get `start` in the same outbox.
    pub fn join(
        &mut self,
        session_id: &SessionId,
        connection_id: ConnectionId,
        out: &mut Vec<Delivery>,
    ) -> Result<Admission, SessionError> {
        if let Some(current) = self.by_connection.get(&connection_id) {
            return Err(SessionError::AlreadyInSession(current.clone()));
        }

        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.clone()))?;

        if session.state == SessionState::Ended {
            return Err(SessionError::SessionNotFound(session_id.clone()));
        }

        let (role, color, token) = match session.admit(connection_id) {
            Some(p) => (p.role, p.color, p.token.clone()),
            None => return Err(SessionError::SessionFull(session_id.clone())),
        };

        self.by_connection
            .insert(connection_id, session_id.clone());

        out.push(Delivery::new(
            connection_id,
            OutputMessage::Role(RoleAssigned {
                session_id: session_id.clone(),
                role,
                color,
                token: token.clone(),
            }),
        ));

        let started = session.is_full();
        if started {
            session.state = SessionState::Active;
            for conn in session.live_connections() {
                out.push(Delivery::new(
                    conn,
                    OutputMessage::start(session_id.clone(), session.turn, session.position.clone()),
                ));
            }

            // The initiator may be away, waiting to rejoin.
            if let Some(peer) = session.participant_by_role(role.peer()) {
                if !peer.live {
                    out.push(Delivery::new(
                        connection_id,
                        OutputMessage::PeerDisconnected(PeerPresence { role: peer.role }),
                    ));
                }
            }
        }

        Ok(Admission {
            session_id: session_id.clone(),
            role,
            color,
            token,
            position: session.position.clone(),
            started,
        })
    }

    /// Explicit exit by `connection_id`.
    ///
    /// A started game is marked Ended and every live participant is told
    /// so; the session is then dropped.
    pub fn leave(
        &mut self,
        connection_id: ConnectionId,
        out: &mut Vec<Delivery>,
    ) -> Result<SessionId, SessionError> {
        let session_id = self
            .by_connection
            .get(&connection_id)
            .cloned()
            .ok_or(SessionError::NotInSession)?;

        if let Some(mut session) = self.sessions.remove(&session_id) {
            let left = session
                .participant_by_connection(connection_id)
                .map(|p| p.role)
                .unwrap_or(Role::Initiator);

            if session.state != SessionState::AwaitingSecond {
                session.state = SessionState::Ended;
                for conn in session.live_connections() {
                    out.push(Delivery::new(
                        conn,
                        OutputMessage::Ended(Ended {
                            session_id: session_id.clone(),
                            left,
                        }),
                    ));
                }
            }

            for p in session.participants.iter() {
                self.by_connection.remove(&p.connection_id);
            }
        }

        self.by_connection.remove(&connection_id);
        Ok(session_id)
    }

    /// Transport drop for `connection_id`.
    ///
    /// Sessions the connection created that nobody joined are discarded.
    /// The participant is marked offline and its peer notified; the session
    /// survives for a later [`rejoin`](Self::rejoin). A started session with
    /// nobody left is destroyed. A waiting session whose only participant
    /// dropped is kept for the rejoin window.
    /// Returns the affected session, if any.
    pub fn disconnect(
        &mut self,
        connection_id: ConnectionId,
        out: &mut Vec<Delivery>,
    ) -> Option<SessionId> {
        self.discard_unjoined(connection_id);

        let session_id = self.by_connection.remove(&connection_id)?;
        let session = self.sessions.get_mut(&session_id)?;

        let role = {
            let participant = session
                .participants
                .iter_mut()
                .find(|p| p.connection_id == connection_id)?;
            participant.live = false;
            participant.role
        };

        if !session.any_live() {
            if session.state == SessionState::AwaitingSecond {
                session.idle_since = Some(Instant::now());
            } else {
                self.sessions.remove(&session_id);
            }
            return Some(session_id);
        }

        for conn in session.live_connections() {
            out.push(Delivery::new(
                conn,
                OutputMessage::PeerDisconnected(PeerPresence { role }),
            ));
        }

        Some(session_id)
    }

    /// Rebind the slot owning `token` to `connection_id` and push a full
    /// `sync` snapshot to it.
    pub fn rejoin(
        &mut self,
        session_id: &SessionId,
        token: &ParticipantToken,
        connection_id: ConnectionId,
        out: &mut Vec<Delivery>,
    ) -> Result<SessionSnapshot, SessionError> {
        if let Some(current) = self.by_connection.get(&connection_id) {
            return Err(SessionError::AlreadyInSession(current.clone()));
        }

        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.clone()))?;

        let role = session
            .participants
            .iter()
            .find(|p| &p.token == token)
            .map(|p| p.role)
            .ok_or_else(|| SessionError::InvalidToken(session_id.clone()))?;

        let previous = match session.participant_by_role_mut(role) {
            Some(p) => {
                let previous = p.connection_id;
                p.connection_id = connection_id;
                p.live = true;
                previous
            }
            None => return Err(SessionError::InvalidToken(session_id.clone())),
        };
        session.idle_since = None;

        self.by_connection.remove(&previous);
        self.by_connection
            .insert(connection_id, session_id.clone());

        if let Some(peer) = session.participant_by_role(role.peer()) {
            if peer.live {
                out.push(Delivery::new(
                    peer.connection_id,
                    OutputMessage::PeerReconnected(PeerPresence { role }),
                ));
            }
        }

        let snapshot = session.snapshot_for(role);
        out.push(Delivery::new(
            connection_id,
            OutputMessage::Sync(snapshot.clone()),
        ));
        Ok(snapshot)
    }

    /// Drop every session that has had no live participant for at least
    /// the rejoin window as of `now`. Nobody is notified: nobody is there.
    pub fn expire_idle(&mut self, now: Instant) -> Vec<SessionId> {
        let window = self.rejoin_window;
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, session)| {
                session
                    .idle_since
                    .is_some_and(|since| now.saturating_duration_since(since) >= window)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            self.sessions.remove(id);
        }

        let sessions = &self.sessions;
        self.created_by.retain(|_, ids| {
            ids.retain(|id| sessions.contains_key(id));
            !ids.is_empty()
        });

        expired
    }

    /// Remove sessions `connection_id` created that still have no participant.
    fn discard_unjoined(&mut self, connection_id: ConnectionId) {
        let Some(created) = self.created_by.remove(&connection_id) else {
            return;
        };
        for id in created {
            let unjoined = self
                .sessions
                .get(&id)
                .is_some_and(|session| session.participants.is_empty());
            if unjoined {
                self.sessions.remove(&id);
            }
        }
    }

    pub fn session(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn session_mut(&mut self, session_id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(session_id)
    }

    /// Session the connection currently belongs to.
    pub fn session_of(&self, connection_id: ConnectionId) -> Option<&SessionId> {
        self.by_connection.get(&connection_id)
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
