//! Authority over the board position and turn of a session.
//!
//! Moves are gated by turn first, then by the [`MoveValidator`]. A rejected
//! move never touches the session. An accepted move updates position and
//! turn together and is broadcast to both participants, the submitter
//! included, so clients reconcile from the broadcast instead of trusting
//! their own optimistic apply. A move that mates or stalemates leaves the
//! session Ended.

use crate::error::SessionError;
use crate::ids::ConnectionId;
use crate::messages::{Delivery, MoveApplied, OutputMessage};
use crate::session::{Session, SessionState};
use crate::validator::MoveValidator;

#[derive(Debug)]
pub struct GameStateReplicator<V> {
    validator: V,
}

impl<V: MoveValidator> GameStateReplicator<V> {
    pub fn new(validator: V) -> Self {
        GameStateReplicator { validator }
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Validate and apply `san` on behalf of `connection_id`.
    pub fn submit_move(
        &self,
        session: &mut Session,
        connection_id: ConnectionId,
        san: &str,
        out: &mut Vec<Delivery>,
    ) -> Result<MoveApplied, SessionError> {
        let color = session
            .participant_by_connection(connection_id)
            .map(|p| p.color)
            .ok_or(SessionError::NotInSession)?;

        if session.state != SessionState::Active {
            return Err(SessionError::SessionNotActive(session.id().clone()));
        }

        if color != session.turn {
            return Err(SessionError::TurnViolation { turn: session.turn });
        }

        let validated = self
            .validator
            .validate(&session.position, san)
            .map_err(|rejected| SessionError::IllegalMove {
                san: san.to_string(),
                reason: rejected.reason,
            })?;

        session.position = validated.position;
        session.turn = session.turn.opponent();
        session.move_count += 1;
        if validated.outcome.is_some() {
            // Mate or stalemate: the board is final, further moves are refused.
            session.state = SessionState::Ended;
        }

        let applied = MoveApplied {
            session_id: session.id().clone(),
            san: validated.san,
            position: session.position.clone(),
            turn: session.turn,
        };

        for conn in session.live_connections() {
            out.push(Delivery::new(conn, OutputMessage::Move(applied.clone())));
            out.push(Delivery::new(conn, OutputMessage::turn(session.turn)));
        }

        Ok(applied)
    }
}
