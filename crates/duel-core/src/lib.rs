//! duel-core
//!
//! Pure session coordination logic:
//! - ids, roles and colors
//! - messages (input/output types)
//! - session registry (admission, roles, liveness)
//! - signal relay
//! - game-state replicator gated by turn and a move validator
//! - coordinator tying them together

pub mod ids;
pub mod role;
pub mod error;
pub mod messages;
pub mod session;
pub mod validator;
pub mod registry;
pub mod relay;
pub mod replicator;
pub mod coordinator;

pub use ids::{ConnectionId, ParticipantToken, SessionId};
pub use role::{Color, Role};

pub use messages::{
    CreateChallenge,
    Created,
    Delivery,
    Ended,
    ErrorReport,
    InputMessage,
    JoinChallenge,
    MoveApplied,
    MoveRequest,
    OutputMessage,
    PeerPresence,
    Rejoin,
    RoleAssigned,
    SessionSnapshot,
    SignalRelayed,
    SignalRequest,
    Start,
    TurnChanged,
};

pub use error::{ErrorKind, SessionError};
pub use session::{Participant, Session, SessionState, INITIAL_POSITION};
pub use validator::{ChessValidator, MoveRejected, MoveValidator, Outcome, ValidatedMove};
pub use registry::{Admission, SessionRegistry};
pub use relay::{RelayDrop, SignalRelay};
pub use replicator::GameStateReplicator;
pub use coordinator::SessionCoordinator;
