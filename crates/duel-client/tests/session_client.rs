// crates/duel-client/tests/session_client.rs
use duel_client::app::{ClientEffect, Intent, MoveError, SessionClient};
use duel_client::lifecycle::LifecycleState;
use duel_client::network::ConnectionEvent;
use duel_client::peer::{CapturedStream, HandshakeFactory};
use duel_client::types::{ClientConfig, MediaKind};
use duel_core::{
    ChessValidator, Color, Created, Ended, ErrorKind, ErrorReport, InputMessage, MoveValidator,
    OutputMessage, ParticipantToken, Role, RoleAssigned, SessionId, SessionSnapshot,
    SessionState, INITIAL_POSITION,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b";

fn session() -> SessionId {
    SessionId::parse("client-test").unwrap()
}

fn client(intent: Intent) -> (SessionClient<HandshakeFactory>, UnboundedReceiver<InputMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = SessionClient::new(
        &ClientConfig::default(),
        intent,
        tx,
        Box::new(ChessValidator),
        HandshakeFactory,
    );
    (client, rx)
}

fn sent(rx: &mut UnboundedReceiver<InputMessage>) -> Vec<InputMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn role(role: Role) -> OutputMessage {
    OutputMessage::Role(RoleAssigned {
        session_id: session(),
        role,
        color: role.color(),
        token: ParticipantToken::new(format!("token-{role}")),
    })
}

/// Connected, joined as `as_role`, game started.
fn started(
    as_role: Role,
) -> (
    SessionClient<HandshakeFactory>,
    UnboundedReceiver<InputMessage>,
    Vec<ClientEffect>,
) {
    let (mut client, mut rx) = client(Intent::Join(session()));
    client.handle_connection_event(ConnectionEvent::Connected);
    client.handle_server_message(role(as_role));
    let effects = client.handle_server_message(OutputMessage::start(
        session(),
        Color::White,
        INITIAL_POSITION,
    ));
    sent(&mut rx);
    (client, rx, effects)
}

fn notices(effects: &[ClientEffect]) -> Vec<&str> {
    effects
        .iter()
        .filter_map(|e| match e {
            ClientEffect::Notice(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn create_intent_creates_then_joins() {
    let (mut client, mut rx) = client(Intent::Create(None));

    client.handle_connection_event(ConnectionEvent::Connected);
    assert!(matches!(
        sent(&mut rx).as_slice(),
        [InputMessage::CreateChallenge(c)] if c.session_id.is_none()
    ));

    let effects = client.handle_server_message(OutputMessage::Created(Created {
        session_id: session(),
    }));
    assert!(matches!(
        sent(&mut rx).as_slice(),
        [InputMessage::JoinChallenge(j)] if j.session_id == session()
    ));
    assert!(notices(&effects)
        .iter()
        .any(|n| n.contains("duel://127.0.0.1:3000/s/client-test")));

    client.handle_server_message(role(Role::Initiator));
    assert_eq!(client.session_state(), Some(SessionState::AwaitingSecond));
    assert_eq!(client.color(), Some(Color::White));
}

#[test]
fn start_acquires_media_and_initiator_offers() {
    let (mut client, mut rx, effects) = started(Role::Initiator);
    assert!(effects.contains(&ClientEffect::AcquireMedia(MediaKind::Audio)));
    assert_eq!(client.media_state(), LifecycleState::AcquiringMedia);

    client.capture_finished(Ok(CapturedStream::new(MediaKind::Audio)));
    let signals: Vec<_> = sent(&mut rx)
        .into_iter()
        .filter_map(|m| match m {
            InputMessage::Signal(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(signals.len(), 2);
    assert!(signals.iter().all(|s| s.to == Role::Receiver));
    assert!(signals[0].data.contains("offer"));
    assert_eq!(client.media_state(), LifecycleState::Negotiating);
}

#[test]
fn own_move_is_provisional_until_echoed() {
    let (mut client, mut rx, _) = started(Role::Initiator);
    assert!(client.can_move());

    client.submit_move("e4").unwrap();
    assert!(matches!(
        sent(&mut rx).as_slice(),
        [InputMessage::Move(m)] if m.san == "e4"
    ));
    assert!(!client.can_move());
    assert!(client.display_position().starts_with(AFTER_E4));
    assert_eq!(client.position(), INITIAL_POSITION);
    assert_eq!(client.submit_move("d4"), Err(MoveError::Pending));

    let after = ChessValidator.validate(INITIAL_POSITION, "e4").unwrap().position;
    client.handle_server_message(OutputMessage::move_applied(
        session(),
        "e4",
        after.clone(),
        Color::Black,
    ));
    client.handle_server_message(OutputMessage::turn(Color::Black));

    assert!(client.provisional().is_none());
    assert_eq!(client.position(), after);
    assert_eq!(client.turn(), Color::Black);
    assert_eq!(client.history().len(), 1);
    assert_eq!(client.history()[0].color, Color::White);
}

#[test]
fn mate_on_the_board_ends_the_game_locally() {
    let (mut client, _rx, _) = started(Role::Initiator);

    let mut position = INITIAL_POSITION.to_string();
    let mut effects = Vec::new();
    for (san, turn) in [
        ("f3", Color::Black),
        ("e5", Color::White),
        ("g4", Color::Black),
        ("Qh4", Color::White),
    ] {
        let validated = ChessValidator.validate(&position, san).unwrap();
        position = validated.position.clone();
        effects = client.handle_server_message(OutputMessage::move_applied(
            session(),
            validated.san,
            validated.position,
            turn,
        ));
    }

    assert_eq!(
        notices(&effects),
        vec!["black played Qh4#", "checkmate, black wins"]
    );
    assert_eq!(client.session_state(), Some(SessionState::Ended));
    assert_eq!(client.submit_move("Ke2"), Err(MoveError::NoActiveSession));
}

#[test]
fn server_rejection_rolls_back_to_confirmed_position() {
    let (mut client, _rx, _) = started(Role::Initiator);
    client.submit_move("e4").unwrap();

    client.handle_server_message(OutputMessage::Error(ErrorReport {
        kind: ErrorKind::IllegalMove,
        message: "illegal move e4".to_string(),
    }));
    assert!(client.provisional().is_none());
    assert_eq!(client.display_position(), INITIAL_POSITION);
    assert!(client.can_move());
    assert_eq!(client.last_error().map(|e| e.kind), Some(ErrorKind::IllegalMove));
}

#[test]
fn local_checks_stop_bad_moves_before_sending() {
    let (mut client, mut rx, _) = started(Role::Receiver);
    assert_eq!(client.submit_move("e5"), Err(MoveError::NotYourTurn(Color::White)));

    let (mut client, _, _) = started(Role::Initiator);
    assert!(matches!(client.submit_move("e5"), Err(MoveError::Illegal(_))));
    assert!(sent(&mut rx).is_empty());

    let (mut fresh, _) = self::client(Intent::Join(session()));
    assert_eq!(fresh.submit_move("e4"), Err(MoveError::NoActiveSession));
}

#[test]
fn reconnect_rejoins_with_token_and_sync_restores_state() {
    let (mut client, mut rx, _) = started(Role::Initiator);

    client.handle_connection_event(ConnectionEvent::Disconnected);
    assert!(!client.connected);
    assert_eq!(client.submit_move("e4"), Err(MoveError::Disconnected));

    client.handle_connection_event(ConnectionEvent::Connected);
    match sent(&mut rx).as_slice() {
        [InputMessage::Rejoin(r)] => {
            assert_eq!(r.session_id, session());
            assert_eq!(r.token, ParticipantToken::new("token-initiator"));
        }
        other => panic!("expected rejoin, got {other:?}"),
    }

    let after = ChessValidator.validate(INITIAL_POSITION, "e4").unwrap().position;
    let effects = client.handle_server_message(OutputMessage::Sync(SessionSnapshot {
        session_id: session(),
        role: Role::Initiator,
        color: Color::White,
        turn: Color::Black,
        position: after.clone(),
        state: SessionState::Active,
        peer_online: false,
    }));
    assert_eq!(client.position(), after);
    assert_eq!(client.turn(), Color::Black);
    assert!(!client.peer_online());
    // Media restarts from scratch after a resync.
    assert!(effects.contains(&ClientEffect::AcquireMedia(MediaKind::Audio)));
}

#[test]
fn rejected_token_clears_the_session() {
    let (mut client, _rx, _) = started(Role::Receiver);

    let effects = client.handle_server_message(OutputMessage::Error(ErrorReport {
        kind: ErrorKind::InvalidToken,
        message: "participant token rejected".to_string(),
    }));
    assert!(effects.contains(&ClientEffect::Exit));
    assert!(client.session_id().is_none());
    assert!(client.role().is_none());
    assert_eq!(client.media_state(), LifecycleState::Closed);
}

#[test]
fn ended_session_closes_media_and_exits() {
    let (mut client, _rx, _) = started(Role::Initiator);
    client.capture_finished(Ok(CapturedStream::new(MediaKind::Audio)));

    let effects = client.handle_server_message(OutputMessage::Ended(Ended {
        session_id: session(),
        left: Role::Receiver,
    }));
    assert!(effects.contains(&ClientEffect::Exit));
    assert_eq!(client.session_state(), Some(SessionState::Ended));
    assert_eq!(client.media_state(), LifecycleState::Closed);
}

#[test]
fn capture_failure_keeps_the_game_playable() {
    let (mut client, mut rx, _) = started(Role::Initiator);

    let effects = client.capture_finished(Err("media capture is disabled".to_string()));
    assert!(notices(&effects)
        .iter()
        .any(|n| n.contains("continuing without media")));
    assert_eq!(client.media_state(), LifecycleState::Failed);

    client.submit_move("e4").unwrap();
    assert!(matches!(sent(&mut rx).as_slice(), [InputMessage::Move(_)]));
}

#[test]
fn leave_notifies_server_and_forgets_session() {
    let (mut client, mut rx, _) = started(Role::Receiver);

    client.leave();
    assert!(matches!(sent(&mut rx).as_slice(), [InputMessage::Leave]));
    assert!(client.session_id().is_none());
    assert_eq!(client.media_state(), LifecycleState::Closed);

    // Nothing more to send once out of a session.
    assert!(client.leave().is_empty());
    assert!(sent(&mut rx).is_empty());
}
