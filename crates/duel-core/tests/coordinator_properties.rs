// crates/duel-core/tests/coordinator_properties.rs
use std::time::{Duration, Instant};

use duel_core::{
    ChessValidator, Color, ConnectionId, CreateChallenge, Delivery, ErrorKind, InputMessage,
    JoinChallenge, MoveRejected, MoveRequest, OutputMessage, ParticipantToken, Rejoin, Role,
    SessionCoordinator, SessionId, SessionState, SignalRequest, ValidatedMove, INITIAL_POSITION,
};

const A: ConnectionId = ConnectionId(1);
const B: ConnectionId = ConnectionId(2);
const C: ConnectionId = ConnectionId(3);
const D: ConnectionId = ConnectionId(4);

const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b";

/// Accepts anything and appends the move to the position text.
fn accept_all(position: &str, san: &str) -> Result<ValidatedMove, MoveRejected> {
    Ok(ValidatedMove {
        san: san.to_string(),
        position: format!("{position} {san}"),
        outcome: None,
    })
}

fn reject_all(_position: &str, san: &str) -> Result<ValidatedMove, MoveRejected> {
    Err(MoveRejected::new(format!("{san} refused")))
}

fn for_conn(deliveries: &[Delivery], conn: ConnectionId) -> Vec<OutputMessage> {
    deliveries
        .iter()
        .filter(|d| d.to == conn)
        .map(|d| d.msg.clone())
        .collect()
}

fn error_kind(deliveries: &[Delivery], conn: ConnectionId) -> Option<ErrorKind> {
    deliveries.iter().find_map(|d| match &d.msg {
        OutputMessage::Error(report) if d.to == conn => Some(report.kind),
        _ => None,
    })
}

fn create<V: duel_core::MoveValidator>(
    coordinator: &mut SessionCoordinator<V>,
    conn: ConnectionId,
) -> SessionId {
    let out = coordinator.process_message(
        conn,
        InputMessage::CreateChallenge(CreateChallenge { session_id: None }),
    );
    match out.as_slice() {
        [Delivery {
            msg: OutputMessage::Created(created),
            ..
        }] => created.session_id.clone(),
        other => panic!("unexpected create reply: {other:?}"),
    }
}

fn join<V: duel_core::MoveValidator>(
    coordinator: &mut SessionCoordinator<V>,
    conn: ConnectionId,
    session_id: &SessionId,
) -> Vec<Delivery> {
    coordinator.process_message(
        conn,
        InputMessage::JoinChallenge(JoinChallenge {
            session_id: session_id.clone(),
        }),
    )
}

fn play<V: duel_core::MoveValidator>(
    coordinator: &mut SessionCoordinator<V>,
    conn: ConnectionId,
    session_id: &SessionId,
    san: &str,
) -> Vec<Delivery> {
    coordinator.process_message(
        conn,
        InputMessage::Move(MoveRequest {
            session_id: session_id.clone(),
            san: san.to_string(),
        }),
    )
}

fn signal<V: duel_core::MoveValidator>(
    coordinator: &mut SessionCoordinator<V>,
    conn: ConnectionId,
    session_id: &SessionId,
    to: Role,
    data: &str,
) -> Vec<Delivery> {
    coordinator.process_message(
        conn,
        InputMessage::Signal(SignalRequest {
            session_id: session_id.clone(),
            to,
            data: data.to_string(),
        }),
    )
}

fn rejoin<V: duel_core::MoveValidator>(
    coordinator: &mut SessionCoordinator<V>,
    conn: ConnectionId,
    session_id: &SessionId,
    token: ParticipantToken,
) -> Vec<Delivery> {
    coordinator.process_message(
        conn,
        InputMessage::Rejoin(Rejoin {
            session_id: session_id.clone(),
            token,
        }),
    )
}

fn token_of(deliveries: &[Delivery]) -> ParticipantToken {
    deliveries
        .iter()
        .find_map(|d| match &d.msg {
            OutputMessage::Role(assigned) => Some(assigned.token.clone()),
            _ => None,
        })
        .expect("role delivered")
}

/// A creates, A joins, B joins. Returns the id and A's token.
fn active_session<V: duel_core::MoveValidator>(
    coordinator: &mut SessionCoordinator<V>,
) -> (SessionId, ParticipantToken) {
    let id = create(coordinator, A);
    let first = join(coordinator, A, &id);
    join(coordinator, B, &id);
    (id, token_of(&first))
}

#[test]
fn roles_follow_join_order() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let id = create(&mut coordinator, A);

    let first = join(&mut coordinator, A, &id);
    match for_conn(&first, A).as_slice() {
        [OutputMessage::Role(assigned)] => {
            assert_eq!(assigned.role, Role::Initiator);
            assert_eq!(assigned.color, Color::White);
        }
        other => panic!("unexpected first join reply: {other:?}"),
    }

    let second = join(&mut coordinator, B, &id);
    let to_b = for_conn(&second, B);
    match &to_b[0] {
        OutputMessage::Role(assigned) => {
            assert_eq!(assigned.role, Role::Receiver);
            assert_eq!(assigned.color, Color::Black);
        }
        other => panic!("unexpected second join reply: {other:?}"),
    }
}

#[test]
fn second_join_starts_session_for_both_in_one_batch() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let id = create(&mut coordinator, A);
    join(&mut coordinator, A, &id);
    assert_eq!(
        coordinator.session(&id).unwrap().state(),
        SessionState::AwaitingSecond
    );

    let out = join(&mut coordinator, B, &id);
    assert_eq!(coordinator.session(&id).unwrap().state(), SessionState::Active);

    for conn in [A, B] {
        let starts: Vec<_> = for_conn(&out, conn)
            .into_iter()
            .filter_map(|m| match m {
                OutputMessage::Start(start) => Some(start),
                _ => None,
            })
            .collect();
        assert_eq!(starts.len(), 1, "{conn} should get exactly one start");
        assert_eq!(starts[0].turn, Color::White);
        assert_eq!(starts[0].position, INITIAL_POSITION);
    }
}

#[test]
fn third_join_is_rejected_and_peers_hear_nothing() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let (id, _) = active_session(&mut coordinator);

    let out = join(&mut coordinator, C, &id);
    assert_eq!(out.len(), 1);
    assert_eq!(error_kind(&out, C), Some(ErrorKind::SessionFull));
    assert_eq!(coordinator.session(&id).unwrap().participants().len(), 2);
}

#[test]
fn join_errors() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let missing = SessionId::parse("no-such-session").unwrap();
    let out = join(&mut coordinator, A, &missing);
    assert_eq!(error_kind(&out, A), Some(ErrorKind::SessionNotFound));

    let id = create(&mut coordinator, A);
    join(&mut coordinator, A, &id);
    let out = join(&mut coordinator, A, &id);
    assert_eq!(error_kind(&out, A), Some(ErrorKind::AlreadyInSession));
}

#[test]
fn proposed_ids_must_be_unique() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let proposed = SessionId::parse("friday-game").unwrap();
    let request = InputMessage::CreateChallenge(CreateChallenge {
        session_id: Some(proposed.clone()),
    });

    let out = coordinator.process_message(A, request.clone());
    assert!(matches!(&out[0].msg, OutputMessage::Created(c) if c.session_id == proposed));

    let out = coordinator.process_message(B, request);
    assert_eq!(error_kind(&out, B), Some(ErrorKind::SessionExists));
}

#[test]
fn session_capacity_is_enforced() {
    let mut coordinator = SessionCoordinator::with_max_sessions(accept_all, 1);
    create(&mut coordinator, A);
    let out = coordinator.process_message(
        B,
        InputMessage::CreateChallenge(CreateChallenge { session_id: None }),
    );
    assert_eq!(error_kind(&out, B), Some(ErrorKind::CapacityExhausted));
}

#[test]
fn accepted_move_is_echoed_to_both_with_turn() {
    let mut coordinator = SessionCoordinator::new(ChessValidator);
    let (id, _) = active_session(&mut coordinator);

    let out = play(&mut coordinator, A, &id, "e4");
    for conn in [A, B] {
        match for_conn(&out, conn).as_slice() {
            [OutputMessage::Move(applied), OutputMessage::Turn(turn)] => {
                assert_eq!(applied.san, "e4");
                assert!(applied.position.starts_with(AFTER_E4), "{}", applied.position);
                assert_eq!(applied.turn, Color::Black);
                assert_eq!(turn.color, Color::Black);
            }
            other => panic!("unexpected move broadcast: {other:?}"),
        }
    }

    let session = coordinator.session(&id).unwrap();
    assert_eq!(session.turn(), Color::Black);
    assert_eq!(session.move_count(), 1);
}

#[test]
fn out_of_turn_move_leaves_state_untouched() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let (id, _) = active_session(&mut coordinator);

    let out = play(&mut coordinator, B, &id, "e5");
    assert_eq!(out.len(), 1);
    assert_eq!(error_kind(&out, B), Some(ErrorKind::TurnViolation));

    let session = coordinator.session(&id).unwrap();
    assert_eq!(session.position(), INITIAL_POSITION);
    assert_eq!(session.turn(), Color::White);
    assert_eq!(session.move_count(), 0);
}

#[test]
fn illegal_move_leaves_state_untouched() {
    let mut coordinator = SessionCoordinator::new(ChessValidator);
    let (id, _) = active_session(&mut coordinator);

    for san in ["e5", "Ke2", "O-O", "nonsense"] {
        let out = play(&mut coordinator, A, &id, san);
        assert_eq!(error_kind(&out, A), Some(ErrorKind::IllegalMove), "{san}");
        assert!(for_conn(&out, B).is_empty());
    }

    let session = coordinator.session(&id).unwrap();
    assert_eq!(session.position(), INITIAL_POSITION);
    assert_eq!(session.turn(), Color::White);
}

#[test]
fn rejecting_validator_blocks_every_move() {
    let mut coordinator = SessionCoordinator::new(reject_all);
    let (id, _) = active_session(&mut coordinator);

    let out = play(&mut coordinator, A, &id, "e4");
    assert_eq!(error_kind(&out, A), Some(ErrorKind::IllegalMove));
    assert_eq!(coordinator.session(&id).unwrap().move_count(), 0);
}

#[test]
fn turn_alternates_over_a_game() {
    let mut coordinator = SessionCoordinator::new(ChessValidator);
    let (id, _) = active_session(&mut coordinator);

    let moves = ["e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Ba4", "Nf6", "O-O"];
    for (n, san) in moves.iter().enumerate() {
        let mover = if n % 2 == 0 { A } else { B };
        let out = play(&mut coordinator, mover, &id, san);
        assert_eq!(error_kind(&out, mover), None, "{san} rejected");
    }

    let session = coordinator.session(&id).unwrap();
    assert_eq!(session.move_count(), moves.len() as u32);
    // Odd number of moves: black to play.
    assert_eq!(session.turn(), Color::Black);
    assert!(session.position().contains(" b "));
}

#[test]
fn moves_need_an_active_session_and_membership() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let id = create(&mut coordinator, A);
    join(&mut coordinator, A, &id);

    let out = play(&mut coordinator, A, &id, "e4");
    assert_eq!(error_kind(&out, A), Some(ErrorKind::SessionNotActive));

    join(&mut coordinator, B, &id);
    let out = play(&mut coordinator, C, &id, "e4");
    assert_eq!(error_kind(&out, C), Some(ErrorKind::NotInSession));
}

#[test]
fn signals_reach_only_the_peer() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let (id, _) = active_session(&mut coordinator);

    let out = signal(&mut coordinator, A, &id, Role::Receiver, "offer-1");
    match out.as_slice() {
        [Delivery {
            to,
            msg: OutputMessage::Signal(relayed),
        }] => {
            assert_eq!(*to, B);
            assert_eq!(relayed.from, Role::Initiator);
            assert_eq!(relayed.data, "offer-1");
        }
        other => panic!("unexpected relay output: {other:?}"),
    }

    // Addressed to itself: dropped without an error.
    let out = signal(&mut coordinator, A, &id, Role::Initiator, "loop");
    assert!(out.is_empty());
    assert_eq!(coordinator.relay().relayed(), 1);
    assert_eq!(coordinator.relay().dropped(), 1);
}

#[test]
fn signals_before_start_are_dropped() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let id = create(&mut coordinator, A);
    join(&mut coordinator, A, &id);

    let out = signal(&mut coordinator, A, &id, Role::Receiver, "too-early");
    assert!(out.is_empty());
    assert_eq!(coordinator.relay().dropped(), 1);
}

#[test]
fn disconnect_then_rejoin_resyncs_the_slot() {
    let mut coordinator = SessionCoordinator::new(ChessValidator);
    let (id, token) = active_session(&mut coordinator);
    play(&mut coordinator, A, &id, "e4");

    let out = coordinator.connection_closed(A);
    match for_conn(&out, B).as_slice() {
        [OutputMessage::PeerDisconnected(presence)] => assert_eq!(presence.role, Role::Initiator),
        other => panic!("unexpected disconnect notice: {other:?}"),
    }

    // Nobody to relay to while A is away.
    let out = signal(&mut coordinator, B, &id, Role::Initiator, "answer");
    assert!(out.is_empty());

    let out = coordinator.process_message(
        D,
        InputMessage::Rejoin(Rejoin {
            session_id: id.clone(),
            token,
        }),
    );
    match for_conn(&out, D).as_slice() {
        [OutputMessage::Sync(snapshot)] => {
            assert_eq!(snapshot.role, Role::Initiator);
            assert_eq!(snapshot.color, Color::White);
            assert_eq!(snapshot.turn, Color::Black);
            assert_eq!(snapshot.state, SessionState::Active);
            assert!(snapshot.peer_online);
            assert!(snapshot.position.starts_with(AFTER_E4));
        }
        other => panic!("unexpected rejoin reply: {other:?}"),
    }
    assert!(matches!(
        for_conn(&out, B).as_slice(),
        [OutputMessage::PeerReconnected(p)] if p.role == Role::Initiator
    ));

    // The new connection plays white from here on.
    play(&mut coordinator, B, &id, "e5");
    let out = play(&mut coordinator, D, &id, "Nf3");
    assert_eq!(error_kind(&out, D), None);
    assert_eq!(coordinator.session(&id).unwrap().move_count(), 3);
}

#[test]
fn rejoin_with_wrong_token_is_refused() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let (id, _) = active_session(&mut coordinator);
    coordinator.connection_closed(A);

    let out = coordinator.process_message(
        D,
        InputMessage::Rejoin(Rejoin {
            session_id: id,
            token: ParticipantToken::new("forged"),
        }),
    );
    assert_eq!(error_kind(&out, D), Some(ErrorKind::InvalidToken));
}

#[test]
fn session_is_destroyed_when_nobody_is_left() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let (id, token) = active_session(&mut coordinator);

    coordinator.connection_closed(A);
    assert!(coordinator.session(&id).is_some());
    let out = coordinator.connection_closed(B);
    assert!(out.is_empty());
    assert!(coordinator.session(&id).is_none());

    let out = coordinator.process_message(
        D,
        InputMessage::Rejoin(Rejoin {
            session_id: id,
            token,
        }),
    );
    assert_eq!(error_kind(&out, D), Some(ErrorKind::SessionNotFound));
}

#[test]
fn unjoined_sessions_go_with_their_creator() {
    let mut coordinator = SessionCoordinator::with_max_sessions(ChessValidator, 3);
    let ids: Vec<SessionId> = (0..3).map(|_| create(&mut coordinator, A)).collect();

    let out = coordinator.process_message(
        B,
        InputMessage::CreateChallenge(CreateChallenge { session_id: None }),
    );
    assert_eq!(error_kind(&out, B), Some(ErrorKind::CapacityExhausted));

    assert!(coordinator.connection_closed(A).is_empty());
    assert!(coordinator.registry().is_empty());
    for id in &ids {
        assert!(coordinator.session(id).is_none());
    }

    // The freed slots are usable again.
    create(&mut coordinator, B);
    assert_eq!(coordinator.registry().len(), 1);
}

#[test]
fn creator_leaving_spares_sessions_someone_joined() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let id = create(&mut coordinator, A);
    join(&mut coordinator, B, &id);

    coordinator.connection_closed(A);
    assert!(coordinator.session(&id).is_some());
}

#[test]
fn waiting_initiator_can_rejoin_after_a_drop() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let id = create(&mut coordinator, A);
    let token = token_of(&join(&mut coordinator, A, &id));

    assert!(coordinator.connection_closed(A).is_empty());
    let session = coordinator.session(&id).expect("waiting session kept");
    assert_eq!(session.state(), SessionState::AwaitingSecond);
    assert!(session.idle_since().is_some());

    let out = rejoin(&mut coordinator, D, &id, token);
    match for_conn(&out, D).as_slice() {
        [OutputMessage::Sync(snapshot)] => {
            assert_eq!(snapshot.role, Role::Initiator);
            assert_eq!(snapshot.state, SessionState::AwaitingSecond);
            assert!(!snapshot.peer_online);
        }
        other => panic!("unexpected rejoin reply: {other:?}"),
    }
    assert!(coordinator.session(&id).unwrap().idle_since().is_none());

    // The shared link still works and the game starts for the new connection.
    let out = join(&mut coordinator, B, &id);
    for conn in [D, B] {
        assert!(
            for_conn(&out, conn)
                .iter()
                .any(|m| matches!(m, OutputMessage::Start(_))),
            "{conn} got no start"
        );
    }
}

#[test]
fn opponent_joining_an_absent_initiator_is_told_so() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let id = create(&mut coordinator, A);
    join(&mut coordinator, A, &id);
    coordinator.connection_closed(A);

    let out = join(&mut coordinator, B, &id);
    assert!(for_conn(&out, A).is_empty());
    match for_conn(&out, B).as_slice() {
        [OutputMessage::Role(_), OutputMessage::Start(_), OutputMessage::PeerDisconnected(p)] => {
            assert_eq!(p.role, Role::Initiator)
        }
        other => panic!("unexpected join reply: {other:?}"),
    }
    assert_eq!(coordinator.session(&id).unwrap().state(), SessionState::Active);
}

#[test]
fn idle_sessions_expire_after_the_rejoin_window() {
    let window = Duration::from_secs(30);
    let mut coordinator = SessionCoordinator::new(accept_all).with_rejoin_window(window);

    let waiting = create(&mut coordinator, A);
    let token = token_of(&join(&mut coordinator, A, &waiting));
    coordinator.connection_closed(A);
    // B stays connected but nobody ever joins its session.
    let unjoined = create(&mut coordinator, B);
    // A live game is never idle.
    let live = create(&mut coordinator, C);
    join(&mut coordinator, C, &live);
    join(&mut coordinator, D, &live);

    assert!(coordinator.expire_idle(Instant::now()).is_empty());

    let expired = coordinator.expire_idle(Instant::now() + window + Duration::from_secs(1));
    assert_eq!(expired.len(), 2);
    assert!(expired.contains(&waiting));
    assert!(expired.contains(&unjoined));
    assert!(coordinator.session(&live).is_some());

    let out = rejoin(&mut coordinator, ConnectionId(9), &waiting, token);
    assert_eq!(error_kind(&out, ConnectionId(9)), Some(ErrorKind::SessionNotFound));
}

#[test]
fn checkmate_ends_the_game() {
    let mut coordinator = SessionCoordinator::new(ChessValidator);
    let (id, _) = active_session(&mut coordinator);

    for (conn, san) in [(A, "f3"), (B, "e5"), (A, "g4")] {
        play(&mut coordinator, conn, &id, san);
    }
    let out = play(&mut coordinator, B, &id, "Qh4");
    match for_conn(&out, A).as_slice() {
        [OutputMessage::Move(applied), OutputMessage::Turn(_)] => assert_eq!(applied.san, "Qh4#"),
        other => panic!("unexpected mate broadcast: {other:?}"),
    }
    assert_eq!(coordinator.session(&id).unwrap().state(), SessionState::Ended);

    let out = play(&mut coordinator, A, &id, "e4");
    assert_eq!(error_kind(&out, A), Some(ErrorKind::SessionNotActive));

    // Leaving a finished game still tells the other side.
    let out = coordinator.process_message(A, InputMessage::Leave);
    assert!(matches!(
        for_conn(&out, B).as_slice(),
        [OutputMessage::Ended(ended)] if ended.left == Role::Initiator
    ));
}

#[test]
fn leave_ends_the_session_for_both() {
    let mut coordinator = SessionCoordinator::new(accept_all);
    let (id, _) = active_session(&mut coordinator);

    let out = coordinator.process_message(B, InputMessage::Leave);
    for conn in [A, B] {
        assert!(
            matches!(
                for_conn(&out, conn).as_slice(),
                [OutputMessage::Ended(ended)] if ended.left == Role::Receiver
            ),
            "{conn} not told about the end"
        );
    }
    assert!(coordinator.session(&id).is_none());

    let out = play(&mut coordinator, A, &id, "e4");
    assert_eq!(error_kind(&out, A), Some(ErrorKind::NotInSession));

    let out = coordinator.process_message(A, InputMessage::Leave);
    assert_eq!(error_kind(&out, A), Some(ErrorKind::NotInSession));
}
