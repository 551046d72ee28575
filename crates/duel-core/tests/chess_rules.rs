// crates/duel-core/tests/chess_rules.rs
use duel_core::{ChessValidator, Color, MoveValidator, Outcome, ValidatedMove, INITIAL_POSITION};

fn play(position: &str, candidate: &str) -> ValidatedMove {
    ChessValidator
        .validate(position, candidate)
        .unwrap_or_else(|e| panic!("{candidate} refused: {e}"))
}

fn play_all(moves: &[&str]) -> ValidatedMove {
    let mut position = INITIAL_POSITION.to_string();
    let mut last = None;
    for san in moves {
        let validated = play(&position, san);
        position = validated.position.clone();
        last = Some(validated);
    }
    last.expect("at least one move")
}

#[test]
fn promotion_accepts_the_usual_spellings() {
    let fen = "8/P7/7k/8/8/8/8/7K w - - 0 1";

    for candidate in ["a8=Q", "a8Q", "a7a8q", "a7a8=Q"] {
        let validated = play(fen, candidate);
        assert_eq!(validated.san, "a8=Q", "{candidate}");
        assert!(validated.position.starts_with("Q7/8/7k/"), "{}", validated.position);
    }

    let knight = play(fen, "a8=N");
    assert_eq!(knight.san, "a8=N");
    assert!(knight.position.starts_with("N7/"));
}

#[test]
fn check_suffix_is_optional_on_input_and_added_on_output() {
    let fen = "7k/P7/8/8/8/8/8/7K w - - 0 1";
    assert_eq!(play(fen, "a8=Q").san, "a8=Q+");
    assert_eq!(play(fen, "a8=Q+").san, "a8=Q+");

    let fen = "4k3/8/8/8/8/8/8/R3K3 w Q - 0 1";
    assert_eq!(play(fen, "Ra8").san, "Ra8+");
    assert_eq!(play(fen, "Ra8+").san, "Ra8+");
}

#[test]
fn both_castles_in_either_notation() {
    let white = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
    for candidate in ["O-O", "0-0", "e1g1"] {
        let validated = play(white, candidate);
        assert_eq!(validated.san, "O-O", "{candidate}");
        assert!(validated.position.contains("/R4RK1 b"), "{}", validated.position);
    }
    for candidate in ["O-O-O", "0-0-0"] {
        let validated = play(white, candidate);
        assert_eq!(validated.san, "O-O-O");
        assert!(validated.position.contains("/2KR3R b"), "{}", validated.position);
    }

    let black = "r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1";
    let validated = play(black, "O-O");
    assert!(validated.position.starts_with("r4rk1/"), "{}", validated.position);
}

#[test]
fn coordinate_moves_are_reported_in_san() {
    assert_eq!(play(INITIAL_POSITION, "e2e4").san, "e4");
    assert_eq!(play(INITIAL_POSITION, "g1f3").san, "Nf3");
}

#[test]
fn ambiguous_moves_need_disambiguation() {
    let fen = "4k3/8/8/8/8/8/8/1N3N1K w - - 0 1";

    assert!(ChessValidator.validate(fen, "Nd2").is_err());
    assert_eq!(play(fen, "Nbd2").san, "Nbd2");
    assert_eq!(play(fen, "Nf1d2").san, "Nfd2");
}

#[test]
fn illegal_candidates_are_refused() {
    for candidate in ["e5", "Ke2", "O-O", "e2e5", "", "Nf3 please"] {
        assert!(
            ChessValidator.validate(INITIAL_POSITION, candidate).is_err(),
            "{candidate:?} accepted"
        );
    }
}

#[test]
fn move_counters_advance() {
    let after = play(INITIAL_POSITION, "Nf3");
    assert!(after.position.ends_with(" 1 1"), "{}", after.position);

    let after = play(&after.position, "Nf6");
    assert!(after.position.ends_with(" 2 2"), "{}", after.position);

    // Pawn moves reset the halfmove clock.
    let after = play(&after.position, "e4");
    assert!(after.position.ends_with(" 0 2"), "{}", after.position);
}

#[test]
fn checkmate_is_reported_with_the_winner() {
    let mate = play_all(&["f3", "e5", "g4", "Qh4#"]);
    assert_eq!(mate.san, "Qh4#");
    assert_eq!(mate.outcome, Some(Outcome::Checkmate { winner: Color::Black }));
    assert!(mate.position.ends_with(" 1 3"), "{}", mate.position);
    assert_eq!(
        ChessValidator.outcome(&mate.position),
        Some(Outcome::Checkmate { winner: Color::Black })
    );

    // Mate without the suffix is the same move.
    let again = play_all(&["f3", "e5", "g4", "Qh4"]);
    assert_eq!(again.san, "Qh4#");
}

#[test]
fn stalemate_is_reported() {
    let validated = play("7k/8/6K1/8/8/8/8/5Q2 w - - 0 1", "Qf7");
    assert_eq!(validated.san, "Qf7");
    assert_eq!(validated.outcome, Some(Outcome::Stalemate));
    assert_eq!(ChessValidator.outcome(INITIAL_POSITION), None);
}
