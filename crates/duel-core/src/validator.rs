//! Move legality, delegated to an external rules engine.
//!
//! The coordinator only needs "position x candidate -> new position or
//! rejection". [`ChessValidator`] provides that for standard chess using
//! the `chess` crate; tests plug in closures.
//!
//! Candidates are resolved against the legal move list, so the usual SAN
//! spellings (`e8=Q`, `O-O`, `0-0`, `Nf3+`, `Nb1d2`) and coordinate moves
//! (`g1f3`) are all accepted; ambiguous ones are refused. The accepted
//! move is always reported in canonical SAN.

use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, File, MoveGen, Piece, Square};
use thiserror::Error;

use crate::role::Color;

/// A move the validator accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMove {
    /// Canonical SAN of the move.
    pub san: String,
    /// Position after the move (FEN).
    pub position: String,
    /// Set when the move ended the game.
    pub outcome: Option<Outcome>,
}

/// How a game finished on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Checkmate { winner: Color },
    Stalemate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct MoveRejected {
    pub reason: String,
}

impl MoveRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        MoveRejected {
            reason: reason.into(),
        }
    }
}

pub trait MoveValidator {
    fn validate(&self, position: &str, candidate: &str) -> Result<ValidatedMove, MoveRejected>;

    /// Whether `position` is already decided.
    fn outcome(&self, _position: &str) -> Option<Outcome> {
        None
    }
}

impl<F> MoveValidator for F
where
    F: Fn(&str, &str) -> Result<ValidatedMove, MoveRejected>,
{
    fn validate(&self, position: &str, candidate: &str) -> Result<ValidatedMove, MoveRejected> {
        self(position, candidate)
    }
}

/// Standard chess rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChessValidator;

impl MoveValidator for ChessValidator {
    fn validate(&self, position: &str, candidate: &str) -> Result<ValidatedMove, MoveRejected> {
        let board = Board::from_str(position)
            .map_err(|e| MoveRejected::new(format!("unreadable position: {e:?}")))?;

        let candidate = candidate.trim();
        let mv = resolve(&board, candidate)
            .ok_or_else(|| MoveRejected::new(format!("{candidate} is not legal here")))?;

        let san = to_san(&board, mv);
        let clocks = Clocks::read(position).advance(&board, mv);
        let next = board.make_move_new(mv);

        Ok(ValidatedMove {
            san,
            position: clocks.write(&next),
            outcome: outcome_of(&next),
        })
    }

    fn outcome(&self, position: &str) -> Option<Outcome> {
        Board::from_str(position).ok().and_then(|board| outcome_of(&board))
    }
}

/// Find the legal move `candidate` names, if any.
fn resolve(board: &Board, candidate: &str) -> Option<ChessMove> {
    let wanted = normalize(candidate);
    if wanted.is_empty() {
        return None;
    }

    let legal: Vec<ChessMove> = MoveGen::new_legal(board).collect();

    let named = |mv: ChessMove| {
        normalize(&to_san(board, mv)) == wanted
            || long_forms(board, mv).iter().any(|form| *form == wanted)
    };
    if let Some(mv) = legal.iter().copied().find(|&mv| named(mv)) {
        return Some(mv);
    }

    // Coordinate form: e2e4, e7e8q.
    if wanted.len() == 4 || wanted.len() == 5 {
        if let Ok(mv) = ChessMove::from_str(&wanted.to_ascii_lowercase()) {
            if legal.contains(&mv) {
                return Some(mv);
            }
        }
    }

    None
}

/// Fully specified spellings such as Nb1d2 or Nb1xd2.
fn long_forms(board: &Board, mv: ChessMove) -> [String; 2] {
    let letter = match board.piece_on(mv.get_source()) {
        Some(Piece::Pawn) | None => String::new(),
        Some(piece) => piece_letter(piece).to_string(),
    };
    let promotion = mv
        .get_promotion()
        .map(|piece| piece_letter(piece).to_string())
        .unwrap_or_default();
    let (source, dest) = (mv.get_source(), mv.get_dest());

    [
        format!("{letter}{source}{dest}{promotion}"),
        format!("{letter}{source}x{dest}{promotion}"),
    ]
}

/// Strip annotations and spelling variants so two SAN strings compare equal.
fn normalize(text: &str) -> String {
    let text = text
        .trim()
        .trim_end_matches(" e.p.")
        .trim_end_matches(['+', '#', '!', '?']);

    match text {
        "0-0" => "O-O".to_string(),
        "0-0-0" => "O-O-O".to_string(),
        _ => text.replace('=', ""),
    }
}

fn to_san(board: &Board, mv: ChessMove) -> String {
    let source = mv.get_source();
    let dest = mv.get_dest();
    let piece = board.piece_on(source).unwrap_or(Piece::Pawn);

    let mut san = String::new();
    let castles = piece == Piece::King
        && source.get_file().to_index().abs_diff(dest.get_file().to_index()) == 2;

    if castles {
        san.push_str(if dest.get_file() == File::G { "O-O" } else { "O-O-O" });
    } else {
        let capture = board.piece_on(dest).is_some()
            || (piece == Piece::Pawn && source.get_file() != dest.get_file());

        if piece == Piece::Pawn {
            if capture {
                san.push(file_char(source));
            }
        } else {
            san.push(piece_letter(piece));
            san.push_str(&disambiguation(board, mv, piece));
        }
        if capture {
            san.push('x');
        }
        san.push_str(&dest.to_string());
        if let Some(promotion) = mv.get_promotion() {
            san.push('=');
            san.push(piece_letter(promotion));
        }
    }

    let next = board.make_move_new(mv);
    if next.status() == BoardStatus::Checkmate {
        san.push('#');
    } else if next.checkers().popcnt() > 0 {
        san.push('+');
    }
    san
}

/// Source file, rank or square needed to tell `mv` apart from same-piece
/// moves to the same square.
fn disambiguation(board: &Board, mv: ChessMove, piece: Piece) -> String {
    let source = mv.get_source();
    let rivals: Vec<Square> = MoveGen::new_legal(board)
        .filter(|other| {
            other.get_dest() == mv.get_dest()
                && other.get_source() != source
                && board.piece_on(other.get_source()) == Some(piece)
        })
        .map(|other| other.get_source())
        .collect();

    if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|sq| sq.get_file() != source.get_file()) {
        file_char(source).to_string()
    } else if rivals.iter().all(|sq| sq.get_rank() != source.get_rank()) {
        rank_char(source).to_string()
    } else {
        source.to_string()
    }
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

fn file_char(square: Square) -> char {
    (b'a' + square.get_file().to_index() as u8) as char
}

fn rank_char(square: Square) -> char {
    (b'1' + square.get_rank().to_index() as u8) as char
}

fn outcome_of(board: &Board) -> Option<Outcome> {
    match board.status() {
        BoardStatus::Ongoing => None,
        BoardStatus::Stalemate => Some(Outcome::Stalemate),
        BoardStatus::Checkmate => {
            // The side to move is the one mated.
            let winner = match board.side_to_move() {
                chess::Color::White => Color::Black,
                chess::Color::Black => Color::White,
            };
            Some(Outcome::Checkmate { winner })
        }
    }
}

/// Halfmove and fullmove counters, which `chess::Board` does not keep.
#[derive(Debug, Clone, Copy)]
struct Clocks {
    halfmove: u32,
    fullmove: u32,
}

impl Clocks {
    fn read(fen: &str) -> Self {
        let mut fields = fen.split_whitespace().skip(4);
        let halfmove = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
        let fullmove = fields
            .next()
            .and_then(|f| f.parse().ok())
            .unwrap_or(1)
            .max(1);
        Clocks { halfmove, fullmove }
    }

    /// Counters after `mv` is played on `board`.
    fn advance(self, board: &Board, mv: ChessMove) -> Self {
        let resets = board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            || board.piece_on(mv.get_dest()).is_some();

        Clocks {
            halfmove: if resets { 0 } else { self.halfmove + 1 },
            fullmove: if board.side_to_move() == chess::Color::Black {
                self.fullmove + 1
            } else {
                self.fullmove
            },
        }
    }

    /// FEN of `board` carrying these counters.
    fn write(self, board: &Board) -> String {
        let fen = board.to_string();
        // Board always prints "0 1" for the counters.
        let placement = fen.rsplitn(3, ' ').nth(2).unwrap_or(&fen);
        format!("{placement} {} {}", self.halfmove, self.fullmove)
    }
}
