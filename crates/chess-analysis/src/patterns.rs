//! Tactical motifs of a candidate move and the phase of the game.

use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::attacks::attacks;
use shakmaty::uci::UciMove;
use shakmaty::{Position, Role};

use crate::notation::{fullmove_number, parse_fen, piece_value, Material};

/// Last fullmove number that still counts as the opening.
pub const OPENING_LAST_MOVE: u32 = 10;

/// Non-pawn material of both sides (in pawns) at or below which the game is
/// an endgame.
pub const ENDGAME_MATERIAL: u32 = 13;

/// Broad stage of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Opening,
    Middlegame,
    Endgame,
}

impl GamePhase {
    /// Classify a position by fullmove number and remaining material.
    pub fn of_fen(fen: &str) -> Self {
        if fullmove_number(fen) <= OPENING_LAST_MOVE {
            GamePhase::Opening
        } else if Material::from_fen(fen).non_pawn <= ENDGAME_MATERIAL {
            GamePhase::Endgame
        } else {
            GamePhase::Middlegame
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GamePhase::Opening => write!(f, "opening"),
            GamePhase::Middlegame => write!(f, "middlegame"),
            GamePhase::Endgame => write!(f, "endgame"),
        }
    }
}

/// A tactical motif a move carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TacticalPattern {
    Checkmate,
    ForcedMate,
    Check,
    Capture,
    Promotion,
    Castling,
    Fork,
}

impl TacticalPattern {
    pub fn name(self) -> &'static str {
        match self {
            TacticalPattern::Checkmate => "checkmate",
            TacticalPattern::ForcedMate => "forced mate",
            TacticalPattern::Check => "check",
            TacticalPattern::Capture => "capture",
            TacticalPattern::Promotion => "promotion",
            TacticalPattern::Castling => "castling",
            TacticalPattern::Fork => "fork",
        }
    }
}

impl fmt::Display for TacticalPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Patterns of playing `uci_move` in `fen`.
///
/// `mate_in` is the engine's mate distance for the side to move, if any.
/// Unparseable positions or moves carry no patterns.
pub fn detect_patterns(fen: &str, uci_move: &str, mate_in: Option<i32>) -> Vec<TacticalPattern> {
    let mut patterns = Vec::new();
    if matches!(mate_in, Some(n) if n > 0) {
        patterns.push(TacticalPattern::ForcedMate);
    }

    let Ok(pos) = parse_fen(fen) else {
        return patterns;
    };
    let Some(m) = uci_move
        .parse::<UciMove>()
        .ok()
        .and_then(|uci| uci.to_move(&pos).ok())
    else {
        return patterns;
    };

    if m.is_capture() {
        patterns.push(TacticalPattern::Capture);
    }
    if m.is_promotion() {
        patterns.push(TacticalPattern::Promotion);
    }
    if m.is_castle() {
        patterns.push(TacticalPattern::Castling);
    }

    let mover = pos.turn();
    let Ok(after) = pos.play(&m) else {
        return patterns;
    };
    if after.is_checkmate() {
        patterns.insert(0, TacticalPattern::Checkmate);
        return patterns;
    }
    if after.is_check() {
        patterns.push(TacticalPattern::Check);
    }

    if !m.is_castle() {
        let board = after.board();
        if let Some(piece) = board.piece_at(m.to()) {
            let targets = attacks(m.to(), piece, board.occupied()) & board.by_color(!mover);
            let valuable = targets
                .into_iter()
                .filter_map(|sq| board.role_at(sq))
                .filter(|role| *role == Role::King || piece_value(*role) >= 3)
                .count();
            if valuable >= 2 {
                patterns.push(TacticalPattern::Fork);
            }
        }
    }

    patterns
}
