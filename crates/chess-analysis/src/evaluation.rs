//! Chess position evaluation types.

use serde::{Deserialize, Serialize};
use uci::Score;

/// Pawn value that mate scores are measured down from.
///
/// A mate in `n` is encoded as `MATE_SCORE - n` pawns, so shorter mates score
/// more extreme than longer ones and any mate outranks any material count.
pub const MATE_SCORE: f64 = 100.0;

/// Represents a chess position evaluation.
///
/// Evaluations can be either centipawn scores (for normal positions)
/// or mate scores (when a forced mate is found). The sign is always from
/// the point of view of the side to move unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Evaluation {
    /// Centipawn evaluation (positive = side to move is better)
    Centipawns(i32),
    /// Mate in N moves (positive = side to move mates, zero or negative = gets mated)
    Mate(i32),
}

impl Evaluation {
    /// Evaluation in pawns.
    ///
    /// Centipawns are divided by 100. A mate in `n` becomes
    /// `sign(n) * (MATE_SCORE - |n|)`, positive when the side to move mates.
    pub fn to_pawns(self) -> f64 {
        match self {
            Evaluation::Centipawns(cp) => f64::from(cp) / 100.0,
            Evaluation::Mate(n) => {
                let magnitude = MATE_SCORE - f64::from(n.unsigned_abs());
                if n > 0 {
                    magnitude
                } else {
                    -magnitude
                }
            }
        }
    }

    /// Mate distance, if this is a mate score.
    pub fn mate_in(self) -> Option<i32> {
        match self {
            Evaluation::Mate(n) => Some(n),
            Evaluation::Centipawns(_) => None,
        }
    }
}

impl From<Score> for Evaluation {
    fn from(score: Score) -> Self {
        match score {
            Score::Cp(cp) => Evaluation::Centipawns(cp),
            Score::Mate(n) => Evaluation::Mate(n),
        }
    }
}

impl Default for Evaluation {
    fn default() -> Self {
        Evaluation::Centipawns(0)
    }
}

/// Convert a side-to-move evaluation (in pawns) to White's point of view.
pub fn to_white_perspective(pawns: f64, white_to_move: bool) -> f64 {
    if white_to_move {
        pawns
    } else {
        -pawns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centipawns_divide_by_hundred() {
        assert_eq!(Evaluation::Centipawns(35).to_pawns(), 0.35);
        assert_eq!(Evaluation::Centipawns(-150).to_pawns(), -1.5);
    }

    #[test]
    fn mate_scores_are_signed_and_offset() {
        assert_eq!(Evaluation::Mate(3).to_pawns(), 97.0);
        assert_eq!(Evaluation::Mate(-2).to_pawns(), -98.0);
        assert_eq!(Evaluation::Mate(0).to_pawns(), -100.0);
    }

    #[test]
    fn shorter_mates_are_more_extreme() {
        assert!(Evaluation::Mate(1).to_pawns() > Evaluation::Mate(5).to_pawns());
        assert!(Evaluation::Mate(-1).to_pawns() < Evaluation::Mate(-5).to_pawns());
    }

    #[test]
    fn mate_outranks_material() {
        assert!(Evaluation::Mate(40).to_pawns() > Evaluation::Centipawns(3900).to_pawns());
    }

    #[test]
    fn from_score_keeps_kind() {
        assert_eq!(Evaluation::from(Score::Cp(-20)), Evaluation::Centipawns(-20));
        assert_eq!(Evaluation::from(Score::Mate(4)), Evaluation::Mate(4));
    }

    #[test]
    fn white_perspective() {
        assert_eq!(to_white_perspective(1.25, true), 1.25);
        assert_eq!(to_white_perspective(1.25, false), -1.25);
    }
}
