//! Move quality classification and game analysis.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::SearchResult;
use crate::notation::GameMetadata;

/// Swing (pawns) at or above which a move is a blunder.
pub const BLUNDER_SWING: f64 = 3.0;
/// Swing (pawns) at or above which a move is a mistake.
pub const MISTAKE_SWING: f64 = 1.5;
/// Swing (pawns) at or above which a move is an inaccuracy.
pub const INACCURACY_SWING: f64 = 0.5;
/// Swing (pawns) at or below which a move counts as the best move.
pub const BEST_SWING: f64 = 0.1;
/// Swing (pawns) at or below which a move past the opening plies is brilliant.
pub const BRILLIANT_SWING: f64 = 0.2;
/// Brilliant moves need a 0-based ply index greater than this.
pub const BRILLIANT_MIN_PLY: usize = 10;

/// Classification of a played move by the evaluation it gave away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveClassification {
    /// Lost three pawns or more
    Blunder,
    /// Lost one and a half pawns or more
    Mistake,
    /// Lost half a pawn or more
    Inaccuracy,
    /// Near-optimal move deep into the game
    Brilliant,
    /// Matched the engine's best evaluation
    Best,
}

impl MoveClassification {
    /// Classify a move from its swing (pawns) and 0-based ply index.
    ///
    /// Thresholds are checked in order, the first match wins. Swings between
    /// the best and inaccuracy bands that do not qualify as brilliant are
    /// left unclassified.
    pub fn classify(swing: f64, ply: usize) -> Option<Self> {
        let swing = swing.abs();
        if swing >= BLUNDER_SWING {
            Some(MoveClassification::Blunder)
        } else if swing >= MISTAKE_SWING {
            Some(MoveClassification::Mistake)
        } else if swing >= INACCURACY_SWING {
            Some(MoveClassification::Inaccuracy)
        } else if swing <= BEST_SWING {
            Some(MoveClassification::Best)
        } else if swing <= BRILLIANT_SWING && ply > BRILLIANT_MIN_PLY {
            Some(MoveClassification::Brilliant)
        } else {
            None
        }
    }

    /// Blunders and mistakes cost accuracy.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            MoveClassification::Blunder | MoveClassification::Mistake
        )
    }

    /// Blunders and brilliant moves are the turning points of a game.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            MoveClassification::Blunder | MoveClassification::Brilliant
        )
    }
}

impl fmt::Display for MoveClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveClassification::Blunder => "blunder",
            MoveClassification::Mistake => "mistake",
            MoveClassification::Inaccuracy => "inaccuracy",
            MoveClassification::Brilliant => "brilliant",
            MoveClassification::Best => "best",
        };
        f.write_str(name)
    }
}

/// Analysis of one ply of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionAnalysis {
    /// Zero-based half-move index.
    pub ply: usize,
    /// Position before the move.
    pub fen: String,
    /// The move that was played, in UCI notation.
    pub played_uci: String,
    /// The move that was played, in SAN.
    pub played_san: String,
    pub white_to_move: bool,
    /// Searches of the position before the move, primary first.
    pub results: Vec<SearchResult>,
    /// Best evaluation available before the move, mover's perspective.
    pub eval_before: f64,
    /// Evaluation after the played move, mover's perspective.
    pub eval_after: f64,
    /// Evaluation given away by the played move, never negative.
    pub swing: f64,
    /// `eval_before` from White's perspective.
    pub eval_white: f64,
    pub classification: Option<MoveClassification>,
}

impl PositionAnalysis {
    /// The engine's preferred move in this position.
    pub fn best_move(&self) -> &str {
        self.results
            .first()
            .map(|r| r.best_move.as_str())
            .unwrap_or("")
    }

    /// Fullmove number of this ply.
    pub fn move_number(&self) -> usize {
        self.ply / 2 + 1
    }

    /// Move label such as `12. Nf3` or `12... Nc6`.
    pub fn label(&self) -> String {
        if self.white_to_move {
            format!("{}. {}", self.move_number(), self.played_san)
        } else {
            format!("{}... {}", self.move_number(), self.played_san)
        }
    }
}

/// Statistics for one side of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Total moves analyzed
    pub total_moves: u32,
    pub best_moves: u32,
    pub brilliant_moves: u32,
    pub inaccuracies: u32,
    pub mistakes: u32,
    pub blunders: u32,
    /// Average swing in pawns
    pub average_swing: f64,
    /// Accuracy percentage (0-100)
    pub accuracy_percent: f64,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            total_moves: 0,
            best_moves: 0,
            brilliant_moves: 0,
            inaccuracies: 0,
            mistakes: 0,
            blunders: 0,
            average_swing: 0.0,
            accuracy_percent: 100.0,
        }
    }
}

impl PlayerStats {
    /// Aggregate the moves of one side.
    pub fn from_moves<'a>(moves: impl IntoIterator<Item = &'a PositionAnalysis>) -> Self {
        let mut stats = PlayerStats::default();
        let mut total_swing = 0.0;
        let mut clean_moves = 0u32;

        for analysis in moves {
            stats.total_moves += 1;
            total_swing += analysis.swing;
            match analysis.classification {
                Some(MoveClassification::Best) => stats.best_moves += 1,
                Some(MoveClassification::Brilliant) => stats.brilliant_moves += 1,
                Some(MoveClassification::Inaccuracy) => stats.inaccuracies += 1,
                Some(MoveClassification::Mistake) => stats.mistakes += 1,
                Some(MoveClassification::Blunder) => stats.blunders += 1,
                None => {}
            }
            if !analysis.classification.is_some_and(MoveClassification::is_error) {
                clean_moves += 1;
            }
        }

        if stats.total_moves > 0 {
            let total = f64::from(stats.total_moves);
            stats.average_swing = total_swing / total;
            stats.accuracy_percent = 100.0 * f64::from(clean_moves) / total;
        }
        stats
    }
}

/// Complete analysis of a chess game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAnalysis {
    /// Players and source of the game
    pub metadata: GameMetadata,
    /// Engine version used for the analysis
    pub engine: String,
    /// One entry per ply, in order
    pub positions: Vec<PositionAnalysis>,
    pub white_stats: PlayerStats,
    pub black_stats: PlayerStats,
    /// Number of blunders and brilliant moves
    pub critical_moments: usize,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

impl GameAnalysis {
    /// Aggregate per-ply analyses. Even plies belong to the side that moved
    /// first, which is Black for games set up with Black to move.
    pub fn from_positions(
        positions: Vec<PositionAnalysis>,
        metadata: GameMetadata,
        engine: &str,
    ) -> Self {
        let first = PlayerStats::from_moves(positions.iter().step_by(2));
        let second = PlayerStats::from_moves(positions.iter().skip(1).step_by(2));
        let (white_stats, black_stats) = if positions.first().map_or(true, |p| p.white_to_move) {
            (first, second)
        } else {
            (second, first)
        };
        let critical_moments = positions
            .iter()
            .filter(|p| p.classification.is_some_and(MoveClassification::is_critical))
            .count();

        Self {
            metadata,
            engine: engine.to_string(),
            positions,
            white_stats,
            black_stats,
            critical_moments,
            insights: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// An empty report for a game that could not be read.
    pub fn neutral(metadata: GameMetadata, engine: &str) -> Self {
        Self::from_positions(Vec::new(), metadata, engine)
    }

    /// Plies flagged as blunders or brilliant moves.
    pub fn critical_plies(&self) -> impl Iterator<Item = &PositionAnalysis> {
        self.positions
            .iter()
            .filter(|p| p.classification.is_some_and(MoveClassification::is_critical))
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
