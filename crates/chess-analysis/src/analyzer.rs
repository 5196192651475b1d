//! Game analysis with move quality classification.
//!
//! This module provides the [`GameAnalyzer`] for analyzing complete chess games
//! and classifying each move's quality.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::engine::EngineError;
use crate::evaluation::{to_white_perspective, MATE_SCORE};
use crate::notation::{ArchivedGame, GameMetadata, GameRecord, NotationError, TerminalState};
use crate::pool::EnginePool;
use crate::position::{MoveSuggestion, PositionAnalyzer};
use crate::quality::{GameAnalysis, MoveClassification, PositionAnalysis};
use crate::reasoning::{game_insights, recommendations};

/// Errors that can occur during position or game analysis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Error from the analysis engine.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    /// The FEN does not describe a legal position.
    #[error("Invalid position: {0}")]
    InvalidPosition(String),
    /// The game notation could not be read.
    #[error("Invalid game record: {0}")]
    InvalidGameRecord(#[from] NotationError),
}

/// Analyzes chess games to classify move quality.
///
/// Every position before a move is analyzed with the
/// [`PositionAnalyzer`]; the played move is then judged by how much of the
/// best evaluation it gave away.
#[derive(Clone)]
pub struct GameAnalyzer {
    positions: PositionAnalyzer,
}

impl GameAnalyzer {
    pub fn new(pool: Arc<EnginePool>, config: AnalysisConfig) -> Self {
        Self {
            positions: PositionAnalyzer::new(pool, config),
        }
    }

    pub fn position_analyzer(&self) -> &PositionAnalyzer {
        &self.positions
    }

    /// Analyzes PGN or SAN movetext.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidGameRecord`] if the notation cannot be
    /// read, and engine errors other than unavailability.
    pub async fn analyze_pgn(&self, pgn: &str, version: &str) -> Result<GameAnalysis, AnalysisError> {
        let record = GameRecord::from_pgn(pgn)?;
        self.analyze_game(&record, version).await
    }

    /// Analyzes a game fetched from a remote archive.
    pub async fn analyze_archived(
        &self,
        game: &ArchivedGame,
        version: &str,
    ) -> Result<GameAnalysis, AnalysisError> {
        let record = GameRecord::from_archived(game)?;
        self.analyze_game(&record, version).await
    }

    /// Like [`GameAnalyzer::analyze_pgn`], but an unreadable game yields an
    /// empty report instead of an error.
    pub async fn analyze_pgn_or_neutral(&self, pgn: &str, version: &str) -> GameAnalysis {
        match self.analyze_pgn(pgn, version).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "game analysis failed, returning neutral report");
                GameAnalysis::neutral(GameMetadata::default(), version)
            }
        }
    }

    /// Analyzes a complete chess game.
    ///
    /// For each move in the game:
    /// 1. Analyzes the position before the move at the configured depth.
    /// 2. Takes the evaluation after the move from the next position's
    ///    analysis, negated to the mover's point of view. After the last
    ///    move it comes from the final board (mate or draw) or one more
    ///    search.
    /// 3. Classifies the move by the evaluation it gave away.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine was shut down or a position is invalid.
    pub async fn analyze_game(
        &self,
        record: &GameRecord,
        version: &str,
    ) -> Result<GameAnalysis, AnalysisError> {
        let depth = self.positions.config().depth;
        info!(
            version,
            plies = record.ply_count(),
            white = record.metadata.white.as_deref().unwrap_or("?"),
            black = record.metadata.black.as_deref().unwrap_or("?"),
            "analyzing game"
        );

        let mut suggestions: Vec<MoveSuggestion> = Vec::with_capacity(record.ply_count());
        for played in &record.moves {
            let suggestion = self
                .positions
                .analyze_position(&played.fen_before, depth, version)
                .await?;
            debug!(ply = played.ply, played = %played.uci, best = %suggestion.best_move, "ply analyzed");
            suggestions.push(suggestion);
        }

        let final_eval = match record.terminal {
            _ if record.moves.is_empty() => 0.0,
            // The side to move in the final position was mated.
            Some(TerminalState::Checkmate) => -MATE_SCORE,
            Some(TerminalState::Stalemate | TerminalState::InsufficientMaterial) => 0.0,
            None => {
                self.positions
                    .evaluate(&record.final_fen, depth, version)
                    .await?
                    .evaluation
            }
        };

        let mut positions = Vec::with_capacity(record.ply_count());
        for (i, (played, suggestion)) in record.moves.iter().zip(suggestions.iter()).enumerate() {
            let next_eval = suggestions
                .get(i + 1)
                .map_or(final_eval, |next| next.evaluation);
            let eval_before = suggestion.evaluation;
            let eval_after = -next_eval;
            let swing = (eval_before - eval_after).max(0.0);
            let classification = MoveClassification::classify(swing, played.ply);

            positions.push(PositionAnalysis {
                ply: played.ply,
                fen: played.fen_before.clone(),
                played_uci: played.uci.clone(),
                played_san: played.san.clone(),
                white_to_move: played.white_to_move,
                results: suggestion.results.clone(),
                eval_before,
                eval_after,
                swing,
                eval_white: to_white_perspective(eval_before, played.white_to_move),
                classification,
            });
        }

        let mut analysis = GameAnalysis::from_positions(positions, record.metadata.clone(), version);
        analysis.insights = game_insights(&analysis);
        analysis.recommendations = recommendations(&analysis);

        info!(
            version,
            white_accuracy = analysis.white_stats.accuracy_percent,
            black_accuracy = analysis.black_stats.accuracy_percent,
            critical_moments = analysis.critical_moments,
            "game analyzed"
        );
        Ok(analysis)
    }
}
