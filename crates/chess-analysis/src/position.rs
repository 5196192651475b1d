//! Single-position analysis: best move, alternatives and confidence.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyzer::AnalysisError;
use crate::config::AnalysisConfig;
use crate::engine::{EngineError, SearchRequest, SearchResult};
use crate::evaluation::to_white_perspective;
use crate::notation::{candidate_moves, parse_fen, white_to_move, Material};
use crate::patterns::{detect_patterns, GamePhase, TacticalPattern};
use crate::pool::EnginePool;
use crate::reasoning::{explain_fallback, explain_move};

/// Confidence of a suggestion made without an engine.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    Engine,
    /// Static material count; no engine was available.
    Fallback,
}

/// Suggested move for a position, with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveSuggestion {
    pub fen: String,
    /// Best move in UCI notation, empty if there is no legal move.
    pub best_move: String,
    /// Pawns from the side to move's point of view.
    pub evaluation: f64,
    /// Pawns from White's point of view.
    pub eval_white: f64,
    pub mate_in: Option<i32>,
    /// How much the searches agree, in `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
    /// Best moves of the follow-up searches, in order. May repeat.
    pub alternatives: Vec<String>,
    pub patterns: Vec<TacticalPattern>,
    pub phase: GamePhase,
    /// Every search of the position, primary first.
    pub results: Vec<SearchResult>,
    pub source: SuggestionSource,
}

/// Agreement between the first two searches of a position.
///
/// 1.0 with fewer than two results.
pub fn confidence(results: &[SearchResult]) -> f64 {
    match results {
        [first, second, ..] => ((first.evaluation - second.evaluation).abs() / 2.0).min(1.0),
        _ => 1.0,
    }
}

/// Runs position searches through an [`EnginePool`].
#[derive(Clone)]
pub struct PositionAnalyzer {
    pool: Arc<EnginePool>,
    config: AnalysisConfig,
}

impl PositionAnalyzer {
    pub fn new(pool: Arc<EnginePool>, config: AnalysisConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &Arc<EnginePool> {
        &self.pool
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Suggest a move for `fen` using engine `version`.
    ///
    /// Runs one primary search and then `alternative_attempts` more searches
    /// of the same position. The follow-up searches do not exclude moves
    /// already found, so alternatives can repeat the best move.
    ///
    /// When the engine cannot be started or dies, a material-only suggestion
    /// with confidence 0.3 is returned instead of an error.
    ///
    /// # Errors
    ///
    /// - `AnalysisError::InvalidPosition` if `fen` is not a legal position.
    /// - `AnalysisError::Engine(EngineError::NotReady)` if the engine was
    ///   shut down by the pool.
    pub async fn analyze_position(
        &self,
        fen: &str,
        depth: u32,
        version: &str,
    ) -> Result<MoveSuggestion, AnalysisError> {
        parse_fen(fen).map_err(|e| AnalysisError::InvalidPosition(e.to_string()))?;

        let primary = match self.search(fen, depth, version).await {
            Ok(result) => result,
            Err(EngineError::Unavailable(reason)) => {
                warn!(version, %reason, "engine unavailable, using material estimate");
                return self.fallback(fen, &reason);
            }
            Err(e) => return Err(e.into()),
        };

        let mut results = vec![primary];
        for attempt in 0..self.config.alternative_attempts {
            match self.search(fen, depth, version).await {
                Ok(result) => results.push(result),
                Err(EngineError::Unavailable(reason)) => {
                    warn!(version, attempt, %reason, "engine lost while searching alternatives");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(self.suggestion(fen, results))
    }

    /// Evaluate `fen` with a single search, falling back to material.
    pub async fn evaluate(
        &self,
        fen: &str,
        depth: u32,
        version: &str,
    ) -> Result<SearchResult, AnalysisError> {
        parse_fen(fen).map_err(|e| AnalysisError::InvalidPosition(e.to_string()))?;
        match self.search(fen, depth, version).await {
            Ok(result) => Ok(result),
            Err(EngineError::Unavailable(reason)) => {
                warn!(version, %reason, "engine unavailable, using material estimate");
                fallback_result(fen)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn search(
        &self,
        fen: &str,
        depth: u32,
        version: &str,
    ) -> Result<SearchResult, EngineError> {
        let engine = self.pool.get_engine(version).await?;
        let request = SearchRequest::new(fen, depth, self.config.time_limit_ms);
        let result = engine.search(&request).await?;
        debug!(
            version,
            best_move = %result.best_move,
            evaluation = result.evaluation,
            depth = result.depth,
            "position searched"
        );
        Ok(result)
    }

    fn suggestion(&self, fen: &str, results: Vec<SearchResult>) -> MoveSuggestion {
        let primary = &results[0];
        let white = white_to_move(fen);
        let phase = GamePhase::of_fen(fen);
        let patterns = detect_patterns(fen, &primary.best_move, primary.mate_in);
        let reasoning = explain_move(
            &primary.best_move,
            primary.evaluation,
            primary.mate_in,
            &patterns,
            phase,
            white,
        );

        MoveSuggestion {
            fen: fen.to_string(),
            best_move: primary.best_move.clone(),
            evaluation: primary.evaluation,
            eval_white: to_white_perspective(primary.evaluation, white),
            mate_in: primary.mate_in,
            confidence: confidence(&results),
            reasoning,
            alternatives: results[1..].iter().map(|r| r.best_move.clone()).collect(),
            patterns,
            phase,
            source: SuggestionSource::Engine,
            results,
        }
    }

    fn fallback(&self, fen: &str, reason: &str) -> Result<MoveSuggestion, AnalysisError> {
        let result = fallback_result(fen)?;
        let material_white = Material::from_fen(fen).balance();

        Ok(MoveSuggestion {
            fen: fen.to_string(),
            best_move: result.best_move.clone(),
            evaluation: result.evaluation,
            eval_white: material_white,
            mate_in: None,
            confidence: FALLBACK_CONFIDENCE,
            reasoning: explain_fallback(&result.best_move, material_white, reason),
            alternatives: Vec::new(),
            patterns: detect_patterns(fen, &result.best_move, None),
            phase: GamePhase::of_fen(fen),
            results: vec![result],
            source: SuggestionSource::Fallback,
        })
    }
}

/// Search result built from material alone.
///
/// The move is the first capture, or else the first legal move.
fn fallback_result(fen: &str) -> Result<SearchResult, AnalysisError> {
    let moves = candidate_moves(fen).map_err(|e| AnalysisError::InvalidPosition(e.to_string()))?;
    let best_move = moves.first().cloned().unwrap_or_default();
    let balance = Material::from_fen(fen).balance();

    Ok(SearchResult {
        pv: moves.into_iter().take(1).collect(),
        best_move,
        evaluation: to_white_perspective(balance, white_to_move(fen)),
        ..SearchResult::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOptions;
    use crate::test_support::{FakeEngine, FakeLauncher, STARTPOS};
    use proptest::prelude::*;
    use std::time::Duration;
    use uci::Score;

    fn analyzer_with(launcher: FakeLauncher) -> PositionAnalyzer {
        let options = EngineOptions {
            handshake_timeout: Duration::from_millis(100),
            stop_grace: Duration::from_millis(20),
            ..EngineOptions::default()
        };
        let pool = Arc::new(EnginePool::new(launcher, options));
        PositionAnalyzer::new(pool, AnalysisConfig::default())
    }

    fn result(evaluation: f64) -> SearchResult {
        SearchResult {
            evaluation,
            ..SearchResult::default()
        }
    }

    #[test]
    fn test_confidence() {
        assert_eq!(confidence(&[]), 1.0);
        assert_eq!(confidence(&[result(0.3)]), 1.0);
        assert_eq!(confidence(&[result(0.3), result(0.3)]), 0.0);
        assert!((confidence(&[result(0.5), result(-0.5)]) - 0.5).abs() < 1e-9);
        assert_eq!(confidence(&[result(5.0), result(0.0), result(9.0)]), 1.0);
    }

    #[tokio::test]
    async fn test_engine_suggestion() {
        let engine = FakeEngine::new("Fake").with_eval(STARTPOS, Score::Cp(30), &["e2e4", "e7e5"]);
        let analyzer = analyzer_with(FakeLauncher::new().with_engine("sf", engine));

        let suggestion = analyzer.analyze_position(STARTPOS, 3, "sf").await.unwrap();

        assert_eq!(suggestion.source, SuggestionSource::Engine);
        assert_eq!(suggestion.best_move, "e2e4");
        assert_eq!(suggestion.evaluation, 0.3);
        assert_eq!(suggestion.eval_white, 0.3);
        assert_eq!(suggestion.results.len(), 3);
        assert_eq!(suggestion.confidence, 0.0);
        assert_eq!(suggestion.phase, GamePhase::Opening);
        assert!(suggestion.reasoning.contains("In the opening, e2e4 maintains equal chances."));
    }

    #[tokio::test]
    async fn test_alternatives_repeat_best_move_known_limitation() {
        // Follow-up searches do not exclude earlier moves, so a deterministic
        // engine reports the same move every time.
        let engine = FakeEngine::new("Fake").with_eval(STARTPOS, Score::Cp(30), &["e2e4"]);
        let analyzer = analyzer_with(FakeLauncher::new().with_engine("sf", engine));

        let suggestion = analyzer.analyze_position(STARTPOS, 3, "sf").await.unwrap();

        assert_eq!(suggestion.alternatives, vec!["e2e4", "e2e4"]);
    }

    #[tokio::test]
    async fn test_black_to_move_is_normalized_for_white() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        let engine = FakeEngine::new("Fake").with_eval(fen, Score::Cp(-40), &["c7c5"]);
        let analyzer = analyzer_with(FakeLauncher::new().with_engine("sf", engine));

        let suggestion = analyzer.analyze_position(fen, 3, "sf").await.unwrap();

        assert_eq!(suggestion.evaluation, -0.4);
        assert_eq!(suggestion.eval_white, 0.4);
    }

    #[tokio::test]
    async fn test_mate_suggestion_has_patterns() {
        let fen = "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";
        let engine = FakeEngine::new("Fake").with_eval(fen, Score::Mate(1), &["h5f7"]);
        let analyzer = analyzer_with(FakeLauncher::new().with_engine("sf", engine));

        let suggestion = analyzer.analyze_position(fen, 3, "sf").await.unwrap();

        assert_eq!(suggestion.mate_in, Some(1));
        assert_eq!(suggestion.evaluation, 99.0);
        assert_eq!(suggestion.patterns[0], TacticalPattern::Checkmate);
        assert!(suggestion.reasoning.contains("White has a forced mate in 1."));
    }

    #[tokio::test]
    async fn test_unavailable_engine_falls_back_at_start() {
        let analyzer = analyzer_with(FakeLauncher::new());

        let suggestion = analyzer.analyze_position(STARTPOS, 1, "missing").await.unwrap();

        assert_eq!(suggestion.source, SuggestionSource::Fallback);
        assert_eq!(suggestion.confidence, 0.3);
        assert_eq!(suggestion.evaluation, 0.0);
        assert_eq!(suggestion.best_move, candidate_moves(STARTPOS).unwrap()[0]);
        assert!(suggestion.alternatives.is_empty());
        assert!(suggestion.reasoning.contains("Static material estimate"));
    }

    #[tokio::test]
    async fn test_fallback_prefers_captures_and_counts_material() {
        // Black to move, up a knight, can take on e4
        let fen = "rnbqkb1r/pppppppp/8/8/4n3/8/PPPP1PPP/R1BQKBNR b KQkq - 0 3";
        let analyzer = analyzer_with(FakeLauncher::new());

        let suggestion = analyzer.analyze_position(fen, 1, "missing").await.unwrap();

        assert_eq!(suggestion.eval_white, -4.0);
        assert_eq!(suggestion.evaluation, 4.0);
        assert!(suggestion.patterns.contains(&TacticalPattern::Capture));
        assert_eq!(suggestion.results[0].depth, 0);
    }

    #[tokio::test]
    async fn test_engine_crash_falls_back() {
        let engine = FakeEngine::new("Crashy").crash_on_go();
        let analyzer = analyzer_with(FakeLauncher::new().with_engine("sf", engine));

        let first = analyzer.analyze_position(STARTPOS, 3, "sf").await.unwrap();
        let second = analyzer.analyze_position(STARTPOS, 3, "sf").await.unwrap();

        assert_eq!(first.source, SuggestionSource::Fallback);
        assert_eq!(second.source, SuggestionSource::Fallback);
    }

    #[tokio::test]
    async fn test_invalid_fen_is_rejected() {
        let analyzer = analyzer_with(FakeLauncher::new());
        let err = analyzer
            .analyze_position("not a position", 3, "sf")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidPosition(_)));
    }

    #[tokio::test]
    async fn test_primary_result_matches_version_comparison() {
        let engine = FakeEngine::new("Fake").with_eval(STARTPOS, Score::Cp(25), &["d2d4", "d7d5"]);
        let analyzer = analyzer_with(FakeLauncher::new().with_engine("sf", engine));

        let suggestion = analyzer.analyze_position(STARTPOS, 3, "sf").await.unwrap();
        let compared = analyzer
            .pool()
            .compare_across_versions(STARTPOS, &["sf"], 3, analyzer.config().time_limit_ms)
            .await;

        let compared = compared["sf"].as_ref().unwrap();
        assert_eq!(
            compared.without_timing(),
            suggestion.results[0].without_timing()
        );
    }

    #[tokio::test]
    async fn test_evaluate_runs_one_search() {
        let engine = FakeEngine::new("Fake").with_eval(STARTPOS, Score::Cp(15), &["g1f3"]);
        let launcher = FakeLauncher::new().with_engine("sf", engine);
        let analyzer = analyzer_with(launcher.clone());

        let result = analyzer.evaluate(STARTPOS, 3, "sf").await.unwrap();

        assert_eq!(result.best_move, "g1f3");
        assert_eq!(launcher.sent.count("go depth 3"), 1);
    }

    proptest! {
        #[test]
        fn prop_confidence_in_unit_range(evals in proptest::collection::vec(-100.0f64..100.0, 0..5)) {
            let results: Vec<_> = evals.into_iter().map(result).collect();
            let c = confidence(&results);
            prop_assert!((0.0..=1.0).contains(&c));
            if results.len() < 2 {
                prop_assert_eq!(c, 1.0);
            }
        }
    }
}
