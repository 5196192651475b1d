//! Chess position and game analysis driven by UCI engines.
//!
//! This crate runs external engines such as Stockfish over the UCI protocol,
//! classifies the quality of played moves and explains the results in plain
//! language.
//!
//! # Overview
//!
//! - [`UciClient`] - Lifecycle and bounded searches of one engine process
//! - [`EnginePool`] - Lazily started engines keyed by version
//! - [`PositionAnalyzer`] - Best move, alternatives and confidence for a FEN
//! - [`GameAnalyzer`] - Per-move classification and accuracy for a whole game
//! - [`GameRecord`] - PGN/SAN parsing and replay
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chess_analysis::{AnalysisConfig, EnginePool, GameAnalyzer, ProcessLauncher};
//!
//! let config = AnalysisConfig::load()?;
//! let launcher = ProcessLauncher::new(config.engines.clone());
//! let pool = Arc::new(EnginePool::new(launcher, config.engine_options()));
//! let analyzer = GameAnalyzer::new(pool.clone(), config);
//! let analysis = analyzer.analyze_pgn("1. e4 e5 2. Nf3 Nc6", "stockfish").await?;
//! println!("White accuracy: {:.1}%", analysis.white_stats.accuracy_percent);
//! pool.terminate_all().await;
//! ```

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod evaluation;
pub mod notation;
pub mod patterns;
pub mod pool;
pub mod position;
pub mod quality;
pub mod reasoning;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use analyzer::{AnalysisError, GameAnalyzer};
pub use config::{AnalysisConfig, ConfigError, EngineSpec};
pub use engine::{EngineError, EngineOptions, SearchRequest, SearchResult, UciClient};
pub use evaluation::{Evaluation, MATE_SCORE};
pub use notation::{ArchivedGame, GameMetadata, GameRecord, NotationError, PlayedMove};
pub use patterns::{GamePhase, TacticalPattern};
pub use pool::{EngineHandle, EngineLauncher, EnginePool, ProcessLauncher};
pub use position::{MoveSuggestion, PositionAnalyzer, SuggestionSource};
pub use quality::{GameAnalysis, MoveClassification, PlayerStats, PositionAnalysis};
pub use transport::{EngineTransport, ProcessTransport};
