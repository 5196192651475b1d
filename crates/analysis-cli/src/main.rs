//! chess-analyze - Analyze chess positions and games with UCI engines.

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chess_analysis::notation::validate_fen;
use chess_analysis::reasoning::game_summary;
use chess_analysis::{AnalysisConfig, EnginePool, GameAnalyzer, PositionAnalyzer, ProcessLauncher};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chess-analyze")]
#[command(about = "Analyze chess positions and games with UCI engines")]
struct Cli {
    /// Configuration file (defaults to analysis.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print JSON instead of a text report
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Suggest the best move for a position
    Position {
        /// Position in FEN notation
        #[arg(long)]
        fen: String,
        /// Search depth
        #[arg(short, long)]
        depth: Option<u32>,
        /// Engine version to use
        #[arg(short, long)]
        engine: Option<String>,
    },
    /// Classify every move of a PGN game
    Game {
        /// PGN file to analyze
        pgn: PathBuf,
        /// Search depth
        #[arg(short, long)]
        depth: Option<u32>,
        /// Engine version to use
        #[arg(short, long)]
        engine: Option<String>,
    },
    /// Search one position with several engine versions
    Compare {
        /// Position in FEN notation
        #[arg(long)]
        fen: String,
        /// Engine versions to compare (repeatable)
        #[arg(short, long = "engine", required = true)]
        engines: Vec<String>,
        /// Search depth
        #[arg(short, long)]
        depth: Option<u32>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => AnalysisConfig::load().context("Failed to load analysis.toml"),
    }
}

async fn run(cli: Cli, mut config: AnalysisConfig, pool: Arc<EnginePool>) -> anyhow::Result<()> {
    match cli.command {
        Commands::Position { fen, depth, engine } => {
            if !validate_fen(&fen) {
                bail!("Invalid FEN: {}", fen);
            }
            let depth = depth.unwrap_or(config.depth);
            let engine = engine.unwrap_or_else(|| config.default_engine.clone());
            let analyzer = PositionAnalyzer::new(pool, config);
            let suggestion = analyzer.analyze_position(&fen, depth, &engine).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&suggestion)?);
            } else {
                println!("{}", output::position_report(&suggestion));
            }
        }
        Commands::Game { pgn, depth, engine } => {
            let text = std::fs::read_to_string(&pgn)
                .with_context(|| format!("Failed to read {}", pgn.display()))?;
            if let Some(depth) = depth {
                config.depth = depth;
            }
            let engine = engine.unwrap_or_else(|| config.default_engine.clone());
            let analyzer = GameAnalyzer::new(pool, config);
            let analysis = analyzer
                .analyze_pgn(&text, &engine)
                .await
                .with_context(|| format!("Failed to analyze {}", pgn.display()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                println!("{}", game_summary(&analysis));
            }
        }
        Commands::Compare {
            fen,
            engines,
            depth,
        } => {
            if !validate_fen(&fen) {
                bail!("Invalid FEN: {}", fen);
            }
            let depth = depth.unwrap_or(config.depth);
            let results = pool
                .compare_across_versions(&fen, &engines, depth, config.time_limit_ms)
                .await;
            let entries = output::comparison_entries(&results);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{}", output::comparison_report(&entries));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    tracing::info!(
        default_engine = %config.default_engine,
        depth = config.depth,
        time_limit_ms = config.time_limit_ms,
        "configuration loaded"
    );

    let launcher = ProcessLauncher::new(config.engines.clone());
    let pool = Arc::new(EnginePool::new(launcher, config.engine_options()));
    let outcome = run(cli, config, pool.clone()).await;
    pool.terminate_all().await;
    outcome
}
