//! UCI protocol client for one analysis engine.
//!
//! [`UciClient`] owns a single [`EngineTransport`] and walks it through the
//! handshake, fixed-depth searches and shutdown. Searches are bounded by a
//! hard time budget: whatever the engine reported last is returned when the
//! budget runs out.

use std::io;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};
use uci::{EngineInfo, EngineMessage, GoOptions, GuiCommand};

use crate::evaluation::Evaluation;
use crate::transport::EngineTransport;

/// Maximum number of lines to read before giving up on a handshake reply.
pub const MAX_UCI_LINES: usize = 1000;

/// Errors that can occur when working with chess engines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The process could not be started, did not complete the handshake,
    /// or its pipes failed.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
    /// A search was attempted on a client that is not initialized or was terminated.
    #[error("Engine not ready")]
    NotReady,
    /// A search was attempted while another one is still running.
    #[error("Engine busy")]
    Busy,
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::Unavailable(e.to_string())
    }
}

/// Lifecycle of a [`UciClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClientState {
    Uninitialized,
    Initializing,
    Ready,
    Searching,
    Terminated,
}

/// Engine tuning and protocol timing.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Value for the `Threads` option.
    pub threads: u32,
    /// Value for the `Hash` option, in megabytes.
    pub hash_mb: u32,
    /// Budget for `uci`..`uciok` and `isready`..`readyok`.
    pub handshake_timeout: Duration,
    /// How long to wait for `bestmove` after sending `stop`.
    pub stop_grace: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 16,
            handshake_timeout: Duration::from_millis(5000),
            stop_grace: Duration::from_millis(250),
        }
    }
}

/// A single search to run on one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Position in FEN notation.
    pub fen: String,
    /// Stop once the engine reports this depth.
    pub depth_limit: u32,
    /// Hard budget for the whole search.
    pub time_limit_ms: u64,
}

impl SearchRequest {
    pub fn new(fen: impl Into<String>, depth_limit: u32, time_limit_ms: u64) -> Self {
        Self {
            fen: fen.into(),
            depth_limit,
            time_limit_ms,
        }
    }
}

/// Result of searching one position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// The best move found in UCI notation, empty if the engine gave none.
    pub best_move: String,
    /// Evaluation in pawns from the side to move's point of view.
    pub evaluation: f64,
    /// The search depth reached.
    pub depth: u32,
    /// The number of nodes searched.
    pub nodes: u64,
    /// Wall-clock time spent on the search.
    pub elapsed_ms: u64,
    /// The principal variation (sequence of best moves).
    pub pv: Vec<String>,
    /// Mate distance when the engine reported a mate score.
    pub mate_in: Option<i32>,
}

impl SearchResult {
    /// Copy with the timing zeroed, for comparing results of separate runs.
    pub fn without_timing(&self) -> Self {
        Self {
            elapsed_ms: 0,
            ..self.clone()
        }
    }
}

/// Why the read loop of a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    BestMove,
    DepthReached,
    TimedOut,
}

/// Best-so-far values gathered from `info` lines.
#[derive(Debug, Default)]
struct SearchAccumulator {
    best_move: String,
    evaluation: Option<Evaluation>,
    depth: u32,
    nodes: u64,
    pv: Vec<String>,
}

impl SearchAccumulator {
    fn update(&mut self, info: &EngineInfo) {
        // Only the primary line counts when the engine runs MultiPV.
        if info.multipv.is_some_and(|n| n > 1) {
            return;
        }
        if let Some(nodes) = info.nodes {
            self.nodes = nodes;
        }
        if let Some(depth) = info.depth {
            self.depth = depth;
        }
        // Score and line move together so the move matches its evaluation.
        if !info.has_exact_score() {
            return;
        }
        if let Some(score) = info.score {
            self.evaluation = Some(score.into());
        }
        if let Some(first) = info.pv.first() {
            self.best_move = first.clone();
            self.pv = info.pv.clone();
        }
    }

    /// `None` is the engine's `bestmove (none)`: there is no legal move.
    fn finish(&mut self, best_move: Option<String>) {
        self.best_move = best_move.unwrap_or_default();
    }

    fn into_result(self, elapsed: Duration) -> SearchResult {
        let evaluation = self.evaluation.unwrap_or_default();
        SearchResult {
            best_move: self.best_move,
            evaluation: evaluation.to_pawns(),
            depth: self.depth,
            nodes: self.nodes,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            pv: self.pv,
            mate_in: evaluation.mate_in(),
        }
    }
}

/// Client for one UCI engine.
///
/// # Lifecycle
///
/// `Uninitialized → Initializing → Ready → Searching → Ready … → Terminated`
///
/// 1. [`UciClient::initialize`] performs the handshake and tuning.
/// 2. [`UciClient::search`] runs one bounded search at a time.
/// 3. [`UciClient::terminate`] sends `quit`; later searches fail with
///    [`EngineError::NotReady`].
pub struct UciClient {
    transport: Box<dyn EngineTransport>,
    options: EngineOptions,
    state: ClientState,
    /// The engine's name as reported during the handshake.
    name: String,
    /// Set when a stopped search never acknowledged with `bestmove`.
    needs_sync: bool,
    /// Why the engine was lost, if a failure terminated it.
    failure: Option<EngineError>,
}

impl UciClient {
    pub fn new(transport: Box<dyn EngineTransport>, options: EngineOptions) -> Self {
        Self {
            transport,
            options,
            state: ClientState::Uninitialized,
            name: String::new(),
            needs_sync: false,
            failure: None,
        }
    }

    /// Returns the engine's name as reported via UCI protocol.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ClientState::Ready
    }

    /// Run the UCI handshake, apply tuning options and start a new game.
    ///
    /// Calling it on a ready client is a no-op.
    ///
    /// # Errors
    ///
    /// - `EngineError::Unavailable` if the engine does not answer within the
    ///   handshake timeout or its pipes fail. The client is then terminated.
    /// - `EngineError::NotReady` if the client was already terminated.
    pub async fn initialize(&mut self) -> Result<(), EngineError> {
        match self.state {
            ClientState::Ready => return Ok(()),
            ClientState::Terminated => return Err(EngineError::NotReady),
            ClientState::Searching | ClientState::Initializing => return Err(EngineError::Busy),
            ClientState::Uninitialized => {}
        }

        self.state = ClientState::Initializing;
        let deadline = tokio::time::Instant::now() + self.options.handshake_timeout;
        let outcome = match timeout_at(deadline, self.handshake()).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Unavailable(format!(
                "handshake timed out after {}ms",
                self.options.handshake_timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(()) => {
                info!(engine = %self.name, "engine ready");
                self.state = ClientState::Ready;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "engine initialization failed");
                self.shutdown().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::Uci).await?;

        let mut name = String::new();
        let mut lines_read = 0;
        loop {
            if lines_read > MAX_UCI_LINES {
                return Err(EngineError::Unavailable(
                    "Too many lines without uciok".to_string(),
                ));
            }
            lines_read += 1;
            match self.read_message().await? {
                EngineMessage::Id { name: Some(n), .. } => name = n,
                EngineMessage::UciOk => break,
                _ => {}
            }
        }

        self.name = if name.is_empty() {
            "Unknown Engine".to_string()
        } else {
            name
        };

        self.send(&GuiCommand::set_option("Threads", self.options.threads))
            .await?;
        self.send(&GuiCommand::set_option("Hash", self.options.hash_mb))
            .await?;
        self.send(&GuiCommand::set_option("Ponder", false)).await?;
        self.send(&GuiCommand::UciNewGame).await?;
        self.wait_ready().await
    }

    /// Send `isready` and wait for `readyok`.
    async fn wait_ready(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::IsReady).await?;
        let mut lines_read = 0;
        loop {
            if lines_read > MAX_UCI_LINES {
                return Err(EngineError::Unavailable(
                    "Too many lines without readyok".to_string(),
                ));
            }
            lines_read += 1;
            if self.read_message().await? == EngineMessage::ReadyOk {
                return Ok(());
            }
        }
    }

    /// Search a position.
    ///
    /// Sends `position fen` and `go depth`, then reads progress until the
    /// engine answers `bestmove`, reports `depth_limit`, or the time limit
    /// elapses. In the last two cases `stop` is sent before returning and the
    /// result holds the last reported values.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotReady` if the client is not initialized or terminated.
    /// - `EngineError::Unavailable` if the engine's pipes fail; the client is
    ///   terminated and later searches repeat the same error.
    pub async fn search(&mut self, request: &SearchRequest) -> Result<SearchResult, EngineError> {
        match self.state {
            ClientState::Ready => {}
            ClientState::Searching => return Err(EngineError::Busy),
            _ => return Err(self.failure.clone().unwrap_or(EngineError::NotReady)),
        }

        self.state = ClientState::Searching;
        match self.run_search(request).await {
            Ok(result) => {
                self.state = ClientState::Ready;
                Ok(result)
            }
            Err(e) => {
                warn!(engine = %self.name, error = %e, "search failed, terminating engine");
                self.shutdown().await;
                self.failure = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn run_search(&mut self, request: &SearchRequest) -> Result<SearchResult, EngineError> {
        if self.needs_sync {
            let deadline = tokio::time::Instant::now() + self.options.handshake_timeout;
            timeout_at(deadline, self.wait_ready())
                .await
                .map_err(|_| EngineError::Unavailable("engine stopped responding".to_string()))??;
            self.needs_sync = false;
        }

        let started = Instant::now();
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(request.time_limit_ms);

        self.send(&GuiCommand::Position {
            fen: Some(request.fen.clone()),
            moves: Vec::new(),
        })
        .await?;
        self.send(&GuiCommand::Go(GoOptions::depth(request.depth_limit)))
            .await?;

        let mut acc = SearchAccumulator::default();
        let reason = loop {
            let message = match timeout_at(deadline, self.read_message()).await {
                Ok(message) => message?,
                Err(_) => break StopReason::TimedOut,
            };
            match message {
                EngineMessage::Info(info) => {
                    acc.update(&info);
                    if request.depth_limit > 0 && acc.depth >= request.depth_limit {
                        break StopReason::DepthReached;
                    }
                }
                EngineMessage::BestMove { mv, .. } => {
                    acc.finish(mv);
                    break StopReason::BestMove;
                }
                _ => {}
            }
        };

        if reason != StopReason::BestMove {
            if reason == StopReason::TimedOut {
                warn!(
                    engine = %self.name,
                    time_limit_ms = request.time_limit_ms,
                    depth = acc.depth,
                    "search timed out, using last reported values"
                );
            }
            self.send(&GuiCommand::Stop).await?;
            self.drain_after_stop(&mut acc).await?;
        }

        let result = acc.into_result(started.elapsed());
        debug!(
            engine = %self.name,
            ?reason,
            best_move = %result.best_move,
            evaluation = result.evaluation,
            depth = result.depth,
            "search finished"
        );
        Ok(result)
    }

    /// Consume output up to the `bestmove` that acknowledges a `stop`.
    async fn drain_after_stop(&mut self, acc: &mut SearchAccumulator) -> Result<(), EngineError> {
        let deadline = tokio::time::Instant::now() + self.options.stop_grace;
        loop {
            match timeout_at(deadline, self.read_message()).await {
                Ok(message) => match message? {
                    EngineMessage::BestMove { mv, .. } => {
                        acc.finish(mv);
                        return Ok(());
                    }
                    EngineMessage::Info(info) => acc.update(&info),
                    _ => {}
                },
                Err(_) => {
                    // Resynchronise before the next search instead of blocking here.
                    self.needs_sync = true;
                    return Ok(());
                }
            }
        }
    }

    /// Send `quit` and mark the client terminated. Safe to call repeatedly.
    pub async fn terminate(&mut self) {
        if self.state == ClientState::Terminated {
            return;
        }
        info!(engine = %self.name, "terminating engine");
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        // The engine may already be gone; quitting is best effort.
        let _ = self.send(&GuiCommand::Quit).await;
        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "engine transport did not close cleanly");
        }
        self.state = ClientState::Terminated;
    }

    /// Send a command to the engine.
    async fn send(&mut self, command: &GuiCommand) -> Result<(), EngineError> {
        let line = command.to_uci();
        debug!(engine = %self.name, ">> {}", line);
        self.transport.send(&line).await?;
        Ok(())
    }

    /// Read and parse the next line of engine output.
    async fn read_message(&mut self) -> Result<EngineMessage, EngineError> {
        match self.transport.next_line().await? {
            Some(line) => {
                debug!(engine = %self.name, "<< {}", line);
                Ok(EngineMessage::parse(&line))
            }
            None => Err(EngineError::Unavailable(
                "Engine closed unexpectedly".to_string(),
            )),
        }
    }
}
