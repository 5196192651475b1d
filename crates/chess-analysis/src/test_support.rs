//! Scripted in-memory engines for unit tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uci::{EngineMessage, GuiCommand, InfoBuilder, Score};

use crate::engine::EngineError;
use crate::pool::EngineLauncher;
use crate::transport::EngineTransport;

pub const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

type Scorer = Arc<dyn Fn(&str) -> Option<(Score, Vec<String>)> + Send + Sync>;

/// Behaviour of a fake UCI engine.
#[derive(Clone)]
pub struct FakeEngine {
    name: String,
    evals: HashMap<String, (Score, Vec<String>)>,
    scorer: Option<Scorer>,
    max_depth: u32,
    handshake: bool,
    bestmove: bool,
    crash_on_go: bool,
}

impl FakeEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            evals: HashMap::new(),
            scorer: None,
            max_depth: 4,
            handshake: true,
            bestmove: true,
            crash_on_go: false,
        }
    }

    pub fn with_eval(mut self, fen: &str, score: Score, pv: &[&str]) -> Self {
        self.evals.insert(
            fen.to_string(),
            (score, pv.iter().map(|m| m.to_string()).collect()),
        );
        self
    }

    /// Score positions not listed with `with_eval`.
    pub fn with_scorer(
        mut self,
        scorer: impl Fn(&str) -> Option<(Score, Vec<String>)> + Send + Sync + 'static,
    ) -> Self {
        self.scorer = Some(Arc::new(scorer));
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn without_handshake(mut self) -> Self {
        self.handshake = false;
        self
    }

    pub fn without_bestmove(mut self) -> Self {
        self.bestmove = false;
        self
    }

    pub fn crash_on_go(mut self) -> Self {
        self.crash_on_go = true;
        self
    }

    fn lookup(&self, fen: &str) -> (Score, Vec<String>) {
        if let Some(entry) = self.evals.get(fen) {
            return entry.clone();
        }
        self.scorer
            .as_ref()
            .and_then(|s| s(fen))
            .unwrap_or((Score::Cp(0), Vec::new()))
    }
}

/// Commands the client sent, shared with the test.
#[derive(Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<String>>>);

impl SentLog {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn count(&self, line: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|l| *l == line).count()
    }

    fn push(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

pub struct FakeTransport {
    engine: FakeEngine,
    fen: Option<String>,
    queue: VecDeque<String>,
    sent: SentLog,
    crashed: bool,
    /// A `go` is running that has not answered `bestmove` yet.
    searching: bool,
}

impl FakeTransport {
    pub fn new(engine: FakeEngine) -> Self {
        Self::with_log(engine, SentLog::default())
    }

    pub fn with_log(engine: FakeEngine, sent: SentLog) -> Self {
        Self {
            engine,
            fen: None,
            queue: VecDeque::new(),
            sent,
            crashed: false,
            searching: false,
        }
    }

    pub fn sent_log(&self) -> SentLog {
        self.sent.clone()
    }

    fn respond(&mut self, command: GuiCommand) {
        match command {
            GuiCommand::Uci if self.engine.handshake => {
                self.queue.push_back(
                    EngineMessage::Id {
                        name: Some(self.engine.name.clone()),
                        author: None,
                    }
                    .to_uci(),
                );
                self.queue
                    .push_back("option name Hash type spin default 16 min 1 max 1024".to_string());
                self.queue.push_back(EngineMessage::UciOk.to_uci());
            }
            GuiCommand::IsReady if self.engine.handshake => {
                self.queue.push_back(EngineMessage::ReadyOk.to_uci());
            }
            GuiCommand::Position { fen, .. } => self.fen = fen,
            GuiCommand::Go(opts) => {
                if self.engine.crash_on_go {
                    self.crashed = true;
                    return;
                }
                let fen = self.fen.clone().unwrap_or_else(|| STARTPOS.to_string());
                let (score, pv) = self.engine.lookup(&fen);
                let target = opts.depth.unwrap_or(self.engine.max_depth);
                let last = target.min(self.engine.max_depth);
                let pv_refs: Vec<&str> = pv.iter().map(String::as_str).collect();
                for depth in 1..=last {
                    let info = InfoBuilder::new()
                        .depth(depth)
                        .seldepth(depth + 2)
                        .nodes(u64::from(depth) * 1000)
                        .pv(&pv_refs);
                    let info = match score {
                        Score::Cp(cp) => info.score_cp(cp),
                        Score::Mate(m) => info.score_mate(m),
                    };
                    self.queue.push_back(info.build().to_uci());
                }
                self.searching = true;
                if self.engine.bestmove && last == target {
                    self.searching = false;
                    self.queue.push_back(
                        EngineMessage::BestMove {
                            mv: pv.first().cloned(),
                            ponder: pv.get(1).cloned(),
                        }
                        .to_uci(),
                    );
                }
            }
            GuiCommand::Stop if self.engine.bestmove && self.searching => {
                self.searching = false;
                let fen = self.fen.clone().unwrap_or_else(|| STARTPOS.to_string());
                let (_, pv) = self.engine.lookup(&fen);
                self.queue.push_back(
                    EngineMessage::BestMove {
                        mv: pv.first().cloned(),
                        ponder: None,
                    }
                    .to_uci(),
                );
            }
            _ => {}
        }
    }
}

#[async_trait]
impl EngineTransport for FakeTransport {
    async fn send(&mut self, line: &str) -> io::Result<()> {
        self.sent.push(line);
        if let Ok(command) = GuiCommand::parse(line) {
            self.respond(command);
        }
        Ok(())
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.crashed {
            return Ok(None);
        }
        match self.queue.pop_front() {
            Some(line) => Ok(Some(line)),
            // A silent engine: block until the caller's timeout fires.
            None => std::future::pending().await,
        }
    }
}

/// Launcher over fake engines keyed by version.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    engines: HashMap<String, FakeEngine>,
    launches: Arc<AtomicUsize>,
    pub sent: SentLog,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, version: &str, engine: FakeEngine) -> Self {
        self.engines.insert(version.to_string(), engine);
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(&self, version: &str) -> Result<Box<dyn EngineTransport>, EngineError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to race.
        tokio::task::yield_now().await;
        match self.engines.get(version) {
            Some(engine) => Ok(Box::new(FakeTransport::with_log(
                engine.clone(),
                self.sent.clone(),
            ))),
            None => Err(EngineError::Unavailable(format!(
                "no engine installed for version {}",
                version
            ))),
        }
    }
}
