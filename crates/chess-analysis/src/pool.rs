//! Version-keyed registry of analysis engines.
//!
//! Engines are started lazily on first request and kept until
//! [`EnginePool::terminate_all`]. Each version gets at most one start
//! attempt: a failed start is remembered and returned to later callers
//! without relaunching the process.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::EngineSpec;
use crate::engine::{EngineError, EngineOptions, SearchRequest, SearchResult, UciClient};
use crate::transport::{EngineTransport, ProcessTransport};

/// Starts the transport for an engine version.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self, version: &str) -> Result<Box<dyn EngineTransport>, EngineError>;
}

/// Launches engines as child processes.
///
/// Versions listed in the configuration map to an executable and arguments;
/// any other version string is run as the executable itself (for example
/// `stockfish` from `PATH`).
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    engines: HashMap<String, EngineSpec>,
}

impl ProcessLauncher {
    pub fn new(engines: HashMap<String, EngineSpec>) -> Self {
        Self { engines }
    }

    /// Executable and arguments used for `version`.
    pub fn resolve(&self, version: &str) -> (PathBuf, Vec<String>) {
        match self.engines.get(version) {
            Some(spec) => (spec.path.clone(), spec.args.clone()),
            None => (PathBuf::from(version), Vec::new()),
        }
    }
}

#[async_trait]
impl EngineLauncher for ProcessLauncher {
    async fn launch(&self, version: &str) -> Result<Box<dyn EngineTransport>, EngineError> {
        let (path, args) = self.resolve(version);
        info!(version, path = %path.display(), "starting engine process");
        let transport = ProcessTransport::spawn(&path, &args).map_err(|e| {
            EngineError::Unavailable(format!("Failed to spawn {}: {}", path.display(), e))
        })?;
        Ok(Box::new(transport))
    }
}

/// Shared handle to one initialized engine.
///
/// Searches through the same handle are queued in arrival order. Only the
/// pool can terminate the engine.
pub struct EngineHandle {
    version: String,
    name: String,
    client: tokio::sync::Mutex<UciClient>,
}

impl EngineHandle {
    /// The version key this engine was requested under.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Name the engine reported in its handshake.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn is_ready(&self) -> bool {
        self.client.lock().await.is_ready()
    }

    /// Run one search, waiting for any search already in progress.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResult, EngineError> {
        self.client.lock().await.search(request).await
    }

    pub(crate) async fn terminate(&self) {
        self.client.lock().await.terminate().await;
    }
}

type Slot = Arc<OnceCell<Result<Arc<EngineHandle>, EngineError>>>;

/// Pool of analysis engines keyed by version.
pub struct EnginePool {
    launcher: Box<dyn EngineLauncher>,
    options: EngineOptions,
    registry: Mutex<HashMap<String, Slot>>,
}

impl EnginePool {
    /// Create a pool. No engine is started until [`EnginePool::get_engine`].
    pub fn new(launcher: impl EngineLauncher + 'static, options: EngineOptions) -> Self {
        Self {
            launcher: Box::new(launcher),
            options,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Get the engine for `version`, starting and initializing it on first use.
    ///
    /// Concurrent first requests for the same version share one start
    /// attempt. If that attempt failed, the same error is returned every time.
    pub async fn get_engine(&self, version: &str) -> Result<Arc<EngineHandle>, EngineError> {
        let slot = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(registry.entry(version.to_string()).or_default())
        };

        let outcome = slot.get_or_init(|| self.start_engine(version)).await;
        if let Err(e) = outcome {
            warn!(version, error = %e, "engine version unavailable");
        }
        outcome.clone()
    }

    async fn start_engine(&self, version: &str) -> Result<Arc<EngineHandle>, EngineError> {
        let transport = self.launcher.launch(version).await?;
        let mut client = UciClient::new(transport, self.options.clone());
        client.initialize().await?;

        info!(version, engine = %client.name(), "engine registered");
        Ok(Arc::new(EngineHandle {
            version: version.to_string(),
            name: client.name().to_string(),
            client: tokio::sync::Mutex::new(client),
        }))
    }

    /// Search `fen` once with each version, one after another.
    ///
    /// Versions that cannot be started map to their error.
    pub async fn compare_across_versions<S: AsRef<str>>(
        &self,
        fen: &str,
        versions: &[S],
        depth: u32,
        time_limit_ms: u64,
    ) -> BTreeMap<String, Result<SearchResult, EngineError>> {
        let request = SearchRequest::new(fen, depth, time_limit_ms);
        let mut results = BTreeMap::new();
        for version in versions {
            let version = version.as_ref();
            let result = match self.get_engine(version).await {
                Ok(engine) => engine.search(&request).await,
                Err(e) => Err(e),
            };
            results.insert(version.to_string(), result);
        }
        results
    }

    /// Versions with a successfully started engine, sorted.
    pub fn loaded_versions(&self) -> Vec<String> {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let mut versions: Vec<String> = registry
            .iter()
            .filter(|(_, slot)| matches!(slot.get(), Some(Ok(_))))
            .map(|(version, _)| version.clone())
            .collect();
        versions.sort();
        versions
    }

    /// Terminate every engine and clear the registry. Safe to call repeatedly.
    pub async fn terminate_all(&self) {
        let slots: Vec<(String, Slot)> = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.drain().collect()
        };

        for (version, slot) in slots {
            if let Some(Ok(engine)) = slot.get() {
                info!(version = %version, "terminating engine");
                engine.terminate().await;
            }
        }
    }
}
