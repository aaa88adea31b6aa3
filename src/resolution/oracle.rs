//! Optional second resolution tier backed by an external definition oracle
//! (typically a language server).
//!
//! The oracle is a black box: every failure mode (absent, slow, erroring,
//! silent) maps to an unresolved symbol, never to a failed build.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::CodeGraphConfig;
use crate::types::SourcePosition;

/// Failures reported by (or about) a definition oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle request failed: {0}")]
    Failed(String),
}

/// Where the oracle says a symbol is defined. `line` and `column` are
/// zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

/// Capability to map a reference position to a definition location.
///
/// Calls are synchronous; the queue runs them on blocking threads under a
/// timeout. `open_file`/`close_file` bracket all requests for one file.
pub trait DefinitionOracle: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    fn open_file(&self, _path: &Path) -> Result<(), OracleError> {
        Ok(())
    }

    /// Resolves the symbol at `position` in `path`. `Ok(None)` means the
    /// oracle has no answer.
    fn resolve(&self, path: &Path, position: SourcePosition) -> Result<Option<DefinitionLocation>, OracleError>;

    fn close_file(&self, _path: &Path) {}
}

/// Whether Pass 2 consults an oracle. Disabled is a normal mode, not an error.
#[derive(Clone, Default)]
pub enum OracleMode {
    #[default]
    Disabled,
    Enabled {
        oracle: Arc<dyn DefinitionOracle>,
        concurrency: usize,
        timeout: Duration,
    },
}

impl OracleMode {
    /// Enables `oracle` with the concurrency and timeout from `config`.
    pub fn enabled(oracle: Arc<dyn DefinitionOracle>, config: &CodeGraphConfig) -> Self {
        OracleMode::Enabled {
            oracle,
            concurrency: config.effective_oracle_concurrency(),
            timeout: config.oracle_timeout(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, OracleMode::Enabled { .. })
    }
}

impl std::fmt::Debug for OracleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleMode::Disabled => f.write_str("Disabled"),
            OracleMode::Enabled {
                oracle,
                concurrency,
                timeout,
            } => f
                .debug_struct("Enabled")
                .field("oracle", &oracle.name())
                .field("concurrency", concurrency)
                .field("timeout", timeout)
                .finish(),
        }
    }
}

/// Requests against one file; the file is opened once for all of them.
#[derive(Debug, Clone)]
pub struct FileBatch {
    pub file: PathBuf,
    /// `(caller-chosen index, reference position)`
    pub requests: Vec<(usize, SourcePosition)>,
}

pub type OracleAnswer = Result<Option<DefinitionLocation>, OracleError>;

/// Bounded-concurrency funnel in front of a [`DefinitionOracle`].
///
/// At most `concurrency` file sessions are active at once; every call is cut
/// off after `timeout`. A session's permit is held by its oracle calls, so a
/// timed-out call that is still running keeps its slot until it returns, and
/// the rest of that session is abandoned.
pub struct OracleQueue {
    oracle: Arc<dyn DefinitionOracle>,
    concurrency: usize,
    timeout: Duration,
}

impl OracleQueue {
    pub fn new(oracle: Arc<dyn DefinitionOracle>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            oracle,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Builds a queue from an enabled mode; `None` when disabled.
    pub fn from_mode(mode: &OracleMode) -> Option<Self> {
        match mode {
            OracleMode::Disabled => None,
            OracleMode::Enabled {
                oracle,
                concurrency,
                timeout,
            } => Some(Self::new(Arc::clone(oracle), *concurrency, *timeout)),
        }
    }

    /// Runs every batch and returns answers sorted by request index.
    /// Requests skipped because of cancellation have no answer.
    ///
    /// Fails only when the oracle reports itself unavailable or the private
    /// runtime cannot start.
    pub fn run(&self, batches: Vec<FileBatch>, cancel: &CancellationToken) -> Result<Vec<(usize, OracleAnswer)>, OracleError> {
        if !self.oracle.is_available() {
            return Err(OracleError::Unavailable(format!(
                "{} reports itself unavailable",
                self.oracle.name()
            )));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.concurrency)
            .thread_name("codegraph-oracle")
            .enable_time()
            .build()
            .map_err(|e| OracleError::Unavailable(format!("cannot start oracle runtime: {e}")))?;

        // block_on on a fresh thread, so callers already inside a runtime are fine
        let results = std::thread::scope(|scope| {
            scope
                .spawn(|| runtime.block_on(self.drive(batches, cancel.clone())))
                .join()
        })
        .map_err(|_| OracleError::Failed("oracle driver panicked".to_string()))?;

        // Timed-out blocking calls may still be running; do not wait for them.
        runtime.shutdown_background();
        Ok(results)
    }

    async fn drive(&self, batches: Vec<FileBatch>, cancel: CancellationToken) -> Vec<(usize, OracleAnswer)> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(batches.len());

        for batch in batches {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let oracle = Arc::clone(&self.oracle);
            let timeout = self.timeout;
            let cancel = cancel.clone();
            let permit = Arc::new(permit);
            handles.push(tokio::spawn(run_batch(oracle, permit, batch, timeout, cancel)));
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(answers) => results.extend(answers),
                Err(e) => warn!(error = %e, "oracle batch task failed"),
            }
        }
        results.sort_by_key(|(index, _)| *index);
        results
    }
}

async fn run_batch(
    oracle: Arc<dyn DefinitionOracle>,
    permit: Arc<OwnedSemaphorePermit>,
    batch: FileBatch,
    timeout: Duration,
    cancel: CancellationToken,
) -> Vec<(usize, OracleAnswer)> {
    let FileBatch { file, requests } = batch;
    let mut answers = Vec::with_capacity(requests.len());

    let open_path = file.clone();
    if let Err(e) = call(Arc::clone(&oracle), Arc::clone(&permit), timeout, move |o| o.open_file(&open_path)).await {
        warn!(file = %file.display(), error = %e, "oracle could not open file");
        answers.extend(requests.into_iter().map(|(index, _)| (index, Err(e.clone()))));
        return answers;
    }

    let mut requests = requests.into_iter();
    while let Some((index, position)) = requests.next() {
        if cancel.is_cancelled() {
            debug!(file = %file.display(), "oracle batch cancelled");
            break;
        }
        let path = file.clone();
        let answer = call(Arc::clone(&oracle), Arc::clone(&permit), timeout, move |o| o.resolve(&path, position)).await;
        if let Err(OracleError::Timeout(limit)) = answer {
            warn!(file = %file.display(), "oracle call timed out, abandoning file session");
            answers.push((index, Err(OracleError::Timeout(limit))));
            answers.extend(requests.map(|(index, _)| (index, Err(OracleError::Timeout(limit)))));
            return answers;
        }
        answers.push((index, answer));
    }

    let close_path = file.clone();
    let closed = call(oracle, permit, timeout, move |o| {
        o.close_file(&close_path);
        Ok(())
    })
    .await;
    if let Err(e) = closed {
        debug!(file = %file.display(), error = %e, "oracle close failed");
    }
    answers
}

/// Runs one synchronous oracle call on the blocking pool under `limit`.
/// The call holds the session permit until it actually returns.
async fn call<T, F>(
    oracle: Arc<dyn DefinitionOracle>,
    permit: Arc<OwnedSemaphorePermit>,
    limit: Duration,
    f: F,
) -> Result<T, OracleError>
where
    T: Send + 'static,
    F: FnOnce(&dyn DefinitionOracle) -> Result<T, OracleError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        f(oracle.as_ref())
    });
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(OracleError::Failed(join.to_string())),
        Err(_) => Err(OracleError::Timeout(limit)),
    }
}
