//! Buffered trace persistence: drains a tracer into an append-only NDJSON file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use observability_primitives::SessionId;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::{TraceResult, TraceSource};

/// Result of one [`TraceFileLogger::flush`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The logger was never initialised; the tracer was left untouched.
    NotReady,
    /// The tracer had nothing buffered; the file was not opened.
    Empty,
    /// All drained events were appended.
    Written {
        /// Number of lines appended.
        records: usize,
    },
    /// The append failed; the drained events are lost.
    Dropped {
        /// Number of events lost.
        records: usize,
    },
}

/// Periodically drains one tracer into its own trace file.
///
/// Persistence is at-most-once: once drained, events are never handed back to
/// the tracer, so a failed append loses that batch. Failures are logged and
/// reported through [`FlushOutcome::Dropped`], never returned as errors.
pub struct TraceFileLogger<T: TraceSource> {
    path: PathBuf,
    tracer: Arc<T>,
    write_lock: Mutex<()>,
    initialized: AtomicBool,
}

impl<T: TraceSource> TraceFileLogger<T> {
    /// Creates a logger writing `tracer`'s events to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, tracer: Arc<T>) -> Self {
        Self {
            path: path.into(),
            tracer,
            write_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Creates a logger at `<cache_root>/<subsystem>/<session>.ndjson.log`.
    #[must_use]
    pub fn for_session(
        cache_root: impl AsRef<Path>,
        subsystem: &str,
        session: SessionId,
        tracer: Arc<T>,
    ) -> Self {
        let path = cache_root
            .as_ref()
            .join(subsystem)
            .join(session.trace_file_name());
        Self::new(path, tracer)
    }

    /// Returns the trace file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the drained tracer.
    #[must_use]
    pub fn tracer(&self) -> &Arc<T> {
        &self.tracer
    }

    /// Returns `true` once [`Self::init`] has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Creates the parent directory and the trace file if absent.
    ///
    /// Idempotent; existing file contents are kept.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors encountered while preparing the file.
    pub async fn init(&self) -> TraceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        self.initialized.store(true, Ordering::Release);
        debug!(path = %self.path.display(), "trace file ready");
        Ok(())
    }

    /// Drains the tracer and appends one JSON line per event.
    ///
    /// An empty drain returns without touching the file. Concurrent flushes
    /// of the same logger are serialised so lines are never interleaved.
    pub async fn flush(&self) -> FlushOutcome {
        if !self.is_initialized() {
            return FlushOutcome::NotReady;
        }

        let _guard = self.write_lock.lock().await;
        let events = self.tracer.flush();
        if events.is_empty() {
            return FlushOutcome::Empty;
        }

        let records = events.len();
        match self.append(&events).await {
            Ok(()) => FlushOutcome::Written { records },
            Err(err) => {
                error!(
                    path = %self.path.display(),
                    records,
                    %err,
                    "error while flushing trace file; events dropped"
                );
                FlushOutcome::Dropped { records }
            }
        }
    }

    /// Flushes whatever is still buffered.
    pub async fn close(&self) -> FlushOutcome {
        let outcome = self.flush().await;
        debug!(path = %self.path.display(), ?outcome, "trace file closed");
        outcome
    }

    async fn append(&self, events: &[T::Event]) -> TraceResult<()> {
        let mut buffer = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buffer, event)?;
            buffer.push(b'\n');
        }

        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

impl<T: TraceSource> std::fmt::Debug for TraceFileLogger<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceFileLogger")
            .field("path", &self.path)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
