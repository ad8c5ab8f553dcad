//! # Batch Recompiler
//!
//! Recompiles every eligible piece of content in fixed-size chunks, for cold warm-up and for
//! operator-triggered full rebuilds. Compiling everything in one request would blow any
//! request budget, so the job is a resumable cursor instead:
//!
//! ```text
//!   idle ──schedule()──▶ running ──process_batch()──▶ running ── … ──▶ complete
//!                          ▲                                              │
//!                          └───────────────── schedule() ─────────────────┘
//! ```
//!
//! The cursor ([`BatchProgress`]) is persisted through a [`ProgressStore`] after every step, so
//! a process that dies mid-run resumes at the stored `offset` on the next `process_batch()`.
//! Ids are paged in ascending order, which keeps offset pagination exhaustive.
//!
//! Steps never overlap: `process_batch` returns [`BatchStep::Busy`] while another step holds
//! the step lock, and `schedule` waits for a running step before resetting the cursor. There is
//! no cancellation; scheduling again supersedes the current run.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    future::Future,
    str::FromStr,
    sync::Arc,
};
use tokio::sync::Mutex;

use crate::{
    blocks::ContentId,
    cache::{now_unix, CacheStore, CompiledCache},
    error::PressNativeError,
    event::{emit, CacheEvent},
    source::ContentSource,
};

pub const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    #[default]
    Idle,
    Running,
    Complete,
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            BatchStatus::Idle => write!(f, "idle"),
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Complete => write!(f, "complete"),
        }
    }
}

impl FromStr for BatchStatus {
    type Err = PressNativeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(BatchStatus::Idle),
            "running" => Ok(BatchStatus::Running),
            "complete" => Ok(BatchStatus::Complete),
            other => Err(PressNativeError::Serialization(format!(
                "unknown batch status {other:?}"
            ))),
        }
    }
}

/// The single, process-wide batch cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub status: BatchStatus,
    pub total: usize,
    pub compiled: usize,
    pub offset: usize,
    /// Unix seconds; 0 until a job has been scheduled.
    pub started_at: i64,
    pub updated_at: i64,
}

impl BatchProgress {
    pub fn is_running(&self) -> bool {
        self.status == BatchStatus::Running
    }

    /// Share of `total` compiled so far, in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        match self.status {
            BatchStatus::Complete => 1.0,
            _ if self.total == 0 => 0.0,
            _ => (self.compiled as f64 / self.total as f64).min(1.0),
        }
    }
}

/// What a call to [`BatchRecompiler::process_batch`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStep {
    /// No job is running; nothing was done.
    Idle,
    /// Another step is in flight; nothing was done.
    Busy,
    /// A chunk was processed and more remain; schedule another step.
    Continue,
    /// The final chunk was processed.
    Complete,
}

/// Persistence port for the batch cursor.
pub trait ProgressStore: Sync {
    fn load_progress(
        &self,
    ) -> impl Future<Output = Result<Option<BatchProgress>, PressNativeError>> + Send;

    fn save_progress(
        &self,
        progress: &BatchProgress,
    ) -> impl Future<Output = Result<(), PressNativeError>> + Send;
}

/// Process-local [`ProgressStore`]. Cloning shares the record.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore(Arc<RwLock<Option<BatchProgress>>>);

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    async fn load_progress(&self) -> Result<Option<BatchProgress>, PressNativeError> {
        Ok(self.0.read().clone())
    }

    async fn save_progress(&self, progress: &BatchProgress) -> Result<(), PressNativeError> {
        *self.0.write() = Some(progress.clone());
        Ok(())
    }
}

pub struct BatchRecompiler<S, C, P> {
    cache: CompiledCache<S>,
    source: C,
    progress_store: P,
    batch_size: usize,
    step_lock: Mutex<()>,
}

impl<S, C, P> BatchRecompiler<S, C, P>
where
    S: CacheStore,
    C: ContentSource,
    P: ProgressStore,
{
    pub fn new(cache: CompiledCache<S>, source: C, progress_store: P) -> Self {
        BatchRecompiler {
            cache,
            source,
            progress_store,
            batch_size: DEFAULT_BATCH_SIZE,
            step_lock: Mutex::new(()),
        }
    }

    /// Sets the chunk size; values below 1 are raised to 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn cache(&self) -> &CompiledCache<S> {
        &self.cache
    }

    /// Current cursor. Never fails: a job that never ran, or an unreadable record, reads as idle.
    pub async fn progress(&self) -> BatchProgress {
        match self.progress_store.load_progress().await {
            Ok(progress) => progress.unwrap_or_default(),
            Err(e) => {
                tracing::error!("[BatchRecompiler] could not load progress: {}", e);
                BatchProgress::default()
            }
        }
    }

    async fn save(&self, progress: &BatchProgress) -> Result<(), PressNativeError> {
        self.progress_store.save_progress(progress).await?;
        emit(
            self.cache.events(),
            CacheEvent::BatchProgress(progress.clone()),
        );
        Ok(())
    }

    /// Starts (or restarts) a full recompilation. With nothing eligible the job completes
    /// immediately; otherwise the cursor is reset and the caller drives `process_batch`.
    pub async fn schedule(&self) -> Result<BatchProgress, PressNativeError> {
        let _step = self.step_lock.lock().await;
        let total = self.source.count_eligible().await?;
        let now = now_unix();
        let progress = BatchProgress {
            status: if total == 0 {
                BatchStatus::Complete
            } else {
                BatchStatus::Running
            },
            total,
            compiled: 0,
            offset: 0,
            started_at: now,
            updated_at: now,
        };
        self.save(&progress).await?;
        tracing::info!(
            "[BatchRecompiler] scheduled recompilation of {} items ({})",
            total,
            progress.status
        );
        Ok(progress)
    }

    /// Compiles the next chunk. A no-op unless a job is running.
    #[tracing::instrument(skip(self))]
    pub async fn process_batch(&self) -> Result<BatchStep, PressNativeError> {
        let Ok(_step) = self.step_lock.try_lock() else {
            tracing::debug!("[BatchRecompiler] step already in flight");
            return Ok(BatchStep::Busy);
        };
        let mut progress = self
            .progress_store
            .load_progress()
            .await?
            .unwrap_or_default();
        if !progress.is_running() {
            return Ok(BatchStep::Idle);
        }

        let ids = self
            .source
            .eligible_ids(progress.offset, self.batch_size)
            .await?;
        for content_id in ids.iter() {
            self.compile_one(*content_id).await;
        }

        progress.compiled += ids.len();
        progress.offset += self.batch_size;
        progress.updated_at = now_unix();
        let step = if ids.len() < self.batch_size {
            progress.status = BatchStatus::Complete;
            BatchStep::Complete
        } else {
            BatchStep::Continue
        };
        self.save(&progress).await?;
        match step {
            BatchStep::Complete => tracing::info!(
                "[BatchRecompiler] complete: {} of {} items compiled",
                progress.compiled,
                progress.total
            ),
            _ => tracing::debug!(
                "[BatchRecompiler] chunk done, {} of {} items compiled",
                progress.compiled,
                progress.total
            ),
        }
        Ok(step)
    }

    /// Compiles and stores one item. Failures are logged and skipped; the item stays uncached
    /// until the next warm-up or an on-demand compile.
    async fn compile_one(&self, content_id: ContentId) {
        let rendered = match self.source.rendered_content(content_id).await {
            Ok(Some(rendered)) if !rendered.trim().is_empty() => rendered,
            Ok(_) => {
                tracing::debug!("[BatchRecompiler] skipping {}: empty body", content_id);
                return;
            }
            Err(e) => {
                tracing::warn!("[BatchRecompiler] skipping {}: {}", content_id, e);
                return;
            }
        };
        if let Err(e) = self.cache.refresh(content_id, &rendered).await {
            tracing::warn!("[BatchRecompiler] could not store {}: {}", content_id, e);
        }
    }

    /// Drives `process_batch` until the job is no longer running, yielding to the runtime
    /// between chunks. Returns the final cursor.
    pub async fn run_to_completion(&self) -> Result<BatchProgress, PressNativeError> {
        loop {
            match self.process_batch().await? {
                BatchStep::Continue | BatchStep::Busy => tokio::task::yield_now().await,
                BatchStep::Complete | BatchStep::Idle => break,
            }
        }
        Ok(self.progress().await)
    }
}
