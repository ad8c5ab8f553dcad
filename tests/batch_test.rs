//! Batch recompiler integration tests
//!
//! Warm-up runs against in-memory stores; "crashes" are simulated by dropping a recompiler
//! mid-run and building a fresh one over the same stores.

mod common;

use common::{content_store, init_logging};
use pressnative_core::{
    batch::{BatchProgress, BatchRecompiler, BatchStatus, BatchStep, MemoryProgressStore},
    blocks::ContentId,
    cache::{CacheStore, CompiledCache, MemoryStore},
    event::CacheEvent,
    source::{ContentSource, MemoryContentSource},
    PressNativeError,
};
use std::sync::Arc;
use test_log::test;
use tokio::sync::{mpsc::unbounded_channel, Semaphore};

type Recompiler = BatchRecompiler<MemoryStore, MemoryContentSource, MemoryProgressStore>;

fn recompiler(
    store: &MemoryStore,
    source: &MemoryContentSource,
    progress: &MemoryProgressStore,
    batch_size: usize,
) -> Recompiler {
    BatchRecompiler::new(
        CompiledCache::new(store.clone()),
        source.clone(),
        progress.clone(),
    )
    .with_batch_size(batch_size)
}

/// Progress with the wall-clock fields cleared, for comparing runs.
fn cursor(progress: &BatchProgress) -> (BatchStatus, usize, usize, usize) {
    (
        progress.status,
        progress.total,
        progress.compiled,
        progress.offset,
    )
}

#[test(tokio::test)]
async fn test_full_run_covers_everything() {
    init_logging();
    let store = MemoryStore::new();
    let source = content_store(47, 3, 5);
    let progress_store = MemoryProgressStore::new();
    let recompiler = recompiler(&store, &source, &progress_store, 10);

    let scheduled = recompiler.schedule().await.unwrap();
    assert_eq!(scheduled.status, BatchStatus::Running);
    assert_eq!(scheduled.total, 47);

    let mut steps = 0;
    loop {
        steps += 1;
        match recompiler.process_batch().await.unwrap() {
            BatchStep::Continue => continue,
            BatchStep::Complete => break,
            other => panic!("unexpected step {other:?}"),
        }
    }
    assert_eq!(steps, 5);

    let done = recompiler.progress().await;
    assert_eq!(done.status, BatchStatus::Complete);
    assert_eq!(done.compiled, done.total);
    assert_eq!(done.fraction(), 1.0);

    let cache = recompiler.cache();
    assert_eq!(store.content_ids().await.unwrap(), (1..=47).collect::<Vec<_>>());
    for id in 1..=47 {
        let compiled_at = cache.compiled_at(id).await.unwrap().unwrap();
        assert!(compiled_at >= scheduled.started_at);
    }

    // Finished jobs stay finished.
    assert_eq!(recompiler.process_batch().await.unwrap(), BatchStep::Idle);
}

#[test(tokio::test)]
async fn test_exact_multiple_of_batch_size() {
    let store = MemoryStore::new();
    let source = content_store(40, 3, 5);
    let progress_store = MemoryProgressStore::new();
    let recompiler = recompiler(&store, &source, &progress_store, 20);
    recompiler.schedule().await.unwrap();

    assert_eq!(recompiler.process_batch().await.unwrap(), BatchStep::Continue);
    assert_eq!(recompiler.process_batch().await.unwrap(), BatchStep::Continue);
    // The empty third page is what ends the job.
    assert_eq!(recompiler.process_batch().await.unwrap(), BatchStep::Complete);

    let done = recompiler.progress().await;
    assert_eq!(cursor(&done), (BatchStatus::Complete, 40, 40, 60));
}

#[test(tokio::test)]
async fn test_resume_after_crash_matches_uninterrupted_run() {
    let source = content_store(95, 8, 4);

    let reference_store = MemoryStore::new();
    let reference_progress = MemoryProgressStore::new();
    let reference = recompiler(&reference_store, &source, &reference_progress, 20);
    reference.schedule().await.unwrap();
    let expected = reference.run_to_completion().await.unwrap();

    for crash_after in 0..=4 {
        let store = MemoryStore::new();
        let progress_store = MemoryProgressStore::new();
        {
            let first = recompiler(&store, &source, &progress_store, 20);
            first.schedule().await.unwrap();
            for _ in 0..crash_after {
                first.process_batch().await.unwrap();
            }
            let interrupted = first.progress().await;
            assert_eq!(interrupted.offset, crash_after * 20);
            assert!(interrupted.is_running());
        }

        let resumed = recompiler(&store, &source, &progress_store, 20);
        let finished = resumed.run_to_completion().await.unwrap();
        assert_eq!(cursor(&finished), cursor(&expected), "crash after {crash_after}");
        assert_eq!(
            store.content_ids().await.unwrap(),
            reference_store.content_ids().await.unwrap()
        );
        for id in [1, 4, 40, 95] {
            assert_eq!(
                resumed.cache().get(id).await.unwrap(),
                reference.cache().get(id).await.unwrap()
            );
        }
    }
}

#[test(tokio::test)]
async fn test_nothing_to_do() {
    let store = MemoryStore::new();
    let source = MemoryContentSource::new();
    let progress_store = MemoryProgressStore::new();
    let recompiler = recompiler(&store, &source, &progress_store, 20);

    // Never scheduled.
    assert_eq!(recompiler.progress().await, BatchProgress::default());
    assert_eq!(recompiler.process_batch().await.unwrap(), BatchStep::Idle);

    // Scheduled with no content.
    let scheduled = recompiler.schedule().await.unwrap();
    assert_eq!(cursor(&scheduled), (BatchStatus::Complete, 0, 0, 0));
    assert_eq!(recompiler.process_batch().await.unwrap(), BatchStep::Idle);
    assert!(store.is_empty());
}

#[test(tokio::test)]
async fn test_empty_bodies_are_counted_but_not_stored() {
    let store = MemoryStore::new();
    let source = content_store(5, 3, 5);
    source.insert(3, "   ");
    let progress_store = MemoryProgressStore::new();
    let recompiler = recompiler(&store, &source, &progress_store, 2);
    recompiler.schedule().await.unwrap();
    let done = recompiler.run_to_completion().await.unwrap();

    assert_eq!(done.compiled, 5);
    assert_eq!(store.content_ids().await.unwrap(), vec![1, 2, 4, 5]);
}

#[test(tokio::test)]
async fn test_schedule_restarts_the_cursor() {
    let store = MemoryStore::new();
    let source = content_store(30, 3, 5);
    let progress_store = MemoryProgressStore::new();
    let recompiler = recompiler(&store, &source, &progress_store, 10);

    recompiler.schedule().await.unwrap();
    recompiler.process_batch().await.unwrap();
    recompiler.process_batch().await.unwrap();
    assert_eq!(recompiler.progress().await.offset, 20);

    source.insert(31, "<p>Late arrival</p>");
    let restarted = recompiler.schedule().await.unwrap();
    assert_eq!(cursor(&restarted), (BatchStatus::Running, 31, 0, 0));

    let done = recompiler.run_to_completion().await.unwrap();
    assert_eq!(done.compiled, 31);
    assert_eq!(store.len(), 31);
}

#[test(tokio::test)]
async fn test_progress_events() {
    let (tx, mut rx) = unbounded_channel();
    let source = content_store(3, 3, 5);
    let recompiler = BatchRecompiler::new(
        CompiledCache::new(MemoryStore::new()).with_events(tx),
        source,
        MemoryProgressStore::new(),
    )
    .with_batch_size(2);
    recompiler.schedule().await.unwrap();
    recompiler.run_to_completion().await.unwrap();

    let snapshots: Vec<(BatchStatus, usize)> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|event| match event {
            CacheEvent::BatchProgress(progress) => Some((progress.status, progress.compiled)),
            _ => None,
        })
        .collect();
    assert_eq!(
        snapshots,
        vec![
            (BatchStatus::Running, 0),
            (BatchStatus::Running, 2),
            (BatchStatus::Complete, 3),
        ]
    );
}

/// Holds every body read until the gate is opened.
#[derive(Clone)]
struct GatedSource {
    inner: MemoryContentSource,
    gate: Arc<Semaphore>,
}

impl ContentSource for GatedSource {
    async fn rendered_content(
        &self,
        content_id: ContentId,
    ) -> Result<Option<String>, PressNativeError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| PressNativeError::Custom(e.to_string()))?;
        self.inner.rendered_content(content_id).await
    }

    async fn count_eligible(&self) -> Result<usize, PressNativeError> {
        self.inner.count_eligible().await
    }

    async fn eligible_ids(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ContentId>, PressNativeError> {
        self.inner.eligible_ids(offset, limit).await
    }
}

#[test(tokio::test)]
async fn test_overlapping_steps_are_refused() {
    let gate = Arc::new(Semaphore::new(0));
    let source = GatedSource {
        inner: content_store(4, 3, 5),
        gate: gate.clone(),
    };
    let store = MemoryStore::new();
    let recompiler = BatchRecompiler::new(
        CompiledCache::new(store.clone()),
        source,
        MemoryProgressStore::new(),
    )
    .with_batch_size(2);
    recompiler.schedule().await.unwrap();

    let (first, second) = tokio::join!(recompiler.process_batch(), async {
        let step = recompiler.process_batch().await;
        gate.add_permits(16);
        step
    });
    assert_eq!(first.unwrap(), BatchStep::Continue);
    assert_eq!(second.unwrap(), BatchStep::Busy);

    let progress = recompiler.progress().await;
    assert_eq!((progress.compiled, progress.offset), (2, 2));
    assert_eq!(store.len(), 2);
}

/// Fails to render one id; every other read goes to the inner source.
#[derive(Clone)]
struct FailingSource {
    inner: MemoryContentSource,
    failing: ContentId,
}

impl ContentSource for FailingSource {
    async fn rendered_content(
        &self,
        content_id: ContentId,
    ) -> Result<Option<String>, PressNativeError> {
        if content_id == self.failing {
            return Err(PressNativeError::Storage(format!(
                "content {content_id} is unreadable"
            )));
        }
        self.inner.rendered_content(content_id).await
    }

    async fn count_eligible(&self) -> Result<usize, PressNativeError> {
        self.inner.count_eligible().await
    }

    async fn eligible_ids(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ContentId>, PressNativeError> {
        self.inner.eligible_ids(offset, limit).await
    }
}

#[test(tokio::test)]
async fn test_failing_item_is_skipped_without_stopping_the_run() {
    let store = MemoryStore::new();
    let source = FailingSource {
        inner: content_store(5, 3, 5),
        failing: 3,
    };
    let recompiler = BatchRecompiler::new(
        CompiledCache::new(store.clone()),
        source,
        MemoryProgressStore::new(),
    )
    .with_batch_size(2);
    recompiler.schedule().await.unwrap();

    // The step holding the bad item still advances the cursor.
    assert_eq!(recompiler.process_batch().await.unwrap(), BatchStep::Continue);
    assert_eq!(recompiler.process_batch().await.unwrap(), BatchStep::Continue);
    assert_eq!(recompiler.progress().await.offset, 4);

    let done = recompiler.run_to_completion().await.unwrap();
    assert_eq!(done.status, BatchStatus::Complete);
    assert_eq!((done.total, done.compiled), (5, 5));
    assert_eq!(store.content_ids().await.unwrap(), vec![1, 2, 4, 5]);
    assert_eq!(recompiler.cache().get(3).await.unwrap(), None);
}
