//! Parallel run coordinator.
//!
//! Fetches the source once, partitions it, and runs every chunk on its own
//! tokio task with its own destination session. Workers never talk to each
//! other; their reports come back through the join handles and are summed
//! here.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use stocksync_core::{DestinationStore, RunId, SourceExtractor, SyncRecord};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, instrument};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::observer::{NoopObserver, SyncObserver};
use crate::partition::{partition, Chunk};
use crate::reconciler::Reconciler;
use crate::statistics::{ChunkFailure, ChunkReport, RunReport, RunSummary};
use crate::types::RunPhase;
use crate::writer::BatchWriter;

/// Drives a reconciliation run from a source into a destination.
pub struct SyncCoordinator<R, S, D>
where
    R: SyncRecord,
    S: SourceExtractor<R>,
    D: DestinationStore<R>,
{
    source: S,
    destination: Arc<D>,
    config: SyncConfig,
    observer: Arc<dyn SyncObserver>,
    _record: PhantomData<fn() -> R>,
}

impl<R, S, D> SyncCoordinator<R, S, D>
where
    R: SyncRecord,
    S: SourceExtractor<R>,
    D: DestinationStore<R>,
{
    /// Create a coordinator with no observer.
    pub fn new(source: S, destination: D, config: SyncConfig) -> Self {
        Self {
            source,
            destination: Arc::new(destination),
            config,
            observer: Arc::new(NoopObserver),
            _record: PhantomData,
        }
    }

    /// Report progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one reconciliation under a fresh run id.
    pub async fn run(&self) -> SyncResult<RunReport> {
        self.run_with_id(RunId::new()).await
    }

    /// Run one reconciliation.
    ///
    /// Returns `Err` for run-level failures, in which case nothing was
    /// written. Chunk failures are listed in the report; every other chunk
    /// is committed.
    #[instrument(
        skip_all,
        fields(run_id = %run_id, entity = R::ENTITY, workers = self.config.worker_count)
    )]
    pub async fn run_with_id(&self, run_id: RunId) -> SyncResult<RunReport> {
        let clock = Instant::now();
        let started_at = Utc::now();
        let mut phase = PhaseTracker::new(run_id, self.observer.as_ref());

        phase.advance(RunPhase::Fetching)?;
        let records = match self.source.fetch_all().await {
            Ok(records) if records.is_empty() => return Err(phase.fail(SyncError::EmptySource)),
            Ok(records) => records,
            Err(source) => return Err(phase.fail(SyncError::Fetch { source })),
        };
        let records_total = records.len();
        self.observer.on_fetched(&run_id, records_total);

        let chunks = match partition(records, self.config.worker_count) {
            Ok(chunks) => chunks,
            Err(e) => return Err(phase.fail(e)),
        };
        phase.advance(RunPhase::Partitioned)?;
        self.observer
            .on_partitioned(&run_id, chunks.len(), records_total);

        phase.advance(RunPhase::Dispatching)?;
        let mut summary = RunSummary::new(started_at, records_total, chunks.len());
        let handles: Vec<(ChunkMeta, JoinHandle<SyncResult<ChunkReport>>)> = chunks
            .into_iter()
            .map(|chunk| {
                let meta = ChunkMeta::of(&chunk);
                let destination = Arc::clone(&self.destination);
                let observer = Arc::clone(&self.observer);
                debug!(chunk = meta.index, records = meta.records, "Dispatching chunk");
                (meta, tokio::spawn(process_chunk(destination, chunk, observer)))
            })
            .collect();

        phase.advance(RunPhase::Aggregating)?;
        let mut failures = Vec::new();
        for (meta, handle) in handles {
            let result = handle.await.unwrap_or_else(|e| {
                Err(SyncError::WorkerPanicked {
                    chunk: meta.index,
                    message: panic_message(e),
                })
            });

            match result {
                Ok(report) => {
                    self.observer.on_chunk_completed(&report);
                    summary.absorb(&report);
                }
                Err(error) => {
                    let failure = ChunkFailure {
                        index: meta.index,
                        offset: meta.offset,
                        records: meta.records,
                        error,
                    };
                    self.observer.on_chunk_failed(&failure);
                    summary.record_failure();
                    failures.push(failure);
                }
            }
        }

        summary.finish(Utc::now(), clock.elapsed());
        phase.advance(RunPhase::Done)?;

        let report = RunReport {
            run_id,
            phase: phase.current(),
            summary,
            failures,
        };
        self.observer.on_run_finished(&report);

        Ok(report)
    }
}

/// Reconcile and write one chunk on a session of its own.
///
/// The session is dropped, and its connection released, on every path out.
async fn process_chunk<R, D>(
    destination: Arc<D>,
    chunk: Chunk<R>,
    observer: Arc<dyn SyncObserver>,
) -> SyncResult<ChunkReport>
where
    R: SyncRecord,
    D: DestinationStore<R>,
{
    let Chunk { index, records, .. } = chunk;
    let mut report = ChunkReport::new(index, records.len());

    let mut session = destination
        .open_session()
        .await
        .map_err(|source| SyncError::Session {
            chunk: index,
            source,
        })?;

    let batch = Reconciler::new(index, observer.as_ref())
        .reconcile(&mut session, records)
        .await?;

    report.updated = batch.updates.len();
    report.inserted = batch.inserts.len();
    report.unchanged = batch.unchanged;

    BatchWriter::new(index).apply(&mut session, batch).await?;

    Ok(report)
}

#[derive(Debug, Clone, Copy)]
struct ChunkMeta {
    index: usize,
    offset: usize,
    records: usize,
}

impl ChunkMeta {
    fn of<R>(chunk: &Chunk<R>) -> Self {
        Self {
            index: chunk.index,
            offset: chunk.offset,
            records: chunk.len(),
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Validated phase transitions, reported to the observer.
struct PhaseTracker<'a> {
    run_id: RunId,
    phase: RunPhase,
    observer: &'a dyn SyncObserver,
}

impl<'a> PhaseTracker<'a> {
    fn new(run_id: RunId, observer: &'a dyn SyncObserver) -> Self {
        Self {
            run_id,
            phase: RunPhase::Idle,
            observer,
        }
    }

    fn current(&self) -> RunPhase {
        self.phase
    }

    fn advance(&mut self, next: RunPhase) -> SyncResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(SyncError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        self.observer.on_phase(&self.run_id, next);
        Ok(())
    }

    /// Move to `Failed` and hand back the error that caused it.
    fn fail(&mut self, error: SyncError) -> SyncError {
        if self.phase.can_transition_to(RunPhase::Failed) {
            self.phase = RunPhase::Failed;
            self.observer.on_phase(&self.run_id, RunPhase::Failed);
        }
        error
    }
}
