//! Run observers.
//!
//! The engine reports progress through [`SyncObserver`] instead of logging
//! from inside the algorithm. Observers are shared by every worker and must
//! be cheap and non-blocking.

use std::fmt::Display;

use stocksync_core::RunId;
use tracing::{debug, error, info, trace, warn, Level};

use crate::statistics::{ChunkFailure, ChunkReport, RunReport};
use crate::types::{ReconciliationOutcome, RunPhase};

/// Hooks invoked during a run. Every hook defaults to doing nothing.
pub trait SyncObserver: Send + Sync {
    /// The run entered `phase`.
    fn on_phase(&self, _run_id: &RunId, _phase: RunPhase) {}

    /// The source returned `records` records.
    fn on_fetched(&self, _run_id: &RunId, _records: usize) {}

    /// The records were split into `chunks` chunks.
    fn on_partitioned(&self, _run_id: &RunId, _chunks: usize, _records: usize) {}

    /// A record of `chunk` was classified.
    fn on_record(&self, _chunk: usize, _key: &dyn Display, _outcome: ReconciliationOutcome) {}

    /// A chunk committed.
    fn on_chunk_completed(&self, _report: &ChunkReport) {}

    /// A chunk failed and wrote nothing.
    fn on_chunk_failed(&self, _failure: &ChunkFailure) {}

    /// The run reached a terminal phase with a report.
    fn on_run_finished(&self, _report: &RunReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

/// Level at which a classified record is logged. Writes show up under the
/// default `debug` filter, unchanged records only under `trace`.
fn record_level(outcome: ReconciliationOutcome) -> Level {
    if outcome.is_write() {
        Level::DEBUG
    } else {
        Level::TRACE
    }
}

/// Observer emitting structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_phase(&self, run_id: &RunId, phase: RunPhase) {
        if phase == RunPhase::Failed {
            warn!(run_id = %run_id, phase = %phase, "Run failed");
        } else {
            debug!(run_id = %run_id, phase = %phase, "Run phase changed");
        }
    }

    fn on_fetched(&self, run_id: &RunId, records: usize) {
        info!(run_id = %run_id, records, "Source records loaded");
    }

    fn on_partitioned(&self, run_id: &RunId, chunks: usize, records: usize) {
        info!(run_id = %run_id, chunks, records, "Records partitioned");
    }

    fn on_record(&self, chunk: usize, key: &dyn Display, outcome: ReconciliationOutcome) {
        if record_level(outcome) == Level::DEBUG {
            debug!(chunk, key = %key, outcome = %outcome, "Record changed");
        } else {
            trace!(chunk, key = %key, outcome = %outcome, "Record unchanged");
        }
    }

    fn on_chunk_completed(&self, report: &ChunkReport) {
        info!(
            chunk = report.index,
            records = report.records,
            updated = report.updated,
            inserted = report.inserted,
            unchanged = report.unchanged,
            "Chunk committed"
        );
    }

    fn on_chunk_failed(&self, failure: &ChunkFailure) {
        error!(
            chunk = failure.index,
            offset = failure.offset,
            records = failure.records,
            code = failure.error.error_code(),
            error = %failure.error,
            "Chunk failed, nothing written"
        );
    }

    fn on_run_finished(&self, report: &RunReport) {
        let summary = &report.summary;
        info!(
            run_id = %report.run_id,
            updated = summary.updated,
            inserted = summary.inserted,
            unchanged = summary.unchanged,
            records_total = summary.records_total,
            chunks_total = summary.chunks_total,
            chunks_failed = summary.chunks_failed,
            started_at = %summary.started_at,
            finished_at = %summary.finished_at,
            duration_ms = u64::try_from(summary.duration.as_millis()).unwrap_or(u64::MAX),
            "Synchronisation finished"
        );

        if !report.is_complete() {
            warn!(
                run_id = %report.run_id,
                chunks_failed = summary.chunks_failed,
                "Some chunks failed; re-run to converge"
            );
        }
    }
}
