//! Per-chunk reports and run summary.
//!
//! Workers return a [`ChunkReport`] each; the coordinator folds them into
//! one [`RunSummary`]. No counters are shared between workers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stocksync_core::RunId;

use crate::error::SyncError;
use crate::types::RunPhase;

/// Counts for one committed chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReport {
    /// Chunk index.
    pub index: usize,
    /// Records in the chunk.
    pub records: usize,
    #[serde(default)]
    pub updated: usize,
    #[serde(default)]
    pub inserted: usize,
    #[serde(default)]
    pub unchanged: usize,
}

impl ChunkReport {
    /// Create an empty report for a chunk of `records` records.
    #[must_use]
    pub fn new(index: usize, records: usize) -> Self {
        Self {
            index,
            records,
            ..Self::default()
        }
    }

    /// Records classified.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.updated + self.inserted + self.unchanged
    }
}

/// A chunk that did not commit.
#[derive(Debug)]
pub struct ChunkFailure {
    /// Chunk index.
    pub index: usize,
    /// Position of the chunk's first record in the source sequence.
    pub offset: usize,
    /// Records in the chunk, none of which were written.
    pub records: usize,
    /// Why the chunk failed.
    pub error: SyncError,
}

/// Totals for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub updated: usize,
    #[serde(default)]
    pub inserted: usize,
    #[serde(default)]
    pub unchanged: usize,
    /// Records fetched from the source.
    pub records_total: usize,
    /// Chunks dispatched.
    pub chunks_total: usize,
    /// Chunks that did not commit.
    #[serde(default)]
    pub chunks_failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
}

impl RunSummary {
    /// Create an empty summary.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, records_total: usize, chunks_total: usize) -> Self {
        Self {
            updated: 0,
            inserted: 0,
            unchanged: 0,
            records_total,
            chunks_total,
            chunks_failed: 0,
            started_at,
            finished_at: started_at,
            duration: Duration::ZERO,
        }
    }

    /// Add a committed chunk's counts.
    pub fn absorb(&mut self, report: &ChunkReport) {
        self.updated += report.updated;
        self.inserted += report.inserted;
        self.unchanged += report.unchanged;
    }

    /// Count a failed chunk.
    pub fn record_failure(&mut self) {
        self.chunks_failed += 1;
    }

    /// Stamp the end of the run.
    pub fn finish(&mut self, finished_at: DateTime<Utc>, duration: Duration) {
        self.finished_at = finished_at;
        self.duration = duration;
    }

    /// Records classified in committed chunks.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.updated + self.inserted + self.unchanged
    }

    /// Rows written.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.updated + self.inserted
    }
}

/// Result of a run that reached aggregation.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    /// Final phase.
    pub phase: RunPhase,
    pub summary: RunSummary,
    /// Failed chunks, in chunk order.
    pub failures: Vec<ChunkFailure>,
}

impl RunReport {
    /// Whether every chunk committed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
