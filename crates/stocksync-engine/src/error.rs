//! Engine error types.
//!
//! Run-level errors (fetch, partition, configuration) end the run. Chunk
//! errors (session, lookup, write, panic) are contained to their chunk and
//! reported alongside the summary.

use stocksync_core::StoreError;
use thiserror::Error;

use crate::types::RunPhase;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a reconciliation run.
#[derive(Debug, Error)]
pub enum SyncError {
    // Run-level errors
    /// Reading the source failed.
    #[error("Source fetch failed: {source}")]
    Fetch {
        #[source]
        source: StoreError,
    },

    /// The source returned no records.
    #[error("Source returned no records")]
    EmptySource,

    /// The records could not be partitioned.
    #[error("Partition error: {message}")]
    Partition { message: String },

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Illegal phase transition.
    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition { from: RunPhase, to: RunPhase },

    // Chunk-level errors
    /// Opening the chunk's destination session failed.
    #[error("Chunk {chunk}: could not open destination session: {source}")]
    Session {
        chunk: usize,
        #[source]
        source: StoreError,
    },

    /// A destination lookup failed.
    #[error("Chunk {chunk}: lookup of {key} failed: {source}")]
    Lookup {
        chunk: usize,
        key: String,
        #[source]
        source: StoreError,
    },

    /// Writing or committing the chunk's batch failed; nothing was applied.
    #[error("Chunk {chunk}: write failed: {source}")]
    Write {
        chunk: usize,
        #[source]
        source: StoreError,
    },

    /// The worker task panicked.
    #[error("Chunk {chunk}: worker panicked: {message}")]
    WorkerPanicked { chunk: usize, message: String },
}

impl SyncError {
    /// Create a partition error.
    pub fn partition(message: impl Into<String>) -> Self {
        SyncError::Partition {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        SyncError::Configuration {
            message: message.into(),
        }
    }

    /// Chunk the error is confined to, if any.
    #[must_use]
    pub fn chunk(&self) -> Option<usize> {
        match self {
            SyncError::Session { chunk, .. }
            | SyncError::Lookup { chunk, .. }
            | SyncError::Write { chunk, .. }
            | SyncError::WorkerPanicked { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }

    /// Whether a re-run may succeed without intervention.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Fetch { source }
            | SyncError::Session { source, .. }
            | SyncError::Lookup { source, .. }
            | SyncError::Write { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Fetch { .. } => "FETCH_FAILED",
            SyncError::EmptySource => "EMPTY_SOURCE",
            SyncError::Partition { .. } => "PARTITION_FAILED",
            SyncError::Configuration { .. } => "INVALID_CONFIG",
            SyncError::InvalidTransition { .. } => "INVALID_TRANSITION",
            SyncError::Session { .. } => "SESSION_FAILED",
            SyncError::Lookup { .. } => "LOOKUP_FAILED",
            SyncError::Write { .. } => "WRITE_FAILED",
            SyncError::WorkerPanicked { .. } => "WORKER_PANICKED",
        }
    }
}
