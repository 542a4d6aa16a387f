//! # Reconciliation Engine
//!
//! Brings a mirrored destination into agreement with an authoritative source
//! while writing as little as possible.
//!
//! ## Overview
//!
//! - Fingerprint every source record over its comparable fields
//! - Classify each record against the destination: unchanged, updated or new
//! - Stage updates and inserts per chunk and commit them in one transaction
//! - Run chunks in parallel, each worker on its own destination session
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         SyncCoordinator                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  fetch_all ──► partition ──┬──► worker 0: Reconciler ─► BatchWriter
//! │                            ├──► worker 1: Reconciler ─► BatchWriter
//! │                            └──► worker k: Reconciler ─► BatchWriter
//! │                                              │                   │
//! │                                              ▼                   │
//! │                              ChunkReport ──► RunSummary          │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```
//! # let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # runtime.block_on(async {
//! use rust_decimal::Decimal;
//! use stocksync_core::{MemorySource, MemoryStore, StockKey, StockRecord};
//! use stocksync_engine::{SyncConfig, SyncCoordinator};
//!
//! let source = MemorySource::new(vec![StockRecord::new(
//!     StockKey::new(1, 2),
//!     Decimal::from(10),
//!     Decimal::from(100),
//! )]);
//! let destination = MemoryStore::new();
//!
//! let coordinator =
//!     SyncCoordinator::new(source, destination.clone(), SyncConfig::default().with_workers(2));
//! let report = coordinator.run().await.unwrap();
//!
//! assert_eq!(report.summary.inserted, 1);
//! assert_eq!(destination.len(), 1);
//! # });
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod observer;
pub mod partition;
pub mod reconciler;
pub mod statistics;
pub mod types;
pub mod writer;

// Re-exports
pub use config::SyncConfig;
pub use coordinator::SyncCoordinator;
pub use error::{SyncError, SyncResult};
pub use observer::{NoopObserver, SyncObserver, TracingObserver};
pub use partition::{partition, Chunk};
pub use reconciler::{classify, ChunkBatch, Reconciler, StagedInsert, StagedUpdate};
pub use statistics::{ChunkFailure, ChunkReport, RunReport, RunSummary};
pub use types::{ReconciliationOutcome, RunPhase};
pub use writer::BatchWriter;
