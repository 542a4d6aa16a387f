//! Store ports
//!
//! The engine depends only on these traits. Concrete stores (PostgreSQL,
//! in-memory) implement them for each synchronised entity.
//!
//! A destination is accessed through three nested scopes:
//!
//! ```text
//! DestinationStore ──open_session()──► DestinationSession ──begin()──► DestinationTransaction
//!   (shared, Arc)                      (one connection,                (one commit boundary)
//!                                       owned by one worker)
//! ```

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{DestinationRecord, SyncRecord};

/// Read-only extraction of the full source dataset.
#[async_trait]
pub trait SourceExtractor<R: SyncRecord>: Send + Sync {
    /// Fetch every source record, in source order.
    async fn fetch_all(&self) -> StoreResult<Vec<R>>;
}

/// Factory for independent destination sessions.
#[async_trait]
pub trait DestinationStore<R: SyncRecord>: Send + Sync + 'static {
    /// Session type; owns one connection until dropped.
    type Session: DestinationSession<R> + 'static;

    /// Open a session on a connection of its own.
    ///
    /// The connection is released when the session is dropped, on every exit
    /// path.
    async fn open_session(&self) -> StoreResult<Self::Session>;
}

/// One worker's view of the destination.
#[async_trait]
pub trait DestinationSession<R: SyncRecord>: Send {
    /// Point read by natural key. Only committed rows are visible.
    async fn lookup(&mut self, key: &R::Key) -> StoreResult<Option<DestinationRecord<R>>>;

    /// Begin a transaction on this session's connection.
    async fn begin<'s>(&'s mut self) -> StoreResult<Box<dyn DestinationTransaction<R> + 's>>;
}

/// Writes inside one commit boundary.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait DestinationTransaction<R: SyncRecord>: Send {
    /// Overwrite existing rows, matched by key. Returns rows affected.
    async fn batch_update(&mut self, records: &[DestinationRecord<R>]) -> StoreResult<u64>;

    /// Insert new rows. Returns rows affected.
    async fn batch_insert(&mut self, records: &[DestinationRecord<R>]) -> StoreResult<u64>;

    /// Make every write of this transaction durable and visible.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard every write of this transaction.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
