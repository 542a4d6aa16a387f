//! Batch writer.
//!
//! Applies one chunk's staged writes inside a single destination
//! transaction: one bulk update, one bulk insert, one commit. Either every
//! staged row lands or none does.

use stocksync_core::{
    DestinationRecord, DestinationSession, DestinationTransaction, StoreError, StoreResult,
    SyncRecord,
};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::reconciler::ChunkBatch;

/// Commits the staged writes of one chunk.
#[derive(Debug, Clone, Copy)]
pub struct BatchWriter {
    chunk: usize,
}

impl BatchWriter {
    pub fn new(chunk: usize) -> Self {
        Self { chunk }
    }

    /// Apply `batch` through `session`. An empty batch opens no transaction.
    pub async fn apply<R, S>(&self, session: &mut S, batch: ChunkBatch<R>) -> SyncResult<()>
    where
        R: SyncRecord,
        S: DestinationSession<R> + ?Sized,
    {
        if batch.is_empty() {
            debug!(chunk = self.chunk, "Nothing to write");
            return Ok(());
        }

        let (updates, inserts) = batch.into_rows();

        let mut tx = session.begin().await.map_err(|e| self.write_error(e))?;

        if let Err(e) = stage(&mut *tx, &updates, &inserts).await {
            if let Err(rollback) = tx.rollback().await {
                warn!(chunk = self.chunk, error = %rollback, "Rollback failed");
            }
            return Err(self.write_error(e));
        }

        tx.commit().await.map_err(|e| self.write_error(e))?;

        debug!(
            chunk = self.chunk,
            updated = updates.len(),
            inserted = inserts.len(),
            "Batch committed"
        );

        Ok(())
    }

    fn write_error(&self, source: StoreError) -> SyncError {
        SyncError::Write {
            chunk: self.chunk,
            source,
        }
    }
}

async fn stage<R, T>(
    tx: &mut T,
    updates: &[DestinationRecord<R>],
    inserts: &[DestinationRecord<R>],
) -> StoreResult<()>
where
    R: SyncRecord,
    T: DestinationTransaction<R> + ?Sized,
{
    if !updates.is_empty() {
        let affected = tx.batch_update(updates).await?;
        // A row removed since the lookup would otherwise be silently skipped.
        if affected != updates.len() as u64 {
            return Err(StoreError::constraint_violation(format!(
                "bulk update matched {affected} of {} rows",
                updates.len()
            )));
        }
    }

    if !inserts.is_empty() {
        tx.batch_insert(inserts).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{StagedInsert, StagedUpdate};
    use rust_decimal::Decimal;
    use stocksync_core::{fingerprint, DestinationStore, MemoryStore, StockKey, StockRecord};

    fn record(product_id: i64, stock: i64) -> StockRecord {
        StockRecord::new(
            StockKey::new(product_id, 2),
            Decimal::from(stock),
            Decimal::from(100),
        )
    }

    fn insert(record: StockRecord) -> StagedInsert<StockRecord> {
        StagedInsert {
            fingerprint: fingerprint(&record),
            source: record,
        }
    }

    fn update(current: StockRecord, fresh: StockRecord) -> StagedUpdate<StockRecord> {
        StagedUpdate {
            destination: DestinationRecord::synced(current),
            fingerprint: fingerprint(&fresh),
            source: fresh,
        }
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let store = MemoryStore::<StockRecord>::new();
        let mut session = store.open_session().await.unwrap();

        BatchWriter::new(0)
            .apply(&mut session, ChunkBatch::default())
            .await
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.commits, 0);
        assert_eq!(stats.rollbacks, 0);
    }

    #[tokio::test]
    async fn test_apply_commits_updates_and_inserts() {
        let store = MemoryStore::seeded(vec![record(1, 10)]);
        let mut session = store.open_session().await.unwrap();

        let batch = ChunkBatch {
            updates: vec![update(record(1, 10), record(1, 4))],
            inserts: vec![insert(record(2, 7))],
            unchanged: 0,
        };
        BatchWriter::new(0).apply(&mut session, batch).await.unwrap();

        assert_eq!(store.stats().commits, 1);
        assert_eq!(
            store.get(&StockKey::new(1, 2)).unwrap().attributes.stock,
            Decimal::from(4)
        );
        assert!(store.get(&StockKey::new(2, 2)).is_some());
    }

    #[tokio::test]
    async fn test_update_of_vanished_row_rolls_back() {
        // Row 1 was never stored, so the bulk update matches nothing.
        let store = MemoryStore::<StockRecord>::new();
        let mut session = store.open_session().await.unwrap();

        let batch = ChunkBatch {
            updates: vec![update(record(1, 10), record(1, 4))],
            inserts: vec![insert(record(2, 7))],
            unchanged: 0,
        };
        let err = BatchWriter::new(5)
            .apply(&mut session, batch)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Write { chunk: 5, .. }));
        assert!(store.is_empty());
        assert_eq!(store.stats().rollbacks, 1);
        assert_eq!(store.stats().commits, 0);
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_destination_untouched() {
        let store = MemoryStore::seeded(vec![record(1, 10)]);
        store.fail_commit_for(StockKey::new(3, 2));
        let mut session = store.open_session().await.unwrap();

        let batch = ChunkBatch {
            updates: vec![update(record(1, 10), record(1, 0))],
            inserts: vec![insert(record(3, 3))],
            unchanged: 0,
        };
        let err = BatchWriter::new(1)
            .apply(&mut session, batch)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Write { chunk: 1, .. }));
        assert_eq!(
            store.get(&StockKey::new(1, 2)).unwrap().attributes.stock,
            Decimal::from(10)
        );
        assert!(store.get(&StockKey::new(3, 2)).is_none());
    }
}
