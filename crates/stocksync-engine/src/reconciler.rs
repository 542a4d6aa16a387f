//! Record classification.
//!
//! The reconciler fingerprints each record of a chunk, looks the key up in
//! the destination and stages the minimal write. It never writes itself;
//! the staged batch goes to the [`BatchWriter`](crate::BatchWriter).

use stocksync_core::{fingerprint, DestinationRecord, DestinationSession, Fingerprint, SyncRecord};

use crate::error::{SyncError, SyncResult};
use crate::observer::SyncObserver;
use crate::types::ReconciliationOutcome;

/// Classify a record by its fingerprint against the destination row.
///
/// Only fingerprint equality decides; attribute values are never compared.
#[must_use]
pub fn classify<R: SyncRecord>(
    existing: Option<&DestinationRecord<R>>,
    fingerprint: &Fingerprint,
) -> ReconciliationOutcome {
    match existing {
        None => ReconciliationOutcome::Inserted,
        Some(row) if row.matches(fingerprint) => ReconciliationOutcome::Unchanged,
        Some(_) => ReconciliationOutcome::Updated,
    }
}

/// An existing row to overwrite.
#[derive(Debug, Clone)]
pub struct StagedUpdate<R: SyncRecord> {
    /// Row as read from the destination.
    pub destination: DestinationRecord<R>,
    /// Source record whose attributes replace it.
    pub source: R,
    pub fingerprint: Fingerprint,
}

impl<R: SyncRecord> StagedUpdate<R> {
    /// The row as it will be written.
    pub fn into_row(self) -> DestinationRecord<R> {
        let mut row = self.destination;
        row.overwrite(self.source, self.fingerprint);
        row
    }
}

/// A new row to create.
#[derive(Debug, Clone)]
pub struct StagedInsert<R: SyncRecord> {
    pub source: R,
    pub fingerprint: Fingerprint,
}

impl<R: SyncRecord> StagedInsert<R> {
    /// The row as it will be written.
    pub fn into_row(self) -> DestinationRecord<R> {
        DestinationRecord::new(self.source, self.fingerprint)
    }
}

/// Writes staged for one chunk.
#[derive(Debug, Clone)]
pub struct ChunkBatch<R: SyncRecord> {
    pub updates: Vec<StagedUpdate<R>>,
    pub inserts: Vec<StagedInsert<R>>,
    /// Records that needed no write.
    pub unchanged: usize,
}

impl<R: SyncRecord> Default for ChunkBatch<R> {
    fn default() -> Self {
        Self {
            updates: Vec::new(),
            inserts: Vec::new(),
            unchanged: 0,
        }
    }
}

impl<R: SyncRecord> ChunkBatch<R> {
    /// Whether the batch requires no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.inserts.is_empty()
    }

    /// Rows to update and rows to insert.
    pub fn into_rows(self) -> (Vec<DestinationRecord<R>>, Vec<DestinationRecord<R>>) {
        (
            self.updates.into_iter().map(StagedUpdate::into_row).collect(),
            self.inserts.into_iter().map(StagedInsert::into_row).collect(),
        )
    }
}

/// Classifies the records of one chunk.
pub struct Reconciler<'a> {
    chunk: usize,
    observer: &'a dyn SyncObserver,
}

impl<'a> Reconciler<'a> {
    pub fn new(chunk: usize, observer: &'a dyn SyncObserver) -> Self {
        Self { chunk, observer }
    }

    /// Classify every record through `session` and stage the writes.
    ///
    /// The first failed lookup aborts the chunk.
    pub async fn reconcile<R, S>(&self, session: &mut S, records: Vec<R>) -> SyncResult<ChunkBatch<R>>
    where
        R: SyncRecord,
        S: DestinationSession<R> + ?Sized,
    {
        let mut batch = ChunkBatch::default();

        for record in records {
            let fp = fingerprint(&record);
            let key = record.key();

            let existing = session
                .lookup(&key)
                .await
                .map_err(|source| SyncError::Lookup {
                    chunk: self.chunk,
                    key: key.to_string(),
                    source,
                })?;

            let outcome = classify(existing.as_ref(), &fp);
            self.observer.on_record(self.chunk, &key, outcome);

            match (outcome, existing) {
                (ReconciliationOutcome::Unchanged, _) => batch.unchanged += 1,
                (ReconciliationOutcome::Updated, Some(destination)) => {
                    batch.updates.push(StagedUpdate {
                        destination,
                        source: record,
                        fingerprint: fp,
                    });
                }
                (_, _) => batch.inserts.push(StagedInsert {
                    source: record,
                    fingerprint: fp,
                }),
            }
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use rust_decimal::Decimal;
    use stocksync_core::{DestinationStore, MemoryStore, StockKey, StockRecord, StoreError};

    fn record(product_id: i64, stock: i64) -> StockRecord {
        StockRecord::new(
            StockKey::new(product_id, 2),
            Decimal::from(stock),
            Decimal::from(100),
        )
    }

    #[test]
    fn test_classify() {
        let current = record(1, 10);
        let fp = fingerprint(&current);
        let same = DestinationRecord::synced(current.clone());
        let stale = DestinationRecord::synced(record(1, 5));
        let mut legacy = DestinationRecord::synced(current);
        legacy.fingerprint = None;

        assert_eq!(classify::<StockRecord>(None, &fp), ReconciliationOutcome::Inserted);
        assert_eq!(classify(Some(&same), &fp), ReconciliationOutcome::Unchanged);
        assert_eq!(classify(Some(&stale), &fp), ReconciliationOutcome::Updated);
        assert_eq!(classify(Some(&legacy), &fp), ReconciliationOutcome::Updated);
    }

    #[test]
    fn test_fingerprint_alone_decides() {
        // Stored attributes differ but the stored fingerprint matches.
        let source = record(1, 10);
        let fp = fingerprint(&source);
        let row = DestinationRecord {
            key: source.key(),
            attributes: record(1, 999),
            fingerprint: Some(fp.clone()),
        };
        assert_eq!(classify(Some(&row), &fp), ReconciliationOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_reconcile_stages_minimal_writes() {
        let store = MemoryStore::seeded(vec![record(1, 10), record(2, 20)]);
        let mut session = store.open_session().await.unwrap();

        let batch = Reconciler::new(0, &NoopObserver)
            .reconcile(&mut session, vec![record(1, 10), record(2, 5), record(3, 1)])
            .await
            .unwrap();

        assert_eq!(batch.unchanged, 1);
        assert_eq!(batch.updates.len(), 1);
        assert_eq!(batch.inserts.len(), 1);
        assert_eq!(batch.updates[0].destination.attributes.stock, Decimal::from(20));

        let (updates, inserts) = batch.into_rows();
        assert_eq!(updates[0].attributes.stock, Decimal::from(5));
        assert!(updates[0].matches(&fingerprint(&record(2, 5))));
        assert_eq!(inserts[0].key, StockKey::new(3, 2));
    }

    #[tokio::test]
    async fn test_reconcile_does_not_write() {
        let store = MemoryStore::new();
        let mut session = store.open_session().await.unwrap();

        let batch = Reconciler::new(0, &NoopObserver)
            .reconcile(&mut session, vec![record(1, 1)])
            .await
            .unwrap();

        assert!(!batch.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_aborts_chunk() {
        let store = MemoryStore::<StockRecord>::new();
        store.fail_lookup_for(StockKey::new(2, 2));
        let mut session = store.open_session().await.unwrap();

        let err = Reconciler::new(4, &NoopObserver)
            .reconcile(&mut session, vec![record(1, 1), record(2, 1), record(3, 1)])
            .await
            .unwrap_err();

        match err {
            SyncError::Lookup { chunk, key, source } => {
                assert_eq!(chunk, 4);
                assert_eq!(key, "2@2");
                assert!(matches!(source, StoreError::Injected { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Record 3 was never looked up.
        assert_eq!(store.stats().lookups, 2);
    }
}
