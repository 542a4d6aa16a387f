//! In-memory source and destination.
//!
//! [`MemoryStore`] behaves like a transactional store with read-committed
//! visibility: lookups see only committed rows, a transaction's writes are
//! staged privately and applied all at once on commit. Failures can be
//! injected per key to exercise error paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::model::{DestinationRecord, SyncRecord};
use crate::traits::{DestinationSession, DestinationStore, DestinationTransaction, SourceExtractor};

/// Source returning a fixed list of records.
#[derive(Debug, Clone)]
pub struct MemorySource<R> {
    records: Vec<R>,
    failure: Option<String>,
}

impl<R> MemorySource<R> {
    /// Source yielding `records`.
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records,
            failure: None,
        }
    }

    /// Source whose fetch always fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl<R: SyncRecord> SourceExtractor<R> for MemorySource<R> {
    async fn fetch_all(&self) -> StoreResult<Vec<R>> {
        match &self.failure {
            Some(message) => Err(StoreError::connection_failed(message.clone())),
            None => Ok(self.records.clone()),
        }
    }
}

/// Counters describing how a [`MemoryStore`] has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub sessions_opened: usize,
    pub sessions_open: usize,
    pub lookups: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

struct Faults<K> {
    lookup: HashSet<K>,
    commit: HashSet<K>,
    open_session: bool,
}

impl<K> Default for Faults<K> {
    fn default() -> Self {
        Self {
            lookup: HashSet::new(),
            commit: HashSet::new(),
            open_session: false,
        }
    }
}

#[derive(Default)]
struct Counters {
    sessions_opened: AtomicUsize,
    sessions_open: AtomicUsize,
    lookups: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

struct Inner<R: SyncRecord> {
    rows: RwLock<HashMap<R::Key, DestinationRecord<R>>>,
    faults: RwLock<Faults<R::Key>>,
    counters: Counters,
}

/// Transactional in-memory destination.
pub struct MemoryStore<R: SyncRecord> {
    inner: Arc<Inner<R>>,
}

impl<R: SyncRecord> Clone for MemoryStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: SyncRecord> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SyncRecord> MemoryStore<R> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                rows: RwLock::new(HashMap::new()),
                faults: RwLock::new(Faults::default()),
                counters: Counters::default(),
            }),
        }
    }

    /// Create a store holding rows already in sync with `records`.
    pub fn seeded(records: impl IntoIterator<Item = R>) -> Self {
        let store = Self::new();
        for record in records {
            store.put(DestinationRecord::synced(record));
        }
        store
    }

    /// Write a row directly, bypassing transactions.
    pub fn put(&self, row: DestinationRecord<R>) {
        self.inner
            .rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(row.key.clone(), row);
    }

    /// Committed row for `key`.
    pub fn get(&self, key: &R::Key) -> Option<DestinationRecord<R>> {
        self.inner
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of committed rows.
    pub fn len(&self) -> usize {
        self.inner
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail every lookup of `key`.
    pub fn fail_lookup_for(&self, key: R::Key) {
        self.faults_mut().lookup.insert(key);
    }

    /// Fail every commit whose writes touch `key`.
    pub fn fail_commit_for(&self, key: R::Key) {
        self.faults_mut().commit.insert(key);
    }

    /// Fail opening new sessions.
    pub fn fail_open_session(&self, fail: bool) {
        self.faults_mut().open_session = fail;
    }

    /// Remove every injected failure.
    pub fn clear_faults(&self) {
        *self.faults_mut() = Faults::default();
    }

    /// Usage counters.
    pub fn stats(&self) -> MemoryStoreStats {
        let c = &self.inner.counters;
        MemoryStoreStats {
            sessions_opened: c.sessions_opened.load(Ordering::SeqCst),
            sessions_open: c.sessions_open.load(Ordering::SeqCst),
            lookups: c.lookups.load(Ordering::SeqCst),
            commits: c.commits.load(Ordering::SeqCst),
            rollbacks: c.rollbacks.load(Ordering::SeqCst),
        }
    }

    fn faults_mut(&self) -> std::sync::RwLockWriteGuard<'_, Faults<R::Key>> {
        self.inner
            .faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<R: SyncRecord> DestinationStore<R> for MemoryStore<R> {
    type Session = MemorySession<R>;

    async fn open_session(&self) -> StoreResult<MemorySession<R>> {
        let refuse = self
            .inner
            .faults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .open_session;
        if refuse {
            return Err(StoreError::connection_failed("memory store refused session"));
        }

        let counters = &self.inner.counters;
        counters.sessions_opened.fetch_add(1, Ordering::SeqCst);
        counters.sessions_open.fetch_add(1, Ordering::SeqCst);

        Ok(MemorySession {
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Session on a [`MemoryStore`].
pub struct MemorySession<R: SyncRecord> {
    inner: Arc<Inner<R>>,
}

impl<R: SyncRecord> Drop for MemorySession<R> {
    fn drop(&mut self) {
        self.inner
            .counters
            .sessions_open
            .fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<R: SyncRecord> DestinationSession<R> for MemorySession<R> {
    async fn lookup(&mut self, key: &R::Key) -> StoreResult<Option<DestinationRecord<R>>> {
        self.inner.counters.lookups.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .inner
            .faults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup
            .contains(key);
        if failing {
            return Err(StoreError::injected(format!("lookup of {key} failed")));
        }

        Ok(self
            .inner
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn begin<'s>(&'s mut self) -> StoreResult<Box<dyn DestinationTransaction<R> + 's>> {
        Ok(Box::new(MemoryTransaction {
            inner: &self.inner,
            updates: Vec::new(),
            inserts: Vec::new(),
        }))
    }
}

struct MemoryTransaction<'s, R: SyncRecord> {
    inner: &'s Inner<R>,
    updates: Vec<DestinationRecord<R>>,
    inserts: Vec<DestinationRecord<R>>,
}

impl<'s, R: SyncRecord> MemoryTransaction<'s, R> {
    fn staged_keys(&self) -> impl Iterator<Item = &R::Key> {
        self.updates
            .iter()
            .chain(self.inserts.iter())
            .map(|row| &row.key)
    }
}

#[async_trait]
impl<'s, R: SyncRecord> DestinationTransaction<R> for MemoryTransaction<'s, R> {
    async fn batch_update(&mut self, records: &[DestinationRecord<R>]) -> StoreResult<u64> {
        let rows = self.inner.rows.read().unwrap_or_else(PoisonError::into_inner);
        let affected = records.iter().filter(|r| rows.contains_key(&r.key)).count();
        drop(rows);

        self.updates.extend_from_slice(records);
        Ok(affected as u64)
    }

    async fn batch_insert(&mut self, records: &[DestinationRecord<R>]) -> StoreResult<u64> {
        self.inserts.extend_from_slice(records);
        Ok(records.len() as u64)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let poisoned = {
            let faults = self
                .inner
                .faults
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            self.staged_keys()
                .find(|key| faults.commit.contains(*key))
                .cloned()
        };
        if let Some(key) = poisoned {
            self.inner.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::injected(format!("commit touching {key} failed")));
        }

        let mut rows = self
            .inner
            .rows
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // Validate everything before applying anything.
        for row in &self.updates {
            if !rows.contains_key(&row.key) {
                return Err(StoreError::constraint_violation(format!(
                    "update of missing row {}",
                    row.key
                )));
            }
        }
        let mut inserted = HashSet::new();
        for row in &self.inserts {
            if rows.contains_key(&row.key) || !inserted.insert(&row.key) {
                return Err(StoreError::constraint_violation(format!(
                    "row {} already exists",
                    row.key
                )));
            }
        }

        let (updated, new) = (self.updates.len(), self.inserts.len());
        for row in self.updates.iter().chain(self.inserts.iter()) {
            rows.insert(row.key.clone(), row.clone());
        }
        drop(rows);

        self.inner.counters.commits.fetch_add(1, Ordering::SeqCst);
        debug!(entity = R::ENTITY, updated, inserted = new, "memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::stock::{StockKey, StockRecord};
    use rust_decimal::Decimal;

    fn record(product_id: i64, stock: i64) -> StockRecord {
        StockRecord::new(
            StockKey::new(product_id, 2),
            Decimal::from(stock),
            Decimal::from(100),
        )
    }

    #[tokio::test]
    async fn test_source_returns_records() {
        let source = MemorySource::new(vec![record(1, 1), record(2, 2)]);
        let records = source.fetch_all().await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_source() {
        let source: MemorySource<StockRecord> = MemorySource::failing("source down");
        let err = source.fetch_all().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_lookup_sees_seeded_rows() {
        let store = MemoryStore::seeded(vec![record(1, 10)]);
        let mut session = store.open_session().await.unwrap();

        let row = session.lookup(&StockKey::new(1, 2)).await.unwrap();
        assert!(row.is_some());
        assert!(session.lookup(&StockKey::new(2, 2)).await.unwrap().is_none());
        assert_eq!(store.stats().lookups, 2);
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = MemoryStore::new();
        let mut writer = store.open_session().await.unwrap();
        let mut reader = store.open_session().await.unwrap();

        let mut tx = writer.begin().await.unwrap();
        tx.batch_insert(&[DestinationRecord::synced(record(1, 10))])
            .await
            .unwrap();

        assert!(reader.lookup(&StockKey::new(1, 2)).await.unwrap().is_none());
        tx.commit().await.unwrap();
        assert!(reader.lookup(&StockKey::new(1, 2)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut session = store.open_session().await.unwrap();

        let mut tx = session.begin().await.unwrap();
        tx.batch_insert(&[DestinationRecord::synced(record(1, 10))])
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(store.is_empty());
        assert_eq!(store.stats().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        let mut session = store.open_session().await.unwrap();
        {
            let mut tx = session.begin().await.unwrap();
            tx.batch_insert(&[DestinationRecord::synced(record(1, 10))])
                .await
                .unwrap();
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::seeded(vec![record(1, 10)]);
        let mut session = store.open_session().await.unwrap();

        let mut tx = session.begin().await.unwrap();
        tx.batch_insert(&[DestinationRecord::synced(record(2, 5))])
            .await
            .unwrap();
        // Duplicate of an existing row fails the whole commit.
        tx.batch_insert(&[DestinationRecord::synced(record(1, 99))])
            .await
            .unwrap();
        let err = tx.commit().await.unwrap_err();

        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
        assert_eq!(store.len(), 1);
        assert!(store.get(&StockKey::new(2, 2)).is_none());
    }

    #[tokio::test]
    async fn test_update_counts_existing_rows() {
        let store = MemoryStore::seeded(vec![record(1, 10)]);
        let mut session = store.open_session().await.unwrap();

        let fresh = record(1, 3);
        let fp = fingerprint(&fresh);
        let mut tx = session.begin().await.unwrap();
        let affected = tx
            .batch_update(&[DestinationRecord::new(fresh.clone(), fp.clone())])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(affected, 1);
        let row = store.get(&StockKey::new(1, 2)).unwrap();
        assert_eq!(row.attributes, fresh);
        assert_eq!(row.fingerprint, Some(fp));
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryStore::<StockRecord>::new();
        store.fail_lookup_for(StockKey::new(1, 2));
        store.fail_commit_for(StockKey::new(2, 2));

        let mut session = store.open_session().await.unwrap();
        assert!(session.lookup(&StockKey::new(1, 2)).await.is_err());

        let mut tx = session.begin().await.unwrap();
        tx.batch_insert(&[DestinationRecord::synced(record(2, 1))])
            .await
            .unwrap();
        assert!(matches!(
            tx.commit().await,
            Err(StoreError::Injected { .. })
        ));
        assert!(store.is_empty());

        store.fail_open_session(true);
        assert!(store.open_session().await.is_err());

        store.clear_faults();
        assert!(store.open_session().await.is_ok());
    }

    #[tokio::test]
    async fn test_sessions_released_on_drop() {
        let store = MemoryStore::<StockRecord>::new();
        let first = store.open_session().await.unwrap();
        let second = store.open_session().await.unwrap();
        assert_eq!(store.stats().sessions_open, 2);

        drop(first);
        drop(second);

        let stats = store.stats();
        assert_eq!(stats.sessions_opened, 2);
        assert_eq!(stats.sessions_open, 0);
    }
}
