//! PostgreSQL destination store.
//!
//! Each session owns one pooled connection for its whole life; the
//! connection goes back to the pool when the session is dropped. Writes run
//! inside a transaction on that connection, which `sqlx` rolls back if it is
//! dropped uncommitted.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{FromRow, PgPool, Postgres, Transaction as SqlxTransaction};
use stocksync_core::{
    DestinationRecord, DestinationSession, DestinationStore, DestinationTransaction, StoreError,
    StoreResult, SyncRecord,
};
use tracing::{debug, info, instrument, warn};

use crate::error::map_sqlx_error;
use crate::mapping::TableMapping;

type Key<M> = <<M as TableMapping>::Record as SyncRecord>::Key;

/// Transaction state for tracking active transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active.
    Active,
    /// A statement failed; the server will refuse further work.
    Aborted,
}

/// Destination store over a connection pool.
pub struct PgDestination<M: TableMapping> {
    pool: PgPool,
    mapping: Arc<M>,
    acquire_timeout_secs: u64,
}

impl<M: TableMapping> PgDestination<M> {
    /// Create a destination writing through `mapping`.
    pub fn new(pool: PgPool, mapping: M) -> Self {
        Self {
            pool,
            mapping: Arc::new(mapping),
            acquire_timeout_secs: 30,
        }
    }

    /// Acquire timeout reported when the pool is exhausted.
    #[must_use]
    pub fn with_acquire_timeout_secs(mut self, secs: u64) -> Self {
        self.acquire_timeout_secs = secs;
        self
    }
}

#[async_trait]
impl<M: TableMapping> DestinationStore<M::Record> for PgDestination<M> {
    type Session = PgSession<M>;

    #[instrument(skip(self), fields(entity = <M::Record as SyncRecord>::ENTITY))]
    async fn open_session(&self) -> StoreResult<PgSession<M>> {
        let conn = self.pool.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => StoreError::ConnectionTimeout {
                timeout_secs: self.acquire_timeout_secs,
            },
            other => map_sqlx_error("Failed to acquire destination connection", other),
        })?;

        debug!("Destination session opened");

        Ok(PgSession {
            conn,
            mapping: Arc::clone(&self.mapping),
        })
    }
}

/// One pooled connection to the destination.
pub struct PgSession<M: TableMapping> {
    conn: PoolConnection<Postgres>,
    mapping: Arc<M>,
}

#[async_trait]
impl<M: TableMapping> DestinationSession<M::Record> for PgSession<M> {
    async fn lookup(&mut self, key: &Key<M>) -> StoreResult<Option<DestinationRecord<M::Record>>> {
        let row = self
            .mapping
            .bind_key(sqlx::query(self.mapping.lookup_sql()), key)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| map_sqlx_error(format!("Failed to look up {key}"), e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let decoded = M::Row::from_row(&row)
            .map_err(|e| map_sqlx_error(format!("Failed to decode row {key}"), e))?;

        Ok(Some(self.mapping.from_row(decoded)))
    }

    async fn begin<'s>(
        &'s mut self,
    ) -> StoreResult<Box<dyn DestinationTransaction<M::Record> + 's>> {
        let tx = sqlx::Connection::begin(&mut *self.conn)
            .await
            .map_err(|e| {
                StoreError::transaction_failed_with_source("Failed to begin transaction", e)
            })?;

        debug!("Database transaction started");

        Ok(Box::new(PgTransaction {
            inner: Some(tx),
            mapping: Arc::clone(&self.mapping),
            state: TransactionState::Active,
        }))
    }
}

#[derive(Debug, Clone, Copy)]
enum Bulk {
    Update,
    Insert,
}

impl Bulk {
    fn as_str(self) -> &'static str {
        match self {
            Bulk::Update => "update",
            Bulk::Insert => "insert",
        }
    }
}

struct PgTransaction<'c, M: TableMapping> {
    inner: Option<SqlxTransaction<'c, Postgres>>,
    mapping: Arc<M>,
    state: TransactionState,
}

impl<'c, M: TableMapping> PgTransaction<'c, M> {
    async fn execute_bulk(
        &mut self,
        op: Bulk,
        records: &[DestinationRecord<M::Record>],
    ) -> StoreResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        if self.state != TransactionState::Active {
            return Err(StoreError::transaction_failed(format!(
                "Cannot run bulk {} in transaction state {:?}",
                op.as_str(),
                self.state
            )));
        }

        let Some(tx) = self.inner.as_mut() else {
            return Err(StoreError::transaction_failed("Transaction already finished"));
        };

        let mapping = &self.mapping;
        let sql = match op {
            Bulk::Update => mapping.update_sql(),
            Bulk::Insert => mapping.insert_sql(),
        };

        let result = mapping
            .bind_columns(sqlx::query(sql), records)
            .execute(&mut **tx)
            .await;

        match result {
            Ok(done) => {
                debug!(
                    op = op.as_str(),
                    rows = records.len(),
                    affected = done.rows_affected(),
                    "Bulk statement executed"
                );
                Ok(done.rows_affected())
            }
            Err(e) => {
                self.state = TransactionState::Aborted;
                Err(map_sqlx_error(format!("Bulk {} failed", op.as_str()), e))
            }
        }
    }
}

#[async_trait]
impl<'c, M: TableMapping> DestinationTransaction<M::Record> for PgTransaction<'c, M> {
    async fn batch_update(&mut self, records: &[DestinationRecord<M::Record>]) -> StoreResult<u64> {
        self.execute_bulk(Bulk::Update, records).await
    }

    async fn batch_insert(&mut self, records: &[DestinationRecord<M::Record>]) -> StoreResult<u64> {
        self.execute_bulk(Bulk::Insert, records).await
    }

    #[instrument(skip(self), fields(entity = <M::Record as SyncRecord>::ENTITY))]
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let PgTransaction { inner, state, .. } = *self;

        if state != TransactionState::Active {
            return Err(StoreError::transaction_failed(format!(
                "Cannot commit transaction in state {state:?}"
            )));
        }

        if let Some(tx) = inner {
            tx.commit().await.map_err(|e| {
                StoreError::transaction_failed_with_source("Failed to commit transaction", e)
            })?;
        }

        info!("Database transaction committed");

        Ok(())
    }

    #[instrument(skip(self), fields(entity = <M::Record as SyncRecord>::ENTITY))]
    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let PgTransaction { inner, .. } = *self;

        if let Some(tx) = inner {
            tx.rollback().await.map_err(|e| {
                StoreError::transaction_failed_with_source("Failed to rollback transaction", e)
            })?;
        }

        warn!("Database transaction rolled back");

        Ok(())
    }
}
