//! PostgreSQL source extractor.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use stocksync_core::{SourceExtractor, StoreResult, SyncRecord};
use tracing::{info, instrument};

use crate::error::map_sqlx_error;
use crate::mapping::SourceMapping;

/// Runs a projection query and decodes every row.
pub struct PgSource<M: SourceMapping> {
    pool: PgPool,
    mapping: M,
}

impl<M: SourceMapping> PgSource<M> {
    pub fn new(pool: PgPool, mapping: M) -> Self {
        Self { pool, mapping }
    }
}

#[async_trait]
impl<M: SourceMapping> SourceExtractor<M::Record> for PgSource<M> {
    #[instrument(skip(self), fields(entity = <M::Record as SyncRecord>::ENTITY))]
    async fn fetch_all(&self) -> StoreResult<Vec<M::Record>> {
        let rows = sqlx::query(self.mapping.query())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to run source query", e))?;

        let records = rows
            .iter()
            .map(|row| {
                M::Row::from_row(row)
                    .map(|decoded| self.mapping.into_record(decoded))
                    .map_err(|e| map_sqlx_error("Failed to decode source row", e))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        info!(records = records.len(), "Source records fetched");

        Ok(records)
    }
}
