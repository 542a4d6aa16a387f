//! Table and query mappings.
//!
//! A mapping ties a [`SyncRecord`] type to its SQL: the statements it runs,
//! how parameters are bound and how rows are decoded. The generic
//! [`PgDestination`](crate::PgDestination) and [`PgSource`](crate::PgSource)
//! drive any mapping.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, Postgres};
use stocksync_core::{DestinationRecord, SyncRecord};

/// A PostgreSQL statement awaiting its bind parameters.
pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Destination table of one record type.
///
/// Bulk statements take one array parameter per column, so
/// [`bind_columns`](TableMapping::bind_columns) serves both the update and
/// the insert statement.
pub trait TableMapping: Send + Sync + 'static {
    /// Record persisted in the table.
    type Record: SyncRecord;

    /// Decoded table row.
    type Row: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    /// Point read by natural key.
    fn lookup_sql(&self) -> &str;

    /// Bulk update matched by natural key.
    fn update_sql(&self) -> &str;

    /// Bulk insert.
    fn insert_sql(&self) -> &str;

    /// Bind the natural key parameters of the lookup statement.
    fn bind_key<'q>(
        &self,
        query: PgQuery<'q>,
        key: &<Self::Record as SyncRecord>::Key,
    ) -> PgQuery<'q>;

    /// Bind one array per column for the bulk statements.
    fn bind_columns<'q>(
        &self,
        query: PgQuery<'q>,
        rows: &[DestinationRecord<Self::Record>],
    ) -> PgQuery<'q>;

    /// Convert a decoded row into a destination record.
    fn from_row(&self, row: Self::Row) -> DestinationRecord<Self::Record>;
}

/// Source projection of one record type.
pub trait SourceMapping: Send + Sync + 'static {
    /// Record produced by the projection.
    type Record: SyncRecord;

    /// Decoded result row.
    type Row: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    /// Projection query.
    fn query(&self) -> &str;

    /// Convert a decoded row into a source record.
    fn into_record(&self, row: Self::Row) -> Self::Record;
}
