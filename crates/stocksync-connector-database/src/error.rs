//! Mapping of `sqlx` errors onto store errors.

use sqlx::error::ErrorKind;
use stocksync_core::StoreError;

/// Classify a driver error under `message`.
pub(crate) fn map_sqlx_error(message: impl Into<String>, err: sqlx::Error) -> StoreError {
    let message = message.into();
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::connection_failed_with_source(message, err),
        sqlx::Error::Database(db) if !matches!(db.kind(), ErrorKind::Other) => {
            StoreError::constraint_violation(format!("{message}: {db}"))
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StoreError::invalid_data(format!("{message}: {err}")),
        _ => StoreError::query_failed_with_source(message, err),
    }
}
