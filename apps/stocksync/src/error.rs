//! Error types for the stocksync binary.

use stocksync_core::StoreError;
use stocksync_engine::SyncError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for top-level operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a stocksync invocation.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot connect to the {role} database: {source}")]
    Connection {
        role: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Synchronisation failed: {0}")]
    Sync(#[from] SyncError),

    #[error("{failed} of {total} chunks failed; their records were not written")]
    PartialRun { failed: usize, total: usize },

    #[error("All {total} chunks failed; nothing was written")]
    NothingCommitted { total: usize },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// A partial run exits 2 so schedulers can tell it apart from a run that
    /// wrote nothing.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::PartialRun { .. } => 2,
            CliError::Config(_)
            | CliError::NothingCommitted { .. }
            | CliError::Connection { .. }
            | CliError::Sync(_)
            | CliError::Logging(_)
            | CliError::Io(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::PartialRun { failed: 1, total: 4 }.exit_code(), 2);
        assert_eq!(CliError::NothingCommitted { total: 4 }.exit_code(), 1);
        assert_eq!(CliError::Sync(SyncError::EmptySource).exit_code(), 1);
        assert_eq!(
            CliError::Config(ConfigError::MissingVar("SOURCE_DATABASE_URL".into())).exit_code(),
            1
        );
        assert_eq!(
            CliError::Connection {
                role: "source",
                source: StoreError::connection_failed("refused"),
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_partial_run_display() {
        let err = CliError::PartialRun { failed: 2, total: 8 };
        assert_eq!(
            err.to_string(),
            "2 of 8 chunks failed; their records were not written"
        );
    }

    #[test]
    fn test_connection_display_names_role() {
        let err = CliError::Connection {
            role: "destination",
            source: StoreError::connection_failed("refused"),
        };
        assert!(err.to_string().contains("destination database"));
    }
}
