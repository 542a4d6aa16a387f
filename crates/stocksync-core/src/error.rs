//! Store error types
//!
//! Error definitions shared by source extractors and destination stores,
//! with transient/permanent classification so operators know whether a
//! re-run is likely to succeed.

use thiserror::Error;

/// Error that can occur while talking to a source or destination store.
#[derive(Debug, Error)]
pub enum StoreError {
    // Connection errors (usually transient)
    /// Failed to establish a connection or acquire one from the pool.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Timed out waiting for a pooled connection.
    #[error("connection timeout after {timeout_secs} seconds")]
    ConnectionTimeout { timeout_secs: u64 },

    // Statement errors
    /// A read or write statement failed.
    #[error("query failed: {message}")]
    QueryFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Beginning, committing or rolling back a transaction failed.
    #[error("transaction failed: {message}")]
    TransactionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Data errors (permanent)
    /// A row could not be mapped to or from a record.
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    /// A write targeted a row in a state it does not allow (missing row on
    /// update, existing row on insert).
    #[error("constraint violation: {message}")]
    ConstraintViolation { message: String },

    // Configuration errors (permanent)
    /// Store configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Failure injected by an in-memory store.
    #[error("injected failure: {message}")]
    Injected { message: String },
}

impl StoreError {
    /// Check if this error is transient and a later run may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed { .. }
                | StoreError::ConnectionTimeout { .. }
                | StoreError::TransactionFailed { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            StoreError::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            StoreError::QueryFailed { .. } => "QUERY_FAILED",
            StoreError::TransactionFailed { .. } => "TRANSACTION_FAILED",
            StoreError::InvalidData { .. } => "INVALID_DATA",
            StoreError::ConstraintViolation { .. } => "CONSTRAINT_VIOLATION",
            StoreError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            StoreError::Injected { .. } => "INJECTED",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        StoreError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query failed error with source.
    pub fn query_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::QueryFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transaction failed error.
    pub fn transaction_failed(message: impl Into<String>) -> Self {
        StoreError::TransactionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transaction failed error with source.
    pub fn transaction_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::TransactionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        StoreError::InvalidData {
            message: message.into(),
        }
    }

    /// Create a constraint violation error.
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        StoreError::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        StoreError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create an injected failure.
    pub fn injected(message: impl Into<String>) -> Self {
        StoreError::Injected {
            message: message.into(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
