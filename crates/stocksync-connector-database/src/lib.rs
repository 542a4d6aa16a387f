//! # Database Connector
//!
//! PostgreSQL adapters for stocksync.
//!
//! This crate implements the store ports of `stocksync-core` on top of
//! `sqlx`: a read-only source extractor running a projection query, and a
//! destination store with point lookups and bulk writes inside one
//! transaction per chunk.
//!
//! ## Features
//!
//! - Connection pooling sized for the worker count
//! - Bulk updates and inserts with `UNNEST` array parameters
//! - Per-table mappings for stock and product rows
//! - Configurable source queries
//!
//! ## Example
//!
//! ```ignore
//! use stocksync_connector_database::{connect, DatabaseConfig, PgDestination, StockTable};
//!
//! let config = DatabaseConfig::new("postgres://sync@db.example.com/shop").with_pool_size(9);
//! let pool = connect(&config).await?;
//! let destination = PgDestination::new(pool, StockTable::new(&config));
//! ```

pub mod config;
pub mod destination;
pub mod error;
pub mod mapping;
pub mod pool;
pub mod product;
pub mod source;
pub mod stock;

// Re-exports
pub use config::DatabaseConfig;
pub use destination::{PgDestination, PgSession, TransactionState};
pub use mapping::{PgQuery, SourceMapping, TableMapping};
pub use pool::connect;
pub use product::{ProductSource, ProductTable};
pub use source::PgSource;
pub use stock::{StockSource, StockTable};
