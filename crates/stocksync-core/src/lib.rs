//! stocksync Core Library
//!
//! Shared record model and store ports for stocksync.
//!
//! # Modules
//!
//! - [`model`] - The [`SyncRecord`] trait and persisted [`DestinationRecord`]
//! - [`fingerprint`] - Deterministic content digests over comparable fields
//! - [`stock`] / [`product`] - The synchronised entities
//! - [`traits`] - Source extraction and destination store ports
//! - [`memory`] - In-memory implementations of the ports
//! - [`error`] - Store error types
//!
//! # Example
//!
//! ```
//! use rust_decimal::Decimal;
//! use stocksync_core::{fingerprint, StockKey, StockRecord};
//!
//! let record = StockRecord::new(StockKey::new(1, 2), Decimal::from(10), Decimal::from(100));
//! assert_eq!(fingerprint(&record), fingerprint(&record.clone()));
//! ```

pub mod error;
pub mod fingerprint;
pub mod ids;
pub mod memory;
pub mod model;
pub mod product;
pub mod stock;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fingerprint::{fingerprint, Fingerprint, FingerprintBuilder, FingerprintField};
pub use ids::RunId;
pub use memory::{MemorySource, MemoryStore};
pub use model::{DestinationRecord, SyncRecord};
pub use product::{ProductKey, ProductRecord};
pub use stock::{StockKey, StockRecord};
pub use traits::{DestinationSession, DestinationStore, DestinationTransaction, SourceExtractor};
