//! Record model shared by sources, destinations and the engine.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use crate::fingerprint::{fingerprint, Fingerprint, FingerprintBuilder};

/// A flat source projection of one logical entity.
///
/// Implementors decide which fields are comparable by writing them, in a fixed
/// order, into the fingerprint builder. Every attribute the destination
/// persists must be written, otherwise a change to it is classified as
/// unchanged.
pub trait SyncRecord: Clone + Debug + Send + Sync + 'static {
    /// Natural key identifying the entity in source and destination.
    type Key: Clone + Debug + Display + Eq + Hash + Send + Sync + 'static;

    /// Name of the entity, used in logs.
    const ENTITY: &'static str;

    /// The natural key of this record.
    fn key(&self) -> Self::Key;

    /// Write the comparable fields, in order.
    fn write_fingerprint(&self, builder: &mut FingerprintBuilder);
}

/// A persisted destination row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRecord<R: SyncRecord> {
    /// Natural key of the row.
    pub key: R::Key,
    /// Attributes as last written.
    pub attributes: R,
    /// Digest of the attributes as of the last synchronisation.
    ///
    /// `None` for rows written before fingerprints existed or holding an
    /// unreadable digest; such rows always compare as changed.
    pub fingerprint: Option<Fingerprint>,
}

impl<R: SyncRecord> DestinationRecord<R> {
    /// Build a fresh row from a source record and its fingerprint.
    pub fn new(record: R, fingerprint: Fingerprint) -> Self {
        Self {
            key: record.key(),
            attributes: record,
            fingerprint: Some(fingerprint),
        }
    }

    /// Build a row whose fingerprint is computed from the record.
    pub fn synced(record: R) -> Self {
        let fp = fingerprint(&record);
        Self::new(record, fp)
    }

    /// Overwrite every mutable field from the source record.
    pub fn overwrite(&mut self, record: R, fingerprint: Fingerprint) {
        self.attributes = record;
        self.fingerprint = Some(fingerprint);
    }

    /// Whether the stored fingerprint equals `fingerprint`.
    #[must_use]
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprint.as_ref() == Some(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::{StockKey, StockRecord};
    use rust_decimal::Decimal;

    fn record(stock: i64) -> StockRecord {
        StockRecord::new(StockKey::new(7, 2), Decimal::from(stock), Decimal::from(100))
    }

    #[test]
    fn test_new_takes_key_from_record() {
        let row = DestinationRecord::synced(record(10));
        assert_eq!(row.key, StockKey::new(7, 2));
        assert!(row.matches(&fingerprint(&record(10))));
    }

    #[test]
    fn test_overwrite_replaces_attributes_and_fingerprint() {
        let mut row = DestinationRecord::synced(record(10));
        let fresh = record(5);
        let fp = fingerprint(&fresh);

        row.overwrite(fresh.clone(), fp.clone());

        assert_eq!(row.attributes, fresh);
        assert_eq!(row.fingerprint, Some(fp));
        assert_eq!(row.key, StockKey::new(7, 2));
    }

    #[test]
    fn test_missing_fingerprint_never_matches() {
        let mut row = DestinationRecord::synced(record(10));
        row.fingerprint = None;
        assert!(!row.matches(&fingerprint(&record(10))));
    }
}
