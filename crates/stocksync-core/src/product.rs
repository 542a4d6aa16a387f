//! Product catalogue rows.

use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;

use crate::fingerprint::FingerprintBuilder;
use crate::model::SyncRecord;

/// Natural key of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductKey(pub i64);

impl Display for ProductKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A product as listed in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub product_id: i64,
    pub name: String,
    pub price: Decimal,
    pub stock: Decimal,
    /// Active ingredient as listed by the ERP, free text.
    pub active_ingredient: Option<String>,
    pub brand_id: i32,
    pub barcode: Option<String>,
}

impl SyncRecord for ProductRecord {
    type Key = ProductKey;

    const ENTITY: &'static str = "product";

    fn key(&self) -> ProductKey {
        ProductKey(self.product_id)
    }

    fn write_fingerprint(&self, builder: &mut FingerprintBuilder) {
        builder
            .field(&self.product_id)
            .field(&self.name)
            .field(&self.price)
            .field(&self.stock)
            .field(&self.active_ingredient)
            .field(&self.brand_id)
            .field(&self.barcode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    fn product() -> ProductRecord {
        ProductRecord {
            product_id: 42,
            name: "ARROZ 1KG".to_string(),
            price: Decimal::new(2550, 2),
            stock: Decimal::from(12),
            active_ingredient: None,
            brand_id: 1,
            barcode: Some("7591234567890".to_string()),
        }
    }

    #[test]
    fn test_key() {
        assert_eq!(product().key(), ProductKey(42));
        assert_eq!(ProductKey(42).to_string(), "42");
    }

    #[test]
    fn test_every_attribute_changes_fingerprint() {
        let reference = fingerprint(&product());
        let variants = [
            ProductRecord { product_id: 43, ..product() },
            ProductRecord { name: "ARROZ 2KG".to_string(), ..product() },
            ProductRecord { price: Decimal::new(2551, 2), ..product() },
            ProductRecord { stock: Decimal::from(11), ..product() },
            ProductRecord {
                active_ingredient: Some("ARROZ".to_string()),
                ..product()
            },
            ProductRecord { brand_id: 2, ..product() },
            ProductRecord { barcode: None, ..product() },
        ];

        for variant in variants {
            assert_ne!(fingerprint(&variant), reference, "{variant:?}");
        }
    }
}
