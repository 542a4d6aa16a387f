//! Product table and source projection.
//!
//! Destination table layout:
//!
//! ```sql
//! CREATE TABLE products (
//!     product_id  BIGINT PRIMARY KEY,
//!     name        TEXT    NOT NULL,
//!     price       NUMERIC NOT NULL,
//!     stock       NUMERIC NOT NULL,
//!     active_ingredient TEXT,
//!     brand_id    INTEGER NOT NULL,
//!     barcode     TEXT,
//!     fingerprint TEXT,
//!     updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```

use rust_decimal::Decimal;
use sqlx::FromRow;
use stocksync_core::{DestinationRecord, Fingerprint, ProductKey, ProductRecord};

use crate::config::DatabaseConfig;
use crate::mapping::{PgQuery, SourceMapping, TableMapping};

const COLUMNS: &str =
    "product_id, name, price, stock, active_ingredient, brand_id, barcode, fingerprint";

const UNNEST: &str = "UNNEST($1::bigint[], $2::text[], $3::numeric[], $4::numeric[], \
     $5::text[], $6::integer[], $7::text[], $8::text[])";

/// Default projection over the source catalogue.
pub const DEFAULT_PRODUCT_QUERY: &str = r"
SELECT product_id, name, price, stock, active_ingredient, barcode
FROM products
ORDER BY product_id
";

/// Decoded product destination row.
#[derive(Debug, FromRow)]
pub struct ProductRow {
    pub product_id: i64,
    pub name: String,
    pub price: Decimal,
    pub stock: Decimal,
    pub active_ingredient: Option<String>,
    pub brand_id: i32,
    pub barcode: Option<String>,
    pub fingerprint: Option<String>,
}

/// Mapping of [`ProductRecord`] onto the product table.
#[derive(Debug, Clone)]
pub struct ProductTable {
    lookup_sql: String,
    update_sql: String,
    insert_sql: String,
}

impl ProductTable {
    /// Build the statements for the configured product table.
    pub fn new(config: &DatabaseConfig) -> Self {
        let table = config.qualified_table(&config.product_table);

        Self {
            lookup_sql: format!("SELECT {COLUMNS} FROM {table} WHERE product_id = $1"),
            update_sql: format!(
                "UPDATE {table} AS d SET \
                 name = s.name, price = s.price, stock = s.stock, \
                 active_ingredient = s.active_ingredient, \
                 brand_id = s.brand_id, barcode = s.barcode, fingerprint = s.fingerprint, \
                 updated_at = now() \
                 FROM {UNNEST} AS s({COLUMNS}) \
                 WHERE d.product_id = s.product_id"
            ),
            insert_sql: format!(
                "INSERT INTO {table} ({COLUMNS}, updated_at) \
                 SELECT s.*, now() FROM {UNNEST} AS s({COLUMNS})"
            ),
        }
    }
}

impl TableMapping for ProductTable {
    type Record = ProductRecord;
    type Row = ProductRow;

    fn lookup_sql(&self) -> &str {
        &self.lookup_sql
    }

    fn update_sql(&self) -> &str {
        &self.update_sql
    }

    fn insert_sql(&self) -> &str {
        &self.insert_sql
    }

    fn bind_key<'q>(&self, query: PgQuery<'q>, key: &ProductKey) -> PgQuery<'q> {
        query.bind(key.0)
    }

    fn bind_columns<'q>(
        &self,
        query: PgQuery<'q>,
        rows: &[DestinationRecord<ProductRecord>],
    ) -> PgQuery<'q> {
        let records = rows.iter().map(|r| &r.attributes);

        query
            .bind(records.clone().map(|r| r.product_id).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.name.clone()).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.price).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.stock).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.active_ingredient.clone()).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.brand_id).collect::<Vec<_>>())
            .bind(records.map(|r| r.barcode.clone()).collect::<Vec<_>>())
            .bind(
                rows.iter()
                    .map(|r| r.fingerprint.as_ref().map(|f| f.as_str().to_string()))
                    .collect::<Vec<_>>(),
            )
    }

    fn from_row(&self, row: ProductRow) -> DestinationRecord<ProductRecord> {
        let fingerprint = row
            .fingerprint
            .as_deref()
            .and_then(|f| Fingerprint::parse(f).ok());

        DestinationRecord {
            key: ProductKey(row.product_id),
            attributes: ProductRecord {
                product_id: row.product_id,
                name: row.name,
                price: row.price,
                stock: row.stock,
                active_ingredient: row.active_ingredient,
                brand_id: row.brand_id,
                barcode: row.barcode,
            },
            fingerprint,
        }
    }
}

/// Decoded row of the product projection.
#[derive(Debug, FromRow)]
pub struct ProductSourceRow {
    pub product_id: i64,
    pub name: String,
    pub price: Decimal,
    pub stock: Decimal,
    pub active_ingredient: Option<String>,
    pub barcode: Option<String>,
}

/// Projection of the source catalogue.
#[derive(Debug, Clone)]
pub struct ProductSource {
    brand_id: i32,
    query: String,
}

impl ProductSource {
    /// Products attributed to `brand_id`, read with [`DEFAULT_PRODUCT_QUERY`].
    pub fn new(brand_id: i32) -> Self {
        Self {
            brand_id,
            query: DEFAULT_PRODUCT_QUERY.to_string(),
        }
    }

    /// Replace the projection query. It must yield the columns of
    /// [`ProductSourceRow`].
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }
}

/// Trim free-text ERP columns; blanks become `None`.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SourceMapping for ProductSource {
    type Record = ProductRecord;
    type Row = ProductSourceRow;

    fn query(&self) -> &str {
        &self.query
    }

    fn into_record(&self, row: ProductSourceRow) -> ProductRecord {
        ProductRecord {
            product_id: row.product_id,
            name: row.name.trim().to_string(),
            price: row.price,
            stock: row.stock,
            active_ingredient: non_blank(row.active_ingredient),
            brand_id: self.brand_id,
            barcode: non_blank(row.barcode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ProductTable {
        ProductTable::new(&DatabaseConfig::new("postgres://db/shop"))
    }

    #[test]
    fn test_product_sql_shape() {
        let table = table();
        assert_eq!(
            table.lookup_sql(),
            format!("SELECT {COLUMNS} FROM \"public\".\"products\" WHERE product_id = $1")
        );
        assert!(table.update_sql().contains("WHERE d.product_id = s.product_id"));
        assert!(table.update_sql().contains("$8::text[]"));
        assert!(table.update_sql().contains("$5::text[]"));
        assert!(table
            .update_sql()
            .contains("active_ingredient = s.active_ingredient"));
        assert!(table.insert_sql().contains("SELECT s.*, now()"));
    }

    #[test]
    fn test_source_row_gets_configured_brand() {
        let record = ProductSource::new(4).into_record(ProductSourceRow {
            product_id: 9,
            name: "  CAFE 500G ".to_string(),
            price: Decimal::new(450, 2),
            stock: Decimal::from(3),
            active_ingredient: Some(" ACETAMINOFEN ".to_string()),
            barcode: Some("   ".to_string()),
        });

        assert_eq!(record.brand_id, 4);
        assert_eq!(record.name, "CAFE 500G");
        assert_eq!(record.barcode, None);
        assert_eq!(record.active_ingredient.as_deref(), Some("ACETAMINOFEN"));
    }

    #[test]
    fn test_default_query_reads_active_ingredient_text() {
        assert!(DEFAULT_PRODUCT_QUERY.contains("active_ingredient"));
        assert!(!UNNEST.contains("boolean"));
    }

    #[test]
    fn test_blank_active_ingredient_is_none() {
        let record = ProductSource::new(1).into_record(ProductSourceRow {
            product_id: 3,
            name: "AGUA 1L".to_string(),
            price: Decimal::from(1),
            stock: Decimal::from(40),
            active_ingredient: Some(String::new()),
            barcode: Some(" 7590001 ".to_string()),
        });

        assert_eq!(record.active_ingredient, None);
        assert_eq!(record.barcode.as_deref(), Some("7590001"));
    }

    #[test]
    fn test_from_row_round_trips_record() {
        let record = ProductRecord {
            product_id: 9,
            name: "CAFE 500G".to_string(),
            price: Decimal::new(450, 2),
            stock: Decimal::from(3),
            active_ingredient: Some("CAFEINA".to_string()),
            brand_id: 1,
            barcode: None,
        };
        let fp = stocksync_core::fingerprint(&record);

        let decoded = table().from_row(ProductRow {
            product_id: 9,
            name: record.name.clone(),
            price: record.price,
            stock: record.stock,
            active_ingredient: record.active_ingredient.clone(),
            brand_id: 1,
            barcode: None,
            fingerprint: Some(fp.as_str().to_string()),
        });

        assert_eq!(decoded.attributes, record);
        assert!(decoded.matches(&fp));
    }
}
