//! Stock table and source projection.
//!
//! Destination table layout:
//!
//! ```sql
//! CREATE TABLE site_stock (
//!     product_id        BIGINT  NOT NULL,
//!     site_id           INTEGER NOT NULL,
//!     line_id           BIGINT,
//!     stock             NUMERIC NOT NULL,
//!     original_price    NUMERIC NOT NULL,
//!     final_price       NUMERIC NOT NULL,
//!     original_price_fx NUMERIC,
//!     final_price_fx    NUMERIC,
//!     exchange_rate     NUMERIC,
//!     discount_percent  NUMERIC,
//!     has_discount      BOOLEAN NOT NULL DEFAULT FALSE,
//!     fingerprint       TEXT,
//!     updated_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     PRIMARY KEY (product_id, site_id)
//! );
//! ```

use rust_decimal::Decimal;
use sqlx::FromRow;
use stocksync_core::{DestinationRecord, Fingerprint, StockKey, StockRecord};

use crate::config::DatabaseConfig;
use crate::mapping::{PgQuery, SourceMapping, TableMapping};

const COLUMNS: &str = "product_id, site_id, line_id, stock, original_price, final_price, \
     original_price_fx, final_price_fx, exchange_rate, discount_percent, has_discount, fingerprint";

const UNNEST: &str = "UNNEST($1::bigint[], $2::integer[], $3::bigint[], $4::numeric[], \
     $5::numeric[], $6::numeric[], $7::numeric[], $8::numeric[], $9::numeric[], \
     $10::numeric[], $11::boolean[], $12::text[])";

/// Default projection over the source catalogue.
///
/// An active offer price beats the product line discount. Reference-currency
/// prices are derived from `exchange_rate` when rows are decoded.
pub const DEFAULT_STOCK_QUERY: &str = r"
SELECT
    p.product_id,
    p.line_id,
    p.stock,
    ROUND(p.price, 2) AS original_price,
    ROUND(CASE
        WHEN p.on_offer AND p.offer_price > 0
             AND CURRENT_DATE > p.offer_start AND CURRENT_DATE < p.offer_end
            THEN p.offer_price
        WHEN l.discount > 0 THEN p.price * (1 - l.discount / 100)
        ELSE p.price
    END, 2) AS final_price,
    CASE
        WHEN p.on_offer AND p.offer_price > 0 AND p.price > 0
             AND CURRENT_DATE > p.offer_start AND CURRENT_DATE < p.offer_end
            THEN ROUND((p.price - p.offer_price) / p.price * 100, 2)
        WHEN l.discount > 0 THEN l.discount
    END AS discount_percent,
    (SELECT c.exchange_rate FROM currencies c WHERE c.is_price_reference LIMIT 1) AS exchange_rate
FROM products p
LEFT JOIN product_lines l ON p.line_id = l.line_id
WHERE p.stock > 0
ORDER BY p.product_id
";

/// Decoded stock destination row.
#[derive(Debug, FromRow)]
pub struct StockRow {
    pub product_id: i64,
    pub site_id: i32,
    pub line_id: Option<i64>,
    pub stock: Decimal,
    pub original_price: Decimal,
    pub final_price: Decimal,
    pub original_price_fx: Option<Decimal>,
    pub final_price_fx: Option<Decimal>,
    pub exchange_rate: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub fingerprint: Option<String>,
}

/// Mapping of [`StockRecord`] onto the stock table.
#[derive(Debug, Clone)]
pub struct StockTable {
    lookup_sql: String,
    update_sql: String,
    insert_sql: String,
}

impl StockTable {
    /// Build the statements for the configured stock table.
    pub fn new(config: &DatabaseConfig) -> Self {
        let table = config.qualified_table(&config.stock_table);

        let lookup_sql = format!(
            "SELECT product_id, site_id, line_id, stock, original_price, final_price, \
             original_price_fx, final_price_fx, exchange_rate, discount_percent, fingerprint \
             FROM {table} WHERE product_id = $1 AND site_id = $2"
        );

        let update_sql = format!(
            "UPDATE {table} AS d SET \
             line_id = s.line_id, stock = s.stock, original_price = s.original_price, \
             final_price = s.final_price, original_price_fx = s.original_price_fx, \
             final_price_fx = s.final_price_fx, exchange_rate = s.exchange_rate, \
             discount_percent = s.discount_percent, has_discount = s.has_discount, \
             fingerprint = s.fingerprint, updated_at = now() \
             FROM {UNNEST} AS s({COLUMNS}) \
             WHERE d.product_id = s.product_id AND d.site_id = s.site_id"
        );

        let insert_sql = format!(
            "INSERT INTO {table} ({COLUMNS}, updated_at) \
             SELECT s.*, now() FROM {UNNEST} AS s({COLUMNS})"
        );

        Self {
            lookup_sql,
            update_sql,
            insert_sql,
        }
    }
}

impl TableMapping for StockTable {
    type Record = StockRecord;
    type Row = StockRow;

    fn lookup_sql(&self) -> &str {
        &self.lookup_sql
    }

    fn update_sql(&self) -> &str {
        &self.update_sql
    }

    fn insert_sql(&self) -> &str {
        &self.insert_sql
    }

    fn bind_key<'q>(&self, query: PgQuery<'q>, key: &StockKey) -> PgQuery<'q> {
        query.bind(key.product_id).bind(key.site_id)
    }

    fn bind_columns<'q>(
        &self,
        query: PgQuery<'q>,
        rows: &[DestinationRecord<StockRecord>],
    ) -> PgQuery<'q> {
        let records = rows.iter().map(|r| &r.attributes);

        query
            .bind(records.clone().map(|r| r.product_id).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.site_id).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.line_id).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.stock).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.original_price).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.final_price).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.original_price_fx).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.final_price_fx).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.exchange_rate).collect::<Vec<_>>())
            .bind(records.clone().map(|r| r.discount_percent).collect::<Vec<_>>())
            .bind(records.map(StockRecord::has_discount).collect::<Vec<_>>())
            .bind(
                rows.iter()
                    .map(|r| r.fingerprint.as_ref().map(|f| f.as_str().to_string()))
                    .collect::<Vec<_>>(),
            )
    }

    fn from_row(&self, row: StockRow) -> DestinationRecord<StockRecord> {
        let record = StockRecord {
            product_id: row.product_id,
            site_id: row.site_id,
            line_id: row.line_id,
            stock: row.stock,
            original_price: row.original_price,
            final_price: row.final_price,
            original_price_fx: row.original_price_fx,
            final_price_fx: row.final_price_fx,
            exchange_rate: row.exchange_rate,
            discount_percent: row.discount_percent,
        };

        DestinationRecord {
            key: StockKey::new(row.product_id, row.site_id),
            attributes: record,
            // Unreadable digests are treated like missing ones.
            fingerprint: row
                .fingerprint
                .as_deref()
                .and_then(|f| Fingerprint::parse(f).ok()),
        }
    }
}

/// Decoded row of the stock projection.
#[derive(Debug, FromRow)]
pub struct StockSourceRow {
    pub product_id: i64,
    pub line_id: Option<i64>,
    pub stock: Decimal,
    pub original_price: Decimal,
    pub final_price: Decimal,
    pub discount_percent: Option<Decimal>,
    pub exchange_rate: Option<Decimal>,
}

/// Projection of source stock for one site.
#[derive(Debug, Clone)]
pub struct StockSource {
    site_id: i32,
    query: String,
}

impl StockSource {
    /// Stock of `site_id`, read with [`DEFAULT_STOCK_QUERY`].
    pub fn new(site_id: i32) -> Self {
        Self {
            site_id,
            query: DEFAULT_STOCK_QUERY.to_string(),
        }
    }

    /// Replace the projection query. It must yield the columns of
    /// [`StockSourceRow`].
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Site every record is attributed to.
    pub fn site_id(&self) -> i32 {
        self.site_id
    }
}

impl SourceMapping for StockSource {
    type Record = StockRecord;
    type Row = StockSourceRow;

    fn query(&self) -> &str {
        &self.query
    }

    fn into_record(&self, row: StockSourceRow) -> StockRecord {
        let mut record = StockRecord::new(
            StockKey::new(row.product_id, self.site_id),
            row.stock,
            row.original_price,
        );
        record.line_id = row.line_id;
        record.final_price = row.final_price;
        record.discount_percent = row.discount_percent;

        match row.exchange_rate {
            Some(rate) => record.with_exchange_rate(rate),
            None => record,
        }
    }
}
