//! Per-site stock and pricing rows.

use std::fmt::{Display, Formatter};

use rust_decimal::{Decimal, RoundingStrategy};

use crate::fingerprint::FingerprintBuilder;
use crate::model::SyncRecord;

/// Decimal places kept for derived foreign-currency prices.
pub const FX_PRICE_SCALE: u32 = 2;

/// Natural key of a stock row: a product at a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StockKey {
    /// Product code.
    pub product_id: i64,
    /// Site (branch) code.
    pub site_id: i32,
}

impl StockKey {
    #[must_use]
    pub fn new(product_id: i64, site_id: i32) -> Self {
        Self {
            product_id,
            site_id,
        }
    }
}

impl Display for StockKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.site_id)
    }
}

/// Stock quantity and prices of one product at one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRecord {
    /// Product code.
    pub product_id: i64,
    /// Site (branch) code.
    pub site_id: i32,
    /// Product line the discount is inherited from.
    pub line_id: Option<i64>,
    /// Quantity on hand.
    pub stock: Decimal,
    /// List price before discounts.
    pub original_price: Decimal,
    /// Price after the active offer or line discount.
    pub final_price: Decimal,
    /// List price in the reference currency.
    pub original_price_fx: Option<Decimal>,
    /// Final price in the reference currency.
    pub final_price_fx: Option<Decimal>,
    /// Local units per reference currency unit.
    pub exchange_rate: Option<Decimal>,
    /// Discount applied, as a percentage of the list price.
    pub discount_percent: Option<Decimal>,
}

impl StockRecord {
    /// Create an undiscounted record.
    #[must_use]
    pub fn new(key: StockKey, stock: Decimal, price: Decimal) -> Self {
        Self {
            product_id: key.product_id,
            site_id: key.site_id,
            line_id: None,
            stock,
            original_price: price,
            final_price: price,
            original_price_fx: None,
            final_price_fx: None,
            exchange_rate: None,
            discount_percent: None,
        }
    }

    /// Set the product line.
    #[must_use]
    pub fn with_line(mut self, line_id: i64) -> Self {
        self.line_id = Some(line_id);
        self
    }

    /// Apply a discount: the final price and the percentage it represents.
    #[must_use]
    pub fn with_discount(mut self, final_price: Decimal, percent: Decimal) -> Self {
        self.final_price = final_price;
        self.discount_percent = Some(percent);
        self.original_price_fx = self.exchange_rate.and_then(|r| to_fx(self.original_price, r));
        self.final_price_fx = self.exchange_rate.and_then(|r| to_fx(self.final_price, r));
        self
    }

    /// Set the exchange rate and derive the reference-currency prices.
    ///
    /// A zero rate leaves the reference-currency prices empty.
    #[must_use]
    pub fn with_exchange_rate(mut self, rate: Decimal) -> Self {
        self.exchange_rate = Some(rate);
        self.original_price_fx = to_fx(self.original_price, rate);
        self.final_price_fx = to_fx(self.final_price, rate);
        self
    }

    /// Whether any discount is in effect.
    #[must_use]
    pub fn has_discount(&self) -> bool {
        self.discount_percent.is_some_and(|p| p > Decimal::ZERO)
    }
}

fn to_fx(price: Decimal, rate: Decimal) -> Option<Decimal> {
    price
        .checked_div(rate)
        .map(|v| v.round_dp_with_strategy(FX_PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

impl SyncRecord for StockRecord {
    type Key = StockKey;

    const ENTITY: &'static str = "stock";

    fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.site_id)
    }

    fn write_fingerprint(&self, builder: &mut FingerprintBuilder) {
        builder
            .field(&self.product_id)
            .field(&self.site_id)
            .field(&self.line_id)
            .field(&self.stock)
            .field(&self.original_price)
            .field(&self.final_price)
            .field(&self.original_price_fx)
            .field(&self.final_price_fx)
            .field(&self.exchange_rate)
            .field(&self.discount_percent);
    }
}
