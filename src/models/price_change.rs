use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for price_changes table. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PriceChange {
    pub id: i64,
    pub stock_code: String,
    pub new_price: Decimal,
    pub reason: String,
    pub changed_at: DateTime<Utc>,
}

/// A price point to be written as part of a larger store operation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPriceChange {
    pub stock_code: String,
    pub new_price: Decimal,
    pub reason: String,
}
