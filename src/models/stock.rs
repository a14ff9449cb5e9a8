use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for stocks table, with tag names aggregated from stock_tags.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Stock {
    pub code: String,
    pub name: String,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Request body for creating a stock. `price` becomes the initial price point.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStock {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub price: Decimal,
}

/// A stock together with its anchor and latest price, as served by listings.
#[derive(Debug, Clone, Serialize)]
pub struct StockSummary {
    #[serde(flatten)]
    pub stock: Stock,
    pub initial_price: Decimal,
    pub price: Decimal,
}
