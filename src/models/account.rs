use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::PriceChange;

/// Player account, identified by the number printed on their game card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub card_number: i64,
    pub name: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub card_number: i64,
    pub name: String,
    #[serde(default)]
    pub balance: Decimal,
}

/// Database row for purchases table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub id: i64,
    pub stock_code: String,
    pub card_number: i64,
    pub purchase_price: Decimal,
    pub purchased_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchase {
    pub stock_code: String,
    pub card_number: i64,
}

/// Everything a purchase writes: the sale, the debited account and, when the
/// market is open, the price increase it triggered.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRecord {
    pub purchase: Purchase,
    pub account: Account,
    pub price_change: Option<PriceChange>,
}
