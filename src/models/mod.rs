pub mod account;
pub mod activation;
pub mod event;
pub mod price_change;
pub mod setting;
pub mod stock;

pub use account::{Account, NewAccount, NewPurchase, Purchase, PurchaseRecord};
pub use activation::{EventActivation, MarketActivation};
pub use event::{Event, NewEvent};
pub use price_change::{NewPriceChange, PriceChange};
pub use setting::SettingKey;
pub use stock::{NewStock, Stock, StockSummary};

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Trim tag names, drop empties and duplicates while keeping first-seen order.
pub fn normalize_tags<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for name in raw {
        let name = name.as_ref().trim();
        if name.is_empty() || out.iter().any(|t| t == name) {
            continue;
        }
        out.push(name.to_string());
    }
    out
}
