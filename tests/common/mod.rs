use std::str::FromStr;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use fandango::db::{MemoryStore, Store};
use fandango::engine::{ManualClock, Market};
use fandango::models::{Account, Event, NewAccount, NewEvent, NewStock, SettingKey, StockSummary};

pub struct TestMarket {
    pub market: Arc<Market>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
}

/// A fresh in-memory market with a fixed clock and a seeded random source.
#[allow(dead_code)]
pub fn setup_market() -> TestMarket {
    setup_market_with_seed(7)
}

#[allow(dead_code)]
pub fn setup_market_with_seed(seed: u64) -> TestMarket {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(MemoryStore::new());
    let market = Arc::new(Market::with_seed(
        store.clone() as Arc<dyn Store>,
        clock.clone(),
        Some(seed),
    ));

    TestMarket {
        market,
        clock,
        store,
    }
}

#[allow(dead_code)]
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("valid decimal literal")
}

#[allow(dead_code)]
pub async fn seed_stock(market: &Market, code: &str, price: &str, tags: &[&str]) -> StockSummary {
    market
        .catalog()
        .create_stock(&NewStock {
            code: code.into(),
            name: format!("{code} Holdings"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            price: dec(price),
        })
        .await
        .expect("Failed to seed stock")
}

#[allow(dead_code)]
pub async fn seed_event(market: &Market, title: &str, min: &str, max: &str, tags: &[&str]) -> Event {
    market
        .catalog()
        .create_event(&NewEvent {
            title: title.into(),
            body: format!("{title} shakes the market"),
            breaking: false,
            video_url: None,
            change_min: dec(min),
            change_max: dec(max),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        })
        .await
        .expect("Failed to seed event")
}

#[allow(dead_code)]
pub async fn seed_account(market: &Market, card_number: i64, balance: &str) -> Account {
    market
        .catalog()
        .create_account(&NewAccount {
            card_number,
            name: format!("Player {card_number}"),
            balance: dec(balance),
        })
        .await
        .expect("Failed to seed account")
}

#[allow(dead_code)]
pub async fn set_setting(market: &Market, key: SettingKey, value: i64) {
    market
        .settings()
        .set(key, value)
        .await
        .expect("Failed to set setting");
}
