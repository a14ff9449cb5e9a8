pub mod account_repo;
pub mod activation_repo;
pub mod event_repo;
pub mod memory;
pub mod pg_store;
pub mod price_repo;
pub mod settings_repo;
pub mod stock_repo;

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Account, Event, EventActivation, MarketActivation, NewAccount, NewEvent, NewPriceChange,
    PriceChange, Purchase, PurchaseRecord, SettingKey, Stock,
};

pub use memory::MemoryStore;
pub use pg_store::PgStore;

pub async fn init_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Everything the market engine needs from durable storage.
///
/// Timestamps are always supplied by the caller so that the engine's clock,
/// not the database's, decides what "now" is.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;

    // --- Sessions ---
    async fn get_open_session(&self, now: DateTime<Utc>) -> anyhow::Result<Option<MarketActivation>>;
    async fn create_session(&self, started_at: DateTime<Utc>) -> anyhow::Result<MarketActivation>;
    async fn extend_session(
        &self,
        session_id: Uuid,
        ends_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<MarketActivation>;

    // --- Event activations ---
    async fn get_unconsumed_event_activation(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<EventActivation>>;
    /// Bind an event to a session and write the price shocks it causes,
    /// all or nothing. Shocks are stamped with `started_at`.
    async fn activate_event(
        &self,
        session_id: Uuid,
        event_id: Uuid,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        shocks: &[NewPriceChange],
    ) -> anyhow::Result<(EventActivation, Vec<PriceChange>)>;
    async fn list_activated_events(&self, session_id: Uuid) -> anyhow::Result<Vec<Event>>;

    // --- Events ---
    async fn list_events(&self) -> anyhow::Result<Vec<Event>>;
    async fn get_event(&self, event_id: Uuid) -> anyhow::Result<Option<Event>>;
    async fn create_event(&self, event: &NewEvent) -> anyhow::Result<Event>;
    async fn delete_event(&self, event_id: Uuid) -> anyhow::Result<bool>;

    // --- Stocks ---
    async fn list_stocks(&self) -> anyhow::Result<Vec<Stock>>;
    async fn get_stock(&self, code: &str) -> anyhow::Result<Option<Stock>>;
    /// Create a stock together with its first price point.
    async fn create_stock(
        &self,
        code: &str,
        name: &str,
        tags: &[String],
        initial: &NewPriceChange,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<(Stock, PriceChange)>;
    async fn set_in_stock(&self, code: &str, in_stock: bool) -> anyhow::Result<Option<Stock>>;
    async fn delete_stock(&self, code: &str) -> anyhow::Result<bool>;
    async fn get_stocks_for_tags(&self, tags: &[String]) -> anyhow::Result<BTreeSet<String>>;

    // --- Prices ---
    async fn get_initial_price(&self, code: &str) -> anyhow::Result<Option<PriceChange>>;
    async fn get_current_price(&self, code: &str) -> anyhow::Result<Option<PriceChange>>;
    async fn append_price_change(
        &self,
        code: &str,
        price: Decimal,
        reason: &str,
        changed_at: DateTime<Utc>,
    ) -> anyhow::Result<PriceChange>;
    /// Append several price points, all or nothing.
    async fn append_price_changes(
        &self,
        changes: &[NewPriceChange],
        changed_at: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PriceChange>>;
    async fn price_history(&self, code: &str) -> anyhow::Result<Vec<PriceChange>>;

    // --- Settings ---
    async fn get_setting(&self, key: SettingKey) -> anyhow::Result<Option<i64>>;
    async fn list_settings(&self) -> anyhow::Result<HashMap<SettingKey, i64>>;
    async fn upsert_setting(&self, key: SettingKey, value: i64) -> anyhow::Result<()>;
    async fn delete_setting(&self, key: SettingKey) -> anyhow::Result<()>;

    // --- Accounts & purchases ---
    async fn create_account(&self, account: &NewAccount) -> anyhow::Result<Account>;
    async fn get_account(&self, card_number: i64) -> anyhow::Result<Option<Account>>;
    async fn list_accounts(&self) -> anyhow::Result<Vec<Account>>;
    async fn delete_account(&self, card_number: i64) -> anyhow::Result<bool>;
    /// Store the purchase, subtract `price` from the balance and append
    /// `next_price` if given, all or nothing.
    async fn record_purchase(
        &self,
        code: &str,
        card_number: i64,
        price: Decimal,
        purchased_at: DateTime<Utc>,
        next_price: Option<&NewPriceChange>,
    ) -> anyhow::Result<PurchaseRecord>;
    async fn latest_purchase_at(&self, code: &str) -> anyhow::Result<Option<DateTime<Utc>>>;
    async fn list_purchases(&self) -> anyhow::Result<Vec<Purchase>>;
}
