use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::{account_repo, activation_repo, event_repo, price_repo, settings_repo, stock_repo, Store};
use crate::models::{
    Account, Event, EventActivation, MarketActivation, NewAccount, NewEvent, NewPriceChange,
    PriceChange, Purchase, PurchaseRecord, SettingKey, Stock,
};

/// Postgres-backed store. Each method delegates to the matching repo function.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_open_session(&self, now: DateTime<Utc>) -> anyhow::Result<Option<MarketActivation>> {
        activation_repo::get_current_activation(&self.pool, now).await
    }

    async fn create_session(&self, started_at: DateTime<Utc>) -> anyhow::Result<MarketActivation> {
        activation_repo::create_activation(&self.pool, started_at).await
    }

    async fn extend_session(
        &self,
        session_id: Uuid,
        ends_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<MarketActivation> {
        activation_repo::update_activation_end(&self.pool, session_id, ends_at).await
    }

    async fn get_unconsumed_event_activation(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<EventActivation>> {
        activation_repo::get_active_event_activation(&self.pool, session_id, now).await
    }

    async fn activate_event(
        &self,
        session_id: Uuid,
        event_id: Uuid,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        shocks: &[NewPriceChange],
    ) -> anyhow::Result<(EventActivation, Vec<PriceChange>)> {
        activation_repo::activate_event(&self.pool, session_id, event_id, started_at, ends_at, shocks).await
    }

    async fn list_activated_events(&self, session_id: Uuid) -> anyhow::Result<Vec<Event>> {
        event_repo::get_activated_events(&self.pool, session_id).await
    }

    async fn list_events(&self) -> anyhow::Result<Vec<Event>> {
        event_repo::get_events(&self.pool).await
    }

    async fn get_event(&self, event_id: Uuid) -> anyhow::Result<Option<Event>> {
        event_repo::get_event(&self.pool, event_id).await
    }

    async fn create_event(&self, event: &NewEvent) -> anyhow::Result<Event> {
        event_repo::create_event(&self.pool, event).await
    }

    async fn delete_event(&self, event_id: Uuid) -> anyhow::Result<bool> {
        event_repo::delete_event(&self.pool, event_id).await
    }

    async fn list_stocks(&self) -> anyhow::Result<Vec<Stock>> {
        stock_repo::get_stocks(&self.pool).await
    }

    async fn get_stock(&self, code: &str) -> anyhow::Result<Option<Stock>> {
        stock_repo::get_stock_by_code(&self.pool, code).await
    }

    async fn create_stock(
        &self,
        code: &str,
        name: &str,
        tags: &[String],
        initial: &NewPriceChange,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<(Stock, PriceChange)> {
        stock_repo::create_stock(&self.pool, code, name, tags, initial, created_at).await
    }

    async fn set_in_stock(&self, code: &str, in_stock: bool) -> anyhow::Result<Option<Stock>> {
        stock_repo::update_in_stock(&self.pool, code, in_stock).await
    }

    async fn delete_stock(&self, code: &str) -> anyhow::Result<bool> {
        stock_repo::delete_stock(&self.pool, code).await
    }

    async fn get_stocks_for_tags(&self, tags: &[String]) -> anyhow::Result<BTreeSet<String>> {
        stock_repo::get_stocks_for_tags(&self.pool, tags).await
    }

    async fn get_initial_price(&self, code: &str) -> anyhow::Result<Option<PriceChange>> {
        price_repo::get_initial_price(&self.pool, code).await
    }

    async fn get_current_price(&self, code: &str) -> anyhow::Result<Option<PriceChange>> {
        price_repo::get_current_price(&self.pool, code).await
    }

    async fn append_price_change(
        &self,
        code: &str,
        price: Decimal,
        reason: &str,
        changed_at: DateTime<Utc>,
    ) -> anyhow::Result<PriceChange> {
        price_repo::insert_price_change(&self.pool, code, price, reason, changed_at).await
    }

    async fn append_price_changes(
        &self,
        changes: &[NewPriceChange],
        changed_at: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PriceChange>> {
        price_repo::insert_price_changes(&self.pool, changes, changed_at).await
    }

    async fn price_history(&self, code: &str) -> anyhow::Result<Vec<PriceChange>> {
        price_repo::get_price_history(&self.pool, code).await
    }

    async fn get_setting(&self, key: SettingKey) -> anyhow::Result<Option<i64>> {
        settings_repo::get_setting(&self.pool, key).await
    }

    async fn list_settings(&self) -> anyhow::Result<HashMap<SettingKey, i64>> {
        settings_repo::get_all_settings(&self.pool).await
    }

    async fn upsert_setting(&self, key: SettingKey, value: i64) -> anyhow::Result<()> {
        settings_repo::upsert_setting(&self.pool, key, value).await
    }

    async fn delete_setting(&self, key: SettingKey) -> anyhow::Result<()> {
        settings_repo::delete_setting(&self.pool, key).await
    }

    async fn create_account(&self, account: &NewAccount) -> anyhow::Result<Account> {
        account_repo::create_account(&self.pool, account).await
    }

    async fn get_account(&self, card_number: i64) -> anyhow::Result<Option<Account>> {
        account_repo::get_account_by_card_number(&self.pool, card_number).await
    }

    async fn list_accounts(&self) -> anyhow::Result<Vec<Account>> {
        account_repo::get_accounts(&self.pool).await
    }

    async fn delete_account(&self, card_number: i64) -> anyhow::Result<bool> {
        account_repo::delete_account(&self.pool, card_number).await
    }

    async fn record_purchase(
        &self,
        code: &str,
        card_number: i64,
        price: Decimal,
        purchased_at: DateTime<Utc>,
        next_price: Option<&NewPriceChange>,
    ) -> anyhow::Result<PurchaseRecord> {
        account_repo::record_purchase(&self.pool, code, card_number, price, purchased_at, next_price).await
    }

    async fn latest_purchase_at(&self, code: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        account_repo::get_latest_purchase_at(&self.pool, code).await
    }

    async fn list_purchases(&self) -> anyhow::Result<Vec<Purchase>> {
        account_repo::get_purchases(&self.pool).await
    }
}
