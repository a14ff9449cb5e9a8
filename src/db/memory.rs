use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::Store;
use crate::models::{
    Account, Event, EventActivation, MarketActivation, NewAccount, NewEvent, NewPriceChange,
    PriceChange, Purchase, PurchaseRecord, SettingKey, Stock,
};

#[derive(Default)]
struct Inner {
    stocks: BTreeMap<String, Stock>,
    price_changes: Vec<PriceChange>,
    next_price_change_id: i64,
    events: Vec<Event>,
    sessions: Vec<MarketActivation>,
    event_activations: Vec<EventActivation>,
    settings: HashMap<SettingKey, i64>,
    accounts: BTreeMap<i64, Account>,
    purchases: Vec<Purchase>,
    next_purchase_id: i64,
}

impl Inner {
    fn event(&self, event_id: Uuid) -> Option<&Event> {
        self.events.iter().find(|e| e.id == event_id)
    }

    fn prices_for<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a PriceChange> + 'a {
        self.price_changes.iter().filter(move |p| p.stock_code == code)
    }

    fn push_price(&mut self, code: &str, price: Decimal, reason: &str, changed_at: DateTime<Utc>) -> PriceChange {
        self.next_price_change_id += 1;
        let change = PriceChange {
            id: self.next_price_change_id,
            stock_code: code.to_string(),
            new_price: price,
            reason: reason.to_string(),
            changed_at,
        };
        self.price_changes.push(change.clone());
        change
    }

    /// Fail unless every change targets an existing stock. Checked before any write.
    fn check_stocks_exist(&self, changes: &[NewPriceChange]) -> anyhow::Result<()> {
        match changes.iter().find(|c| !self.stocks.contains_key(&c.stock_code)) {
            Some(missing) => bail!("stock {} not found", missing.stock_code),
            None => Ok(()),
        }
    }
}

/// In-process store with the same ordering, uniqueness and cascade rules as
/// the Postgres schema. Used by tests and when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> anyhow::Result<()> {
        self.lock().map(|_| ())
    }

    async fn get_open_session(&self, now: DateTime<Utc>) -> anyhow::Result<Option<MarketActivation>> {
        let inner = self.lock()?;
        Ok(inner
            .sessions
            .iter()
            .filter(|s| s.is_open_at(now))
            .min_by_key(|s| s.started_at)
            .cloned())
    }

    async fn create_session(&self, started_at: DateTime<Utc>) -> anyhow::Result<MarketActivation> {
        let mut inner = self.lock()?;
        let session = MarketActivation {
            id: Uuid::new_v4(),
            started_at,
            ends_at: None,
        };
        inner.sessions.push(session.clone());
        Ok(session)
    }

    async fn extend_session(
        &self,
        session_id: Uuid,
        ends_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<MarketActivation> {
        let mut inner = self.lock()?;
        let session = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| anyhow!("session {session_id} not found"))?;
        session.ends_at = ends_at;
        Ok(session.clone())
    }

    async fn get_unconsumed_event_activation(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<EventActivation>> {
        let inner = self.lock()?;
        Ok(inner
            .event_activations
            .iter()
            .filter(|a| a.market_activation_id == session_id && a.is_active_at(now))
            .max_by_key(|a| a.started_at)
            .cloned())
    }

    async fn activate_event(
        &self,
        session_id: Uuid,
        event_id: Uuid,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        shocks: &[NewPriceChange],
    ) -> anyhow::Result<(EventActivation, Vec<PriceChange>)> {
        let mut inner = self.lock()?;
        if !inner.sessions.iter().any(|s| s.id == session_id) {
            bail!("session {session_id} not found");
        }
        if inner.event(event_id).is_none() {
            bail!("event {event_id} not found");
        }
        if inner
            .event_activations
            .iter()
            .any(|a| a.market_activation_id == session_id && a.event_id == event_id)
        {
            bail!("event {event_id} already activated in session {session_id}");
        }
        inner.check_stocks_exist(shocks)?;

        let activation = EventActivation {
            id: Uuid::new_v4(),
            market_activation_id: session_id,
            event_id,
            started_at,
            ends_at,
        };
        inner.event_activations.push(activation.clone());

        let stored = shocks
            .iter()
            .map(|shock| inner.push_price(&shock.stock_code, shock.new_price, &shock.reason, started_at))
            .collect();
        Ok((activation, stored))
    }

    async fn list_activated_events(&self, session_id: Uuid) -> anyhow::Result<Vec<Event>> {
        let inner = self.lock()?;
        Ok(inner
            .event_activations
            .iter()
            .filter(|a| a.market_activation_id == session_id)
            .filter_map(|a| inner.event(a.event_id).cloned())
            .collect())
    }

    async fn list_events(&self) -> anyhow::Result<Vec<Event>> {
        let inner = self.lock()?;
        let mut events = inner.events.clone();
        events.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn get_event(&self, event_id: Uuid) -> anyhow::Result<Option<Event>> {
        let inner = self.lock()?;
        Ok(inner.event(event_id).cloned())
    }

    async fn create_event(&self, event: &NewEvent) -> anyhow::Result<Event> {
        let mut inner = self.lock()?;
        let mut tags = event.tags.clone();
        tags.sort();
        let event = Event {
            id: Uuid::new_v4(),
            title: event.title.clone(),
            body: event.body.clone(),
            breaking: event.breaking,
            video_url: event.video_url.clone(),
            change_min: event.change_min,
            change_max: event.change_max,
            tags,
        };
        inner.events.push(event.clone());
        Ok(event)
    }

    async fn delete_event(&self, event_id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.lock()?;
        let before = inner.events.len();
        inner.events.retain(|e| e.id != event_id);
        inner.event_activations.retain(|a| a.event_id != event_id);
        Ok(inner.events.len() < before)
    }

    async fn list_stocks(&self) -> anyhow::Result<Vec<Stock>> {
        let inner = self.lock()?;
        let mut stocks: Vec<Stock> = inner.stocks.values().cloned().collect();
        stocks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.code.cmp(&b.code)));
        Ok(stocks)
    }

    async fn get_stock(&self, code: &str) -> anyhow::Result<Option<Stock>> {
        let inner = self.lock()?;
        Ok(inner.stocks.get(code).cloned())
    }

    async fn create_stock(
        &self,
        code: &str,
        name: &str,
        tags: &[String],
        initial: &NewPriceChange,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<(Stock, PriceChange)> {
        let mut inner = self.lock()?;
        if inner.stocks.contains_key(code) {
            bail!("stock {code} already exists");
        }
        let mut tags = tags.to_vec();
        tags.sort();
        tags.dedup();
        let stock = Stock {
            code: code.to_string(),
            name: name.to_string(),
            in_stock: true,
            created_at,
            tags,
        };
        inner.stocks.insert(stock.code.clone(), stock.clone());
        let change = inner.push_price(code, initial.new_price, &initial.reason, created_at);
        Ok((stock, change))
    }

    async fn set_in_stock(&self, code: &str, in_stock: bool) -> anyhow::Result<Option<Stock>> {
        let mut inner = self.lock()?;
        Ok(inner.stocks.get_mut(code).map(|stock| {
            stock.in_stock = in_stock;
            stock.clone()
        }))
    }

    async fn delete_stock(&self, code: &str) -> anyhow::Result<bool> {
        let mut inner = self.lock()?;
        let removed = inner.stocks.remove(code).is_some();
        inner.price_changes.retain(|p| p.stock_code != code);
        inner.purchases.retain(|p| p.stock_code != code);
        Ok(removed)
    }

    async fn get_stocks_for_tags(&self, tags: &[String]) -> anyhow::Result<BTreeSet<String>> {
        let inner = self.lock()?;
        Ok(inner
            .stocks
            .values()
            .filter(|s| s.tags.iter().any(|t| tags.contains(t)))
            .map(|s| s.code.clone())
            .collect())
    }

    async fn get_initial_price(&self, code: &str) -> anyhow::Result<Option<PriceChange>> {
        let inner = self.lock()?;
        Ok(inner.prices_for(code).min_by_key(|p| (p.changed_at, p.id)).cloned())
    }

    async fn get_current_price(&self, code: &str) -> anyhow::Result<Option<PriceChange>> {
        let inner = self.lock()?;
        Ok(inner.prices_for(code).max_by_key(|p| (p.changed_at, p.id)).cloned())
    }

    async fn append_price_change(
        &self,
        code: &str,
        price: Decimal,
        reason: &str,
        changed_at: DateTime<Utc>,
    ) -> anyhow::Result<PriceChange> {
        let mut inner = self.lock()?;
        if !inner.stocks.contains_key(code) {
            bail!("stock {code} not found");
        }
        Ok(inner.push_price(code, price, reason, changed_at))
    }

    async fn append_price_changes(
        &self,
        changes: &[NewPriceChange],
        changed_at: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PriceChange>> {
        let mut inner = self.lock()?;
        inner.check_stocks_exist(changes)?;
        Ok(changes
            .iter()
            .map(|c| inner.push_price(&c.stock_code, c.new_price, &c.reason, changed_at))
            .collect())
    }

    async fn price_history(&self, code: &str) -> anyhow::Result<Vec<PriceChange>> {
        let inner = self.lock()?;
        let mut history: Vec<PriceChange> = inner.prices_for(code).cloned().collect();
        history.sort_by_key(|p| (p.changed_at, p.id));
        Ok(history)
    }

    async fn get_setting(&self, key: SettingKey) -> anyhow::Result<Option<i64>> {
        let inner = self.lock()?;
        Ok(inner.settings.get(&key).copied())
    }

    async fn list_settings(&self) -> anyhow::Result<HashMap<SettingKey, i64>> {
        let inner = self.lock()?;
        Ok(inner.settings.clone())
    }

    async fn upsert_setting(&self, key: SettingKey, value: i64) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        inner.settings.insert(key, value);
        Ok(())
    }

    async fn delete_setting(&self, key: SettingKey) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        inner.settings.remove(&key);
        Ok(())
    }

    async fn create_account(&self, account: &NewAccount) -> anyhow::Result<Account> {
        let mut inner = self.lock()?;
        if inner.accounts.contains_key(&account.card_number) {
            bail!("account {} already exists", account.card_number);
        }
        let account = Account {
            card_number: account.card_number,
            name: account.name.clone(),
            balance: account.balance,
        };
        inner.accounts.insert(account.card_number, account.clone());
        Ok(account)
    }

    async fn get_account(&self, card_number: i64) -> anyhow::Result<Option<Account>> {
        let inner = self.lock()?;
        Ok(inner.accounts.get(&card_number).cloned())
    }

    async fn list_accounts(&self) -> anyhow::Result<Vec<Account>> {
        let inner = self.lock()?;
        Ok(inner.accounts.values().cloned().collect())
    }

    async fn delete_account(&self, card_number: i64) -> anyhow::Result<bool> {
        let mut inner = self.lock()?;
        let removed = inner.accounts.remove(&card_number).is_some();
        inner.purchases.retain(|p| p.card_number != card_number);
        Ok(removed)
    }

    async fn record_purchase(
        &self,
        code: &str,
        card_number: i64,
        price: Decimal,
        purchased_at: DateTime<Utc>,
        next_price: Option<&NewPriceChange>,
    ) -> anyhow::Result<PurchaseRecord> {
        let mut inner = self.lock()?;
        if !inner.stocks.contains_key(code) {
            bail!("stock {code} not found");
        }
        if let Some(next) = next_price {
            inner.check_stocks_exist(std::slice::from_ref(next))?;
        }
        let account = {
            let account = inner
                .accounts
                .get_mut(&card_number)
                .ok_or_else(|| anyhow!("account {card_number} not found"))?;
            account.balance -= price;
            account.clone()
        };

        inner.next_purchase_id += 1;
        let purchase = Purchase {
            id: inner.next_purchase_id,
            stock_code: code.to_string(),
            card_number,
            purchase_price: price,
            purchased_at,
        };
        inner.purchases.push(purchase.clone());

        let price_change =
            next_price.map(|next| inner.push_price(&next.stock_code, next.new_price, &next.reason, purchased_at));

        Ok(PurchaseRecord {
            purchase,
            account,
            price_change,
        })
    }

    async fn latest_purchase_at(&self, code: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        let inner = self.lock()?;
        Ok(inner
            .purchases
            .iter()
            .filter(|p| p.stock_code == code)
            .map(|p| p.purchased_at)
            .max())
    }

    async fn list_purchases(&self) -> anyhow::Result<Vec<Purchase>> {
        let inner = self.lock()?;
        let mut purchases = inner.purchases.clone();
        purchases.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at).then(b.id.cmp(&a.id)));
        Ok(purchases)
    }
}
