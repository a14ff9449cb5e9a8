use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use super::clock::Clock;
use super::price::{reason, round_price, MAX_PRICE};
use crate::db::Store;
use crate::errors::{EngineError, EngineResult};
use crate::models::{
    normalize_tags, Account, Event, NewAccount, NewEvent, NewPriceChange, NewStock, Stock, StockSummary,
};

const MAX_CODE_LEN: usize = 5;
const MAX_NAME_LEN: usize = 50;

fn require_text(field: &str, value: &str, max_len: usize) -> EngineResult<String> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > max_len {
        return Err(EngineError::InvalidArgument(format!(
            "{field} must be 1 to {max_len} characters"
        )));
    }
    Ok(value.to_string())
}

/// Event shocks are percentages in `MIN_EVENT_CHANGE..=MAX_EVENT_CHANGE`.
const MIN_EVENT_CHANGE: Decimal = Decimal::from_parts(100, 0, 0, true, 0);
const MAX_EVENT_CHANGE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

fn require_change(field: &str, pct: Decimal) -> EngineResult<()> {
    if pct < MIN_EVENT_CHANGE || pct > MAX_EVENT_CHANGE {
        return Err(EngineError::InvalidArgument(format!(
            "{field} must be between {MIN_EVENT_CHANGE} and {MAX_EVENT_CHANGE} percent"
        )));
    }
    Ok(())
}

/// Create/delete operations on stocks, events and accounts.
pub struct Catalog {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a stock and record its initial price. The initial price is
    /// written whether or not the market is open.
    pub async fn create_stock(&self, new: &NewStock) -> EngineResult<StockSummary> {
        let code = require_text("code", &new.code, MAX_CODE_LEN)?;
        let name = require_text("name", &new.name, MAX_NAME_LEN)?;
        let price = round_price(new.price);
        if price <= Decimal::ZERO {
            return Err(EngineError::InvalidArgument("price must be positive".into()));
        }
        if price > MAX_PRICE {
            return Err(EngineError::InvalidArgument(format!("price must not exceed {MAX_PRICE}")));
        }

        if self.store.get_stock(&code).await?.is_some() {
            return Err(EngineError::Conflict(format!("Stock code {code} already in use")));
        }

        let tags = normalize_tags(&new.tags);
        let now = self.clock.now();
        let initial = NewPriceChange {
            stock_code: code.clone(),
            new_price: price,
            reason: reason::INITIAL_PRICE.to_string(),
        };
        let (stock, initial) = self.store.create_stock(&code, &name, &tags, &initial, now).await?;

        tracing::info!(stock = %code, price = %price, tags = ?tags, "Stock created");

        Ok(StockSummary {
            stock,
            initial_price: initial.new_price,
            price: initial.new_price,
        })
    }

    pub async fn get_stock(&self, code: &str) -> EngineResult<Stock> {
        self.store
            .get_stock(code)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Stock {code}")))
    }

    /// Stock with its initial and current price.
    pub async fn summarize(&self, stock: Stock) -> EngineResult<StockSummary> {
        let initial = self.store.get_initial_price(&stock.code).await?;
        let current = self.store.get_current_price(&stock.code).await?;
        match (initial, current) {
            (Some(initial), Some(current)) => Ok(StockSummary {
                stock,
                initial_price: initial.new_price,
                price: current.new_price,
            }),
            _ => Err(EngineError::NotFound(format!("Price history for stock {}", stock.code))),
        }
    }

    pub async fn set_in_stock(&self, code: &str, in_stock: bool) -> EngineResult<Stock> {
        let stock = self
            .store
            .set_in_stock(code, in_stock)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Stock {code}")))?;
        tracing::info!(stock = %code, in_stock, "Stock availability changed");
        Ok(stock)
    }

    pub async fn delete_stock(&self, code: &str) -> EngineResult<()> {
        if !self.store.delete_stock(code).await? {
            return Err(EngineError::NotFound(format!("Stock {code}")));
        }
        tracing::info!(stock = %code, "Stock deleted");
        Ok(())
    }

    pub async fn create_event(&self, new: &NewEvent) -> EngineResult<Event> {
        require_change("change_min", new.change_min)?;
        require_change("change_max", new.change_max)?;

        let event = NewEvent {
            title: require_text("title", &new.title, MAX_NAME_LEN)?,
            body: new.body.trim().to_string(),
            breaking: new.breaking,
            video_url: new
                .video_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
            change_min: new.change_min,
            change_max: new.change_max,
            tags: normalize_tags(&new.tags),
        };

        let event = self.store.create_event(&event).await?;
        tracing::info!(event_id = %event.id, title = %event.title, tags = ?event.tags, "Event created");
        Ok(event)
    }

    pub async fn delete_event(&self, event_id: Uuid) -> EngineResult<()> {
        if !self.store.delete_event(event_id).await? {
            return Err(EngineError::NotFound(format!("Event {event_id}")));
        }
        tracing::info!(event_id = %event_id, "Event deleted");
        Ok(())
    }

    pub async fn create_account(&self, new: &NewAccount) -> EngineResult<Account> {
        let name = require_text("name", &new.name, MAX_NAME_LEN)?;
        if self.store.get_account(new.card_number).await?.is_some() {
            return Err(EngineError::Conflict(format!(
                "Card number {} already exists",
                new.card_number
            )));
        }

        let account = self
            .store
            .create_account(&NewAccount {
                card_number: new.card_number,
                name,
                balance: new.balance,
            })
            .await?;
        tracing::info!(card_number = account.card_number, "Account created");
        Ok(account)
    }

    pub async fn get_account(&self, card_number: i64) -> EngineResult<Account> {
        self.store
            .get_account(card_number)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Account {card_number}")))
    }

    pub async fn delete_account(&self, card_number: i64) -> EngineResult<()> {
        if !self.store.delete_account(card_number).await? {
            return Err(EngineError::NotFound(format!("Account {card_number}")));
        }
        tracing::info!(card_number, "Account deleted");
        Ok(())
    }
}
