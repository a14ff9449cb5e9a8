use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use super::activation::ActivationManager;
use super::clock::Clock;
use super::locks::KeyedLocks;
use super::settings::{ordered, MarketRules, SettingsProvider};
use super::SharedRng;
use crate::db::Store;
use crate::errors::{EngineError, EngineResult};
use crate::models::{NewPriceChange, PriceChange};

/// Reason labels written to price history.
pub mod reason {
    pub const INITIAL_PRICE: &str = "Initial Price";
    pub const PURCHASE: &str = "Purchase";
    pub const NEW_EVENT: &str = "New Event";
    pub const NO_PURCHASE: &str = "No purchase";
    pub const MARKET_CRASH: &str = "Market Crash";
}

/// Largest price a price point can hold.
pub const MAX_PRICE: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);

/// What happened to a requested price change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PriceOutcome {
    /// A new price point was appended.
    Recorded(PriceChange),
    /// The new price would have breached the loss floor and was discarded.
    Rejected { attempted: Decimal, drift_pct: Decimal },
    /// The new price is above `MAX_PRICE` or not representable; discarded.
    OutOfRange { current: Decimal, pct: Decimal },
    /// No session is open; nothing was read or written.
    MarketClosed,
}

impl PriceOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, PriceOutcome::Recorded(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, PriceOutcome::Rejected { .. } | PriceOutcome::OutOfRange { .. })
    }

    pub fn new_price(&self) -> Option<Decimal> {
        match self {
            PriceOutcome::Recorded(change) => Some(change.new_price),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockOutcome {
    pub stock_code: String,
    #[serde(flatten)]
    pub outcome: PriceOutcome,
}

/// A price move that passed every rule and is ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlannedChange {
    pub from: Decimal,
    pub to: Decimal,
    pub pct: Decimal,
}

impl PlannedChange {
    pub fn to_new(&self, code: &str, reason: &str) -> NewPriceChange {
        NewPriceChange {
            stock_code: code.to_string(),
            new_price: self.to,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PriceDecision {
    Skip(PriceOutcome),
    Accept(PlannedChange),
}

/// Stored prices carry two decimals.
pub fn round_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Move `current` by `pct` percent of itself. `None` on overflow.
pub fn propose_price(current: Decimal, pct: Decimal) -> Option<Decimal> {
    let delta = current.checked_mul(pct)?.checked_div(Decimal::ONE_HUNDRED)?;
    Some(round_price(current.checked_add(delta)?))
}

/// Percentage distance of `price` from the stock's initial price. `None` for
/// a zero initial price or on overflow.
pub fn drift_pct(price: Decimal, initial: Decimal) -> Option<Decimal> {
    price
        .checked_sub(initial)?
        .checked_div(initial)?
        .checked_mul(Decimal::ONE_HUNDRED)
}

/// A price may be stored only while its drift stays strictly above `-max_loss`.
pub fn within_floor(drift_pct: Decimal, max_percent_loss: i64) -> bool {
    drift_pct > -Decimal::from(max_percent_loss)
}

/// Records price points for stocks, subject to the session and floor rules.
pub struct PriceEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: Arc<SettingsProvider>,
    activations: Arc<ActivationManager>,
    rng: SharedRng,
    stock_locks: KeyedLocks<String>,
}

impl PriceEngine {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        settings: Arc<SettingsProvider>,
        activations: Arc<ActivationManager>,
        rng: SharedRng,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
            activations,
            rng,
            stock_locks: KeyedLocks::new(),
        }
    }

    /// Serialize every mutation of one stock. Hold the guard for the whole
    /// read-modify-write sequence.
    pub async fn lock_stock(&self, code: &str) -> OwnedMutexGuard<()> {
        self.stock_locks.lock(&code.to_string()).await
    }

    /// Lock several stocks. The set's ordering is the global lock order.
    pub(crate) async fn lock_stocks(&self, codes: &BTreeSet<String>) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(codes.len());
        for code in codes {
            guards.push(self.stock_locks.lock(code).await);
        }
        guards
    }

    #[cfg(test)]
    pub(crate) fn tracked_stocks(&self) -> usize {
        self.stock_locks.len()
    }

    /// Move the stock's price by a random percentage in `[min_pct, max_pct]`.
    pub async fn apply_change(
        &self,
        code: &str,
        min_pct: Decimal,
        max_pct: Decimal,
        reason: &str,
    ) -> EngineResult<PriceOutcome> {
        let _guard = self.lock_stock(code).await;
        self.apply_change_locked(code, min_pct, max_pct, reason).await
    }

    /// Same as `apply_change`; the caller must already hold `lock_stock(code)`.
    pub(crate) async fn apply_change_locked(
        &self,
        code: &str,
        min_pct: Decimal,
        max_pct: Decimal,
        reason: &str,
    ) -> EngineResult<PriceOutcome> {
        let rules = self.settings.rules().await?;
        let planned = match self.plan_change_locked(code, min_pct, max_pct, reason, &rules).await? {
            PriceDecision::Skip(outcome) => return Ok(outcome),
            PriceDecision::Accept(planned) => planned,
        };

        let change = self
            .store
            .append_price_change(code, planned.to, reason, self.clock.now())
            .await?;
        Ok(self.recorded(reason, &planned, change))
    }

    /// Decide the next price without writing it. Rejections are logged and
    /// counted here; the caller must hold the stock's lock until the accepted
    /// change is stored.
    pub(crate) async fn plan_change_locked(
        &self,
        code: &str,
        min_pct: Decimal,
        max_pct: Decimal,
        reason: &str,
        rules: &MarketRules,
    ) -> EngineResult<PriceDecision> {
        if !self.activations.is_open().await? {
            tracing::debug!(stock = %code, reason, "Market closed, price change skipped");
            return Ok(PriceDecision::Skip(PriceOutcome::MarketClosed));
        }

        let initial = self.initial_price(code).await?;
        let current = self.current_price(code).await?;

        let (lo, hi) = ordered(min_pct, max_pct);
        let pct = self.sample_percent(lo, hi);

        let attempted = match propose_price(current, pct) {
            Some(price) if price <= MAX_PRICE => price,
            _ => {
                tracing::warn!(
                    stock = %code,
                    reason,
                    current = %current,
                    pct = %pct.round_dp(2),
                    max = %MAX_PRICE,
                    "Price change out of range"
                );
                metrics::counter!("price_changes_rejected_total", "reason" => reason.to_string()).increment(1);
                return Ok(PriceDecision::Skip(PriceOutcome::OutOfRange { current, pct }));
            }
        };

        let Some(drift) = drift_pct(attempted, initial) else {
            tracing::warn!(stock = %code, initial = %initial, "Drift cannot be computed, price change skipped");
            return Ok(PriceDecision::Skip(PriceOutcome::Rejected {
                attempted,
                drift_pct: Decimal::ZERO,
            }));
        };

        if !within_floor(drift, rules.stock_max_percent_loss) {
            let floor = -rules.stock_max_percent_loss;
            tracing::debug!(
                stock = %code,
                reason,
                current = %current,
                attempted = %attempted,
                drift_pct = %drift.round_dp(2),
                floor,
                "Price change rejected by loss floor"
            );
            metrics::counter!("price_changes_rejected_total", "reason" => reason.to_string()).increment(1);
            return Ok(PriceDecision::Skip(PriceOutcome::Rejected {
                attempted,
                drift_pct: drift.round_dp(4),
            }));
        }

        Ok(PriceDecision::Accept(PlannedChange {
            from: current,
            to: attempted,
            pct,
        }))
    }

    /// Log and count a stored change.
    pub(crate) fn recorded(&self, reason: &str, planned: &PlannedChange, change: PriceChange) -> PriceOutcome {
        tracing::info!(
            stock = %change.stock_code,
            reason,
            from = %planned.from,
            to = %change.new_price,
            pct = %planned.pct.round_dp(2),
            "Price changed"
        );
        metrics::counter!("price_changes_total", "reason" => reason.to_string()).increment(1);
        PriceOutcome::Recorded(change)
    }

    /// Price of the stock's latest price point.
    pub async fn current_price(&self, code: &str) -> EngineResult<Decimal> {
        self.store
            .get_current_price(code)
            .await?
            .map(|change| change.new_price)
            .ok_or_else(|| EngineError::NotFound(format!("Price history for stock {code}")))
    }

    /// Price of the stock's first price point.
    pub async fn initial_price(&self, code: &str) -> EngineResult<Decimal> {
        self.store
            .get_initial_price(code)
            .await?
            .map(|change| change.new_price)
            .ok_or_else(|| EngineError::NotFound(format!("Price history for stock {code}")))
    }

    pub async fn history(&self, code: &str) -> EngineResult<Vec<PriceChange>> {
        if self.store.get_stock(code).await?.is_none() {
            return Err(EngineError::NotFound(format!("Stock {code}")));
        }
        Ok(self.store.price_history(code).await?)
    }

    /// Uniform draw in `[lo, hi]`. Equal bounds return exactly `lo`.
    fn sample_percent(&self, lo: Decimal, hi: Decimal) -> Decimal {
        if lo == hi {
            return lo;
        }
        let t: f64 = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(0.0..=1.0)
        };
        lo + (hi - lo) * Decimal::from_f64(t).unwrap_or(Decimal::ZERO)
    }
}
