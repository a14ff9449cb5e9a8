use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::clock::Clock;
use super::price::{reason, PriceEngine, PriceOutcome, StockOutcome};
use super::settings::SettingsProvider;
use crate::db::Store;
use crate::errors::EngineResult;
use crate::models::Stock;

/// Punishes stocks that nobody has bought and whose price has not moved
/// within the stale window.
pub struct NoPurchaseDecay {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: Arc<SettingsProvider>,
    prices: Arc<PriceEngine>,
}

impl NoPurchaseDecay {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        settings: Arc<SettingsProvider>,
        prices: Arc<PriceEngine>,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
            prices,
        }
    }

    /// Latest of creation, last purchase and last price change.
    pub async fn last_activity(&self, stock: &Stock) -> EngineResult<DateTime<Utc>> {
        let last_purchase = self.store.latest_purchase_at(&stock.code).await?;
        let last_change = self
            .store
            .get_current_price(&stock.code)
            .await?
            .map(|change| change.changed_at);

        Ok([Some(stock.created_at), last_purchase, last_change]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(stock.created_at))
    }

    /// Decay the stock if it has been idle for the configured window.
    /// Returns `None` when the stock is still fresh.
    pub async fn maybe_decay(&self, stock: &Stock) -> EngineResult<Option<PriceOutcome>> {
        let _guard = self.prices.lock_stock(&stock.code).await;

        let rules = self.settings.rules().await?;
        let idle = self.clock.now() - self.last_activity(stock).await?;
        if idle < Duration::minutes(rules.stock_no_purchase_loss_time) {
            return Ok(None);
        }

        let outcome = self
            .prices
            .apply_change_locked(
                &stock.code,
                -Decimal::from(rules.stock_no_purchase_min_loss),
                -Decimal::from(rules.stock_no_purchase_max_loss),
                reason::NO_PURCHASE,
            )
            .await?;

        if outcome.is_recorded() {
            tracing::info!(
                stock = %stock.code,
                idle_secs = idle.num_seconds(),
                "Idle stock decayed"
            );
            metrics::counter!("stock_decays_total").increment(1);
        }

        Ok(Some(outcome))
    }

    /// Run `maybe_decay` over every stock currently offered for sale.
    pub async fn sweep(&self) -> EngineResult<Vec<StockOutcome>> {
        let mut outcomes = Vec::new();
        for stock in self.store.list_stocks().await? {
            if !stock.in_stock {
                continue;
            }
            if let Some(outcome) = self.maybe_decay(&stock).await? {
                outcomes.push(StockOutcome {
                    stock_code: stock.code,
                    outcome,
                });
            }
        }
        Ok(outcomes)
    }
}
