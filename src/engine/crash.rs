use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;

use super::activation::ActivationManager;
use super::clock::Clock;
use super::price::{reason, PriceDecision, PriceEngine, StockOutcome};
use super::settings::SettingsProvider;
use crate::db::Store;
use crate::errors::{EngineError, EngineResult};
use crate::models::NewPriceChange;

/// Admin-triggered bulk loss applied to every stock in the catalog. Every
/// stock is locked for the duration and the drops are stored as one batch.
pub struct MarketCrash {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: Arc<SettingsProvider>,
    activations: Arc<ActivationManager>,
    prices: Arc<PriceEngine>,
}

impl MarketCrash {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        settings: Arc<SettingsProvider>,
        activations: Arc<ActivationManager>,
        prices: Arc<PriceEngine>,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
            activations,
            prices,
        }
    }

    pub async fn crash(&self) -> EngineResult<Vec<StockOutcome>> {
        if !self.activations.is_open().await? {
            tracing::info!("Market closed, crash ignored");
            return Ok(Vec::new());
        }

        let rules = self.settings.rules().await?;
        let loss = -Decimal::from(rules.market_crash_loss);

        let codes: BTreeSet<String> = self.store.list_stocks().await?.into_iter().map(|s| s.code).collect();
        let _guards = self.prices.lock_stocks(&codes).await;

        let mut decisions = Vec::with_capacity(codes.len());
        for code in codes {
            let decision = self
                .prices
                .plan_change_locked(&code, loss, loss, reason::MARKET_CRASH, &rules)
                .await?;
            decisions.push((code, decision));
        }

        let drops: Vec<NewPriceChange> = decisions
            .iter()
            .filter_map(|(code, decision)| match decision {
                PriceDecision::Accept(planned) => Some(planned.to_new(code, reason::MARKET_CRASH)),
                PriceDecision::Skip(_) => None,
            })
            .collect();
        let mut stored = self.store.append_price_changes(&drops, self.clock.now()).await?.into_iter();

        let mut outcomes = Vec::with_capacity(decisions.len());
        for (code, decision) in decisions {
            let outcome = match decision {
                PriceDecision::Skip(outcome) => outcome,
                PriceDecision::Accept(planned) => {
                    let change = stored.next().ok_or_else(|| {
                        EngineError::Store(anyhow::anyhow!("crash price for {code} was not stored"))
                    })?;
                    self.prices.recorded(reason::MARKET_CRASH, &planned, change)
                }
            };
            outcomes.push(StockOutcome {
                stock_code: code,
                outcome,
            });
        }

        let rejected = outcomes.iter().filter(|o| o.outcome.is_rejected()).count();
        tracing::warn!(
            loss_pct = rules.market_crash_loss,
            stocks = outcomes.len(),
            rejected,
            "Market crashed"
        );
        metrics::counter!("market_crashes_total").increment(1);

        Ok(outcomes)
    }
}
