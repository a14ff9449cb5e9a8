use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use super::clock::Clock;
use super::locks::KeyedLocks;
use super::price::{reason, PriceDecision, PriceEngine, PriceOutcome};
use super::settings::SettingsProvider;
use crate::db::Store;
use crate::errors::{EngineError, EngineResult};
use crate::models::{Account, Purchase};

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub purchase: Purchase,
    pub account: Account,
    pub price_outcome: PriceOutcome,
}

/// Sells one unit of a stock at its current price, then raises the price for
/// the next buyer.
///
/// The whole sequence runs under the stock's lock and then the account's
/// lock, always in that order, so two purchases of the same stock can never
/// read the same pre-increase price.
pub struct PurchaseDesk {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: Arc<SettingsProvider>,
    prices: Arc<PriceEngine>,
    account_locks: KeyedLocks<i64>,
}

impl PurchaseDesk {
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
            account_locks: KeyedLocks::new(),
        }
    }

    /// Both the stock and the account must exist before any lock is taken,
    /// so unknown keys never enter the lock registries.
    pub async fn purchase(&self, stock_code: &str, card_number: i64) -> EngineResult<PurchaseReceipt> {
        if self.store.get_stock(stock_code).await?.is_none() {
            return Err(EngineError::NotFound(format!("Stock {stock_code}")));
        }
        if self.store.get_account(card_number).await?.is_none() {
            return Err(EngineError::NotFound(format!("Account {card_number}")));
        }

        let _stock_guard = self.prices.lock_stock(stock_code).await;
        let _account_guard = self.account_locks.lock(&card_number).await;

        let price = self.prices.current_price(stock_code).await?;
        let rules = self.settings.rules().await?;
        let decision = self
            .prices
            .plan_change_locked(
                stock_code,
                Decimal::from(rules.stock_purchase_min_increase),
                Decimal::from(rules.stock_purchase_max_increase),
                reason::PURCHASE,
                &rules,
            )
            .await?;

        let next_price = match &decision {
            PriceDecision::Accept(planned) => Some(planned.to_new(stock_code, reason::PURCHASE)),
            PriceDecision::Skip(_) => None,
        };

        // Sale, debit and price bump land together or not at all
        let record = self
            .store
            .record_purchase(stock_code, card_number, price, self.clock.now(), next_price.as_ref())
            .await?;

        let price_outcome = match (decision, record.price_change) {
            (PriceDecision::Accept(planned), Some(change)) => {
                self.prices.recorded(reason::PURCHASE, &planned, change)
            }
            (PriceDecision::Skip(outcome), _) => outcome,
            (PriceDecision::Accept(_), None) => {
                return Err(EngineError::Store(anyhow::anyhow!(
                    "purchase of {stock_code} stored without its price change"
                )));
            }
        };

        tracing::info!(
            stock = %stock_code,
            card_number,
            price = %price,
            balance = %record.account.balance,
            next_price = ?price_outcome.new_price(),
            "Purchase recorded"
        );
        metrics::counter!("purchases_total").increment(1);

        Ok(PurchaseReceipt {
            purchase: record.purchase,
            account: record.account,
            price_outcome,
        })
    }

    #[cfg(test)]
    fn tracked_accounts(&self) -> usize {
        self.account_locks.len()
    }
}
