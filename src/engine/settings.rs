use std::sync::Arc;

use crate::db::Store;
use crate::errors::{EngineError, EngineResult};
use crate::models::SettingKey;

/// Every tunable resolved to a concrete value, defaults filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketRules {
    /// News event duration bounds, minutes.
    pub news_min_duration: i64,
    pub news_max_duration: i64,
    /// Largest drop from the initial price a stored price may reach, percent.
    pub stock_max_percent_loss: i64,
    pub stock_purchase_min_increase: i64,
    pub stock_purchase_max_increase: i64,
    pub stock_no_purchase_min_loss: i64,
    pub stock_no_purchase_max_loss: i64,
    /// Idle time before the no-purchase decay kicks in, minutes.
    pub stock_no_purchase_loss_time: i64,
    pub market_crash_loss: i64,
}

impl Default for MarketRules {
    fn default() -> Self {
        Self::resolve(|_| None)
    }
}

impl MarketRules {
    fn resolve(lookup: impl Fn(SettingKey) -> Option<i64>) -> Self {
        let get = |key: SettingKey| lookup(key).unwrap_or_else(|| key.default_value());
        Self {
            news_min_duration: get(SettingKey::NewsMinDuration),
            news_max_duration: get(SettingKey::NewsMaxDuration),
            stock_max_percent_loss: get(SettingKey::StockMaxPercentLoss),
            stock_purchase_min_increase: get(SettingKey::StockPurchaseMinIncrease),
            stock_purchase_max_increase: get(SettingKey::StockPurchaseMaxIncrease),
            stock_no_purchase_min_loss: get(SettingKey::StockNoPurchaseMinLoss),
            stock_no_purchase_max_loss: get(SettingKey::StockNoPurchaseMaxLoss),
            stock_no_purchase_loss_time: get(SettingKey::StockNoPurchaseLossTime),
            market_crash_loss: get(SettingKey::MarketCrashLoss),
        }
    }

    /// `(lower, upper)` news duration in minutes, tolerant of swapped settings.
    pub fn news_duration_range(&self) -> (i64, i64) {
        ordered(self.news_min_duration, self.news_max_duration)
    }
}

pub(crate) fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn validate(key: SettingKey, value: i64) -> EngineResult<()> {
    if value == 0 {
        return Ok(());
    }
    let (min, max) = key.bounds();
    if value < min || value > max {
        return Err(EngineError::InvalidSetting {
            key,
            value,
            reason: format!("must be between {min} and {max}"),
        });
    }
    Ok(())
}

/// Resolves tunables from the store. Nothing is cached: a change is visible
/// to the very next engine call.
pub struct SettingsProvider {
    store: Arc<dyn Store>,
}

impl SettingsProvider {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: SettingKey) -> EngineResult<i64> {
        let value = self.store.get_setting(key).await?;
        Ok(value.unwrap_or_else(|| key.default_value()))
    }

    /// Store an override. Zero removes the override and restores the default.
    pub async fn set(&self, key: SettingKey, value: i64) -> EngineResult<()> {
        validate(key, value)?;
        self.write(key, value).await
    }

    /// Apply several overrides. Nothing is written unless every value is valid.
    pub async fn set_many(&self, updates: &[(SettingKey, i64)]) -> EngineResult<()> {
        for &(key, value) in updates {
            validate(key, value)?;
        }
        for &(key, value) in updates {
            self.write(key, value).await?;
        }
        Ok(())
    }

    async fn write(&self, key: SettingKey, value: i64) -> EngineResult<()> {
        if value == 0 {
            self.store.delete_setting(key).await?;
            tracing::info!(key = %key, default = key.default_value(), "Setting reverted to default");
            return Ok(());
        }

        self.store.upsert_setting(key, value).await?;
        tracing::info!(key = %key, value, "Setting updated");
        Ok(())
    }

    /// Every key with its effective value, in declaration order.
    pub async fn all(&self) -> EngineResult<Vec<(SettingKey, i64)>> {
        let rules = self.store.list_settings().await?;
        Ok(SettingKey::ALL
            .into_iter()
            .map(|key| (key, rules.get(&key).copied().unwrap_or_else(|| key.default_value())))
            .collect())
    }

    /// Resolve every tunable with a single store read.
    pub async fn rules(&self) -> EngineResult<MarketRules> {
        let stored = self.store.list_settings().await?;
        Ok(MarketRules::resolve(|key| stored.get(&key).copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn provider() -> SettingsProvider {
        SettingsProvider::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let settings = provider();
        assert_eq!(settings.get(SettingKey::NewsMinDuration).await.unwrap(), 10);
        assert_eq!(settings.rules().await.unwrap(), MarketRules::default());
    }

    #[tokio::test]
    async fn test_set_overrides_and_zero_reverts() {
        let settings = provider();

        settings.set(SettingKey::MarketCrashLoss, 50).await.unwrap();
        assert_eq!(settings.get(SettingKey::MarketCrashLoss).await.unwrap(), 50);
        assert_eq!(settings.rules().await.unwrap().market_crash_loss, 50);

        settings.set(SettingKey::MarketCrashLoss, 0).await.unwrap();
        assert_eq!(settings.get(SettingKey::MarketCrashLoss).await.unwrap(), 90);
    }

    #[tokio::test]
    async fn test_out_of_range_rejected() {
        let settings = provider();

        let err = settings.set(SettingKey::StockMaxPercentLoss, 150).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSetting { value: 150, .. }));

        let err = settings.set(SettingKey::NewsMinDuration, -1).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSetting { .. }));

        // The stored value is untouched
        assert_eq!(settings.get(SettingKey::StockMaxPercentLoss).await.unwrap(), 80);
    }

    #[tokio::test]
    async fn test_set_many_is_all_or_nothing() {
        let settings = provider();

        let err = settings
            .set_many(&[(SettingKey::NewsMinDuration, 5), (SettingKey::MarketCrashLoss, 101)])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSetting { key: SettingKey::MarketCrashLoss, .. }));
        assert_eq!(settings.get(SettingKey::NewsMinDuration).await.unwrap(), 10);

        settings
            .set_many(&[(SettingKey::NewsMinDuration, 5), (SettingKey::MarketCrashLoss, 50)])
            .await
            .unwrap();
        assert_eq!(settings.get(SettingKey::NewsMinDuration).await.unwrap(), 5);
        assert_eq!(settings.get(SettingKey::MarketCrashLoss).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_all_lists_every_key() {
        let settings = provider();
        settings.set(SettingKey::NewsMaxDuration, 20).await.unwrap();

        let all = settings.all().await.unwrap();
        assert_eq!(all.len(), SettingKey::ALL.len());
        assert!(all.contains(&(SettingKey::NewsMaxDuration, 20)));
        assert!(all.contains(&(SettingKey::StockNoPurchaseLossTime, 3)));
    }

    #[test]
    fn test_swapped_news_range_is_ordered() {
        let rules = MarketRules {
            news_min_duration: 15,
            news_max_duration: 10,
            ..MarketRules::default()
        };
        assert_eq!(rules.news_duration_range(), (10, 15));
    }
}
