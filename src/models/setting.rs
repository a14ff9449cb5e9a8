use serde::{Deserialize, Serialize};
use std::fmt;

/// Tunable simulation parameters. Absent rows fall back to `default_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SettingKey {
    NewsMinDuration,
    NewsMaxDuration,
    StockMaxPercentLoss,
    StockPurchaseMinIncrease,
    StockPurchaseMaxIncrease,
    StockNoPurchaseMinLoss,
    StockNoPurchaseMaxLoss,
    StockNoPurchaseLossTime,
    MarketCrashLoss,
}

impl SettingKey {
    pub const ALL: [SettingKey; 9] = [
        SettingKey::NewsMinDuration,
        SettingKey::NewsMaxDuration,
        SettingKey::StockMaxPercentLoss,
        SettingKey::StockPurchaseMinIncrease,
        SettingKey::StockPurchaseMaxIncrease,
        SettingKey::StockNoPurchaseMinLoss,
        SettingKey::StockNoPurchaseMaxLoss,
        SettingKey::StockNoPurchaseLossTime,
        SettingKey::MarketCrashLoss,
    ];

    /// Key as stored in the settings table.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::NewsMinDuration => "NewsMinDuration",
            SettingKey::NewsMaxDuration => "NewsMaxDuration",
            SettingKey::StockMaxPercentLoss => "StockMaxPercentLoss",
            SettingKey::StockPurchaseMinIncrease => "StockPurchaseMinIncrease",
            SettingKey::StockPurchaseMaxIncrease => "StockPurchaseMaxIncrease",
            SettingKey::StockNoPurchaseMinLoss => "StockNoPurchaseMinLoss",
            SettingKey::StockNoPurchaseMaxLoss => "StockNoPurchaseMaxLoss",
            SettingKey::StockNoPurchaseLossTime => "StockNoPurchaseLossTime",
            SettingKey::MarketCrashLoss => "MarketCrashLoss",
        }
    }

    /// Accepts the stored PascalCase name or the SCREAMING_SNAKE_CASE alias.
    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|key| {
            key.as_str() == s || key.as_str().eq_ignore_ascii_case(&s.replace('_', ""))
        })
    }

    pub fn default_value(&self) -> i64 {
        match self {
            SettingKey::NewsMinDuration => 10,
            SettingKey::NewsMaxDuration => 15,
            SettingKey::StockMaxPercentLoss => 80,
            SettingKey::StockPurchaseMinIncrease => 20,
            SettingKey::StockPurchaseMaxIncrease => 30,
            SettingKey::StockNoPurchaseMinLoss => 2,
            SettingKey::StockNoPurchaseMaxLoss => 5,
            SettingKey::StockNoPurchaseLossTime => 3,
            SettingKey::MarketCrashLoss => 90,
        }
    }

    /// Inclusive range a stored override must fall into.
    pub fn bounds(&self) -> (i64, i64) {
        match self {
            SettingKey::NewsMinDuration
            | SettingKey::NewsMaxDuration
            | SettingKey::StockNoPurchaseLossTime => (0, i64::from(i32::MAX)),
            SettingKey::StockPurchaseMinIncrease | SettingKey::StockPurchaseMaxIncrease => (0, 1_000),
            SettingKey::StockMaxPercentLoss
            | SettingKey::StockNoPurchaseMinLoss
            | SettingKey::StockNoPurchaseMaxLoss
            | SettingKey::MarketCrashLoss => (0, 100),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
