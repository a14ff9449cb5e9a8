use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for market_activations table (one trading session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MarketActivation {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl MarketActivation {
    /// A session is open while it has no end time or its end time is ahead.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.map_or(true, |ends_at| ends_at > now)
    }

    /// True once `close` has scheduled an end that has not yet elapsed.
    pub fn is_closing_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|ends_at| ends_at > now)
    }
}

/// Database row for event_activations table: an event bound to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EventActivation {
    pub id: Uuid,
    pub market_activation_id: Uuid,
    pub event_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl EventActivation {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at > now
    }
}
