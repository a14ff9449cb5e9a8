use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A news template. `change_min`/`change_max` are percentage bounds applied
/// to every stock sharing a tag with the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub breaking: bool,
    pub video_url: Option<String>,
    pub change_min: Decimal,
    pub change_max: Decimal,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub breaking: bool,
    #[serde(default)]
    pub video_url: Option<String>,
    pub change_min: Decimal,
    pub change_max: Decimal,
    #[serde(default)]
    pub tags: Vec<String>,
}
