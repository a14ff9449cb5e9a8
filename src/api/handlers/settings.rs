use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ok, ApiResult};
use crate::errors::AppError;
use crate::models::SettingKey;
use crate::AppState;

#[derive(Serialize)]
pub struct SettingEntry {
    pub key: SettingKey,
    pub value: i64,
    pub default: i64,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<SettingEntry>> {
    let entries = state
        .market
        .settings()
        .all()
        .await?
        .into_iter()
        .map(|(key, value)| SettingEntry {
            key,
            value,
            default: key.default_value(),
        })
        .collect();
    ok(entries)
}

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: HashMap<String, i64>,
}

/// PUT /settings: a value of 0 restores the default.
pub async fn update(
    State(state): State<AppState>,
    Json(body): Json<UpdateSettingsRequest>,
) -> ApiResult<Vec<SettingEntry>> {
    let mut updates = Vec::with_capacity(body.settings.len());
    for (name, value) in &body.settings {
        let key = SettingKey::from_name(name)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown setting {name}")))?;
        updates.push((key, *value));
    }

    if updates.is_empty() {
        return Err(AppError::BadRequest("No settings provided".into()));
    }

    state.market.settings().set_many(&updates).await?;
    list(State(state)).await
}
