use axum::extract::{Query, State};
use serde::Deserialize;

use super::{ok, ApiResult};
use crate::errors::EngineError;
use crate::models::MarketActivation;
use crate::AppState;

pub async fn current(State(state): State<AppState>) -> ApiResult<MarketActivation> {
    match state.market.activations().current().await? {
        Some(session) => ok(session),
        None => Err(EngineError::MarketClosed.into()),
    }
}

/// PUT /activation/open
pub async fn open(State(state): State<AppState>) -> ApiResult<MarketActivation> {
    ok(state.market.activations().open().await?)
}

#[derive(Deserialize)]
pub struct CloseQuery {
    /// Minutes until the session ends. Zero closes immediately.
    #[serde(default)]
    pub ends_in: i64,
}

/// PUT /activation/close?ends_in=<minutes>
pub async fn close(
    State(state): State<AppState>,
    Query(query): Query<CloseQuery>,
) -> ApiResult<MarketActivation> {
    ok(state.market.activations().close(query.ends_in).await?)
}
