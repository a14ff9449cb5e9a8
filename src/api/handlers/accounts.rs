use axum::extract::{Path, State};
use axum::Json;

use super::{ok, ApiResult};
use crate::errors::AppError;
use crate::models::{Account, NewAccount};
use crate::AppState;

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Account>> {
    ok(state.market.store().list_accounts().await.map_err(AppError::Internal)?)
}

pub async fn detail(
    State(state): State<AppState>,
    Path(card_number): Path<i64>,
) -> ApiResult<Account> {
    ok(state.market.catalog().get_account(card_number).await?)
}

/// PUT /accounts
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewAccount>,
) -> ApiResult<Account> {
    ok(state.market.catalog().create_account(&body).await?)
}

pub async fn remove(State(state): State<AppState>, Path(card_number): Path<i64>) -> ApiResult<i64> {
    state.market.catalog().delete_account(card_number).await?;
    ok(card_number)
}
