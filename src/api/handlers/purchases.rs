use axum::extract::State;
use axum::Json;

use super::{ok, ApiResult};
use crate::engine::PurchaseReceipt;
use crate::errors::AppError;
use crate::models::{NewPurchase, Purchase};
use crate::AppState;

/// POST /purchases: sell one unit at the current price.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewPurchase>,
) -> ApiResult<PurchaseReceipt> {
    ok(state
        .market
        .purchases()
        .purchase(&body.stock_code, body.card_number)
        .await?)
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Purchase>> {
    ok(state.market.store().list_purchases().await.map_err(AppError::Internal)?)
}
