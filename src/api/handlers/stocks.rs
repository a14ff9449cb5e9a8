use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::{ok, ApiResult};
use crate::models::{NewStock, PriceChange, Stock, StockSummary};
use crate::AppState;

/// GET /stocks, applying any pending no-purchase decay first.
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<StockSummary>> {
    ok(state.market.list_stocks().await?)
}

pub async fn detail(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<StockSummary> {
    ok(state.market.stock_summary(&code).await?)
}

pub async fn history(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Vec<PriceChange>> {
    ok(state.market.prices().history(&code).await?)
}

/// PUT /stocks
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewStock>,
) -> ApiResult<StockSummary> {
    ok(state.market.catalog().create_stock(&body).await?)
}

#[derive(Deserialize)]
pub struct InStockQuery {
    pub in_stock: bool,
}

/// PUT /stocks/:code?in_stock=true|false
pub async fn set_in_stock(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<InStockQuery>,
) -> ApiResult<Stock> {
    ok(state.market.catalog().set_in_stock(&code, query.in_stock).await?)
}

pub async fn remove(State(state): State<AppState>, Path(code): Path<String>) -> ApiResult<String> {
    state.market.catalog().delete_stock(&code).await?;
    ok(code)
}
