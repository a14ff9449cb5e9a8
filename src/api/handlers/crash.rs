use axum::extract::State;

use super::{ok, ApiResult};
use crate::engine::StockOutcome;
use crate::AppState;

/// PUT /crash: drop every stock by `MarketCrashLoss` percent. An empty list
/// means the market was closed.
pub async fn crash(State(state): State<AppState>) -> ApiResult<Vec<StockOutcome>> {
    ok(state.market.crash().crash().await?)
}
