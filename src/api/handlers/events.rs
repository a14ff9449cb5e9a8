use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use super::{ok, ApiResult};
use crate::errors::AppError;
use crate::models::{Event, NewEvent};
use crate::AppState;

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Event>> {
    ok(state.market.store().list_events().await.map_err(AppError::Internal)?)
}

/// GET /current_event: may roll a new event and move prices.
pub async fn current(State(state): State<AppState>) -> ApiResult<Event> {
    match state.market.events().current_event().await? {
        Some(event) => ok(event),
        None => Err(AppError::NotFound("No active event".into())),
    }
}

/// PUT /events
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewEvent>,
) -> ApiResult<Event> {
    ok(state.market.catalog().create_event(&body).await?)
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Uuid> {
    state.market.catalog().delete_event(id).await?;
    ok(id)
}
