pub mod accounts;
pub mod activation;
pub mod crash;
pub mod events;
pub mod health;
pub mod metrics;
pub mod purchases;
pub mod settings;
pub mod stocks;

use axum::Json;
use serde::Serialize;

use crate::errors::AppError;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse { success: true, data }))
}
