use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::AppError;
use crate::AppState;

/// Bearer-token authentication for admin routes.
///
/// If `API_TOKEN` is configured, every request must carry
/// `Authorization: Bearer <token>` matching it. Otherwise the check is
/// skipped (dev mode).
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.config.api_token.as_deref() else {
        return next.run(req).await;
    };

    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if token == expected => next.run(req).await,
        _ => {
            tracing::warn!(path = %req.uri().path(), "Rejected admin request");
            AppError::Unauthorized.into_response()
        }
    }
}
