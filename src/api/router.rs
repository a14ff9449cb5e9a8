use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::require_admin;
use super::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes: reads used by the ticker and player screens
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render))
        .route("/stocks", get(handlers::stocks::list))
        .route("/stocks/:code", get(handlers::stocks::detail))
        .route("/stocks/:code/history", get(handlers::stocks::history))
        .route("/events", get(handlers::events::list))
        .route("/current_event", get(handlers::events::current))
        .route("/activation", get(handlers::activation::current))
        .route("/accounts", get(handlers::accounts::list))
        .route("/accounts/:card_number", get(handlers::accounts::detail));

    // Admin routes: require Bearer token when API_TOKEN is set
    let admin = Router::new()
        // Stocks
        .route("/stocks", put(handlers::stocks::create))
        .route(
            "/stocks/:code",
            put(handlers::stocks::set_in_stock).delete(handlers::stocks::remove),
        )
        .route("/crash", put(handlers::crash::crash))
        // Events
        .route("/events", put(handlers::events::create))
        .route("/events/:id", delete(handlers::events::remove))
        // Sessions
        .route("/activation/open", put(handlers::activation::open))
        .route("/activation/close", put(handlers::activation::close))
        // Settings
        .route(
            "/settings",
            get(handlers::settings::list).put(handlers::settings::update),
        )
        // Accounts & purchases
        .route("/accounts", put(handlers::accounts::create))
        .route("/accounts/:card_number", delete(handlers::accounts::remove))
        .route(
            "/purchases",
            post(handlers::purchases::create).get(handlers::purchases::list),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
