mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use fandango::api::router::create_router;
use fandango::config::AppConfig;
use fandango::AppState;

const TOKEN: &str = "test-admin-token";

fn build_test_app() -> (Router, common::TestMarket) {
    let t = common::setup_market();
    let config = AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        api_token: Some(TOKEN.into()),
        ..AppConfig::default()
    };

    let state = AppState {
        market: t.market.clone(),
        config,
        metrics_handle: fandango::metrics::init_metrics(),
    };

    (create_router(state), t)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>, admin: bool) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if admin {
        builder = builder.header("authorization", format!("Bearer {TOKEN}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn price(value: &Value) -> rust_decimal::Decimal {
    common::dec(value.as_str().expect("decimal serialized as string"))
}

#[tokio::test]
async fn test_health_check() {
    let (app, _t) = build_test_app();

    let (status, json) = send(&app, Method::GET, "/health", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _t) = build_test_app();

    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let (app, _t) = build_test_app();
    let stock = json!({ "code": "ABC", "name": "Alphabet Soup", "price": "100.00" });

    let (status, json) = send(&app, Method::PUT, "/stocks", Some(stock.clone()), false).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (status, _) = send(&app, Method::GET, "/settings", None, false).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(&app, Method::PUT, "/stocks", Some(stock), true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["code"], "ABC");

    // Reads stay public
    let (status, json) = send(&app, Method::GET, "/stocks", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stock_lifecycle() {
    let (app, _t) = build_test_app();
    let stock = json!({ "code": "ABC", "name": "Alphabet Soup", "tags": ["food"], "price": "12.50" });

    send(&app, Method::PUT, "/stocks", Some(stock.clone()), true).await;
    let (status, _) = send(&app, Method::PUT, "/stocks", Some(stock), true).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(&app, Method::GET, "/stocks/ABC", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(price(&json["data"]["price"]), common::dec("12.5"));
    assert_eq!(json["data"]["tags"], json!(["food"]));

    let (status, json) = send(&app, Method::GET, "/stocks/ABC/history", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["reason"], "Initial Price");

    let (status, json) = send(&app, Method::PUT, "/stocks/ABC?in_stock=false", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["in_stock"], false);

    let (status, _) = send(&app, Method::DELETE, "/stocks/ABC", None, true).await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = send(&app, Method::GET, "/stocks/ABC", None, false).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_invalid_stock_rejected() {
    let (app, _t) = build_test_app();
    let stock = json!({ "code": "TOOLONG", "name": "Too Long", "price": "1.00" });

    let (status, _) = send(&app, Method::PUT, "/stocks", Some(stock), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_activation_and_current_event() {
    let (app, _t) = build_test_app();

    let (status, _) = send(&app, Method::GET, "/activation", None, false).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, "/current_event", None, false).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let event = json!({
        "title": "Moon landing",
        "body": "Space stocks soar",
        "change_min": "5",
        "change_max": "10",
        "tags": ["space"]
    });
    let (status, json) = send(&app, Method::PUT, "/events", Some(event), true).await;
    assert_eq!(status, StatusCode::OK);
    let event_id = json["data"]["id"].as_str().unwrap().to_string();

    let (status, json) = send(&app, Method::PUT, "/activation/open", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["ends_at"].is_null());

    let (status, json) = send(&app, Method::GET, "/current_event", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["id"], event_id.as_str());

    let (status, json) = send(&app, Method::PUT, "/activation/close?ends_in=5", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["ends_at"].is_string());

    let (status, _) = send(&app, Method::PUT, "/activation/close?ends_in=-1", None, true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, Method::PUT, "/activation/close?ends_in=99999999999999", None, true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_event_with_unbounded_change_rejected() {
    let (app, _t) = build_test_app();

    let event = json!({
        "title": "Hyperinflation",
        "body": "",
        "breaking": true,
        "change_min": "1",
        "change_max": "1000000000000000000000000000",
        "tags": ["space"]
    });
    let (status, _) = send(&app, Method::PUT, "/events", Some(event), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, Method::GET, "/events", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_settings_update() {
    let (app, _t) = build_test_app();

    let body = json!({ "settings": { "NewsMinDuration": 5, "MARKET_CRASH_LOSS": 50 } });
    let (status, json) = send(&app, Method::PUT, "/settings", Some(body), true).await;
    assert_eq!(status, StatusCode::OK);

    let entries = json["data"].as_array().unwrap();
    assert_eq!(entries.len(), 9);
    let crash = entries.iter().find(|e| e["key"] == "MarketCrashLoss").unwrap();
    assert_eq!(crash["value"], 50);
    assert_eq!(crash["default"], 90);

    let body = json!({ "settings": { "StockMaxPercentLoss": 150 } });
    let (status, _) = send(&app, Method::PUT, "/settings", Some(body), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = json!({ "settings": { "NoSuchKnob": 1 } });
    let (status, _) = send(&app, Method::PUT, "/settings", Some(body), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_purchase_flow() {
    let (app, _t) = build_test_app();

    send(
        &app,
        Method::PUT,
        "/stocks",
        Some(json!({ "code": "BUY", "name": "Buy Corp", "price": "10.00" })),
        true,
    )
    .await;
    let (status, _) = send(
        &app,
        Method::PUT,
        "/accounts",
        Some(json!({ "card_number": 4242, "name": "Sam", "balance": "50.00" })),
        true,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    send(&app, Method::PUT, "/activation/open", None, true).await;

    let purchase = json!({ "stock_code": "BUY", "card_number": 4242 });
    let (status, json) = send(&app, Method::POST, "/purchases", Some(purchase), true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(price(&json["data"]["purchase"]["purchase_price"]), common::dec("10"));
    assert_eq!(price(&json["data"]["account"]["balance"]), common::dec("40"));
    assert_eq!(json["data"]["price_outcome"]["outcome"], "recorded");

    let (status, json) = send(&app, Method::GET, "/accounts/4242", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(price(&json["data"]["balance"]), common::dec("40"));

    let (status, json) = send(&app, Method::GET, "/purchases", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let purchase = json!({ "stock_code": "BUY", "card_number": 1 });
    let (status, _) = send(&app, Method::POST, "/purchases", Some(purchase), true).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_crash_endpoint() {
    let (app, _t) = build_test_app();

    let (status, json) = send(&app, Method::PUT, "/crash", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], json!([]));
}
