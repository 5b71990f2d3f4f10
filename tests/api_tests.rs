//! API integration tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use royalbit_sheetforge::api::build_router;
use royalbit_sheetforge::api::handlers::ApiResponse;
use royalbit_sheetforge::api::server::ApiConfig;
use royalbit_sheetforge::engine::spawn_engine;
use royalbit_sheetforge::types::EngineConfig;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(width: usize, height: usize) -> Router {
    let (engine, _worker) = spawn_engine(EngineConfig::new(width, height).unwrap()).unwrap();
    build_router(engine)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIG / ENVELOPE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_config_custom() {
    let config = ApiConfig {
        host: "0.0.0.0".to_string(),
        port: 3000,
        engine: EngineConfig::new(5, 5).unwrap(),
    };
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.engine.width, 5);
}

#[test]
fn test_request_ids_are_unique() {
    let a = ApiResponse::ok(1);
    let b = ApiResponse::ok(1);
    assert_ne!(a.request_id, b.request_id);
}

// ═══════════════════════════════════════════════════════════════════════════
// INFO ENDPOINTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_root_lists_endpoints() {
    let app = app(3, 3);
    let (status, body) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let paths: Vec<&str> = body["data"]["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"/api/v1/edits"));
}

#[tokio::test]
async fn test_health_reports_table_size() {
    let app = app(4, 7);
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["table"], "4x7");
}

#[tokio::test]
async fn test_version() {
    let app = app(2, 2);
    let (_, body) = send(&app, Method::GET, "/version", None).await;
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

// ═══════════════════════════════════════════════════════════════════════════
// EDITS / SNAPSHOT / CELLS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_edit_then_snapshot() {
    let app = app(5, 5);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/edits",
        Some(json!({"expressions": {"A1": "42", "B4": "A1 + 1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["evaluated"], 2);
    assert_eq!(body["data"]["cells"]["B4"], 43.0);
    assert_eq!(body["data"]["diagnostics"], json!([]));

    let (status, body) = send(&app, Method::GET, "/api/v1/snapshot", None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["rawExpressions"]["B4"], "A1 + 1");
    assert_eq!(data["parsedExpressions"]["B4"]["type"], "operator");
    assert_eq!(data["parsedExpressions"]["B4"]["name"], "+");
    assert_eq!(data["rowData"][3], json!(["4", "", "43", "", "", ""]));
}

#[tokio::test]
async fn test_edit_cycle_is_unprocessable() {
    let app = app(3, 3);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/edits",
        Some(json!({"expressions": {"A1": "B1", "B1": "A1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("A1, B1"));
}

#[tokio::test]
async fn test_edit_diagnostics() {
    let app = app(2, 2);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/edits",
        Some(json!({"expressions": {"A1": "x + 1", "Z9": "5"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body["data"]["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"unknown_operand"));
    assert!(kinds.contains(&"out_of_bounds"));
    // NaN has no JSON form
    assert_eq!(body["data"]["cells"]["A1"], Value::Null);
}

#[tokio::test]
async fn test_empty_edit_rejected() {
    let app = app(2, 2);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/edits",
        Some(json!({"expressions": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_cell_endpoint() {
    let app = app(3, 3);
    send(
        &app,
        Method::POST,
        "/api/v1/edits",
        Some(json!({"expressions": {"A1": "2", "B1": "A1 * A1"}})),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/v1/cells/A1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], 2.0);
    assert_eq!(body["data"]["dependents"], json!(["B1"]));

    let (_, body) = send(&app, Method::GET, "/api/v1/cells/B1", None).await;
    assert_eq!(body["data"]["value"], 4.0);
    assert_eq!(body["data"]["dependencies"], json!(["A1", "A1"]));
    assert_eq!(body["data"]["raw"], "A1 * A1");

    let (_, body) = send(&app, Method::GET, "/api/v1/cells/Q40", None).await;
    assert_eq!(body["data"]["value"], Value::Null);
}
