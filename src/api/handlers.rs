//! API request handlers

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::server::AppState;
use crate::error::SheetError;
use crate::types::{CellDiagnostic, CellInfo, EditBatch, Snapshot};

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

/// HTTP status for an engine error
fn status_for(error: &SheetError) -> StatusCode {
    match error {
        SheetError::CircularDependency { .. } | SheetError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SheetError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn failure<T: Serialize>(error: SheetError) -> (StatusCode, Json<ApiResponse<T>>) {
    (status_for(&error), Json(ApiResponse::err(error.to_string())))
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

fn endpoint(method: &str, path: &str, description: &str) -> EndpointInfo {
    EndpointInfo {
        path: path.to_string(),
        method: method.to_string(),
        description: description.to_string(),
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = RootResponse {
        name: "SheetForge API Server".to_string(),
        version: state.version.clone(),
        description: "Incremental spreadsheet recalculation over HTTP".to_string(),
        endpoints: vec![
            endpoint("GET", "/health", "Health check endpoint"),
            endpoint("GET", "/version", "Get server version"),
            endpoint("GET", "/api/v1/snapshot", "Current formulas and value grid"),
            endpoint("POST", "/api/v1/edits", "Apply a batch of cell formula edits"),
            endpoint("GET", "/api/v1/cells/{key}", "Formula, value and edges of one cell"),
        ],
    };
    Json(ApiResponse::ok(response))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub table: String,
}

/// GET /health - Health check
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.engine.config();
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        table: format!("{}x{}", config.width, config.height),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: vec![
            "edits".to_string(),
            "snapshot".to_string(),
            "cells".to_string(),
        ],
    }))
}

/// GET /api/v1/snapshot - Current published state
pub async fn snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.engine.snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(ApiResponse::ok(snapshot))),
        Err(e) => failure::<Snapshot>(e),
    }
}

/// Edit request
#[derive(Deserialize)]
pub struct EditRequest {
    pub expressions: EditBatch,
}

/// Edit response
#[derive(Serialize)]
pub struct EditResponse {
    pub evaluated: usize,
    /// Computed values of every evaluated cell; NaN and infinities serialize as null
    pub cells: BTreeMap<String, f64>,
    pub diagnostics: Vec<CellDiagnostic>,
}

/// POST /api/v1/edits - Apply an edit batch
pub async fn edits(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EditRequest>,
) -> impl IntoResponse {
    match state.engine.submit(req.expressions).await {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::ok(EditResponse {
                evaluated: report.evaluated.len(),
                cells: report.evaluated.into_iter().collect(),
                diagnostics: report.diagnostics,
            })),
        ),
        Err(e) => failure::<EditResponse>(e),
    }
}

/// GET /api/v1/cells/:key - Inspect one cell
pub async fn cell(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match state.engine.cell(key).await {
        Ok(info) => (StatusCode::OK, Json(ApiResponse::ok(info))),
        Err(e) => failure::<CellInfo>(e),
    }
}
