//! REST API server for the query orchestrator
//!
//! Exposes the single-turn entry point over HTTP for the presentation layer.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::models::Domain;
use crate::orchestrator::Orchestrator;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryRequest {
    pub query: String,
    /// Opaque caller-chosen session identifier; stable across turns.
    pub session_id: Option<String>,
    /// Forces routing to one domain (`sql`, `rag`, `web`), skipping
    /// classification.
    pub force_domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClearSessionRequest {
    pub session_id: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Helpers — Session Identifiers
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> uuid::Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            uuid::Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Query Endpoint
/// =============================

async fn run_query(
    State(state): State<ApiState>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Query must not be empty".into())),
        );
    }

    info!("Received query: {}", req.query);

    let session_id = parse_or_stable_uuid(req.session_id.as_deref(), "anonymous-session");

    let override_domain = match req.force_domain.as_deref() {
        Some(raw) => match Domain::from_str(raw) {
            Ok(domain) => Some(domain),
            Err(e) => {
                warn!("Ignoring invalid force_domain: {}", e);
                None
            }
        },
        None => None,
    };

    let response = state
        .orchestrator
        .handle_turn(session_id, &req.query, override_domain)
        .await;

    let contributors: Vec<&str> = response.contributors.iter().map(|d| d.label()).collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "session_id": session_id.to_string(),
            "answer": response.answer,
            "status": response.status,
            "citations": response.citations,
            "payloads": response.payloads,
            "domains": response.contributors,
            "agents_used": contributors,
        }))),
    )
}

/// =============================
/// Session Endpoint
/// =============================

async fn clear_session(
    State(state): State<ApiState>,
    Json(req): Json<ClearSessionRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = parse_or_stable_uuid(Some(&req.session_id), "anonymous-session");
    let existed = state.orchestrator.end_session(session_id).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "session_id": session_id.to_string(),
            "cleared": existed,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/query", post(run_query))
        .route("/api/session/clear", post(clear_session))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
