//! REST API Server for the FinOps query router
//!
//! Exposes the orchestrator and the financial data service via HTTP

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::Orchestrator;
use crate::data::DataSource;
use crate::error::OrchestrationError;
use crate::models::{AggregateReport, Domain};

/// Session ids shorter than this are replaced with a fresh UUID.
const MIN_SESSION_ID_LEN: usize = 33;

const DEFAULT_SYMBOL: &str = "AAPL";
const DEFAULT_SYMBOLS: &str = "AAPL,MSFT,GOOGL,AMZN";
const TRANSACTION_SAMPLE: usize = 20;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub query: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents_invoked: Option<Vec<Domain>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalyzeResponse {
    pub fn from_report(report: AggregateReport, session_id: String) -> Self {
        // Responder errors already live in the combined text.
        let error = if !report.overall_succeeded && !report.responders_ran() {
            Some(report.errors.join("; "))
        } else {
            None
        };

        Self {
            success: report.overall_succeeded,
            response: Some(report.combined_text),
            agents_invoked: Some(report.domains_invoked),
            session_id: Some(session_id),
            error,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            agents_invoked: None,
            session_id: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FinancialDataQuery {
    #[serde(rename = "type", default = "default_data_type")]
    pub data_type: String,
    pub symbol: Option<String>,
    pub symbols: Option<String>,
}

fn default_data_type() -> String {
    "stock".to_string()
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub data: Arc<dyn DataSource>,
    pub request_timeout: Duration,
}

fn resolve_session_id(requested: Option<String>) -> String {
    match requested {
        Some(id) if id.len() >= MIN_SESSION_ID_LEN => id,
        _ => {
            let id = Uuid::new_v4().to_string();
            info!(session_id = %id, "Generated new session id");
            id
        }
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
/// Analysis Endpoint
/// =============================

async fn analyze(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<AnalyzeRequest>, JsonRejection>,
) -> (StatusCode, Json<AnalyzeResponse>) {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected analysis request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(AnalyzeResponse::error(format!(
                    "Invalid request body: {}",
                    rejection.body_text()
                ))),
            );
        }
    };

    if req.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(AnalyzeResponse::error("Query is required")),
        );
    }

    let session_id = resolve_session_id(req.session_id);
    info!(session_id = %session_id, "Received analysis request: {}", req.query);

    let outcome =
        tokio::time::timeout(state.request_timeout, state.orchestrator.handle(&req.query)).await;

    match outcome {
        Ok(Ok(report)) => (
            StatusCode::OK,
            Json(AnalyzeResponse::from_report(report, session_id)),
        ),
        Ok(Err(OrchestrationError::Validation(msg))) => {
            (StatusCode::BAD_REQUEST, Json(AnalyzeResponse::error(msg)))
        }
        Ok(Err(e)) => {
            error!(session_id = %session_id, error = %e, "Analysis failed");
            let status = if e.is_request_fatal() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let mut body = AnalyzeResponse::error(e.to_string());
            body.session_id = Some(session_id);
            (status, Json(body))
        }
        Err(_) => {
            warn!(session_id = %session_id, "Analysis exceeded request deadline");
            let mut body = AnalyzeResponse::error(format!(
                "Request timed out after {} seconds",
                state.request_timeout.as_secs()
            ));
            body.session_id = Some(session_id);
            (StatusCode::GATEWAY_TIMEOUT, Json(body))
        }
    }
}

/// =============================
/// Financial Data Endpoint
/// =============================

fn json_or_error<T: Serialize>(result: crate::Result<T>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => {
            warn!(error = %e, "Financial data unavailable");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn financial_data(
    State(state): State<ApiState>,
    Query(params): Query<FinancialDataQuery>,
) -> Response {
    let symbol = params.symbol.as_deref().unwrap_or(DEFAULT_SYMBOL);

    match params.data_type.as_str() {
        "stock" => json_or_error(state.data.get_quote(symbol).await),
        "ratios" => json_or_error(state.data.get_ratios(symbol).await),
        "multiple" => {
            let symbols: Vec<String> = params
                .symbols
                .as_deref()
                .unwrap_or(DEFAULT_SYMBOLS)
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            Json(state.data.get_multiple(&symbols).await).into_response()
        }
        "transactions" => Json(state.data.synthetic_transactions(TRANSACTION_SAMPLE)).into_response(),
        "compliance" => Json(state.data.synthetic_compliance()).into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Invalid data type" })),
        )
            .into_response(),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/financial-data", get(financial_data))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    bind_address: &str,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    info!("API Server listening on http://{}", bind_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
