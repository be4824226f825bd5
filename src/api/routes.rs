//! HTTP read surface over the aggregation engine.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::aggregate::{Aggregator, Candle, EngineStats};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Aggregator>,
}

/// Create the API router
pub fn create_router(engine: Arc<Aggregator>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/symbols", get(get_symbols))
        .route("/api/candles", get(get_candles))
        .route("/api/vwap", get(get_vwap))
        .route("/api/stats", get(get_stats))
        .with_state(state)
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// All symbols with recorded candles
async fn get_symbols(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.symbols())
}

/// One-minute candles for a symbol. Unknown symbols yield an empty list,
/// never an error.
async fn get_candles(
    State(state): State<AppState>,
    Query(params): Query<SymbolQuery>,
) -> Result<Json<Vec<Candle>>, ApiError> {
    let symbol = params.symbol.ok_or_else(missing_symbol)?;
    Ok(Json(state.engine.candles(&symbol)))
}

/// Running VWAP for a symbol; 0 when unknown or without volume.
async fn get_vwap(
    State(state): State<AppState>,
    Query(params): Query<SymbolQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let symbol = params.symbol.ok_or_else(missing_symbol)?;
    let vwap = state.engine.vwap(&symbol);
    Ok(Json(json!({
        "symbol": symbol,
        "vwap": vwap,
    })))
}

/// Engine counters
async fn get_stats(State(state): State<AppState>) -> Json<EngineStats> {
    Json(state.engine.stats())
}

fn missing_symbol() -> ApiError {
    ApiError::BadRequest("missing 'symbol' query parameter".to_string())
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct SymbolQuery {
    symbol: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ===== Error Handling =====

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
