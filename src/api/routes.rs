//! Route handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::database::BindingStore;
use crate::registry::{Binding, BindingRegistry, RegistryError};
use crate::telemetry::MinerMetrics;
use crate::validator::{Validator, ValidatorError};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<BindingRegistry>,
    pub validator: Arc<Validator>,
    pub store: Arc<dyn BindingStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/ratings", get(ratings))
        .route("/metrics", get(metrics))
        .route("/bindings", get(list_bindings))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub hotkey: String,
    pub worker: String,
    pub registration_time: i64,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, (StatusCode, String)> {
    let claim = Binding {
        worker: request.worker,
        hotkey: request.hotkey,
        registration_time: request.registration_time,
        signature: request.signature,
    };

    match state.registry.accept(&claim).await {
        Ok(()) => Ok(Json(RegisterResponse {
            message: "registration successful".to_string(),
        })),
        Err(RegistryError::Rejected(reason)) => {
            Err((StatusCode::BAD_REQUEST, reason.to_string()))
        }
        Err(RegistryError::Remote(err)) => {
            warn!(error = %err, "registration blocked by unavailable oracle");
            Err((StatusCode::SERVICE_UNAVAILABLE, err.to_string()))
        }
        Err(RegistryError::Store(err)) => {
            Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

async fn ratings(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, f64>>, (StatusCode, String)> {
    state
        .validator
        .compute_ratings()
        .await
        .map(Json)
        .map_err(validator_error)
}

async fn metrics(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Vec<MinerMetrics>>>, (StatusCode, String)> {
    state
        .validator
        .hotkey_metrics()
        .await
        .map(Json)
        .map_err(validator_error)
}

fn validator_error(err: ValidatorError) -> (StatusCode, String) {
    let status = match err {
        ValidatorError::Remote(_) => StatusCode::SERVICE_UNAVAILABLE,
        ValidatorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct ListBindingsQuery {
    #[serde(default)]
    pub since_timestamp: i64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_page_number")]
    pub page_number: u32,
}

fn default_page_size() -> u32 {
    100
}

fn default_page_number() -> u32 {
    1
}

/// The listing peers replicate from: bindings past the caller's watermark,
/// ordered by registration time, one page at a time.
async fn list_bindings(
    State(state): State<AppState>,
    Query(query): Query<ListBindingsQuery>,
) -> Result<Json<Vec<Binding>>, (StatusCode, String)> {
    let page_size = query.page_size.min(MAX_PAGE_SIZE);
    let page_number = query.page_number.max(1);
    let offset = (page_number - 1).saturating_mul(page_size);

    state
        .store
        .scan_since(query.since_timestamp, page_size, offset)
        .await
        .map(Json)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}
