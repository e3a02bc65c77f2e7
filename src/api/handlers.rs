//! API Handlers
//!
//! HTTP request handlers for the administrative operations and for the
//! `/store` protocol that remote nodes speak.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::cache::EntryMeta;
use crate::engine::CacheEngine;
use crate::error::{CacheError, Result};
use crate::invalidation::{DataChangeEvent, InvalidationReport};
use crate::models::{
    CountResponse, DeleteMatchingRequest, DeleteResponse, GetQuery, GetResponse, HealthResponse,
    InvalidateRequest, KeysResponse, SetResponse, SkippedResponse, StatsResponse, StoreSetRequest,
};
use crate::registry::Pattern;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CacheEngine>,
}

impl AppState {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }
}

// == Admin Handlers ==

/// Handler for POST /admin/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidationReport>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    Ok(Json(state.engine.invalidate_by_pattern(&req.patterns).await))
}

/// Handler for POST /admin/invalidate-all
pub async fn invalidate_all_handler(State(state): State<AppState>) -> Json<InvalidationReport> {
    Json(state.engine.invalidate_all().await)
}

/// Handler for POST /admin/data-change
///
/// Malformed events are rejected with 400 and dropped.
pub async fn data_change_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<InvalidationReport>> {
    let event = DataChangeEvent::from_value(body)?;
    Ok(Json(state.engine.invalidate_by_data_change(&event).await))
}

/// Handler for POST /admin/refresh
pub async fn refresh_handler(State(state): State<AppState>) -> Response {
    report_or_skipped(state.engine.background_refresh().await, "refresh")
}

/// Handler for POST /admin/warm
pub async fn warm_handler(State(state): State<AppState>) -> Response {
    report_or_skipped(state.engine.warm_popular_data().await, "warming")
}

fn report_or_skipped(report: Option<InvalidationReport>, task: &str) -> Response {
    match report {
        Some(report) => Json(report).into_response(),
        None => (StatusCode::CONFLICT, Json(SkippedResponse::in_flight(task))).into_response(),
    }
}

/// Handler for GET /admin/stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.engine.stats().await?;
    Ok(Json(StatsResponse::from(stats)))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.engine.backend_name()))
}

// == Store Protocol Handlers ==

/// Handler for GET /store/entries/:key
///
/// A non-peek read counts as demand on this node.
pub async fn store_get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<GetQuery>,
) -> Result<Json<GetResponse>> {
    let store = state.engine.store();
    let value = if query.peek {
        store.peek(&key).await?
    } else {
        state.engine.popularity().record_access(&key);
        store.get(&key).await?
    };

    value
        .map(|value| Json(GetResponse::new(key.clone(), value)))
        .ok_or(CacheError::NotFound(key))
}

/// Handler for GET /store/meta/:key
pub async fn store_meta_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<EntryMeta>> {
    state
        .engine
        .store()
        .metadata(&key)
        .await?
        .map(Json)
        .ok_or(CacheError::NotFound(key))
}

/// Handler for PUT /store/entries/:key
pub async fn store_set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<StoreSetRequest>,
) -> Result<Json<SetResponse>> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    state
        .engine
        .store()
        .set(&key, req.value, Duration::from_millis(req.ttl_ms), req.category)
        .await?;
    Ok(Json(SetResponse::new(key, req.ttl_ms)))
}

/// Handler for DELETE /store/entries/:key
pub async fn store_delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.engine.store().delete(&key).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Handler for POST /store/delete-matching
pub async fn store_delete_matching_handler(
    State(state): State<AppState>,
    Json(req): Json<DeleteMatchingRequest>,
) -> Result<Json<KeysResponse>> {
    let pattern = Pattern::compile(&req.pattern)?;
    let keys = state.engine.store().delete_matching(&pattern).await?;
    Ok(Json(KeysResponse { keys }))
}

/// Handler for GET /store/keys
pub async fn store_keys_handler(State(state): State<AppState>) -> Result<Json<KeysResponse>> {
    let keys = state.engine.store().list_keys().await?;
    Ok(Json(KeysResponse { keys }))
}

/// Handler for DELETE /store/entries
pub async fn store_clear_handler(State(state): State<AppState>) -> Result<Json<CountResponse>> {
    let count = state.engine.store().clear().await?;
    Ok(Json(CountResponse { count }))
}

/// Handler for GET /store/stats
pub async fn store_stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.engine.store().stats().await?;
    Ok(Json(StatsResponse::from(stats)))
}
