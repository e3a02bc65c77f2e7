//! API Routes
//!
//! Configures the Axum router with the admin and store endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    data_change_handler, health_handler, invalidate_all_handler, invalidate_handler,
    refresh_handler, stats_handler, store_clear_handler, store_delete_handler,
    store_delete_matching_handler, store_get_handler, store_keys_handler, store_meta_handler,
    store_set_handler, store_stats_handler, warm_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/admin/invalidate", post(invalidate_handler))
        .route("/admin/invalidate-all", post(invalidate_all_handler))
        .route("/admin/data-change", post(data_change_handler))
        .route("/admin/refresh", post(refresh_handler))
        .route("/admin/warm", post(warm_handler))
        .route("/admin/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .nest("/store", store_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Routes of the remote store protocol.
fn store_router() -> Router<AppState> {
    Router::new()
        .route("/entries", delete(store_clear_handler))
        .route(
            "/entries/:key",
            get(store_get_handler)
                .put(store_set_handler)
                .delete(store_delete_handler),
        )
        .route("/meta/:key", get(store_meta_handler))
        .route("/delete-matching", post(store_delete_matching_handler))
        .route("/keys", get(store_keys_handler))
        .route("/stats", get(store_stats_handler))
}
