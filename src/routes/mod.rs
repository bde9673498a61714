//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (quest flow)
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers); the UI runs as a separate local client
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/modules", get(http::http_list_modules).post(http::http_create_module))
        .route("/api/v1/modules/hall-of-fame", get(http::http_hall_of_fame))
        .route("/api/v1/modules/hall-of-fame/reset", post(http::http_reset_hall_of_fame))
        .route(
            "/api/v1/modules/:id",
            get(http::http_get_module)
                .put(http::http_update_module)
                .delete(http::http_delete_module),
        )
        .route("/api/v1/modules/:id/document", post(http::http_attach_document))
        .route("/api/v1/stats", get(http::http_stats))
        .route("/api/v1/quests", get(http::http_open_quests).delete(http::http_clear_quests))
        .route("/api/v1/quests/archive", get(http::http_quest_archive))
        .route("/api/v1/quests/generate", post(http::http_generate_quests))
        .route("/api/v1/quests/:id/draft", post(http::http_save_draft))
        .route("/api/v1/quests/:id/review", post(http::http_review_answer))
        .route("/api/v1/quests/:id/complete", post(http::http_complete_quest))
        .route("/api/v1/profile", get(http::http_profile))
        .route("/api/v1/profile/login", post(http::http_login))
        .route("/api/v1/profile/persona", put(http::http_set_persona))
        .route("/api/v1/shop", get(http::http_shop))
        .route("/api/v1/shop/:item", post(http::http_purchase))
        .route("/api/v1/export", get(http::http_export))
        .route("/api/v1/import", post(http::http_import))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
