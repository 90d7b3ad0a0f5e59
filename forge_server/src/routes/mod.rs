//! HTTP routes — live build stream, build history, ledger read-through, stats.

pub mod api;
pub mod stream;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ForgeConfig;
use crate::dashboard::kpi;
use crate::models::build::BuildRecord;
use crate::services::generator::ContentGenerator;
use crate::services::ledger::{derive_build_account, LedgerClient};
use crate::store::BuildStore;

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: BuildStore,
    pub generator: Arc<dyn ContentGenerator>,
    pub ledger: Arc<dyn LedgerClient>,
    pub config: ForgeConfig,
}

/// Build the server's Axum router.
pub fn forge_router(state: AppState) -> Router {
    Router::new()
        // Live build stream
        .route("/api/build/live", post(stream::live_build))
        // Build history
        .route("/api/builds", get(list_builds_handler))
        .route("/api/builds/{build_id}", get(get_build_handler))
        .route("/api/builds/{build_id}/ledger", get(build_ledger_handler))
        // Stats
        .route("/api/stats", get(stats_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Build API ──

async fn list_builds_handler(State(state): State<AppState>) -> Json<api::BuildListJson> {
    Json(api::list_builds(&state.store).await)
}

async fn get_build_handler(
    State(state): State<AppState>,
    Path(build_id): Path<String>,
) -> Result<Json<BuildRecord>, (StatusCode, Json<serde_json::Value>)> {
    match state.store.get(&build_id).await {
        Some(record) => Ok(Json(record)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "build not found", "build_id": build_id })),
        )),
    }
}

/// Read the build's ledger account back from the external log (best-effort).
async fn build_ledger_handler(
    State(state): State<AppState>,
    Path(build_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    if state.store.get(&build_id).await.is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "build not found", "build_id": build_id })),
        ));
    }

    let account = derive_build_account(&build_id);
    match state.ledger.read_record(&account).await {
        Ok(record) => Ok(Json(
            serde_json::json!({ "account": account, "record": record }),
        )),
        Err(e) => {
            tracing::warn!(build_id = %build_id, "ledger read failed: {e}");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            ))
        }
    }
}

// ── Stats API ──

async fn stats_handler(State(state): State<AppState>) -> Json<kpi::BuildStats> {
    Json(kpi::query_stats(&state.store).await)
}
