//! Live build stream — SSE transport for build events.
//!
//! Each emitted event becomes one `data: <json>` frame the moment the
//! orchestrator produces it; the stream closes once the terminal event has
//! been written and the sender side drops.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::Json;
use futures::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;

use super::AppState;
use crate::services::orchestrator::BuildOrchestrator;

#[derive(Debug, Deserialize)]
pub struct LiveBuildRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Start a build and stream its events to the caller.
pub async fn live_build(
    State(state): State<AppState>,
    Json(req): Json<LiveBuildRequest>,
) -> Result<
    Sse<impl Stream<Item = Result<Event, axum::Error>>>,
    (StatusCode, Json<serde_json::Value>),
> {
    let prompt = req.prompt.unwrap_or_default().trim().to_string();
    if prompt.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "prompt is required" })),
        ));
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = BuildOrchestrator::new(
        state.store.clone(),
        state.generator.clone(),
        state.ledger.clone(),
        state.config.stream_pacing_ms,
    );

    // The build outlives its subscriber: a disconnect drops frames, the
    // record still reaches a terminal state.
    tokio::spawn(async move {
        orchestrator.run(&prompt, &tx).await;
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Event::default().json_data(&event), rx))
    });

    Ok(Sse::new(stream))
}
