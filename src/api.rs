use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::ingest::scheduler::{Scheduler, SchedulerStatus};
use crate::ingest::types::SourceId;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

/// Control and observability routes for the ingestion scheduler.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/scheduler/status", get(scheduler_status))
        .route("/scheduler/start", post(scheduler_start))
        .route("/scheduler/stop", post(scheduler_stop))
        .route("/sources/{id}/trigger", post(trigger_source))
        .route("/sources/{id}/reload", post(reload_source))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}

async fn scheduler_start(State(state): State<AppState>) -> impl IntoResponse {
    match state.scheduler.start().await {
        Ok(()) => Json(state.scheduler.status().await).into_response(),
        Err(e) => {
            tracing::error!(error = ?e, "scheduler start via API failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")).into_response()
        }
    }
}

async fn scheduler_stop(State(state): State<AppState>) -> Json<SchedulerStatus> {
    state.scheduler.stop().await;
    Json(state.scheduler.status().await)
}

async fn trigger_source(
    State(state): State<AppState>,
    Path(id): Path<SourceId>,
) -> impl IntoResponse {
    let outcome = state.scheduler.trigger_scraping(id).await;
    let code = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (code, Json(outcome))
}

#[derive(serde::Serialize)]
struct ReloadOut {
    scheduled: bool,
}

async fn reload_source(
    State(state): State<AppState>,
    Path(id): Path<SourceId>,
) -> impl IntoResponse {
    match state.scheduler.reload_source(id).await {
        Ok(scheduled) => Json(ReloadOut { scheduled }).into_response(),
        Err(e) => {
            tracing::error!(source_id = id, error = ?e, "reload via API failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")).into_response()
        }
    }
}
