//! HTTP routes
//!
//! Webhook ingestion and conflict resolution are the two external callers
//! of the sync logic; both go through the same `SyncService` so per-mapping
//! serialization holds across them.

use aqademiq_domain::{MergePatch, RemoteEvent, ResolutionStrategy, SyncAction, SyncConflict};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/sync/events", post(ingest_event))
        .route("/v1/conflicts", get(list_conflicts))
        .route("/v1/conflicts/{id}/resolve", post(resolve_conflict))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.db.health_check()?;
    Ok(Json(HealthResponse { status: "ok", timestamp: Utc::now().timestamp() }))
}

/// One inbound remote event, as delivered by a webhook push.
#[derive(Debug, Deserialize)]
struct IngestRequest {
    user_id: String,
    event: RemoteEvent,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    #[serde(flatten)]
    action: SyncAction,
}

async fn ingest_event(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let action = state.service.process_event(&request.user_id, &request.event).await?;
    info!(
        user_id = %request.user_id,
        remote_event_id = %request.event.id,
        ?action,
        "webhook event processed"
    );
    Ok(Json(IngestResponse { action }))
}

#[derive(Debug, Deserialize)]
struct ConflictQuery {
    user_id: String,
}

async fn list_conflicts(
    State(state): State<AppState>,
    Query(query): Query<ConflictQuery>,
) -> Result<Json<Vec<SyncConflict>>, ApiError> {
    let conflicts = state.service.pending_conflicts(&query.user_id).await?;
    Ok(Json(conflicts))
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    strategy: ResolutionStrategy,
    #[serde(default)]
    merge: Option<MergePatch>,
}

#[derive(Debug, Serialize)]
struct ResolveResponse {
    conflict_id: String,
    status: &'static str,
}

async fn resolve_conflict(
    State(state): State<AppState>,
    Path(conflict_id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    state
        .service
        .resolve_conflict(&conflict_id, request.strategy, request.merge.as_ref())
        .await?;
    info!(conflict_id, strategy = ?request.strategy, "conflict resolved");
    Ok(Json(ResolveResponse { conflict_id, status: "resolved" }))
}
