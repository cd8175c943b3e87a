//! HTTP surface (A1, §6.1): the `axum` router and handlers for
//! `/search`, `/health`, and `/stats`.

use crate::error::PipelineError;
use crate::fingerprint::CacheStore as _;
use crate::pipeline;
use crate::rerank::CrossEncoder as _;
use crate::state::AppState;
use crate::types::{HealthResponse, SearchRequest, SearchResponse, StatsResponse};
use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /search` (§6.1): validates the query string into a `ValidatedRequest`
/// and hands it to the pipeline. Fatal `PipelineError`s map to their status
/// codes via `IntoResponse`; everything else degrades internally and still
/// returns 200 (§7).
async fn search(State(state): State<Arc<AppState>>, Query(params): Query<SearchRequest>) -> Result<Json<SearchResponse>, PipelineError> {
    let validated = params.validate(state.config.max_results_default)?;
    let response = pipeline::run(&state, validated).await?;
    Ok(Json((*response).clone()))
}

/// `GET /health` (§6.1): reachability of the cache store and the backend,
/// plus whether the cross-encoder has a real model loaded.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let redis_ok = state.cache_store.ping().await.is_ok();
    let searxng_ok = probe_backend(&state).await;
    let status = if redis_ok && searxng_ok { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        redis: if redis_ok { "reachable" } else { "unreachable" },
        searxng: if searxng_ok { "reachable" } else { "unreachable" },
        cross_encoder: if state.cross_encoder.is_loaded() { "loaded" } else { "unavailable" },
        uptime_seconds: state.uptime_seconds(),
    })
}

async fn probe_backend(state: &Arc<AppState>) -> bool {
    let deadline = std::time::Duration::from_millis(500);
    match tokio::time::timeout(deadline, state.http_client.get(&state.config.searxng_url).send()).await {
        Ok(Ok(response)) => response.status().is_success() || response.status().is_redirection(),
        _ => false,
    }
}

/// `GET /stats` (§6.1): reads the Redis-backed counters and computes the
/// derived rates on read.
async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, PipelineError> {
    state
        .stats_store
        .snapshot()
        .await
        .map(Json)
        .map_err(|err| PipelineError::Internal(format!("failed to read stats: {err}")))
}
