//! Process-wide shared resources (A5, §3, §5): `AppState`, constructed once
//! at startup and handed to every request handler via `axum::extract::State`.

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::fingerprint::CacheStore;
use crate::rerank::CrossEncoder;
use crate::singleflight::SingleFlight;
use crate::stats::StatsStore;
use crate::types::SearchResponse;
use std::sync::Arc;
use std::time::Instant;

/// What a single pipeline execution produces, shared verbatim across
/// single-flight followers (§5).
pub type PipelineOutcome = Result<Arc<SearchResponse>, PipelineError>;

pub struct AppState {
    pub http_client: reqwest::Client,
    pub cache_store: Arc<dyn CacheStore>,
    pub stats_store: Arc<StatsStore>,
    pub cross_encoder: Arc<dyn CrossEncoder>,
    pub single_flight: SingleFlight<PipelineOutcome>,
    pub config: AppConfig,
    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("searxng_url", &self.config.searxng_url)
            .field("cross_encoder_loaded", &self.cross_encoder.is_loaded())
            .finish()
    }
}

impl AppState {
    pub fn new(
        http_client: reqwest::Client,
        cache_store: Arc<dyn CacheStore>,
        stats_store: Arc<StatsStore>,
        cross_encoder: Arc<dyn CrossEncoder>,
        config: AppConfig,
    ) -> Self {
        Self { http_client, cache_store, stats_store, cross_encoder, single_flight: SingleFlight::new(), config, started_at: Instant::now() }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
