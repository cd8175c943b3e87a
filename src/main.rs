use relevance_gateway::config::{self, AppConfig};
use relevance_gateway::fingerprint::{CacheStore, RedisCacheStore};
use relevance_gateway::rerank::{CrossEncoder, DegradedCrossEncoder};
use relevance_gateway::state::AppState;
use relevance_gateway::stats::StatsStore;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    config::init_tracing(config.environment);

    info!("starting relevance-gateway");

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
        .connect_timeout(std::time::Duration::from_secs(config.http_connect_timeout_secs))
        .build()?;

    let redis_client = redis::Client::open(config.redis_url.as_str())?;
    let connection_manager = redis_client.get_connection_manager().await?;

    let cache_store: Arc<dyn CacheStore> = Arc::new(RedisCacheStore::from_manager(connection_manager.clone()));
    let stats_store = Arc::new(StatsStore::new(connection_manager));

    let cross_encoder: Arc<dyn CrossEncoder> = load_cross_encoder();
    if cross_encoder.is_loaded() {
        info!("cross-encoder model loaded");
    } else {
        warn!("cross-encoder unavailable; reranking will use the renormalized metadata blend");
    }

    if config.anthropic_api_key.is_none() {
        warn!("ANTHROPIC_API_KEY not set; intent classification will always degrade to 'general'");
    }

    let state = Arc::new(AppState::new(http_client, cache_store, stats_store, cross_encoder, config.clone()));

    let app = relevance_gateway::http::router(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on http://{bind_addr}");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

/// Loads the ONNX cross-encoder when the `cross-encoder` feature is
/// compiled in and the configured model files are present; falls back to
/// the always-degraded stub otherwise (§4.7, §9's "global model handle").
#[cfg(feature = "cross-encoder")]
fn load_cross_encoder() -> Arc<dyn CrossEncoder> {
    let model_path = std::env::var("CROSS_ENCODER_MODEL_PATH").unwrap_or_else(|_| "models/cross-encoder.onnx".to_string());
    let tokenizer_path = std::env::var("CROSS_ENCODER_TOKENIZER_PATH").unwrap_or_else(|_| "models/tokenizer.json".to_string());

    match relevance_gateway::rerank::onnx::OnnxCrossEncoder::load(&model_path, &tokenizer_path) {
        Ok(encoder) => Arc::new(encoder),
        Err(err) => {
            warn!(error = %err, model_path, tokenizer_path, "failed to load cross-encoder model");
            Arc::new(DegradedCrossEncoder)
        }
    }
}

#[cfg(not(feature = "cross-encoder"))]
fn load_cross_encoder() -> Arc<dyn CrossEncoder> {
    Arc::new(DegradedCrossEncoder)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
