use std::time::Duration;

/// Process-wide configuration resolved once at startup from environment
/// variables (§6.5). There is no file-based layer here — unlike the teacher
/// crate's `cortex-scout.json`, every recognized option in this system is a
/// deployment knob (ports, backend URLs, credentials) rather than a
/// user-editable preference, so env vars alone are the right source.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub anthropic_api_key: Option<String>,
    pub classifier_base_url: String,
    pub classifier_model: String,
    pub redis_url: String,
    pub searxng_url: String,
    pub cache_ttl_hours: u64,
    pub max_results_default: u32,
    pub port: u16,
    pub environment: Environment,
    pub http_timeout_secs: u64,
    pub http_connect_timeout_secs: u64,
    pub outbound_limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl AppConfig {
    /// Loads configuration from environment variables, applying the defaults
    /// documented in §6.5. Never fails: every option has a safe fallback
    /// except the classifier API key, whose absence simply means every
    /// request takes the `ClassifierDegraded` path (§4.2, §7).
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: env_nonempty("ANTHROPIC_API_KEY"),
            classifier_base_url: std::env::var("CLASSIFIER_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".to_string()),
            classifier_model: std::env::var("CLASSIFIER_MODEL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "claude-haiku-4-5".to_string()),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            searxng_url: std::env::var("SEARXNG_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8888".to_string()),
            cache_ttl_hours: env_parse("CACHE_TTL_HOURS").unwrap_or(24),
            max_results_default: env_parse("MAX_RESULTS").unwrap_or(8),
            port: env_parse("PORT").unwrap_or(8080),
            environment: match std::env::var("ENVIRONMENT")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str()
            {
                "production" => Environment::Production,
                _ => Environment::Development,
            },
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS").unwrap_or(30),
            http_connect_timeout_secs: env_parse("HTTP_CONNECT_TIMEOUT_SECS").unwrap_or(10),
            outbound_limit: env_parse("OUTBOUND_LIMIT").unwrap_or(32),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Installs the `tracing` subscriber per §6.5's `ENVIRONMENT` switch: human
/// output in development, JSON in production.
pub fn init_tracing(env: Environment) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));

    match env {
        Environment::Production => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        Environment::Development => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
