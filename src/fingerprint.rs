//! Fingerprint & Cache (C1, §4.1): stable request hashing and the
//! Redis-backed `CacheStore`.

use crate::types::SearchResponse;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Hashes `(normalized_query, limit, domain_hint_or_empty)` into a stable
/// lowercase hex digest. `normalized_query` is lowercased and
/// whitespace-collapsed so cosmetic variation in the client's query does not
/// fragment the cache.
pub fn compute(query: &str, limit: u32, domain_hint: Option<&str>) -> String {
    let normalized_query: String = query.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase();
    let domain_hint = domain_hint.unwrap_or("");

    let mut hasher = Sha256::new();
    hasher.update(normalized_query.as_bytes());
    hasher.update([0u8]);
    hasher.update(limit.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(domain_hint.as_bytes());

    hex::encode(hasher.finalize())
}

/// Abstracts the response cache so the pipeline is not hard-wired to Redis
/// (§4.1). Any I/O error is the caller's concern to degrade on, never a
/// panic path.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn lookup(&self, fingerprint: &str) -> anyhow::Result<Option<SearchResponse>>;
    async fn store(&self, fingerprint: &str, response: &SearchResponse, ttl: Duration) -> anyhow::Result<()>;
    /// Used by `/health` (§6.1): a cheap reachability probe.
    async fn ping(&self) -> anyhow::Result<()>;
}

pub struct RedisCacheStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }

    /// Builds a cache store from a connection manager shared with other
    /// consumers (e.g. [`crate::stats::StatsStore`]) instead of opening a
    /// dedicated connection.
    pub fn from_manager(manager: redis::aio::ConnectionManager) -> Self {
        Self { manager }
    }

    fn key(fingerprint: &str) -> String {
        format!("cache:{fingerprint}")
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn lookup(&self, fingerprint: &str) -> anyhow::Result<Option<SearchResponse>> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(Self::key(fingerprint)).await?;
        let Some(raw) = raw else { return Ok(None) };
        match serde_json::from_str::<SearchResponse>(&raw) {
            Ok(response) => Ok(Some(response)),
            Err(_) => Ok(None),
        }
    }

    async fn store(&self, fingerprint: &str, response: &SearchResponse, ttl: Duration) -> anyhow::Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let serialized = serde_json::to_string(response)?;
        conn.set_ex::<_, _, ()>(Self::key(fingerprint), serialized, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let _: String = conn.get("cache:__health_probe__").await.or_else(|e| {
            // A missing key is not a connectivity failure; any other error is.
            if e.kind() == redis::ErrorKind::TypeError { Ok(String::new()) } else { Err(e) }
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_across_whitespace_and_case() {
        let a = compute("Rust   Async Runtimes", 8, None);
        let b = compute("rust async runtimes", 8, None);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_domain_hint() {
        let a = compute("rust", 8, None);
        let b = compute("rust", 8, Some("docs.rs"));
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_limit() {
        let a = compute("rust", 8, None);
        let b = compute("rust", 10, None);
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_is_lowercase_hex() {
        let digest = compute("rust", 8, None);
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
