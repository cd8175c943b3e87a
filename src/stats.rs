//! Stats counters (C8, §6.4): best-effort Redis-backed increments and the
//! `/stats` snapshot.

use crate::types::{Intent, StatsResponse};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::BTreeMap;

pub struct StatsStore {
    manager: ConnectionManager,
}

impl StatsStore {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Increments the per-request counters. Best-effort: a failure here is
    /// logged and never fails the request (§4.8).
    pub async fn record_query(&self, intent: Intent, cache_hit: bool, latency_ms: f64) {
        if let Err(err) = self.record_query_inner(intent, cache_hit, latency_ms).await {
            tracing::warn!(degradation = "stats_degraded", error = %err, "failed to record query stats");
        }
    }

    async fn record_query_inner(&self, intent: Intent, cache_hit: bool, latency_ms: f64) -> anyhow::Result<()> {
        let mut conn = self.manager.clone();
        conn.incr::<_, _, ()>("stats:queries_total", 1).await?;
        if cache_hit {
            conn.incr::<_, _, ()>("stats:cache_hits", 1).await?;
        }
        conn.incr::<_, _, ()>(format!("stats:by_intent:{}", intent.as_str()), 1).await?;
        let _: f64 = conn.incr("stats:latency_sum_ms", latency_ms).await?;
        conn.incr::<_, _, ()>("stats:latency_count", 1).await?;
        Ok(())
    }

    /// Reads the current counters into a `StatsResponse`, computing
    /// `cache_hit_rate` and `avg_latency_ms` on read (§3, §6.1). Missing
    /// keys read as zero.
    pub async fn snapshot(&self) -> anyhow::Result<StatsResponse> {
        let mut conn = self.manager.clone();

        let queries_total: u64 = conn.get("stats:queries_total").await.unwrap_or(0);
        let cache_hits: u64 = conn.get("stats:cache_hits").await.unwrap_or(0);
        let latency_sum_ms: f64 = conn.get("stats:latency_sum_ms").await.unwrap_or(0.0);
        let latency_count: u64 = conn.get("stats:latency_count").await.unwrap_or(0);

        let mut queries_by_intent = BTreeMap::new();
        for intent in [Intent::Research, Intent::Biomedical, Intent::Code, Intent::News, Intent::General] {
            let count: u64 = conn.get(format!("stats:by_intent:{}", intent.as_str())).await.unwrap_or(0);
            queries_by_intent.insert(intent.as_str().to_string(), count);
        }

        let cache_hit_rate = if queries_total == 0 { 0.0 } else { cache_hits as f64 / queries_total as f64 };
        let avg_latency_ms = if latency_count == 0 { 0.0 } else { latency_sum_ms / latency_count as f64 };

        Ok(StatsResponse { queries_total, cache_hit_rate, avg_latency_ms, queries_by_intent })
    }
}
