use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse topical label driving engine selection (§3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Research,
    Biomedical,
    Code,
    News,
    General,
}

impl Intent {
    /// Normalizes an arbitrary classifier-reported string into the closed
    /// enumeration. Unknown values (including empty strings) map to `General`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "research" => Intent::Research,
            "biomedical" => Intent::Biomedical,
            "code" => Intent::Code,
            "news" => Intent::News,
            _ => Intent::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Research => "research",
            Intent::Biomedical => "biomedical",
            Intent::Code => "code",
            Intent::News => "news",
            Intent::General => "general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Intent {
    fn default() -> Self {
        Intent::General
    }
}

/// The inbound `/search` request, validated and clamped at the HTTP boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(alias = "q")]
    pub query: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub domain_hint: Option<String>,
}

pub const MIN_QUERY_LEN: usize = 1;
pub const MAX_QUERY_LEN: usize = 512;
pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 20;

/// A validated request: `query` is trimmed and non-empty, `limit` is clamped
/// to `[MIN_LIMIT, MAX_LIMIT]`.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub query: String,
    pub limit: u32,
    pub domain_hint: Option<String>,
}

impl SearchRequest {
    /// Validates and clamps the raw request per §3's invariants, using
    /// `default_limit` when the caller omits `limit` (§6.5's `MAX_RESULTS`).
    pub fn validate(&self, default_limit: u32) -> Result<ValidatedRequest, crate::error::PipelineError> {
        let query = self.query.trim().to_string();
        if query.is_empty() {
            return Err(crate::error::PipelineError::InvalidRequest("query must not be empty".to_string()));
        }
        if query.chars().count() > MAX_QUERY_LEN {
            return Err(crate::error::PipelineError::InvalidRequest(format!("query exceeds {MAX_QUERY_LEN} characters")));
        }

        let limit = self.limit.unwrap_or(default_limit).clamp(MIN_LIMIT, MAX_LIMIT);
        let domain_hint = self.domain_hint.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Ok(ValidatedRequest { query, limit, domain_hint })
    }
}

/// Output of the intent classifier (C2): the resolved intent plus the text
/// the rest of the pipeline should search for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandedQuery {
    pub intent: Intent,
    pub text: String,
}

/// Fixed engine/category plan for a given intent (C3). Never empty.
#[derive(Debug, Clone, Serialize)]
pub struct EnginePlan {
    pub engines: Vec<&'static str>,
    pub categories: Vec<&'static str>,
}

/// A single hit as returned by the meta-search backend, before normalization.
#[derive(Debug, Clone)]
pub struct RawHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub engine: String,
    pub published_date: Option<String>,
    pub position_in_engine: u32,
}

/// `RawHit` after URL canonicalization and domain extraction (C5).
#[derive(Debug, Clone)]
pub struct CanonicalHit {
    pub title: String,
    pub snippet: String,
    pub engine: String,
    pub published_date: Option<String>,
    pub position_in_engine: u32,
    pub domain: String,
    pub canonical_url: String,
}

/// Per-sub-score breakdown, each component clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: f64,
    pub authority: f64,
    pub recency: f64,
    pub engine_trust: f64,
    pub position: f64,
}

/// A `CanonicalHit` plus its final scoring (C6 + C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub engine: String,
    pub domain: String,
    pub published_date: Option<String>,
    pub score_breakdown: ScoreBreakdown,
    pub final_score: f64,
}

/// The `/search` response body (§3, §6.1). Schema-stable: degradation
/// signals never change its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub expanded_query: String,
    pub intent: Intent,
    pub cache_hit: bool,
    pub query_time_ms: f64,
    pub results: Vec<ScoredHit>,
}

/// `GET /health` response (§6.1).
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub redis: &'static str,
    pub searxng: &'static str,
    pub cross_encoder: &'static str,
    pub uptime_seconds: u64,
}

/// `GET /stats` response (§6.1).
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub queries_total: u64,
    pub cache_hit_rate: f64,
    pub avg_latency_ms: f64,
    pub queries_by_intent: std::collections::BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_rejected() {
        let req = SearchRequest { query: "   ".to_string(), limit: None, domain_hint: None };
        assert!(req.validate(8).is_err());
    }

    #[test]
    fn oversized_query_is_rejected() {
        let req = SearchRequest { query: "a".repeat(MAX_QUERY_LEN + 1), limit: None, domain_hint: None };
        assert!(req.validate(8).is_err());
    }

    #[test]
    fn limit_is_clamped_to_bounds() {
        let req = SearchRequest { query: "rust".to_string(), limit: Some(1000), domain_hint: None };
        let validated = req.validate(8).unwrap();
        assert_eq!(validated.limit, MAX_LIMIT);
    }

    #[test]
    fn missing_limit_uses_default() {
        let req = SearchRequest { query: "rust".to_string(), limit: None, domain_hint: None };
        let validated = req.validate(8).unwrap();
        assert_eq!(validated.limit, 8);
    }
}
