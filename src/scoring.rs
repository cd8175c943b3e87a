//! Metadata Scorer (C6, §4.6): authority/recency/engine-trust/position
//! sub-scores, the coarse selection score, and top-K1 pruning.

use crate::types::{CanonicalHit, ScoreBreakdown};
use chrono::{NaiveDate, Utc};

pub const K1: usize = 12;

/// Tier A domains (§4.6): peer-reviewed and standards-body publishers.
const AUTHORITY_TIER_A: &[&str] = &[
    "arxiv.org", "nature.com", "science.org", "nejm.org", "nih.gov", "ieee.org", "acm.org",
];

/// Tier B domains: high-trust community and reference sources.
const AUTHORITY_TIER_B: &[&str] = &[
    "github.com",
    "stackoverflow.com",
    "semanticscholar.org",
    "wikipedia.org",
    "nytimes.com",
    "bbc.co.uk",
    "reuters.com",
];

/// Tier C allowlist: everything else considered curated rather than unknown.
/// Kept small and explicit per §9 ("configurable constant table" = centralized
/// data, not a runtime-editable list); grown as real deployments surface
/// domains worth trusting above the unknown default.
const AUTHORITY_TIER_C: &[&str] = &[
    "medium.com",
    "dev.to",
    "docs.rs",
    "crates.io",
    "mozilla.org",
    "w3.org",
];

/// `true` if `domain` either *is* `tier_domain` or is a subdomain of it
/// (`en.wikipedia.org` matches `wikipedia.org`). This is the "at minimum a
/// suffix match" fallback for domains `extract_domain` didn't reduce to a
/// bare registrable host (it only strips a leading `www.`).
fn matches_registrable_domain(domain: &str, tier_domain: &str) -> bool {
    domain == tier_domain || domain.ends_with(&format!(".{tier_domain}"))
}

fn in_tier(domain: &str, tier: &[&str]) -> bool {
    tier.iter().any(|tier_domain| matches_registrable_domain(domain, tier_domain))
}

fn authority(domain: &str) -> f64 {
    if in_tier(domain, AUTHORITY_TIER_A) {
        1.00
    } else if in_tier(domain, AUTHORITY_TIER_B) {
        0.85
    } else if in_tier(domain, AUTHORITY_TIER_C) {
        0.70
    } else {
        0.50
    }
}

fn recency(published_date: Option<&str>) -> f64 {
    let Some(raw) = published_date else { return 0.30 };
    let Some(date) = parse_published_date(raw) else { return 0.30 };

    let today = Utc::now().date_naive();
    let age_days = (today - date).num_days().max(0) as f64;
    let score = 0.5_f64.powf(age_days / 365.0);
    score.clamp(0.0, 1.0)
}

/// Accepts `YYYY-MM-DD` or `YYYY-MM` (the latter anchored to the 1st).
fn parse_published_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    let with_day = format!("{raw}-01");
    NaiveDate::parse_from_str(&with_day, "%Y-%m-%d").ok()
}

fn engine_trust(engine: &str) -> f64 {
    match engine {
        "arxiv" | "pubmed" | "semantic_scholar" => 1.00,
        "github" | "stackoverflow" => 0.90,
        "bing_news" | "duckduckgo_news" => 0.80,
        "duckduckgo" | "bing" | "brave" => 0.75,
        _ => 0.60,
    }
}

fn position(position_in_engine: u32) -> f64 {
    let pos = position_in_engine.max(1) as f64;
    (1.0 / (1.0 + pos.ln())).clamp(0.0, 1.0)
}

/// Per-hit sub-scores with `semantic` left at its default (0.0); C7 fills it
/// in after re-ranking.
pub fn sub_scores(hit: &CanonicalHit) -> ScoreBreakdown {
    ScoreBreakdown {
        semantic: 0.0,
        authority: authority(&hit.domain),
        recency: recency(hit.published_date.as_deref()),
        engine_trust: engine_trust(&hit.engine),
        position: position(hit.position_in_engine),
    }
}

fn coarse_score(breakdown: &ScoreBreakdown) -> f64 {
    0.35 * breakdown.authority + 0.20 * breakdown.recency + 0.25 * breakdown.engine_trust + 0.20 * breakdown.position
}

/// Scores every hit and keeps the top `K1` by coarse score, ties broken by
/// earlier `position_in_engine` then lexicographic `canonical_url` (§4.6).
pub fn select_top_k1(hits: Vec<CanonicalHit>) -> Vec<(CanonicalHit, ScoreBreakdown)> {
    let mut scored: Vec<(CanonicalHit, ScoreBreakdown, f64)> = hits
        .into_iter()
        .map(|hit| {
            let breakdown = sub_scores(&hit);
            let coarse = coarse_score(&breakdown);
            (hit, breakdown, coarse)
        })
        .collect();

    scored.sort_by(|(a_hit, _, a_score), (b_hit, _, b_score)| {
        b_score
            .partial_cmp(a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a_hit.position_in_engine.cmp(&b_hit.position_in_engine))
            .then_with(|| a_hit.canonical_url.cmp(&b_hit.canonical_url))
    });

    scored.truncate(K1);
    scored.into_iter().map(|(hit, breakdown, _)| (hit, breakdown)).collect()
}
