//! Normalizer & Deduper (C5, §4.5): URL canonicalization, exact dedup by
//! canonical URL, and near-duplicate dedup by title similarity.

use crate::types::{CanonicalHit, RawHit};
use std::collections::HashSet;
use url::Url;

/// Tracking query-param names stripped during canonicalization. `utm_*` is a
/// prefix match; everything else is an exact (case-insensitive) match.
/// Centralized per §9's "configurable constant table" resolution — this is a
/// compile-time constant, not a runtime-configurable list.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "mc_cid", "ref", "ref_src", "ref_url"];

/// Canonicalizes a URL per the ordered rules in §4.5. Idempotent: running it
/// twice yields the same string (invariant 5, §8).
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    // Lowercase scheme and host.
    let scheme = url.scheme().to_ascii_lowercase();
    let host = url.host_str()?.to_ascii_lowercase();
    url.set_host(Some(&host)).ok()?;

    // Remove default ports.
    let is_default_port = matches!((scheme.as_str(), url.port()), ("http", Some(80)) | ("https", Some(443)));
    if is_default_port {
        let _ = url.set_port(None);
    }

    // Remove fragment.
    url.set_fragment(None);

    // Strip tracking params, sort the rest by name.
    if url.query().is_some() {
        let mut kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !is_tracking_param(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        kept.sort_by(|a, b| a.0.cmp(&b.0));
        if kept.is_empty() {
            url.set_query(None);
        } else {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
        }
    }

    // Collapse duplicate slashes in the path, then strip a single trailing
    // slash (but never at root).
    let collapsed = collapse_slashes(url.path());
    let trimmed = if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.trim_end_matches('/').to_string()
    } else {
        collapsed
    };
    let path = if trimmed.is_empty() { "/".to_string() } else { trimmed };
    url.set_path(&path);

    Some(url.to_string())
}

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}

/// Extracts the registrable host for the "domain" field (§3): the lowercased
/// host with a leading `www.` label stripped. This is not full
/// public-suffix-aware parsing (a real `en.wikipedia.org` subdomain is left
/// alone), so C6's `authority` lookup additionally falls back to a
/// suffix match against the tier tables for hosts this doesn't normalize.
pub fn extract_domain(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// Converts a `RawHit` into a `CanonicalHit`, dropping it if the URL cannot
/// be canonicalized (invalid or non-HTTP(S) scheme — §3's parse-time drop
/// rule applies transitively here for hits that slipped through C4).
pub fn canonicalize(hit: RawHit) -> Option<CanonicalHit> {
    let canonical_url = canonicalize_url(&hit.url)?;
    let parsed = Url::parse(&canonical_url).ok()?;
    let domain = extract_domain(&parsed);

    Some(CanonicalHit {
        title: hit.title,
        snippet: hit.snippet,
        engine: hit.engine,
        published_date: hit.published_date,
        position_in_engine: hit.position_in_engine,
        domain,
        canonical_url,
    })
}

/// Lowercased, punctuation-stripped, whitespace-collapsed title, tokenized
/// on whitespace for the LCS similarity below.
fn normalized_title_tokens(title: &str) -> Vec<String> {
    let stripped: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    stripped.split_whitespace().map(|s| s.to_string()).collect()
}

/// Longest-common-subsequence length over two token sequences.
fn lcs_len(a: &[String], b: &[String]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }
    dp[a.len()][b.len()]
}

/// Title similarity: LCS token length over the longer token sequence's
/// length (§4.5). `0.0` when either title tokenizes to nothing.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let ta = normalized_title_tokens(a);
    let tb = normalized_title_tokens(b);
    let longer = ta.len().max(tb.len());
    if longer == 0 {
        return 0.0;
    }
    lcs_len(&ta, &tb) as f64 / longer as f64
}

pub const NEAR_DUP_THRESHOLD: f64 = 0.85;

/// Exact-dedup by `canonical_url` (keep earliest occurrence, preserving its
/// engine/position for scoring) followed by near-duplicate dedup by title
/// similarity (§4.5). Input order is assumed to already reflect discovery
/// order (earliest first); output preserves relative order of survivors.
pub fn dedup(hits: Vec<CanonicalHit>) -> Vec<CanonicalHit> {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut exact_deduped: Vec<CanonicalHit> = Vec::with_capacity(hits.len());
    for hit in hits {
        if seen_urls.insert(hit.canonical_url.clone()) {
            exact_deduped.push(hit);
        }
    }

    let mut survivors: Vec<CanonicalHit> = Vec::with_capacity(exact_deduped.len());
    for hit in exact_deduped {
        let is_near_dup = survivors
            .iter()
            .any(|kept| title_similarity(&kept.title, &hit.title) >= NEAR_DUP_THRESHOLD);
        if !is_near_dup {
            survivors.push(hit);
        }
    }
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str, title: &str) -> RawHit {
        RawHit {
            title: title.to_string(),
            url: url.to_string(),
            snippet: "snippet".to_string(),
            engine: "duckduckgo".to_string(),
            published_date: None,
            position_in_engine: 1,
        }
    }

    #[test]
    fn canonicalization_strips_tracking_params_and_is_idempotent() {
        let canon = canonicalize_url("https://Example.com:443/a//b/?utm_source=t&z=1&a=2#frag").unwrap();
        assert_eq!(canon, "https://example.com/a/b?a=2&z=1");
        let twice = canonicalize_url(&canon).unwrap();
        assert_eq!(canon, twice);
    }

    #[test]
    fn root_path_trailing_slash_preserved() {
        let canon = canonicalize_url("https://example.com/").unwrap();
        assert_eq!(canon, "https://example.com/");
    }

    #[test]
    fn non_http_scheme_is_dropped() {
        assert!(canonicalize_url("ftp://example.com/file").is_none());
    }

    #[test]
    fn domain_extraction_strips_leading_www() {
        let canon = canonicalize(hit("https://www.nature.com/articles/x", "Title")).unwrap();
        assert_eq!(canon.domain, "nature.com");

        // A real subdomain is left alone — this is not full
        // public-suffix-aware parsing (see `extract_domain`'s doc comment).
        let canon = canonicalize(hit("https://en.wikipedia.org/wiki/Rust", "Title")).unwrap();
        assert_eq!(canon.domain, "en.wikipedia.org");
    }

    #[test]
    fn exact_dedup_keeps_earliest_tracking_variant() {
        let hits = vec![
            canonicalize(hit("https://a.example/x?utm_source=t", "Title A")).unwrap(),
            canonicalize(hit("https://a.example/x", "Title A")).unwrap(),
        ];
        let out = dedup(hits);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].canonical_url, "https://a.example/x");
    }

    #[test]
    fn near_duplicate_titles_are_dropped() {
        let hits = vec![
            canonicalize(hit("https://a.example/1", "Rust Programming Language Guide")).unwrap(),
            canonicalize(hit("https://b.example/2", "Rust Programming Language Guide!!")).unwrap(),
            canonicalize(hit("https://c.example/3", "Totally Unrelated Content Here")).unwrap(),
        ];
        let out = dedup(hits);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].canonical_url, "https://a.example/1");
        assert_eq!(out[1].canonical_url, "https://c.example/3");
    }

    #[test]
    fn title_similarity_is_symmetric_ratio_of_lcs() {
        let sim = title_similarity("hello world foo", "hello world bar");
        assert!((sim - (2.0 / 3.0)).abs() < 1e-9);
    }
}
