//! Backend Fetcher (C4, §4.4, §6.2): one HTTP GET to the meta-search
//! backend, parsed into `RawHit`s with per-engine position assignment.

use crate::error::PipelineError;
use crate::types::{EnginePlan, RawHit};
use serde::Deserialize;
use std::time::Duration;

pub const BACKEND_DEADLINE: Duration = Duration::from_secs(8);

#[derive(Debug, Deserialize)]
struct BackendResponse {
    #[serde(default)]
    results: Vec<BackendResult>,
}

#[derive(Debug, Deserialize)]
struct BackendResult {
    title: Option<String>,
    url: Option<String>,
    #[serde(default)]
    content: String,
    engine: Option<String>,
    #[serde(rename = "publishedDate", default)]
    published_date: Option<String>,
}

/// Issues the single request described in §6.2 and returns the parsed hits.
/// A transport error, non-2xx, or malformed body is a fatal
/// `PipelineError::BackendUnavailable` (502 to the caller, §4.4) — the
/// backend is local and not retried.
pub async fn fetch(http_client: &reqwest::Client, base_url: &str, query: &str, plan: &EnginePlan) -> Result<Vec<RawHit>, PipelineError> {
    let engines = plan.engines.join(",");
    let categories = plan.categories.join(",");

    let request = http_client.get(base_url).query(&[
        ("q", query),
        ("engines", engines.as_str()),
        ("categories", categories.as_str()),
        ("format", "json"),
    ]);

    // The deadline must bound the whole request lifecycle, not just the
    // initial `send()` — a slow response body can otherwise blow the stage
    // deadline while only the client-wide timeout still applies.
    let parsed: BackendResponse = tokio::time::timeout(BACKEND_DEADLINE, async {
        let response = request.send().await.map_err(|err| PipelineError::BackendUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendUnavailable(format!("backend returned status {}", response.status())));
        }

        response.json().await.map_err(|err| PipelineError::BackendUnavailable(format!("malformed backend response: {err}")))
    })
    .await
    .map_err(|_| PipelineError::BackendUnavailable(format!("backend did not respond within {BACKEND_DEADLINE:?}")))??;

    Ok(assign_positions(parsed.results))
}

/// Assigns `position_in_engine` per-engine by discovery order within the
/// response, dropping hits missing required fields or carrying an invalid
/// URL (§3's parse-time drop rule, §4.4).
fn assign_positions(results: Vec<BackendResult>) -> Vec<RawHit> {
    use std::collections::HashMap;
    let mut next_position: HashMap<String, u32> = HashMap::new();
    let mut hits = Vec::with_capacity(results.len());

    for result in results {
        let (Some(title), Some(url), Some(engine)) = (result.title, result.url, result.engine) else { continue };
        if url::Url::parse(&url).is_err() {
            continue;
        }

        let position_in_engine = next_position.entry(engine.clone()).or_insert(0);
        *position_in_engine += 1;

        hits.push(RawHit {
            title,
            url,
            snippet: result.content,
            engine,
            published_date: result.published_date,
            position_in_engine: *position_in_engine,
        });
    }

    hits
}
