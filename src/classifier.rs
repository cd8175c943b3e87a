//! Intent Classifier (C2, §4.2, §6.3): a single bounded call to an LLM
//! endpoint, with strict-then-lenient JSON parsing and a fixed fallback.

use crate::types::{ExpandedQuery, Intent};
use serde::Deserialize;
use std::time::Duration;

pub const CLASSIFIER_DEADLINE: Duration = Duration::from_secs(3);

const SYSTEM_PROMPT: &str = "You are a search query classifier. Given a user's search query, \
respond with ONLY a strict JSON object of the form {\"intent\": <one of \"research\", \
\"biomedical\", \"code\", \"news\", \"general\">, \"expanded_query\": <a slightly expanded or \
clarified version of the query>}. Do not include any prose, explanation, or markdown fences.";

#[derive(Debug, Deserialize)]
struct ClassifierPayload {
    intent: String,
    #[serde(default)]
    expanded_query: String,
}

/// Calls the configured LLM endpoint and returns the resolved `ExpandedQuery`.
/// Never fails: any transport error, non-2xx, timeout, or unparseable body
/// is swallowed and logged as `classifier_degraded`, falling back to
/// `{intent: general, text: raw_query}` (§4.2, §7).
pub async fn classify(http_client: &reqwest::Client, base_url: &str, model: &str, api_key: Option<&str>, query: &str) -> ExpandedQuery {
    match classify_inner(http_client, base_url, model, api_key, query).await {
        Ok(expanded) => expanded,
        Err(err) => {
            tracing::warn!(degradation = "classifier_degraded", error = %err, "intent classification failed, falling back to general");
            ExpandedQuery { intent: Intent::General, text: query.to_string() }
        }
    }
}

async fn classify_inner(
    http_client: &reqwest::Client,
    base_url: &str,
    model: &str,
    api_key: Option<&str>,
    query: &str,
) -> anyhow::Result<ExpandedQuery> {
    let api_key = api_key.ok_or_else(|| anyhow::anyhow!("ANTHROPIC_API_KEY not configured"))?;

    let body = serde_json::json!({
        "model": model,
        "max_tokens": 256,
        "system": SYSTEM_PROMPT,
        "messages": [{"role": "user", "content": query}],
    });

    // The deadline must bound the whole request lifecycle, not just the
    // initial `send()` — a slow response body can otherwise blow the stage
    // deadline while only the client-wide timeout still applies.
    let raw: serde_json::Value = tokio::time::timeout(CLASSIFIER_DEADLINE, async {
        let response = http_client
            .post(base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("classifier returned status {}", response.status());
        }

        response.json::<serde_json::Value>().await.map_err(anyhow::Error::from)
    })
    .await
    .map_err(|_| anyhow::anyhow!("classifier call timed out"))??;

    let text = extract_text(&raw).ok_or_else(|| anyhow::anyhow!("classifier response missing text content"))?;
    let payload = parse_payload(&text)?;

    let intent = Intent::from_label(&payload.intent);
    let text = if payload.expanded_query.trim().is_empty() { query.to_string() } else { payload.expanded_query };
    Ok(ExpandedQuery { intent, text })
}

/// Pulls the assistant's text content out of an Anthropic Messages response.
fn extract_text(raw: &serde_json::Value) -> Option<String> {
    raw.get("content")?.as_array()?.iter().find_map(|block| block.get("text")?.as_str()).map(str::to_string)
}

/// Strict parse first; on failure, strip surrounding prose and take the
/// first top-level JSON object (§4.2, §6.3).
fn parse_payload(text: &str) -> anyhow::Result<ClassifierPayload> {
    if let Ok(payload) = serde_json::from_str::<ClassifierPayload>(text.trim()) {
        return Ok(payload);
    }

    let object = first_json_object(text).ok_or_else(|| anyhow::anyhow!("no JSON object found in classifier response"))?;
    let payload: ClassifierPayload = serde_json::from_str(&object)?;
    Ok(payload)
}

/// Extracts the first balanced `{...}` substring, tolerating braces nested
/// inside string literals.
fn first_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_json() {
        let payload = parse_payload(r#"{"intent": "code", "expanded_query": "rust async runtimes"}"#).unwrap();
        assert_eq!(payload.intent, "code");
        assert_eq!(payload.expanded_query, "rust async runtimes");
    }

    #[test]
    fn strips_surrounding_prose() {
        let text = "Sure, here you go:\n```json\n{\"intent\": \"news\", \"expanded_query\": \"latest rust release\"}\n```";
        let payload = parse_payload(text).unwrap();
        assert_eq!(payload.intent, "news");
    }

    #[test]
    fn unknown_intent_label_normalizes_to_general() {
        assert_eq!(Intent::from_label("xyz"), Intent::General);
    }

    #[test]
    fn empty_expanded_query_is_rejected_by_caller_fallback() {
        let payload = parse_payload(r#"{"intent": "research", "expanded_query": ""}"#).unwrap();
        assert!(payload.expanded_query.is_empty());
    }
}
