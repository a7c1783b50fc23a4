//! # Search - Web Search Capability
//!
//! Queries SearXNG's JSON API. Endpoints are tried in order: the configured
//! URL, a few public instances, then a local instance.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{required_str, Capability, CapabilityError, CapabilityProvider};
use crate::state::ToolInput;

const PUBLIC_INSTANCES: [&str; 3] = [
    "https://searx.be",
    "https://search.sapti.me",
    "https://searx.tiekoetter.com",
];

const LOCAL_INSTANCES: [&str; 2] = ["http://localhost:8888", "http://127.0.0.1:8888"];

/// SearXNG-backed `search` provider
pub struct SearchProvider {
    client: reqwest::Client,
    endpoints: Vec<String>,
    max_results: usize,
}

impl SearchProvider {
    pub fn new(custom_url: Option<String>, max_results: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("waypoint-agent/0.1")
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoints: search_endpoints(custom_url.as_deref()),
            max_results: max_results.max(1) as usize,
        }
    }

    async fn query_endpoint(&self, endpoint: &str, query: &str) -> Option<Vec<Value>> {
        let url = format!("{}?q={}&format=json", endpoint, urlencoding::encode(query));
        let response = self.client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            tracing::debug!(endpoint, status = %response.status(), "Search endpoint refused");
            return None;
        }
        let body = response.json::<Value>().await.ok()?;
        Some(extract_results(&body, self.max_results))
    }
}

/// Build the ordered list of `/search` endpoints to try
fn search_endpoints(custom_url: Option<&str>) -> Vec<String> {
    custom_url
        .into_iter()
        .chain(PUBLIC_INSTANCES)
        .chain(LOCAL_INSTANCES)
        .map(|base| format!("{}/search", base.trim_end_matches('/')))
        .collect()
}

/// Reduce a SearXNG response to `{title, url, snippet}` records
fn extract_results(body: &Value, max_results: usize) -> Vec<Value> {
    body.get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .take(max_results)
                .map(|r| {
                    json!({
                        "title": r.get("title").and_then(Value::as_str).unwrap_or(""),
                        "url": r.get("url").and_then(Value::as_str).unwrap_or(""),
                        "snippet": r.get("content").and_then(Value::as_str).unwrap_or("")
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl CapabilityProvider for SearchProvider {
    fn capability(&self) -> Capability {
        Capability::Search
    }

    async fn invoke(&self, input: &ToolInput) -> Result<Value, CapabilityError> {
        let query = required_str(Capability::Search, input)?;
        for endpoint in &self.endpoints {
            if let Some(results) = self.query_endpoint(endpoint, query).await {
                tracing::debug!(endpoint = %endpoint, count = results.len(), "Search succeeded");
                return Ok(json!({
                    "query": query,
                    "source": endpoint,
                    "results": results
                }));
            }
        }
        Err(CapabilityError::Unavailable(
            "no search backend responded; set SEARXNG_URL to a reachable SearXNG instance"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_endpoint_comes_first() {
        let endpoints = search_endpoints(Some("http://searx.internal/"));
        assert_eq!(endpoints[0], "http://searx.internal/search");
        assert_eq!(endpoints.len(), 1 + PUBLIC_INSTANCES.len() + LOCAL_INSTANCES.len());
        assert!(endpoints.last().unwrap().ends_with("127.0.0.1:8888/search"));
    }

    #[test]
    fn test_extract_results_limits_and_maps_fields() {
        let body = json!({
            "results": [
                {"title": "A", "url": "https://a", "content": "alpha"},
                {"title": "B", "url": "https://b"},
                {"title": "C", "url": "https://c", "content": "gamma"}
            ]
        });
        let results = extract_results(&body, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["snippet"], "alpha");
        assert_eq!(results[1]["snippet"], "");
    }

    #[test]
    fn test_extract_results_without_results_key() {
        assert!(extract_results(&json!({"error": "rate limited"}), 5).is_empty());
    }
}
