use anyhow::{anyhow, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::KeywordDataProvider;
use crate::types::KeywordCandidate;
use crate::TARGET_WEB_REQUEST;

const SUGGEST_ENDPOINT: &str = "https://suggestqueries.google.com/complete/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Query-modifier templates expanded around each seed. `{}` marks the seed
/// position.
const QUERY_MODIFIERS: &[&str] = &[
    "{}",
    "how to {}",
    "best {}",
    "{} vs",
    "{} for beginners",
    "why {}",
    "{} tips",
];

/// Keyword suggestions scraped from a public autocomplete endpoint.
///
/// One request per query-modifier template, separated by a politeness delay.
/// Individual request failures are logged and skipped so one bad template
/// never sinks the whole seed.
#[derive(Debug, Clone)]
pub struct AutocompleteProvider {
    client: reqwest::Client,
    delay: Duration,
}

impl AutocompleteProvider {
    pub fn new(delay_ms: u64) -> Self {
        AutocompleteProvider {
            client: reqwest::Client::new(),
            delay: Duration::from_millis(delay_ms),
        }
    }

    async fn fetch_suggestions(&self, query: &str) -> Result<Vec<String>> {
        debug!(target: TARGET_WEB_REQUEST, "Fetching autocomplete suggestions for '{}'", query);

        let request = self
            .client
            .get(SUGGEST_ENDPOINT)
            .query(&[("client", "firefox"), ("q", query)])
            .send();

        let response = match timeout(REQUEST_TIMEOUT, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(anyhow!("Request for '{}' failed: {}", query, e)),
            Err(_) => return Err(anyhow!("Request for '{}' timed out", query)),
        };

        if !response.status().is_success() {
            return Err(anyhow!(
                "Non-success status {} for '{}'",
                response.status(),
                query
            ));
        }

        // Response shape: [query, [suggestion, ...], ...]
        let body: Value = response.json().await?;
        let suggestions = body
            .get(1)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(suggestions)
    }
}

impl KeywordDataProvider for AutocompleteProvider {
    fn name(&self) -> &str {
        "google-autocomplete"
    }

    fn is_available(&self) -> bool {
        // The endpoint is public and unauthenticated.
        true
    }

    async fn get_keyword_suggestions(&self, seed: &str) -> Result<Vec<KeywordCandidate>> {
        let mut candidates = Vec::new();

        for (i, modifier) in QUERY_MODIFIERS.iter().enumerate() {
            let query = modifier.replace("{}", seed);

            match self.fetch_suggestions(&query).await {
                Ok(suggestions) => {
                    debug!(target: TARGET_WEB_REQUEST, "'{}' returned {} suggestions", query, suggestions.len());
                    candidates.extend(suggestions.into_iter().map(|keyword| KeywordCandidate {
                        keyword,
                        source: self.name().to_string(),
                    }));
                }
                Err(e) => {
                    warn!(target: TARGET_WEB_REQUEST, "Skipping autocomplete query '{}': {}", query, e);
                }
            }

            if i < QUERY_MODIFIERS.len() - 1 {
                sleep(self.delay).await;
            }
        }

        Ok(candidates)
    }
}
