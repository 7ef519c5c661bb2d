use anyhow::{anyhow, Context, Result};
use async_openai::types::{
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::options::GenerationOptions;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::cannibalization::CorpusArticle;
use crate::outcome::Outcome;
use crate::prompts;
use crate::types::{
    CannibalizationResult, KeywordCandidate, KeywordMetrics, OverlappingArticle, SearchIntent,
};
use crate::{LLMClient, LLMParams, TARGET_LLM_REQUEST};

const LLM_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RETRIES: usize = 3;

/// Generates a completion for the given prompt, retrying with exponential
/// backoff on error or timeout. Returns `None` if every attempt fails.
pub async fn generate_llm_response(prompt: &str, params: &LLMParams) -> Option<String> {
    let mut response_text = String::new();
    let mut backoff = 2;

    debug!(target: TARGET_LLM_REQUEST, "Starting LLM response generation for prompt: {}", prompt);

    for retry_count in 0..MAX_RETRIES {
        match timeout(LLM_TIMEOUT, generate_once(prompt, params)).await {
            Ok(Ok(response)) => {
                debug!(target: TARGET_LLM_REQUEST, "LLM response received: {}", response);
                response_text = response;
                break;
            }
            Ok(Err(e)) => {
                warn!(target: TARGET_LLM_REQUEST, "Error generating response: {}", e);
                if retry_count < MAX_RETRIES - 1 {
                    info!(target: TARGET_LLM_REQUEST, "Retrying LLM request... ({}/{})", retry_count + 1, MAX_RETRIES);
                } else {
                    error!(target: TARGET_LLM_REQUEST, "Failed to generate response after {} retries", MAX_RETRIES);
                }
            }
            Err(_) => {
                warn!(target: TARGET_LLM_REQUEST, "LLM request timed out");
                if retry_count < MAX_RETRIES - 1 {
                    info!(target: TARGET_LLM_REQUEST, "Retrying LLM request... ({}/{})", retry_count + 1, MAX_RETRIES);
                } else {
                    error!(target: TARGET_LLM_REQUEST, "Failed to generate response after {} retries due to timeouts", MAX_RETRIES);
                }
            }
        }

        if retry_count < MAX_RETRIES - 1 {
            debug!(target: TARGET_LLM_REQUEST, "Backing off for {} seconds before retry", backoff);
            sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }

    if response_text.is_empty() {
        error!(target: TARGET_LLM_REQUEST, "No response generated after all retries");
        None
    } else {
        Some(response_text)
    }
}

async fn generate_once(prompt: &str, params: &LLMParams) -> Result<String> {
    match &params.llm_client {
        LLMClient::Ollama(ollama) => {
            let mut request = GenerationRequest::new(params.model.clone(), prompt.to_string());
            request.options = Some(GenerationOptions::default().temperature(params.temperature));
            let response = ollama
                .generate(request)
                .await
                .map_err(|e| anyhow!("Ollama generation failed: {}", e))?;
            Ok(response.response)
        }
        LLMClient::OpenAI(client) => {
            let request = CreateChatCompletionRequestArgs::default()
                .model(params.model.clone())
                .temperature(params.temperature)
                .messages(vec![ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into()])
                .build()?;
            let response = client.chat().create(request).await?;
            response
                .choices
                .first()
                .and_then(|choice| choice.message.content.clone())
                .ok_or_else(|| anyhow!("OpenAI returned no completion choices"))
        }
    }
}

/// Parses a JSON payload out of an LLM response, tolerating the Markdown code
/// fences models like to wrap JSON in.
pub fn parse_json_payload<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    let without_fences = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(without_fences).context("Failed to parse JSON from LLM response")
}

#[derive(Debug, Deserialize)]
struct RawKeywordMetrics {
    keyword: String,
    #[serde(rename = "estimatedVolume", default)]
    estimated_volume: String,
    #[serde(rename = "estimatedDifficulty", default)]
    estimated_difficulty: i64,
    #[serde(default)]
    trend: String,
}

/// Fetches volume/difficulty/trend estimates for up to 30 candidates in one
/// batched call. A hard failure here is the caller's problem: the research
/// step has nothing useful to do without metrics.
pub async fn fetch_keyword_metrics(
    topic: &str,
    candidates: &[KeywordCandidate],
    params: &LLMParams,
) -> Outcome<Vec<KeywordMetrics>> {
    let prompt = prompts::keyword_metrics_prompt(topic, candidates);
    let response = match generate_llm_response(&prompt, params).await {
        Some(text) => text,
        None => return Outcome::Failed(anyhow!("Keyword metrics call produced no response")),
    };

    let raw: Vec<RawKeywordMetrics> = match parse_json_payload(&response) {
        Ok(parsed) => parsed,
        Err(e) => return Outcome::Failed(e),
    };

    let metrics = raw
        .into_iter()
        .map(|m| {
            KeywordMetrics::validated(
                m.keyword,
                "gpt".to_string(),
                &m.estimated_volume,
                m.estimated_difficulty,
                "informational",
                &m.trend,
            )
        })
        .collect();
    Outcome::Success(metrics)
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    keyword: String,
    #[serde(default)]
    intent: String,
}

/// Classifies search intent for a batch of keywords. Degrades to
/// `Informational` for every keyword the collaborator failed to classify.
pub async fn classify_intents(
    keywords: &[String],
    params: &LLMParams,
) -> Outcome<HashMap<String, SearchIntent>> {
    let prompt = prompts::intent_classification_prompt(keywords);
    let fallback: HashMap<String, SearchIntent> = keywords
        .iter()
        .map(|k| (k.to_lowercase(), SearchIntent::Informational))
        .collect();

    let response = match generate_llm_response(&prompt, params).await {
        Some(text) => text,
        None => {
            return Outcome::degraded(fallback, "Intent classification produced no response");
        }
    };

    match parse_json_payload::<Vec<RawIntent>>(&response) {
        Ok(raw) => {
            let mut intents = fallback;
            for entry in raw {
                intents.insert(
                    entry.keyword.to_lowercase(),
                    SearchIntent::parse_lenient(&entry.intent),
                );
            }
            Outcome::Success(intents)
        }
        Err(e) => {
            warn!(target: TARGET_LLM_REQUEST, "Unparseable intent classification response: {}", e);
            Outcome::degraded(
                keywords
                    .iter()
                    .map(|k| (k.to_lowercase(), SearchIntent::Informational))
                    .collect(),
                "Intent classification response was not valid JSON",
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawOverlappingArticle {
    #[serde(default)]
    title: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    similarity: f64,
    #[serde(rename = "matchedKeywords", default)]
    matched_keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCannibalization {
    keyword: String,
    #[serde(rename = "overlappingArticles", default)]
    overlapping_articles: Vec<RawOverlappingArticle>,
    #[serde(rename = "isCannibalized", default)]
    is_cannibalized: bool,
    #[serde(rename = "suggestedLongTails", default)]
    suggested_long_tails: Vec<String>,
}

/// Submits one batched overlap comparison of candidates against the corpus.
/// Results are normalized locally: the 0.6 cutoff is enforced here, not
/// trusted from the collaborator.
pub async fn assess_cannibalization(
    candidates: &[KeywordCandidate],
    corpus: &[CorpusArticle],
    params: &LLMParams,
) -> Outcome<Vec<CannibalizationResult>> {
    let prompt = prompts::cannibalization_prompt(candidates, corpus);
    let response = match generate_llm_response(&prompt, params).await {
        Some(text) => text,
        None => return Outcome::Failed(anyhow!("Cannibalization call produced no response")),
    };

    let raw: Vec<RawCannibalization> = match parse_json_payload(&response) {
        Ok(parsed) => parsed,
        Err(e) => return Outcome::Failed(e),
    };

    let results = raw
        .into_iter()
        .map(|r| {
            CannibalizationResult {
                keyword: r.keyword,
                overlapping_articles: r
                    .overlapping_articles
                    .into_iter()
                    .map(|a| OverlappingArticle {
                        title: a.title,
                        slug: a.slug,
                        similarity: a.similarity,
                        matched_keywords: a.matched_keywords,
                    })
                    .collect(),
                is_cannibalized: r.is_cannibalized,
                suggested_long_tails: r.suggested_long_tails,
            }
            .normalized()
        })
        .collect();
    Outcome::Success(results)
}

/// Suggests long-tail phrases for a primary keyword. Long-tails are an
/// enhancement, so every failure degrades to an empty list.
pub async fn suggest_long_tails(primary_keyword: &str, params: &LLMParams) -> Outcome<Vec<String>> {
    let prompt = prompts::long_tail_prompt(primary_keyword);
    let response = match generate_llm_response(&prompt, params).await {
        Some(text) => text,
        None => return Outcome::degraded(Vec::new(), "Long-tail call produced no response"),
    };

    match parse_json_payload::<Vec<String>>(&response) {
        Ok(phrases) => Outcome::Success(phrases),
        Err(e) => {
            warn!(target: TARGET_LLM_REQUEST, "Unparseable long-tail response: {}", e);
            Outcome::degraded(Vec::new(), "Long-tail response was not valid JSON")
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSeeds {
    #[serde(default)]
    seeds: Vec<String>,
}

/// Expands a niche into seed topics for the pipeline to research.
pub async fn expand_niche_seeds(niche: &str, params: &LLMParams) -> Outcome<Vec<String>> {
    let prompt = prompts::niche_expansion_prompt(niche);
    let response = match generate_llm_response(&prompt, params).await {
        Some(text) => text,
        None => return Outcome::degraded(Vec::new(), "Niche expansion produced no response"),
    };

    match parse_json_payload::<RawSeeds>(&response) {
        Ok(raw) => Outcome::Success(raw.seeds),
        Err(e) => {
            warn!(target: TARGET_LLM_REQUEST, "Unparseable niche expansion response: {}", e);
            Outcome::degraded(Vec::new(), "Niche expansion response was not valid JSON")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_payload_strips_code_fences() {
        let fenced = "```json\n[\"ebike range\", \"best ebike\"]\n```";
        let parsed: Vec<String> = parse_json_payload(fenced).unwrap();
        assert_eq!(parsed, vec!["ebike range", "best ebike"]);
    }

    #[test]
    fn parse_json_payload_accepts_bare_json() {
        let parsed: RawSeeds = parse_json_payload("{\"seeds\": [\"gravel bikes\"]}").unwrap();
        assert_eq!(parsed.seeds, vec!["gravel bikes"]);
    }

    #[test]
    fn parse_json_payload_rejects_prose() {
        let result: Result<Vec<String>> = parse_json_payload("Sure! Here are some keywords.");
        assert!(result.is_err());
    }

    #[test]
    fn raw_metrics_accept_wire_field_names() {
        let raw: Vec<RawKeywordMetrics> = parse_json_payload(
            "[{\"keyword\": \"ebike\", \"estimatedVolume\": \"high\", \"estimatedDifficulty\": 62, \"trend\": \"rising\"}]",
        )
        .unwrap();
        assert_eq!(raw[0].keyword, "ebike");
        assert_eq!(raw[0].estimated_difficulty, 62);
    }
}
