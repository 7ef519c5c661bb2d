use anyhow::{Context, Result};
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::llm;
use crate::providers::{KeywordDataProvider, Provider};
use crate::types::{
    CannibalizationResult, KeywordCandidate, KeywordMetrics, KeywordPlan, SearchIntent,
    SearchVolume, Trend,
};
use crate::{LLMParams, TARGET_LLM_REQUEST};

/// Hard cap on the candidate pool before metrics estimation. Ranking quality
/// beyond the cap is sacrificed to bound collaborator cost.
const MAX_CANDIDATE_POOL: usize = 30;

/// Related queries folded into the provider seed set.
const MAX_SEED_QUERIES: usize = 3;

/// Secondary keywords carried in a plan.
const MAX_SECONDARY_KEYWORDS: usize = 5;

/// Word count at which an autocomplete phrase qualifies as a long-tail.
const MIN_LONG_TAIL_WORDS: usize = 4;

/// Aggregates provider suggestions, delegates metric estimation to the
/// text-completion collaborator, and assembles ranked keyword plans.
pub struct KeywordResearchEngine {
    providers: Vec<Provider>,
    llm: LLMParams,
}

impl KeywordResearchEngine {
    pub fn new(providers: Vec<Provider>, llm: LLMParams) -> Self {
        KeywordResearchEngine { providers, llm }
    }

    /// Gathers, deduplicates, and scores keyword candidates for a topic.
    ///
    /// Provider failures and unavailable providers are skipped; a failed
    /// metrics call is the one hard error here, propagated for the pipeline
    /// orchestrator to retry or abort.
    pub async fn research_keywords(
        &self,
        topic: &str,
        related_queries: &[String],
    ) -> Result<Vec<KeywordMetrics>> {
        let candidates = self.gather_candidates(topic, related_queries).await;
        if candidates.is_empty() {
            info!(target: TARGET_LLM_REQUEST, "No keyword candidates gathered for '{}'", topic);
            return Ok(Vec::new());
        }

        let estimated = llm::fetch_keyword_metrics(topic, &candidates, &self.llm)
            .await
            .into_result()
            .with_context(|| format!("Keyword metrics research failed for '{}'", topic))?;

        let mut metrics = merge_metrics(&candidates, estimated);

        let keywords: Vec<String> = metrics.iter().map(|m| m.keyword.clone()).collect();
        let intents = llm::classify_intents(&keywords, &self.llm).await;
        if intents.is_degraded() {
            warn!(target: TARGET_LLM_REQUEST, "Intent classification degraded for '{}'", topic);
        }
        if let Ok(intents) = intents.into_result() {
            for metric in &mut metrics {
                if let Some(intent) = intents.get(&metric.keyword.to_lowercase()) {
                    metric.intent = *intent;
                }
            }
        }

        Ok(metrics)
    }

    /// Expands a primary keyword into long-tail phrases: autocomplete-derived
    /// phrases of four words or more, combined with collaborator suggestions.
    ///
    /// Long-tails are an enhancement, so both sources failing yields an empty
    /// list rather than an error.
    pub async fn expand_long_tails(&self, primary_keyword: &str) -> Vec<String> {
        let mut phrases = Vec::new();

        for provider in self.providers.iter().filter(|p| p.is_available()) {
            match provider.get_keyword_suggestions(primary_keyword).await {
                Ok(suggestions) => {
                    phrases.extend(
                        suggestions
                            .into_iter()
                            .map(|s| s.keyword)
                            .filter(|k| is_long_tail(k)),
                    );
                }
                Err(e) => {
                    warn!(target: TARGET_LLM_REQUEST, "Provider {} failed during long-tail expansion: {}", provider.name(), e);
                }
            }
        }

        let suggested = llm::suggest_long_tails(primary_keyword, &self.llm)
            .await
            .recover_with(Vec::new());
        phrases.extend(suggested);

        dedupe_keywords(phrases)
    }

    async fn gather_candidates(
        &self,
        topic: &str,
        related_queries: &[String],
    ) -> Vec<KeywordCandidate> {
        let mut seeds: Vec<&str> = vec![topic];
        seeds.extend(
            related_queries
                .iter()
                .take(MAX_SEED_QUERIES)
                .map(String::as_str),
        );

        let available: Vec<&Provider> = self
            .providers
            .iter()
            .filter(|p| {
                if !p.is_available() {
                    info!(target: TARGET_LLM_REQUEST, "Provider {} unavailable, skipping", p.name());
                    return false;
                }
                true
            })
            .collect();

        let mut candidates = Vec::new();
        for seed in seeds {
            // Fan out across providers for one seed at a time; providers
            // handle their own politeness delays internally.
            let batches = join_all(
                available
                    .iter()
                    .map(|provider| provider.get_keyword_suggestions(seed)),
            )
            .await;

            for (provider, batch) in available.iter().zip(batches) {
                match batch {
                    Ok(suggestions) => candidates.extend(suggestions),
                    Err(e) => {
                        warn!(target: TARGET_LLM_REQUEST, "Provider {} failed for seed '{}': {}", provider.name(), seed, e);
                    }
                }
            }
        }

        let mut deduped = dedupe_candidates(candidates);
        deduped.truncate(MAX_CANDIDATE_POOL);
        deduped
    }
}

/// Deduplicates candidates case-insensitively, preserving the first-seen
/// source attribution.
pub fn dedupe_candidates(candidates: Vec<KeywordCandidate>) -> Vec<KeywordCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.keyword.to_lowercase()))
        .collect()
}

fn dedupe_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .filter(|k| seen.insert(k.to_lowercase()))
        .collect()
}

fn is_long_tail(phrase: &str) -> bool {
    phrase.split_whitespace().count() >= MIN_LONG_TAIL_WORDS
}

/// Attaches candidate source attribution to collaborator-estimated metrics.
/// Metrics with no matching candidate are kept with their default `"gpt"`
/// source.
fn merge_metrics(
    candidates: &[KeywordCandidate],
    estimated: Vec<KeywordMetrics>,
) -> Vec<KeywordMetrics> {
    estimated
        .into_iter()
        .map(|mut metric| {
            if let Some(candidate) = candidates
                .iter()
                .find(|c| c.keyword.eq_ignore_ascii_case(&metric.keyword))
            {
                metric.source = candidate.source.clone();
            }
            metric
        })
        .collect()
}

fn volume_score(volume: SearchVolume) -> f64 {
    match volume {
        SearchVolume::High => 100.0,
        SearchVolume::Medium => 70.0,
        SearchVolume::Low => 40.0,
        SearchVolume::VeryLow => 15.0,
    }
}

fn trend_score(trend: Trend) -> f64 {
    match trend {
        Trend::Rising => 100.0,
        Trend::Stable => 60.0,
        Trend::Declining => 20.0,
    }
}

/// Balanced plan score: volume 30%, ease of ranking 25%, a flat relevance
/// baseline 20%, trend 15%, non-cannibalization 10%.
pub fn plan_score(metrics: &KeywordMetrics, cannibalized: bool) -> f64 {
    let cannibalization_score = if cannibalized { 0.0 } else { 100.0 };
    volume_score(metrics.estimated_volume) * 0.30
        + (100.0 - metrics.estimated_difficulty as f64) * 0.25
        + 70.0 * 0.20
        + trend_score(metrics.trend) * 0.15
        + cannibalization_score * 0.10
}

/// "Easy win" score used by the standalone keyword-planning report:
/// difficulty 40%, volume 20%, trend 20%, non-cannibalization 15%, intent
/// bonus 5%. Kept deliberately distinct from [`plan_score`]; the two serve
/// different consumers.
pub fn easy_to_rank_score(metrics: &KeywordMetrics, cannibalized: bool) -> f64 {
    let intent_bonus = match metrics.intent {
        SearchIntent::Transactional | SearchIntent::Commercial => 100.0,
        SearchIntent::Informational | SearchIntent::Navigational => 0.0,
    };
    let cannibalization_score = if cannibalized { 0.0 } else { 100.0 };
    (100.0 - metrics.estimated_difficulty as f64) * 0.40
        + volume_score(metrics.estimated_volume) * 0.20
        + trend_score(metrics.trend) * 0.20
        + cannibalization_score * 0.15
        + intent_bonus * 0.05
}

/// Ranks scored candidates into a keyword plan. Pure: no collaborator calls,
/// no randomness, so identical inputs always produce identical plans.
///
/// The primary keyword is the top-scoring non-cannibalized candidate, falling
/// back to the global top if every candidate is cannibalized: a suboptimal
/// primary beats no plan at all. Returns `None` only when `metrics` is empty.
pub fn score_and_prioritize(
    metrics: &[KeywordMetrics],
    report: &[CannibalizationResult],
) -> Option<KeywordPlan> {
    if metrics.is_empty() {
        return None;
    }

    let cannibalized: HashSet<String> = report
        .iter()
        .filter(|r| r.is_cannibalized)
        .map(|r| r.keyword.to_lowercase())
        .collect();
    let is_cannibalized =
        |m: &KeywordMetrics| cannibalized.contains(&m.keyword.to_lowercase());

    let mut scored: Vec<(f64, &KeywordMetrics)> = metrics
        .iter()
        .map(|m| (plan_score(m, is_cannibalized(m)), m))
        .collect();
    // Stable sort keeps input order on score ties.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let (primary_score, primary) = scored
        .iter()
        .find(|(_, m)| !is_cannibalized(m))
        .copied()
        .unwrap_or(scored[0]);

    let secondary: Vec<KeywordMetrics> = scored
        .iter()
        .filter(|(_, m)| !std::ptr::eq(*m, primary) && !is_cannibalized(m))
        .take(MAX_SECONDARY_KEYWORDS)
        .map(|(_, m)| (*m).clone())
        .collect();

    let intent_profile = majority_intent(primary, &secondary);

    Some(KeywordPlan {
        primary: primary.clone(),
        secondary,
        long_tails: Vec::new(),
        intent_profile,
        cannibalization_report: report.to_vec(),
        score: primary_score,
    })
}

/// Majority intent across the primary and secondary keywords, ties broken by
/// first-seen order during tallying.
fn majority_intent(primary: &KeywordMetrics, secondary: &[KeywordMetrics]) -> SearchIntent {
    let mut tally: Vec<(SearchIntent, usize)> = Vec::new();
    for metric in std::iter::once(primary).chain(secondary.iter()) {
        match tally.iter_mut().find(|(intent, _)| *intent == metric.intent) {
            Some((_, count)) => *count += 1,
            None => tally.push((metric.intent, 1)),
        }
    }

    let mut best: Option<(SearchIntent, usize)> = None;
    for (intent, count) in tally {
        // Strictly greater keeps the first-tallied intent on ties.
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((intent, count));
        }
    }
    best.map(|(intent, _)| intent)
        .unwrap_or(SearchIntent::Informational)
}
