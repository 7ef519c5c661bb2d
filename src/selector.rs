use anyhow::Result;
use rand::prelude::*;
use tracing::{info, warn};

use crate::diversity::check_topic_similarity;
use crate::history::RecentArticle;
use crate::llm;
use crate::outcome::Outcome;
use crate::{LLMParams, TARGET_STORE};

/// A topic proposed by a source, before diversity filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicCandidate {
    pub title: String,
    pub related_queries: Vec<String>,
}

impl TopicCandidate {
    pub fn bare(title: impl Into<String>) -> Self {
        TopicCandidate {
            title: title.into(),
            related_queries: Vec::new(),
        }
    }
}

/// How a selected topic was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionReason {
    /// Operator-specified topic, returned without diversity filtering.
    ManualOverride,
    /// First candidate from the named source to pass the diversity filter.
    PassedDiversity { source: String },
    /// Every source was exhausted; a static-pool topic was used even though
    /// diversity could not be guaranteed.
    StaticFallback,
}

#[derive(Debug, Clone)]
pub struct SelectedTopic {
    pub candidate: TopicCandidate,
    pub reason: SelectionReason,
}

/// Capability interface for topic sources.
pub trait TopicSource {
    fn name(&self) -> &str;
    async fn fetch_candidates(&self) -> Result<Vec<TopicCandidate>>;
}

/// A fixed list of topics; also the shape of the last-resort fallback pool.
#[derive(Debug, Clone)]
pub struct StaticTopicSource {
    name: String,
    topics: Vec<TopicCandidate>,
}

impl StaticTopicSource {
    pub fn new(name: impl Into<String>, topics: Vec<TopicCandidate>) -> Self {
        StaticTopicSource {
            name: name.into(),
            topics,
        }
    }
}

impl TopicSource for StaticTopicSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_candidates(&self) -> Result<Vec<TopicCandidate>> {
        Ok(self.topics.clone())
    }
}

/// Topics proposed by the text-completion collaborator for a configured
/// niche.
pub struct LlmTopicSource {
    niche: String,
    llm: LLMParams,
}

impl LlmTopicSource {
    pub fn new(niche: impl Into<String>, llm: LLMParams) -> Self {
        LlmTopicSource {
            niche: niche.into(),
            llm,
        }
    }
}

impl TopicSource for LlmTopicSource {
    fn name(&self) -> &str {
        "llm-suggestion"
    }

    async fn fetch_candidates(&self) -> Result<Vec<TopicCandidate>> {
        let seeds = match llm::expand_niche_seeds(&self.niche, &self.llm).await {
            Outcome::Success(seeds) => seeds,
            Outcome::Degraded { value, reason } => {
                warn!(target: TARGET_STORE, "Degraded niche expansion: {}", reason);
                value
            }
            Outcome::Failed(e) => return Err(e),
        };
        Ok(seeds.into_iter().map(TopicCandidate::bare).collect())
    }
}

/// The registered set of topic sources, walked in configuration order.
pub enum SourceKind {
    Static(StaticTopicSource),
    Llm(LlmTopicSource),
}

impl TopicSource for SourceKind {
    fn name(&self) -> &str {
        match self {
            SourceKind::Static(s) => s.name(),
            SourceKind::Llm(s) => s.name(),
        }
    }

    async fn fetch_candidates(&self) -> Result<Vec<TopicCandidate>> {
        match self {
            SourceKind::Static(s) => s.fetch_candidates().await,
            SourceKind::Llm(s) => s.fetch_candidates().await,
        }
    }
}

/// Walks the configured sources in order and returns the first candidate
/// that passes the diversity filter.
///
/// A manual override short-circuits the whole walk, unfiltered. If every
/// source is exhausted, a random pick from the static fallback pool is
/// returned even when it fails the diversity check: diversity is a soft
/// preference, availability a hard requirement.
pub async fn select_topic(
    manual_override: Option<TopicCandidate>,
    sources: &[SourceKind],
    recent_history: &[RecentArticle],
    fallback_pool: &[TopicCandidate],
    diversity_threshold: f64,
) -> SelectedTopic {
    if let Some(candidate) = manual_override {
        info!(target: TARGET_STORE, "Using manually specified topic '{}'", candidate.title);
        return SelectedTopic {
            candidate,
            reason: SelectionReason::ManualOverride,
        };
    }

    let mut rng = rand::rng();

    for source in sources {
        let mut batch = match source.fetch_candidates().await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(target: TARGET_STORE, "Topic source {} failed: {}", source.name(), e);
                continue;
            }
        };
        batch.shuffle(&mut rng);

        for candidate in batch {
            let verdict = check_topic_similarity(
                &candidate.title,
                &candidate.related_queries,
                recent_history,
                diversity_threshold,
            );
            if verdict.is_too_similar {
                info!(
                    target: TARGET_STORE,
                    "Rejecting '{}' from {}: {:.3} similar to '{}'",
                    candidate.title,
                    source.name(),
                    verdict.highest_score,
                    verdict.most_similar_title.as_deref().unwrap_or("?")
                );
                continue;
            }
            info!(target: TARGET_STORE, "Accepted topic '{}' from {}", candidate.title, source.name());
            return SelectedTopic {
                candidate,
                reason: SelectionReason::PassedDiversity {
                    source: source.name().to_string(),
                },
            };
        }
    }

    let candidate = fallback_pool
        .choose(&mut rng)
        .cloned()
        .unwrap_or_else(|| TopicCandidate::bare("evergreen topic roundup"));
    warn!(target: TARGET_STORE, "All topic sources exhausted, falling back to '{}'", candidate.title);
    SelectedTopic {
        candidate,
        reason: SelectionReason::StaticFallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn recent(title: &str, keywords: &[&str]) -> RecentArticle {
        RecentArticle {
            title: title.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn manual_override_short_circuits_diversity() {
        // The override matches recent history exactly and is still returned.
        let history = vec![recent("Best Electric Bikes 2024", &["electric", "bike"])];
        let selected = select_topic(
            Some(TopicCandidate::bare("Best Electric Bikes 2024")),
            &[],
            &history,
            &[],
            0.1,
        )
        .await;

        assert_eq!(selected.reason, SelectionReason::ManualOverride);
        assert_eq!(selected.candidate.title, "Best Electric Bikes 2024");
    }

    #[tokio::test]
    async fn first_passing_candidate_is_accepted() {
        let history = vec![recent("Best Electric Bikes 2024", &["electric", "bike"])];
        let sources = vec![SourceKind::Static(StaticTopicSource::new(
            "feed",
            vec![TopicCandidate::bare("Sourdough Starter Troubleshooting")],
        ))];

        let selected = select_topic(None, &sources, &history, &[], 0.35).await;
        assert_eq!(
            selected.reason,
            SelectionReason::PassedDiversity {
                source: "feed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn exhausted_sources_fall_back_to_static_pool() {
        let history = vec![recent("Best Electric Bikes 2024", &["electric", "bike", "commuter"])];
        // Every source candidate collides with history.
        let sources = vec![SourceKind::Static(StaticTopicSource::new(
            "feed",
            vec![TopicCandidate::bare("Best Electric Bikes for Commuters")],
        ))];
        // The pool candidate also collides, but is returned anyway.
        let pool = vec![TopicCandidate::bare("Electric Bike Commuter Guide")];

        let selected = select_topic(None, &sources, &history, &pool, 0.2).await;
        assert_eq!(selected.reason, SelectionReason::StaticFallback);
        assert_eq!(selected.candidate.title, "Electric Bike Commuter Guide");
    }

    #[tokio::test]
    async fn empty_everything_still_returns_a_topic() {
        let selected = select_topic(None, &[], &[], &[], 0.35).await;
        assert_eq!(selected.reason, SelectionReason::StaticFallback);
        assert!(!selected.candidate.title.is_empty());
    }
}
