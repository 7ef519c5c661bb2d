use tracing::{info, warn};

use crate::cluster_store::TopicCluster;
use crate::history::PublishedRecord;
use crate::llm;
use crate::outcome::Outcome;
use crate::types::{CannibalizationResult, KeywordCandidate};
use crate::{LLMParams, TARGET_LLM_REQUEST};

/// Candidates actually submitted to the collaborator. Later arrivals are
/// marked non-cannibalized unchecked, trading coverage for call cost.
const MAX_CHECKED_CANDIDATES: usize = 10;

/// A previously published article as seen by the detector, merged from
/// publish history and the cluster store.
#[derive(Debug, Clone)]
pub struct CorpusArticle {
    pub title: String,
    pub slug: String,
    pub keywords: Vec<String>,
}

/// Merges the two independently persisted corpus sources, deduplicating by
/// slug with first occurrence winning. History records come first, so they
/// take precedence over cluster-store entries with the same slug.
pub fn build_corpus(history: &[PublishedRecord], clusters: &[TopicCluster]) -> Vec<CorpusArticle> {
    let mut corpus: Vec<CorpusArticle> = Vec::new();

    for record in history {
        if corpus.iter().any(|a| a.slug == record.slug) {
            continue;
        }
        corpus.push(CorpusArticle {
            title: record.title.clone(),
            slug: record.slug.clone(),
            keywords: record.keywords.clone(),
        });
    }

    for cluster in clusters {
        for article in &cluster.articles {
            if corpus.iter().any(|a| a.slug == article.slug) {
                continue;
            }
            corpus.push(CorpusArticle {
                title: article.title.clone(),
                slug: article.slug.clone(),
                keywords: article.keywords.clone(),
            });
        }
    }

    corpus
}

/// Checks candidate keywords for overlap against the published corpus.
pub struct CannibalizationDetector<'a> {
    llm: &'a LLMParams,
}

impl<'a> CannibalizationDetector<'a> {
    pub fn new(llm: &'a LLMParams) -> Self {
        CannibalizationDetector { llm }
    }

    /// Returns one result per candidate, in candidate order.
    ///
    /// With an empty corpus there is nothing to overlap with, so every
    /// candidate is trivially clean and no collaborator call is made. On
    /// collaborator failure every checked candidate fails open to clean: a
    /// missed cannibalization is less harmful than a blocked pipeline.
    pub async fn check(
        &self,
        candidates: &[KeywordCandidate],
        corpus: &[CorpusArticle],
    ) -> Vec<CannibalizationResult> {
        if corpus.is_empty() {
            return candidates
                .iter()
                .map(|c| CannibalizationResult::clean(&c.keyword))
                .collect();
        }

        let checked = &candidates[..candidates.len().min(MAX_CHECKED_CANDIDATES)];
        info!(
            target: TARGET_LLM_REQUEST,
            "Checking {} of {} candidates against a corpus of {} articles",
            checked.len(),
            candidates.len(),
            corpus.len()
        );

        let assessed = match llm::assess_cannibalization(checked, corpus, self.llm).await {
            Outcome::Success(results) => results,
            Outcome::Degraded { value, reason } => {
                warn!(target: TARGET_LLM_REQUEST, "Degraded cannibalization check: {}", reason);
                value
            }
            Outcome::Failed(e) => {
                warn!(target: TARGET_LLM_REQUEST, "Cannibalization check failed ({}), treating all candidates as clean", e);
                Vec::new()
            }
        };

        candidates
            .iter()
            .map(|candidate| {
                assessed
                    .iter()
                    .find(|r| r.keyword.eq_ignore_ascii_case(&candidate.keyword))
                    .cloned()
                    .unwrap_or_else(|| CannibalizationResult::clean(&candidate.keyword))
            })
            .collect()
    }
}
