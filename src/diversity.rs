use std::collections::HashSet;
use tracing::debug;

use crate::history::RecentArticle;
use crate::similarity::{jaccard, keyword_set};
use crate::TARGET_STORE;

/// Verdict on whether a candidate topic is too close to recent output.
#[derive(Debug, Clone, PartialEq)]
pub struct DiversityVerdict {
    pub is_too_similar: bool,
    pub highest_score: f64,
    pub most_similar_title: Option<String>,
}

impl DiversityVerdict {
    fn distinct() -> Self {
        DiversityVerdict {
            is_too_similar: false,
            highest_score: 0.0,
            most_similar_title: None,
        }
    }
}

/// Compares a candidate topic against recently published articles.
///
/// The candidate token bag combines the title's extracted keywords with the
/// raw lowercased related queries; each recent article contributes its own
/// title keywords plus its recorded keyword list. `is_too_similar` trips at
/// `highest_score >= threshold` (inclusive, unlike the cluster-match bar).
/// Empty history is never too similar.
pub fn check_topic_similarity(
    candidate_title: &str,
    candidate_queries: &[String],
    recent_history: &[RecentArticle],
    threshold: f64,
) -> DiversityVerdict {
    if recent_history.is_empty() {
        return DiversityVerdict::distinct();
    }

    let mut candidate_bag = keyword_set(candidate_title);
    for query in candidate_queries {
        candidate_bag.insert(query.trim().to_lowercase());
    }

    let mut highest_score = 0.0;
    let mut most_similar_title = None;

    for article in recent_history {
        let mut article_bag: HashSet<String> = keyword_set(&article.title);
        article_bag.extend(article.keywords.iter().map(|k| k.to_lowercase()));

        let score = jaccard(&candidate_bag, &article_bag);
        if score > highest_score {
            highest_score = score;
            most_similar_title = Some(article.title.clone());
        }
    }

    debug!(
        target: TARGET_STORE,
        "Candidate '{}' peaked at {:.3} against recent history (threshold {:.2})",
        candidate_title, highest_score, threshold
    );

    DiversityVerdict {
        is_too_similar: highest_score >= threshold,
        highest_score,
        most_similar_title,
    }
}
