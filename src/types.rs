use serde::{Deserialize, Serialize};
use tracing::warn;

/// Similarity above which an overlapping article marks a keyword as
/// cannibalized. The comparison is strict: exactly 0.6 does not trip it.
pub const CANNIBALIZATION_SIMILARITY_THRESHOLD: f64 = 0.60;

/// Estimated monthly search volume band for a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchVolume {
    High,
    Medium,
    Low,
    VeryLow,
}

impl SearchVolume {
    /// Parses a collaborator-supplied volume string, defaulting to `Low` on
    /// anything unrecognized.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" => SearchVolume::High,
            "medium" => SearchVolume::Medium,
            "low" => SearchVolume::Low,
            "very_low" | "very low" => SearchVolume::VeryLow,
            other => {
                warn!("Unrecognized search volume '{}', defaulting to low", other);
                SearchVolume::Low
            }
        }
    }
}

/// Dominant search intent behind a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchIntent {
    Informational,
    Transactional,
    Navigational,
    Commercial,
}

impl SearchIntent {
    /// Parses a collaborator-supplied intent string, defaulting to
    /// `Informational` on anything unrecognized.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "informational" => SearchIntent::Informational,
            "transactional" => SearchIntent::Transactional,
            "navigational" => SearchIntent::Navigational,
            "commercial" => SearchIntent::Commercial,
            other => {
                warn!(
                    "Unrecognized search intent '{}', defaulting to informational",
                    other
                );
                SearchIntent::Informational
            }
        }
    }
}

/// Search interest trajectory for a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Stable,
    Declining,
}

impl Trend {
    /// Parses a collaborator-supplied trend string, defaulting to `Stable` on
    /// anything unrecognized.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "rising" => Trend::Rising,
            "stable" => Trend::Stable,
            "declining" => Trend::Declining,
            other => {
                warn!("Unrecognized trend '{}', defaulting to stable", other);
                Trend::Stable
            }
        }
    }
}

/// A raw keyword suggestion before any scoring, attributed to the provider
/// that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordCandidate {
    pub keyword: String,
    pub source: String,
}

/// A keyword candidate enriched with collaborator-estimated metrics.
///
/// Every field is guaranteed in-domain: construction goes through
/// [`KeywordMetrics::validated`], which clamps and defaults out-of-range
/// collaborator output instead of trusting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordMetrics {
    pub keyword: String,
    pub source: String,
    pub estimated_volume: SearchVolume,
    pub estimated_difficulty: u8,
    pub intent: SearchIntent,
    pub trend: Trend,
}

impl KeywordMetrics {
    /// Builds metrics from raw collaborator fields, clamping difficulty into
    /// 0..=100 and defaulting unparseable enum values.
    pub fn validated(
        keyword: String,
        source: String,
        volume: &str,
        difficulty: i64,
        intent: &str,
        trend: &str,
    ) -> Self {
        let clamped = difficulty.clamp(0, 100) as u8;
        if difficulty < 0 || difficulty > 100 {
            warn!(
                "Difficulty {} for '{}' out of range, clamped to {}",
                difficulty, keyword, clamped
            );
        }
        KeywordMetrics {
            keyword,
            source,
            estimated_volume: SearchVolume::parse_lenient(volume),
            estimated_difficulty: clamped,
            intent: SearchIntent::parse_lenient(intent),
            trend: Trend::parse_lenient(trend),
        }
    }
}

/// A previously published article that overlaps a candidate keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlappingArticle {
    pub title: String,
    pub slug: String,
    pub similarity: f64,
    pub matched_keywords: Vec<String>,
}

/// Outcome of checking one keyword against the published corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CannibalizationResult {
    pub keyword: String,
    pub overlapping_articles: Vec<OverlappingArticle>,
    pub is_cannibalized: bool,
    pub suggested_long_tails: Vec<String>,
}

impl CannibalizationResult {
    /// A trivially clean result for a keyword that was never checked or had
    /// nothing to overlap with.
    pub fn clean(keyword: &str) -> Self {
        CannibalizationResult {
            keyword: keyword.to_string(),
            overlapping_articles: Vec::new(),
            is_cannibalized: false,
            suggested_long_tails: Vec::new(),
        }
    }

    /// Normalizes a collaborator-reported result: clamps per-article
    /// similarity into [0,1] and re-derives `is_cannibalized` locally rather
    /// than trusting the reported flag.
    pub fn normalized(mut self) -> Self {
        for article in &mut self.overlapping_articles {
            article.similarity = article.similarity.clamp(0.0, 1.0);
        }
        self.is_cannibalized = self
            .overlapping_articles
            .iter()
            .any(|a| a.similarity > CANNIBALIZATION_SIMILARITY_THRESHOLD);
        self
    }
}

/// The assembled research output for one topic cycle.
///
/// Immutable after construction except `long_tails`, which the separate
/// expansion step may append to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordPlan {
    pub primary: KeywordMetrics,
    pub secondary: Vec<KeywordMetrics>,
    pub long_tails: Vec<String>,
    pub intent_profile: SearchIntent,
    pub cannibalization_report: Vec<CannibalizationResult>,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_is_clamped_into_domain() {
        let metrics =
            KeywordMetrics::validated("kw".into(), "gpt".into(), "high", 150, "informational", "rising");
        assert_eq!(metrics.estimated_difficulty, 100);

        let metrics =
            KeywordMetrics::validated("kw".into(), "gpt".into(), "high", -20, "informational", "rising");
        assert_eq!(metrics.estimated_difficulty, 0);
    }

    #[test]
    fn unrecognized_enums_fall_back_to_defaults() {
        let metrics = KeywordMetrics::validated(
            "kw".into(),
            "gpt".into(),
            "astronomical",
            50,
            "mysterious",
            "sideways",
        );
        assert_eq!(metrics.estimated_volume, SearchVolume::Low);
        assert_eq!(metrics.intent, SearchIntent::Informational);
        assert_eq!(metrics.trend, Trend::Stable);
    }

    #[test]
    fn cannibalization_flag_is_rederived_locally() {
        let result = CannibalizationResult {
            keyword: "kw".into(),
            overlapping_articles: vec![OverlappingArticle {
                title: "t".into(),
                slug: "t".into(),
                similarity: 0.6,
                matched_keywords: vec![],
            }],
            // Collaborator claims cannibalized, but 0.6 is not above the cutoff.
            is_cannibalized: true,
            suggested_long_tails: vec![],
        };
        assert!(!result.normalized().is_cannibalized);

        let result = CannibalizationResult {
            keyword: "kw".into(),
            overlapping_articles: vec![OverlappingArticle {
                title: "t".into(),
                slug: "t".into(),
                similarity: 0.61,
                matched_keywords: vec![],
            }],
            is_cannibalized: false,
            suggested_long_tails: vec![],
        };
        assert!(result.normalized().is_cannibalized);
    }

    #[test]
    fn out_of_range_similarity_is_clamped() {
        let result = CannibalizationResult {
            keyword: "kw".into(),
            overlapping_articles: vec![OverlappingArticle {
                title: "t".into(),
                slug: "t".into(),
                similarity: 1.7,
                matched_keywords: vec![],
            }],
            is_cannibalized: false,
            suggested_long_tails: vec![],
        }
        .normalized();
        assert_eq!(result.overlapping_articles[0].similarity, 1.0);
        assert!(result.is_cannibalized);
    }
}
