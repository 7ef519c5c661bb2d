use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    /// Common English stopwords stripped before any token comparison.
    static ref STOPWORDS: HashSet<&'static str> = {
        let words = [
            "a", "an", "the", "and", "but", "or", "nor", "so", "yet",
            "about", "above", "after", "against", "along", "among", "around",
            "at", "before", "behind", "below", "between", "by", "down",
            "during", "for", "from", "in", "into", "near", "of", "off", "on",
            "onto", "out", "over", "through", "to", "under", "until", "up",
            "upon", "with", "within", "without",
            "i", "me", "my", "we", "our", "you", "your", "he", "him", "his",
            "she", "her", "it", "its", "they", "them", "their",
            "what", "which", "who", "this", "that", "these", "those",
            "is", "are", "was", "were", "be", "been", "being",
            "have", "has", "had", "do", "does", "did",
            "can", "could", "shall", "should", "will", "would", "may",
            "might", "must",
            "all", "any", "each", "more", "most", "other", "some", "such",
            "no", "not", "only", "same", "than", "too", "very",
            "just", "also", "now", "here", "there", "when", "where", "why",
            "how",
            // Ranking qualifiers: near-universal in SEO titles, so they
            // carry no topical signal.
            "top", "best", "guide", "review", "reviews",
        ];
        words.into_iter().collect()
    };
}

/// Extracts lowercase, stopword-filtered keywords from free text.
///
/// Tokens are split on non-alphanumeric boundaries, must be at least three
/// characters long and not purely numeric (bare years and counts dilute
/// overlap comparisons), and are deduplicated while preserving first-seen
/// order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for token in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if token.len() < 3 || STOPWORDS.contains(token) {
            continue;
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if seen.insert(token.to_string()) {
            keywords.push(token.to_string());
        }
    }

    keywords
}

/// Jaccard similarity between two string sets: |A∩B| / |A∪B|, bounded [0,1].
///
/// Two empty sets score 0.0 here: with no tokens on either side there is no
/// evidence of overlap, and callers treat 0.0 as "no match".
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Cosine similarity between two dense vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude inputs rather than
/// erroring, since callers only ever compare the result against a threshold.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Convenience: extract keywords from text and collect them into a set.
pub fn keyword_set(text: &str) -> HashSet<String> {
    extract_keywords(text).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn extract_keywords_filters_stopwords_and_short_tokens() {
        let keywords = extract_keywords("How to Choose the Best Electric Bike");
        assert_eq!(keywords, vec!["choose", "electric", "bike"]);
    }

    #[test]
    fn extract_keywords_drops_bare_numbers_and_ranking_qualifiers() {
        let keywords = extract_keywords("Best Electric Bikes 2024");
        assert_eq!(keywords, vec!["electric", "bikes"]);

        // Mixed alphanumerics are real tokens, only bare numbers are dropped.
        let keywords = extract_keywords("top 10 e5 keyword9 2024");
        assert_eq!(keywords, vec!["keyword9"]);
    }

    #[test]
    fn extract_keywords_dedupes_preserving_order() {
        let keywords = extract_keywords("bike bike BIKE electric bike");
        assert_eq!(keywords, vec!["bike", "electric"]);
    }

    #[test]
    fn jaccard_is_bounded() {
        let a = set(&["electric", "bike", "range"]);
        let b = set(&["bike", "commuter"]);
        let score = jaccard(&a, &b);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn jaccard_identity_is_one() {
        let a = set(&["electric", "bike"]);
        assert_eq!(jaccard(&a, &a), 1.0);
    }

    #[test]
    fn jaccard_against_empty_is_zero() {
        let a = set(&["electric"]);
        let empty = HashSet::new();
        assert_eq!(jaccard(&a, &empty), 0.0);
        assert_eq!(jaccard(&empty, &empty), 0.0);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.2, 0.8];
        let score = cosine_similarity(&v, &v);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_handles_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
