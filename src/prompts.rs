// prompts.rs

use crate::types::KeywordCandidate;
use crate::cannibalization::CorpusArticle;

pub fn keyword_metrics_prompt(topic: &str, candidates: &[KeywordCandidate]) -> String {
    let keyword_list = candidates
        .iter()
        .map(|c| format!("- {}", c.keyword))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an SEO keyword analyst. For the topic \"{}\", estimate metrics for each of the
following keywords:

{}

For every keyword respond with estimated monthly search volume (high, medium, low, or very_low),
ranking difficulty as an integer from 0 to 100, and search trend (rising, stable, or declining).

Respond with a JSON array only, no prose, in this exact shape:
[{{\"keyword\": \"...\", \"estimatedVolume\": \"low\", \"estimatedDifficulty\": 45, \"trend\": \"stable\"}}]",
        topic, keyword_list
    )
}

pub fn intent_classification_prompt(keywords: &[String]) -> String {
    let keyword_list = keywords
        .iter()
        .map(|k| format!("- {}", k))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Classify the dominant search intent of each keyword below as one of: informational,
transactional, navigational, or commercial.

{}

Respond with a JSON array only, no prose, in this exact shape:
[{{\"keyword\": \"...\", \"intent\": \"informational\"}}]",
        keyword_list
    )
}

pub fn cannibalization_prompt(candidates: &[KeywordCandidate], corpus: &[CorpusArticle]) -> String {
    let keyword_list = candidates
        .iter()
        .map(|c| format!("- {}", c.keyword))
        .collect::<Vec<_>>()
        .join("\n");

    let corpus_list = corpus
        .iter()
        .map(|a| format!("- \"{}\" (slug: {}, keywords: {})", a.title, a.slug, a.keywords.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are auditing a content site for keyword cannibalization. Candidate keywords:

{}

Already-published articles:

{}

For each candidate keyword, list any published articles competing for the same search intent,
with a similarity score between 0 and 1. A keyword is cannibalized only when some overlapping
article scores above 0.6. For cannibalized keywords, suggest two or three long-tail variations
that avoid the overlap.

Respond with a JSON array only, no prose, in this exact shape:
[{{\"keyword\": \"...\", \"overlappingArticles\": [{{\"title\": \"...\", \"slug\": \"...\",
\"similarity\": 0.8, \"matchedKeywords\": [\"...\"]}}], \"isCannibalized\": true,
\"suggestedLongTails\": [\"...\"]}}]",
        keyword_list, corpus_list
    )
}

pub fn long_tail_prompt(primary_keyword: &str) -> String {
    format!(
        "Suggest eight long-tail keyword phrases (four words or longer) derived from the primary
keyword \"{}\". Favor specific, low-competition phrasings a searcher would actually type.

Respond with a JSON array of strings only, no prose.",
        primary_keyword
    )
}

pub fn niche_expansion_prompt(niche: &str) -> String {
    format!(
        "List ten seed topics that a content site focused on \"{}\" should cover, mixing broad
pillar subjects with narrower supporting subjects.

Respond with JSON only, no prose, in this exact shape: {{\"seeds\": [\"...\"]}}",
        niche
    )
}
