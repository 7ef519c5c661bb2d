use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embeddings::EmbeddingClient;
use crate::history::write_json_atomically;
use crate::similarity::{cosine_similarity, extract_keywords, jaccard};
use crate::TARGET_STORE;

/// Minimum Jaccard overlap required to assign a topic to an existing cluster.
/// The comparison is strict: exactly 0.3 does not match.
pub const JACCARD_MATCH_THRESHOLD: f64 = 0.30;

/// Minimum cosine similarity required on the embedding path. Deliberately
/// stricter than the Jaccard bar; the two constants are tuned independently.
pub const EMBEDDING_MATCH_THRESHOLD: f64 = 0.75;

/// Keyword list cap applied at cluster creation and classify-time merges.
const MAX_CLUSTER_KEYWORDS: usize = 30;

/// Related queries folded into the candidate text on the embedding path.
const MAX_EMBED_QUERIES: usize = 5;

/// Cluster keywords folded into the per-cluster text on the embedding path.
const MAX_EMBED_KEYWORDS: usize = 10;

/// Whether an article anchors its cluster or supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Pillar,
    Cluster,
}

/// A published article recorded against a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterArticle {
    pub title: String,
    pub slug: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub keywords: Vec<String>,
    pub content_type: ContentType,
}

/// One pillar content theme and everything published under it.
///
/// Articles accumulate for the cluster's lifetime; clusters are never
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCluster {
    pub id: String,
    pub pillar_topic: String,
    pub keywords: Vec<String>,
    pub articles: Vec<ClusterArticle>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TopicCluster {
    fn keyword_set(&self) -> HashSet<String> {
        self.keywords.iter().map(|k| k.to_lowercase()).collect()
    }

    fn has_pillar_article(&self) -> bool {
        self.articles
            .iter()
            .any(|a| a.content_type == ContentType::Pillar)
    }
}

/// Result of classifying a topic into the cluster graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicClassification {
    pub cluster_id: String,
    pub content_type: ContentType,
    pub is_new: bool,
}

/// Persistent pillar/cluster graph.
///
/// Owns the in-memory cluster list and the backing JSON document, which is
/// rewritten wholesale (write-to-temp-then-rename) after every mutation. A
/// single-instance lock file is held for the store's lifetime; construction
/// fails fast if another process already holds it.
#[derive(Debug)]
pub struct TopicClusterStore {
    path: PathBuf,
    lock_path: PathBuf,
    clusters: Vec<TopicCluster>,
}

impl TopicClusterStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lock_path = path.with_extension("lock");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let mut lock_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| {
                anyhow!(
                    "Failed to acquire cluster store lock at {}: {}. Another pipeline may be \
                     running; if not, the lock is stale from a crashed run and can be removed \
                     (the file records the holder's pid)",
                    lock_path.display(),
                    e
                )
            })?;
        if let Err(e) = writeln!(lock_file, "{}", std::process::id()) {
            warn!(target: TARGET_STORE, "Failed to record pid in lock file {}: {}", lock_path.display(), e);
        }

        let clusters = Self::load_clusters(&path);
        info!(target: TARGET_STORE, "Opened cluster store at {} with {} clusters", path.display(), clusters.len());

        Ok(TopicClusterStore {
            path,
            lock_path,
            clusters,
        })
    }

    fn load_clusters(path: &Path) -> Vec<TopicCluster> {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(clusters) => clusters,
                Err(e) => {
                    warn!(target: TARGET_STORE, "Corrupt cluster store at {}: {}. Starting empty.", path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => {
                info!(target: TARGET_STORE, "No cluster store at {}, starting empty", path.display());
                Vec::new()
            }
        }
    }

    pub fn clusters(&self) -> &[TopicCluster] {
        &self.clusters
    }

    /// Classifies a topic into an existing cluster or creates a new one,
    /// using stopword-filtered token overlap.
    pub fn classify_topic(
        &mut self,
        topic: &str,
        related_queries: &[String],
    ) -> Result<TopicClassification> {
        let tokens = topic_tokens(topic, related_queries);
        let token_set: HashSet<String> = tokens.iter().cloned().collect();

        let mut best: Option<(usize, f64)> = None;
        for (i, cluster) in self.clusters.iter().enumerate() {
            let score = jaccard(&token_set, &cluster.keyword_set());
            debug!(target: TARGET_STORE, "Cluster '{}' scored {:.3} against '{}'", cluster.pillar_topic, score, topic);
            // Strictly greater keeps the first cluster in storage order on ties.
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        match best {
            Some((index, score)) if score > JACCARD_MATCH_THRESHOLD => {
                self.accept_match(index, &tokens)
            }
            _ => self.create_cluster(topic, &tokens),
        }
    }

    /// Classifies a topic using embedding cosine similarity, falling back to
    /// the Jaccard path in full on any failure (no client reachable, no
    /// clusters yet, below-threshold best match handled separately).
    pub async fn classify_topic_with_embeddings(
        &mut self,
        topic: &str,
        related_queries: &[String],
        embeddings: &EmbeddingClient,
    ) -> Result<TopicClassification> {
        if self.clusters.is_empty() {
            return self.classify_topic(topic, related_queries);
        }

        let best = match self
            .best_embedding_match(topic, related_queries, embeddings)
            .await
        {
            Ok(best) => best,
            Err(e) => {
                warn!(target: TARGET_STORE, "Embedding classification failed ({}), falling back to token overlap", e);
                return self.classify_topic(topic, related_queries);
            }
        };

        match best {
            Some((index, score)) if score > EMBEDDING_MATCH_THRESHOLD => {
                debug!(target: TARGET_STORE, "Embedding match for '{}' at {:.3}", topic, score);
                let tokens = topic_tokens(topic, related_queries);
                self.accept_match(index, &tokens)
            }
            _ => {
                let tokens = topic_tokens(topic, related_queries);
                self.create_cluster(topic, &tokens)
            }
        }
    }

    async fn best_embedding_match(
        &self,
        topic: &str,
        related_queries: &[String],
        embeddings: &EmbeddingClient,
    ) -> Result<Option<(usize, f64)>> {
        let candidate_text = std::iter::once(topic.to_string())
            .chain(related_queries.iter().take(MAX_EMBED_QUERIES).cloned())
            .collect::<Vec<_>>()
            .join(" ");
        let candidate_vector = embeddings.embed(&candidate_text).await?;

        let mut best: Option<(usize, f64)> = None;
        for (i, cluster) in self.clusters.iter().enumerate() {
            let cluster_text = std::iter::once(cluster.pillar_topic.clone())
                .chain(cluster.keywords.iter().take(MAX_EMBED_KEYWORDS).cloned())
                .collect::<Vec<_>>()
                .join(" ");
            let cluster_vector = embeddings.embed(&cluster_text).await?;
            let score = cosine_similarity(&candidate_vector, &cluster_vector);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        Ok(best)
    }

    fn accept_match(
        &mut self,
        index: usize,
        tokens: &[String],
    ) -> Result<TopicClassification> {
        let cluster = &mut self.clusters[index];

        for token in tokens {
            if cluster.keywords.len() >= MAX_CLUSTER_KEYWORDS {
                break;
            }
            if !cluster.keywords.iter().any(|k| k.eq_ignore_ascii_case(token)) {
                cluster.keywords.push(token.clone());
            }
        }
        cluster.updated_at = Utc::now();

        // Classification reads articles: until a pillar article is actually
        // recorded, repeated classification keeps answering pillar.
        let content_type = if cluster.has_pillar_article() {
            ContentType::Cluster
        } else {
            ContentType::Pillar
        };
        let cluster_id = cluster.id.clone();

        self.persist()?;
        Ok(TopicClassification {
            cluster_id,
            content_type,
            is_new: false,
        })
    }

    fn create_cluster(
        &mut self,
        topic: &str,
        tokens: &[String],
    ) -> Result<TopicClassification> {
        let now = Utc::now();
        let cluster = TopicCluster {
            id: Uuid::new_v4().to_string(),
            pillar_topic: topic.to_string(),
            keywords: tokens.iter().take(MAX_CLUSTER_KEYWORDS).cloned().collect(),
            articles: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let cluster_id = cluster.id.clone();
        info!(target: TARGET_STORE, "Created new cluster '{}' ({})", topic, cluster_id);

        self.clusters.push(cluster);
        self.persist()?;
        Ok(TopicClassification {
            cluster_id,
            content_type: ContentType::Pillar,
            is_new: true,
        })
    }

    /// Records a published article against a cluster. Idempotent by slug: a
    /// duplicate slug is a silent no-op. Keywords merge without the creation
    /// cap.
    pub fn add_article_to_cluster(
        &mut self,
        cluster_id: &str,
        article: ClusterArticle,
    ) -> Result<()> {
        let cluster = self
            .clusters
            .iter_mut()
            .find(|c| c.id == cluster_id)
            .ok_or_else(|| anyhow!("No cluster with id {}", cluster_id))?;

        if cluster.articles.iter().any(|a| a.slug == article.slug) {
            debug!(target: TARGET_STORE, "Article '{}' already recorded in cluster {}", article.slug, cluster_id);
            return Ok(());
        }

        for keyword in &article.keywords {
            let lowered = keyword.to_lowercase();
            if !cluster.keywords.iter().any(|k| k.eq_ignore_ascii_case(&lowered)) {
                cluster.keywords.push(lowered);
            }
        }
        cluster.articles.push(article);
        cluster.updated_at = Utc::now();

        self.persist()
    }

    fn persist(&self) -> Result<()> {
        write_json_atomically(&self.path, &self.clusters)
    }
}

impl Drop for TopicClusterStore {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            warn!(target: TARGET_STORE, "Failed to release cluster store lock {}: {}", self.lock_path.display(), e);
        }
    }
}

/// Tokens from the topic and every related query, first-seen order
/// preserved so cluster keyword lists stay deterministic across runs.
fn topic_tokens(topic: &str, related_queries: &[String]) -> Vec<String> {
    let mut tokens = extract_keywords(topic);
    let mut seen: HashSet<String> = tokens.iter().cloned().collect();
    for query in related_queries {
        for token in extract_keywords(query) {
            if seen.insert(token.clone()) {
                tokens.push(token);
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}.json", name, Uuid::new_v4()))
    }

    fn article(slug: &str, content_type: ContentType) -> ClusterArticle {
        ClusterArticle {
            title: slug.replace('-', " "),
            slug: slug.to_string(),
            url: format!("https://example.com/{}", slug),
            published_at: Utc::now(),
            keywords: vec!["electric".into(), "bike".into()],
            content_type,
        }
    }

    fn cleanup(store: TopicClusterStore) {
        let path = store.path.clone();
        drop(store);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn new_topic_creates_pillar_cluster() {
        let mut store = TopicClusterStore::open(scratch_path("store-new")).unwrap();
        let result = store
            .classify_topic(
                "electric bikes",
                &["ebike range".into(), "best electric bike".into()],
            )
            .unwrap();

        assert!(result.is_new);
        assert_eq!(result.content_type, ContentType::Pillar);
        assert_eq!(store.clusters().len(), 1);
        cleanup(store);
    }

    #[test]
    fn repeated_topic_matches_same_cluster() {
        let mut store = TopicClusterStore::open(scratch_path("store-rematch")).unwrap();
        let related = vec!["ebike range".to_string(), "best electric bike".to_string()];
        let first = store.classify_topic("electric bikes", &related).unwrap();
        let second = store.classify_topic("electric bikes", &related).unwrap();

        assert_eq!(first.cluster_id, second.cluster_id);
        assert!(!second.is_new);
        // No pillar article has been recorded yet, so classification still
        // answers pillar.
        assert_eq!(second.content_type, ContentType::Pillar);
        cleanup(store);
    }

    #[test]
    fn recorded_pillar_article_flips_later_matches_to_cluster() {
        let mut store = TopicClusterStore::open(scratch_path("store-flip")).unwrap();
        let related = vec!["ebike range".to_string()];
        let first = store.classify_topic("electric bikes", &related).unwrap();
        store
            .add_article_to_cluster(&first.cluster_id, article("electric-bikes-guide", ContentType::Pillar))
            .unwrap();

        let second = store.classify_topic("electric bikes", &related).unwrap();
        assert_eq!(second.cluster_id, first.cluster_id);
        assert_eq!(second.content_type, ContentType::Cluster);
        cleanup(store);
    }

    #[test]
    fn jaccard_threshold_is_strict() {
        let mut store = TopicClusterStore::open(scratch_path("store-threshold")).unwrap();
        // Seed a cluster with a controlled 10-keyword list.
        let seed_queries: Vec<String> = (0..9).map(|i| format!("keyword{}", i)).collect();
        let seeded = store.classify_topic("keyword9", &seed_queries).unwrap();
        assert_eq!(store.clusters()[0].keywords.len(), 10);

        // 3 shared of 10 total tokens: overlap exactly 0.3 must NOT match.
        let exact = store
            .classify_topic("keyword0", &["keyword1".into(), "keyword2".into()])
            .unwrap();
        assert!(exact.is_new);
        assert_ne!(exact.cluster_id, seeded.cluster_id);

        // 4 shared of 10: overlap 0.4 matches.
        let above = store
            .classify_topic(
                "keyword3",
                &["keyword4".into(), "keyword5".into(), "keyword6".into()],
            )
            .unwrap();
        assert!(!above.is_new);
        assert_eq!(above.cluster_id, seeded.cluster_id);
        cleanup(store);
    }

    #[test]
    fn add_article_is_idempotent_by_slug() {
        let mut store = TopicClusterStore::open(scratch_path("store-idempotent")).unwrap();
        let result = store.classify_topic("electric bikes", &[]).unwrap();

        store
            .add_article_to_cluster(&result.cluster_id, article("ebike-commuting", ContentType::Pillar))
            .unwrap();
        store
            .add_article_to_cluster(&result.cluster_id, article("ebike-commuting", ContentType::Cluster))
            .unwrap();

        assert_eq!(store.clusters()[0].articles.len(), 1);
        cleanup(store);
    }

    #[test]
    fn article_keywords_merge_without_creation_cap() {
        let mut store = TopicClusterStore::open(scratch_path("store-merge")).unwrap();
        let seed_queries: Vec<String> = (0..29).map(|i| format!("keyword{}", i)).collect();
        let result = store.classify_topic("keyword29", &seed_queries).unwrap();
        assert_eq!(store.clusters()[0].keywords.len(), 30);

        let mut extra = article("overflow-article", ContentType::Pillar);
        extra.keywords = vec!["beyond".into(), "cap".into()];
        store.add_article_to_cluster(&result.cluster_id, extra).unwrap();
        assert!(store.clusters()[0].keywords.len() > 30);
        cleanup(store);
    }

    #[test]
    fn store_reloads_persisted_clusters() {
        let path = scratch_path("store-reload");
        {
            let mut store = TopicClusterStore::open(&path).unwrap();
            store.classify_topic("electric bikes", &[]).unwrap();
        }
        let store = TopicClusterStore::open(&path).unwrap();
        assert_eq!(store.clusters().len(), 1);
        assert_eq!(store.clusters()[0].pillar_topic, "electric bikes");
        cleanup(store);
    }

    #[test]
    fn second_open_fails_while_lock_is_held() {
        let path = scratch_path("store-lock");
        let store = TopicClusterStore::open(&path).unwrap();

        let err = TopicClusterStore::open(&path).unwrap_err().to_string();
        assert!(err.contains(&store.lock_path.display().to_string()));
        assert!(err.contains("can be removed"));

        // The lock records who holds it.
        let recorded = std::fs::read_to_string(&store.lock_path).unwrap();
        assert_eq!(recorded.trim(), std::process::id().to_string());
        cleanup(store);
    }

    #[test]
    fn cluster_keywords_preserve_first_seen_order() {
        let mut store = TopicClusterStore::open(scratch_path("store-order")).unwrap();
        store
            .classify_topic(
                "electric bikes",
                &["ebike range".into(), "range anxiety".into()],
            )
            .unwrap();

        // Seed keywords follow extraction order: topic first, then queries,
        // duplicates skipped. The same list must come back on every run.
        assert_eq!(
            store.clusters()[0].keywords,
            vec!["electric", "bikes", "ebike", "range", "anxiety"]
        );

        store.classify_topic("electric bikes", &["bikes commuting".into()]).unwrap();
        assert_eq!(
            store.clusters()[0].keywords,
            vec!["electric", "bikes", "ebike", "range", "anxiety", "commuting"]
        );
        cleanup(store);
    }

    #[tokio::test]
    async fn embedding_path_with_no_clusters_equals_jaccard_path() {
        // No embedding request may be attempted with an empty store, so an
        // unreachable endpoint must not matter.
        let embeddings = EmbeddingClient::Ollama {
            client: ollama_rs::Ollama::new("http://127.0.0.1".to_string(), 1),
            model: "nomic-embed-text".to_string(),
        };

        let mut store = TopicClusterStore::open(scratch_path("store-embed-empty")).unwrap();
        let result = store
            .classify_topic_with_embeddings("electric bikes", &["ebike range".into()], &embeddings)
            .await
            .unwrap();
        assert!(result.is_new);
        assert_eq!(result.content_type, ContentType::Pillar);
        cleanup(store);
    }

    #[tokio::test]
    async fn embedding_failure_falls_back_to_jaccard_in_full() {
        let embeddings = EmbeddingClient::Ollama {
            client: ollama_rs::Ollama::new("http://127.0.0.1".to_string(), 1),
            model: "nomic-embed-text".to_string(),
        };

        let mut store = TopicClusterStore::open(scratch_path("store-embed-fallback")).unwrap();
        let related = vec!["ebike range".to_string(), "best electric bike".to_string()];
        let first = store.classify_topic("electric bikes", &related).unwrap();

        // Client is unreachable, so the embedding path must fall back and
        // still find the token-overlap match.
        let second = store
            .classify_topic_with_embeddings("electric bikes", &related, &embeddings)
            .await
            .unwrap();
        assert_eq!(second.cluster_id, first.cluster_id);
        assert!(!second.is_new);
        cleanup(store);
    }
}
