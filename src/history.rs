use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::TARGET_STORE;

/// One published article as recorded by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedRecord {
    pub title: String,
    pub slug: String,
    pub url: String,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A recently published article, the diversity filter's input shape.
#[derive(Debug, Clone)]
pub struct RecentArticle {
    pub title: String,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Publish history persisted as a single JSON document, rewritten wholesale
/// on every append. A missing or corrupt file means "no history yet"; the
/// file is regenerated on the next write.
#[derive(Debug)]
pub struct PublishHistory {
    path: PathBuf,
    records: Vec<PublishedRecord>,
}

impl PublishHistory {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(records) => records,
                Err(e) => {
                    warn!(target: TARGET_STORE, "Corrupt publish history at {}: {}. Starting empty.", path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => {
                info!(target: TARGET_STORE, "No publish history at {}, starting empty", path.display());
                Vec::new()
            }
        };
        PublishHistory { path, records }
    }

    pub fn records(&self) -> &[PublishedRecord] {
        &self.records
    }

    /// Appends a record and rewrites the document.
    pub fn record(&mut self, record: PublishedRecord) -> Result<()> {
        self.records.push(record);
        self.persist()
    }

    /// Returns articles inside the lookback window, newest first, bounded by
    /// both the day count and the record count (whichever is tighter).
    pub fn recent(&self, max_days: i64, max_records: usize) -> Vec<RecentArticle> {
        let cutoff = Utc::now() - Duration::days(max_days);
        let mut recent: Vec<&PublishedRecord> = self
            .records
            .iter()
            .filter(|r| r.created_at >= cutoff)
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent
            .into_iter()
            .take(max_records)
            .map(|r| RecentArticle {
                title: r.title.clone(),
                keywords: r.keywords.clone(),
                created_at: r.created_at,
            })
            .collect()
    }

    fn persist(&self) -> Result<()> {
        write_json_atomically(&self.path, &self.records)
    }
}

/// Serializes `value` to `<path>.tmp`, then renames over `path`, so readers
/// never observe a partially written document.
pub fn write_json_atomically<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    let payload = serde_json::to_string_pretty(value)?;
    std::fs::write(&tmp_path, payload)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move {} into place", tmp_path.display()))?;
    Ok(())
}
