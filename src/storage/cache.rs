use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::models::Suggestion;
use crate::services::titles;

/// On-disk shape of one source title's related recommendations
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    title: String,
    recommendations: Vec<Suggestion>,
}

/// File-backed cache of related-movie recommendations
///
/// Each source title gets its own JSON file named by the SHA-256 of the
/// title. Entries only grow; nothing is ever invalidated.
pub struct RecommendationCache {
    dir: PathBuf,
    /// Serializes read-modify-write of cache files
    write_lock: Mutex<()>,
}

/// Cache file name for a source title
pub fn cache_file_name(title: &str) -> String {
    format!("{:x}.json", Sha256::digest(title.as_bytes()))
}

impl RecommendationCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, title: &str) -> PathBuf {
        self.dir.join(cache_file_name(title))
    }

    /// All cached recommendations for `title`, oldest first
    pub async fn get(&self, title: &str) -> Vec<Suggestion> {
        read_entry(&self.path_for(title))
            .await
            .map(|entry| entry.recommendations)
            .unwrap_or_default()
    }

    /// Cached recommendations whose titles are not in `exclude`
    pub async fn get_unused(&self, title: &str, exclude: &[String]) -> Vec<Suggestion> {
        let excluded: HashSet<String> = exclude.iter().map(|t| titles::normalize(t)).collect();
        let unused: Vec<Suggestion> = self
            .get(title)
            .await
            .into_iter()
            .filter(|r| !excluded.contains(&titles::normalize(&r.title)))
            .collect();

        tracing::info!(source = %title, unused = unused.len(), "Found unused cached recommendations");
        unused
    }

    /// Appends one recommendation for `title`
    pub async fn add(&self, title: &str, recommendation: Suggestion) {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(title);

        let mut entry = read_entry(&path).await.unwrap_or_else(|| CacheEntry {
            title: title.to_string(),
            recommendations: Vec::new(),
        });
        entry.recommendations.push(recommendation);

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::error!(error = %e, dir = %self.dir.display(), "Failed to create cache directory");
            return;
        }

        let json = match serde_json::to_string_pretty(&entry) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        match tokio::fs::write(&path, json).await {
            Ok(()) => tracing::info!(
                source = %title,
                count = entry.recommendations.len(),
                "Saved recommendations to cache"
            ),
            Err(e) => tracing::error!(error = %e, source = %title, "Error saving cache"),
        }
    }
}

async fn read_entry(path: &Path) -> Option<CacheEntry> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Error loading cache");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Cache deserialization error");
            None
        }
    }
}
