use std::path::PathBuf;

use crate::models::MovieDocument;

pub mod cache;

pub use cache::RecommendationCache;

/// Persistence for the movie-list document
///
/// Neither operation fails the caller: a load that cannot read the document
/// yields an empty default one, and a failed save is logged.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieStore: Send + Sync {
    async fn load(&self) -> MovieDocument;

    async fn save(&self, doc: &MovieDocument);
}

/// Stores the whole document as a single YAML file
pub struct YamlMovieStore {
    path: PathBuf,
}

impl YamlMovieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl MovieStore for YamlMovieStore {
    async fn load(&self) -> MovieDocument {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    tracing::info!(path = %self.path.display(), "No movie file yet, starting empty");
                } else {
                    tracing::error!(error = %e, path = %self.path.display(), "Error loading movies");
                }
                return MovieDocument::default();
            }
        };

        if raw.trim().is_empty() {
            return MovieDocument::default();
        }

        serde_yaml::from_str(&raw).unwrap_or_else(|e| {
            tracing::error!(error = %e, path = %self.path.display(), "Error parsing movies");
            MovieDocument::default()
        })
    }

    async fn save(&self, doc: &MovieDocument) {
        let yaml = match serde_yaml::to_string(doc) {
            Ok(yaml) => yaml,
            Err(e) => {
                tracing::error!(error = %e, "Movie serialization error");
                return;
            }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::error!(error = %e, path = %parent.display(), "Failed to create movie directory");
                return;
            }
        }

        match tokio::fs::write(&self.path, yaml).await {
            Ok(()) => tracing::info!(path = %self.path.display(), "Movies saved successfully"),
            Err(e) => tracing::error!(error = %e, path = %self.path.display(), "Error saving movies"),
        }
    }
}
