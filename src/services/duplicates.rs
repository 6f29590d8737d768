use std::sync::Arc;

use crate::models::{DuplicateCheck, ListName, MovieDocument};
use crate::services::rejections::RejectionMemory;
use crate::services::titles;

const QUEUE_LABEL: &str = "suggestion queue";

/// Decides whether a candidate title is already known to the user
///
/// Checks, in order and stopping at the first hit: the rejection memory,
/// exact matches in each list, exact matches in the queue, similar (same
/// base title) matches in each list, similar matches in the queue. Every
/// positive result is appended to the rejection memory, so the next attempt
/// at the same title is turned away without a scan.
pub struct DuplicateDetector {
    rejections: Arc<RejectionMemory>,
}

impl DuplicateDetector {
    pub fn new(rejections: Arc<RejectionMemory>) -> Self {
        Self { rejections }
    }

    pub fn rejections(&self) -> &RejectionMemory {
        &self.rejections
    }

    pub async fn check(
        &self,
        title: &str,
        doc: &MovieDocument,
        queue_titles: &[String],
    ) -> DuplicateCheck {
        let key = titles::normalize(title);

        if let Some(prior) = self.rejections.find(&key).await {
            let prior_reason = prior.reason.unwrap_or_else(|| "duplicate".to_string());
            tracing::debug!(title = %title, prior = %prior.title, "Matched recent rejection");
            // Stores the underlying reason, not the prefixed one
            self.rejections.record(title, &prior_reason).await;
            return DuplicateCheck::duplicate(format!("recently rejected: {}", prior_reason));
        }

        match find_duplicate(title, doc, queue_titles) {
            Some(reason) => {
                tracing::info!(title = %title, reason = %reason, "Duplicate detected");
                self.rejections.record(title, &reason).await;
                DuplicateCheck::duplicate(reason)
            }
            None => DuplicateCheck::unique(),
        }
    }

    /// Records a rejection that did not come from a duplicate scan
    pub async fn reject(&self, title: &str, reason: &str) {
        self.rejections.record(title, reason).await;
    }
}

/// Scans lists and queue without consulting or touching the rejection memory
///
/// Returns the reason for the first match.
pub fn find_duplicate(title: &str, doc: &MovieDocument, queue_titles: &[String]) -> Option<String> {
    let key = titles::normalize(title);
    let base = titles::base_key(title);

    if let Some(list) = find_exact_in_lists(&key, doc) {
        return Some(format!("exists in {}", list));
    }

    if queue_titles.iter().any(|q| titles::normalize(q) == key) {
        return Some(format!("exists in {}", QUEUE_LABEL));
    }

    let similar_list = doc.lists().find_map(|(list, movies)| {
        movies
            .iter()
            .any(|m| titles::base_key(&m.title) == base)
            .then_some(list)
    });
    if let Some(list) = similar_list {
        return Some(format!("similar exists in {}", list));
    }

    if queue_titles.iter().any(|q| titles::base_key(q) == base) {
        return Some(format!("similar exists in {}", QUEUE_LABEL));
    }

    None
}

/// First list holding a movie with exactly this normalized key
pub fn find_exact_in_lists(key: &str, doc: &MovieDocument) -> Option<ListName> {
    doc.lists().find_map(|(list, movies)| {
        movies
            .iter()
            .any(|m| titles::normalize(&m.title) == key)
            .then_some(list)
    })
}
