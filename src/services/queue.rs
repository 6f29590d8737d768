use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    models::{MovieDocument, Suggestion},
    services::{
        duplicates::DuplicateDetector,
        generator::{GenerationRequest, SuggestionGenerator},
        titles,
    },
    storage::MovieStore,
};

/// Generation attempts allowed per missing queue slot during a fill
const ATTEMPTS_PER_SLOT: usize = 5;

/// FIFO entries plus the normalized keys of exactly those entries
#[derive(Default)]
struct QueueState {
    entries: VecDeque<Suggestion>,
    keys: HashSet<String>,
    /// Bumped by every `clear`; a fill only enqueues into the epoch it started in
    epoch: u64,
}

/// Outcome of offering a candidate to the queue
#[derive(Debug, PartialEq, Eq)]
enum Offer {
    Added,
    Rejected,
    /// The queue was cleared after the fill started
    Stale,
}

/// Bounded FIFO of pre-generated suggestions
///
/// Entries and their tracking keys are only ever changed together under the
/// same lock, so the key set always mirrors the FIFO.
pub struct SuggestionQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    detector: Arc<DuplicateDetector>,
}

impl SuggestionQueue {
    pub fn new(capacity: usize, detector: Arc<DuplicateDetector>) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState::default()),
            detector,
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Titles of the queued suggestions, oldest first
    pub async fn titles(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .map(|s| s.title.clone())
            .collect()
    }

    /// Removes and returns the oldest suggestion
    pub async fn try_dequeue(&self) -> Option<Suggestion> {
        let mut state = self.state.lock().await;
        let suggestion = state.entries.pop_front()?;
        state.keys.remove(&titles::normalize(&suggestion.title));
        tracing::info!(
            title = %suggestion.title,
            remaining = state.entries.len(),
            "Served suggestion from queue"
        );
        Some(suggestion)
    }

    /// Appends `candidate` unless it is a duplicate or the queue is full
    ///
    /// The duplicate check runs again under the lock because lists or queue
    /// may have changed while the candidate was being generated.
    pub async fn enqueue_if_unique(&self, candidate: Suggestion, doc: &MovieDocument) -> bool {
        self.offer(candidate, doc, None).await == Offer::Added
    }

    async fn offer(&self, candidate: Suggestion, doc: &MovieDocument, epoch: Option<u64>) -> Offer {
        let mut state = self.state.lock().await;

        if epoch.is_some_and(|epoch| epoch != state.epoch) {
            tracing::info!(title = %candidate.title, "Queue cleared during refill, dropping suggestion");
            return Offer::Stale;
        }

        if state.entries.len() >= self.capacity {
            tracing::debug!(title = %candidate.title, "Queue full, dropping suggestion");
            return Offer::Rejected;
        }

        let queued: Vec<String> = state.entries.iter().map(|s| s.title.clone()).collect();
        let check = self.detector.check(&candidate.title, doc, &queued).await;
        if check.is_duplicate {
            tracing::warn!(
                title = %candidate.title,
                reason = ?check.reason,
                "Rejected duplicate"
            );
            return Offer::Rejected;
        }

        let key = titles::normalize(&candidate.title);
        if state.keys.contains(&key) {
            tracing::warn!(title = %candidate.title, "Rejected duplicate (queue key set)");
            return Offer::Rejected;
        }

        tracing::info!(
            title = %candidate.title,
            queue_size = state.entries.len() + 1,
            "Added unique suggestion to queue"
        );
        state.keys.insert(key);
        state.entries.push_back(candidate);
        Offer::Added
    }

    /// Empties the queue, e.g. after preferences change
    ///
    /// A fill already running when the queue is cleared adds nothing more.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.keys.clear();
        state.epoch += 1;
        tracing::info!(epoch = state.epoch, "Cleared suggestion queue and title tracking set");
    }

    /// Generates suggestions until the queue is full or the attempt budget is spent
    ///
    /// At most `5 * missing slots` generation calls are made, so a fill
    /// always terminates even when every candidate is rejected. Failures
    /// are logged; the queue simply stays under capacity. The document is
    /// reloaded for every attempt, and the fill stops as soon as the queue
    /// is cleared under it.
    pub async fn fill(
        &self,
        generator: &SuggestionGenerator,
        store: &dyn MovieStore,
        max_retries: u32,
    ) -> usize {
        let (needed, epoch) = {
            let state = self.state.lock().await;
            (self.capacity.saturating_sub(state.entries.len()), state.epoch)
        };
        if needed == 0 {
            tracing::debug!("Suggestion queue already full");
            return 0;
        }

        let max_attempts = needed * ATTEMPTS_PER_SLOT;
        let mut attempts = 0;
        let mut added = 0;

        tracing::info!(needed, max_attempts, "Filling suggestion queue");

        while added < needed && attempts < max_attempts {
            attempts += 1;

            if self.state.lock().await.epoch != epoch {
                tracing::info!(added, attempts, "Queue cleared, abandoning refill");
                return added;
            }

            let doc = store.load().await;
            let queued = self.titles().await;
            if queued.len() >= self.capacity {
                break;
            }

            let request = GenerationRequest::discovery(max_retries, &queued);
            match generator.generate(&doc, request).await {
                Ok(suggestion) => match self.offer(suggestion, &doc, Some(epoch)).await {
                    Offer::Added => added += 1,
                    Offer::Rejected => {}
                    Offer::Stale => {
                        tracing::info!(added, attempts, "Queue cleared, abandoning refill");
                        return added;
                    }
                },
                Err(e) => {
                    tracing::warn!(attempt = attempts, error = %e, "Queue fill generation failed");
                }
            }
        }

        if added < needed {
            tracing::warn!(
                added,
                needed,
                attempts,
                "Queue fill stopped below target size"
            );
        } else {
            tracing::info!(added, attempts, "Suggestion queue filled");
        }

        added
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> (Vec<String>, HashSet<String>) {
        let state = self.state.lock().await;
        let entry_keys = state
            .entries
            .iter()
            .map(|s| titles::normalize(&s.title))
            .collect();
        (entry_keys, state.keys.clone())
    }
}
