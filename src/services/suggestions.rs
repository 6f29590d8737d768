use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    config::Config,
    error::AppResult,
    models::{DuplicateCheck, KeywordAnalysis, MovieDocument, Suggestion},
    services::{
        duplicates::{self, DuplicateDetector},
        generator::{GenerationRequest, SuggestionGenerator},
        keywords,
        providers::GenerationProvider,
        queue::SuggestionQueue,
        rejections::RejectionMemory,
        titles,
    },
    storage::{MovieStore, RecommendationCache},
};

/// Tunables for suggestion generation
#[derive(Debug, Clone, Copy)]
pub struct SuggestionSettings {
    /// Attempts per foreground generation
    pub max_retries: u32,
    /// Attempts per generation during a background refill
    pub refill_max_retries: u32,
    pub queue_capacity: usize,
    pub generation_timeout: Duration,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            max_retries: 30,
            refill_max_retries: 5,
            queue_capacity: 5,
            generation_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for SuggestionSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            refill_max_retries: config.refill_max_retries,
            queue_capacity: config.queue_capacity,
            generation_timeout: config.generation_timeout(),
        }
    }
}

/// Pending refill requests, consumed by the refill worker
pub struct RefillJobs(mpsc::Receiver<()>);

/// Handle for stopping the background refill worker
pub struct RefillWorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RefillWorkerHandle {
    /// Stops the worker, interrupting a refill that is in progress
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Refill worker terminated abnormally");
        }
        tracing::info!("Refill worker stopped");
    }
}

/// Serves suggestions from the queue, the related cache or the provider
pub struct SuggestionService {
    store: Arc<dyn MovieStore>,
    generator: Arc<SuggestionGenerator>,
    queue: Arc<SuggestionQueue>,
    detector: Arc<DuplicateDetector>,
    cache: RecommendationCache,
    settings: SuggestionSettings,
    refill_tx: mpsc::Sender<()>,
}

impl SuggestionService {
    /// Wires the suggestion pipeline around `provider`
    ///
    /// The returned [`RefillJobs`] must be handed to
    /// [`spawn_refill_worker`](Self::spawn_refill_worker) for refills to run.
    pub fn new(
        store: Arc<dyn MovieStore>,
        provider: Arc<dyn GenerationProvider>,
        rejections: Arc<RejectionMemory>,
        cache: RecommendationCache,
        settings: SuggestionSettings,
    ) -> (Self, RefillJobs) {
        let detector = Arc::new(DuplicateDetector::new(rejections));
        let generator = Arc::new(SuggestionGenerator::new(
            provider,
            detector.clone(),
            settings.generation_timeout,
        ));
        let queue = Arc::new(SuggestionQueue::new(settings.queue_capacity, detector.clone()));
        // Capacity 1: a refill requested while one is already pending is merged into it
        let (refill_tx, refill_rx) = mpsc::channel(1);

        let service = Self {
            store,
            generator,
            queue,
            detector,
            cache,
            settings,
            refill_tx,
        };

        (service, RefillJobs(refill_rx))
    }

    pub fn queue(&self) -> &SuggestionQueue {
        &self.queue
    }

    /// Next suggestion, from the queue when possible
    ///
    /// Falls back to synchronous generation on an empty queue. Either way a
    /// background refill is requested afterwards.
    pub async fn get_suggestion(&self) -> AppResult<Suggestion> {
        let suggestion = match self.queue.try_dequeue().await {
            Some(suggestion) => suggestion,
            None => {
                tracing::info!("Suggestion queue empty, generating synchronously");
                let doc = self.store.load().await;
                let queued = self.queue.titles().await;
                self.generator
                    .generate(
                        &doc,
                        GenerationRequest::discovery(self.settings.max_retries, &queued),
                    )
                    .await?
            }
        };

        self.request_refill();
        Ok(suggestion)
    }

    /// Full description of one known movie
    pub async fn get_details(&self, title: &str) -> AppResult<Suggestion> {
        let doc = self.store.load().await;
        self.generator
            .generate(&doc, GenerationRequest::details(title, self.settings.max_retries))
            .await
    }

    /// A movie related to `title`, preferring cached recommendations
    pub async fn get_related(
        &self,
        title: &str,
        previous_suggestions: &[String],
    ) -> AppResult<Suggestion> {
        let doc = self.store.load().await;

        if let Some(cached) = self.best_cached(title, previous_suggestions, &doc).await {
            tracing::info!(source = %title, title = %cached.title, "Serving related movie from cache");
            return Ok(cached);
        }

        tracing::info!(source = %title, "No usable cached recommendation, generating");
        let suggestion = self
            .generator
            .generate(
                &doc,
                GenerationRequest::related(title, previous_suggestions, self.settings.max_retries),
            )
            .await?;

        self.cache.add(title, suggestion.clone()).await;
        Ok(suggestion)
    }

    /// Cached recommendation sharing the most keywords with liked movies
    async fn best_cached(
        &self,
        title: &str,
        previous_suggestions: &[String],
        doc: &MovieDocument,
    ) -> Option<Suggestion> {
        let analysis = keywords::analyze(&doc.watched);

        // Reversed so that ties go to the oldest entry, as max_by_key keeps the last maximum
        self.cache
            .get_unused(title, previous_suggestions)
            .await
            .into_iter()
            .filter(|s| duplicates::find_exact_in_lists(&titles::normalize(&s.title), doc).is_none())
            .rev()
            .max_by_key(|s| keywords::liked_affinity(&analysis, &s.keywords))
    }

    pub async fn check_duplicate(&self, title: &str) -> DuplicateCheck {
        let doc = self.store.load().await;
        let queued = self.queue.titles().await;
        self.detector.check(title, &doc, &queued).await
    }

    pub async fn analyze_keywords(&self) -> KeywordAnalysis {
        keywords::analyze(&self.store.load().await.watched)
    }

    /// Drops queued suggestions and requests a fresh fill
    ///
    /// A refill that is already running stops without adding anything, and
    /// the requested fill works from the current document.
    pub async fn reset_queue(&self) {
        self.queue.clear().await;
        self.request_refill();
    }

    /// Asks the refill worker to top up the queue
    ///
    /// Never blocks; a request made while another is pending is merged.
    pub fn request_refill(&self) {
        match self.refill_tx.try_send(()) {
            Ok(()) => tracing::debug!("Queue refill requested"),
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::debug!("Queue refill already pending")
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::warn!("Refill worker is not running, skipping refill")
            }
        }
    }

    /// Starts the single background task that serves refill requests
    pub fn spawn_refill_worker(&self, jobs: RefillJobs) -> RefillWorkerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(refill_worker(
            self.store.clone(),
            self.generator.clone(),
            self.queue.clone(),
            self.settings.refill_max_retries,
            jobs,
            shutdown_rx,
        ));

        RefillWorkerHandle { shutdown_tx, task }
    }
}

/// Fills the queue once per request until shut down
async fn refill_worker(
    store: Arc<dyn MovieStore>,
    generator: Arc<SuggestionGenerator>,
    queue: Arc<SuggestionQueue>,
    max_retries: u32,
    RefillJobs(mut jobs): RefillJobs,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    tracing::info!("Refill worker started");

    loop {
        tokio::select! {
            Some(()) = jobs.recv() => {
                tokio::select! {
                    added = queue.fill(&generator, store.as_ref(), max_retries) => {
                        tracing::debug!(added, "Background refill finished");
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Refill worker shutting down mid-refill");
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("Refill worker shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credits, MovieRecord};
    use crate::services::providers::{MockGenerationProvider, ProviderError};
    use crate::storage::YamlMovieStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    fn reply(title: &str, keywords: &[&str]) -> String {
        json!({
            "title": title,
            "description": "A movie.",
            "keywords": keywords,
            "credits": {"directors": [], "cast": [], "writers": []}
        })
        .to_string()
    }

    fn suggestion(title: &str, keywords: &[&str]) -> Suggestion {
        Suggestion {
            title: title.to_string(),
            description: "A movie.".to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            credits: Credits::default(),
        }
    }

    fn document() -> MovieDocument {
        let mut doc = MovieDocument::default();
        let mut heat = MovieRecord::new("Heat (1995)");
        heat.score = Some(9);
        heat.keywords = vec!["heist".to_string(), "crime".to_string()];
        doc.watched.push(heat);
        doc.want_to_watch.push(MovieRecord::new("Thief (1981)"));
        doc
    }

    struct Fixture {
        service: SuggestionService,
        jobs: RefillJobs,
        _dir: TempDir,
    }

    /// Replies with a fresh romance title once a permit is released on `gate`
    struct GatedProvider {
        gate: Arc<Semaphore>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl GenerationProvider for GatedProvider {
        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            Ok(reply(&format!("Love Story {} (2000)", n), &["romance"]))
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    async fn fixture(provider: MockGenerationProvider, capacity: usize) -> Fixture {
        fixture_with(Arc::new(provider), capacity).await
    }

    async fn fixture_with(provider: Arc<dyn GenerationProvider>, capacity: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlMovieStore::new(dir.path().join("movies.yaml"));
        store.save(&document()).await;

        let settings = SuggestionSettings {
            max_retries: 3,
            refill_max_retries: 2,
            queue_capacity: capacity,
            generation_timeout: Duration::from_secs(5),
        };
        let (service, jobs) = SuggestionService::new(
            Arc::new(store),
            provider,
            Arc::new(RejectionMemory::in_memory(50)),
            RecommendationCache::new(dir.path().join("cache")),
            settings,
        );

        Fixture {
            service,
            jobs,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_empty_queue_generates_and_leaves_queue_empty() {
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_complete()
            .times(1)
            .returning(|_| Ok(reply("Ronin (1998)", &["heist"])));
        let mut fx = fixture(provider, 5).await;

        let served = fx.service.get_suggestion().await.unwrap();

        assert_eq!(served.title, "Ronin (1998)");
        assert!(fx.service.queue().is_empty().await);
        assert!(fx.service.queue().titles().await.is_empty());
        // A refill was requested but no worker is running yet
        assert!(fx.jobs.0.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_queued_suggestion_is_served_first() {
        let mut provider = MockGenerationProvider::new();
        provider.expect_complete().times(0);
        let fx = fixture(provider, 5).await;
        fx.service
            .queue()
            .enqueue_if_unique(suggestion("Ronin (1998)", &[]), &document())
            .await;

        assert_eq!(fx.service.get_suggestion().await.unwrap().title, "Ronin (1998)");
        assert!(fx.service.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_refill_requests_coalesce() {
        let provider = MockGenerationProvider::new();
        let mut fx = fixture(provider, 5).await;

        fx.service.request_refill();
        fx.service.request_refill();
        fx.service.reset_queue().await;

        assert!(fx.jobs.0.try_recv().is_ok());
        assert!(fx.jobs.0.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_related_prefers_cached_by_liked_keywords() {
        let mut provider = MockGenerationProvider::new();
        provider.expect_complete().times(0);
        let fx = fixture(provider, 5).await;
        let cache = &fx.service.cache;
        cache.add("Heat (1995)", suggestion("Amelie (2001)", &["romance"])).await;
        cache.add("Heat (1995)", suggestion("Thief (1981)", &["heist", "crime"])).await;
        cache.add("Heat (1995)", suggestion("Ronin (1998)", &["heist"])).await;
        cache.add("Heat (1995)", suggestion("Sicario (2015)", &["crime"])).await;

        // Thief is already listed, so Ronin and Sicario tie and the older one wins
        let related = fx.service.get_related("Heat (1995)", &[]).await.unwrap();
        assert_eq!(related.title, "Ronin (1998)");

        let previous = vec!["Ronin (1998)".to_string()];
        let related = fx.service.get_related("Heat (1995)", &previous).await.unwrap();
        assert_eq!(related.title, "Sicario (2015)");
    }

    #[tokio::test]
    async fn test_related_cache_miss_generates_and_caches() {
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_complete()
            .withf(|prompt: &str| {
                prompt.contains(r#"similar to "Heat (1995)""#) && prompt.contains("Collateral (2004)")
            })
            .times(1)
            .returning(|_| Ok(reply("Ronin (1998)", &["heist"])));
        let fx = fixture(provider, 5).await;
        let previous = vec!["Collateral (2004)".to_string()];

        let related = fx.service.get_related("Heat (1995)", &previous).await.unwrap();

        assert_eq!(related.title, "Ronin (1998)");
        let cached = fx.service.cache.get("Heat (1995)").await;
        assert_eq!(cached, vec![related]);
    }

    #[tokio::test]
    async fn test_details_skip_duplicate_filtering() {
        let mut provider = MockGenerationProvider::new();
        provider
            .expect_complete()
            .times(1)
            .returning(|_| Ok(reply("Heat (1995)", &["heist"])));
        let fx = fixture(provider, 5).await;

        let details = fx.service.get_details("Heat").await.unwrap();
        assert_eq!(details.title, "Heat (1995)");
    }

    #[tokio::test]
    async fn test_check_duplicate_and_keywords() {
        let fx = fixture(MockGenerationProvider::new(), 5).await;

        let check = fx.service.check_duplicate("The Thief (1981)").await;
        assert_eq!(check, DuplicateCheck::duplicate("exists in want_to_watch"));
        assert!(!fx.service.check_duplicate("Ronin (1998)").await.is_duplicate);

        let analysis = fx.service.analyze_keywords().await;
        assert_eq!(analysis.liked.get("heist"), Some(&1));
        assert!(analysis.disliked.is_empty());
    }

    #[tokio::test]
    async fn test_refill_worker_fills_queue_and_stops() {
        let mut n = 0;
        let mut provider = MockGenerationProvider::new();
        provider.expect_complete().returning(move |_| {
            n += 1;
            Ok(reply(&format!("Movie Number {} (19{:02})", n, n), &[]))
        });
        let fx = fixture(provider, 2).await;

        let handle = fx.service.spawn_refill_worker(fx.jobs);
        fx.service.request_refill();

        for _ in 0..100 {
            if fx.service.queue().len().await == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(fx.service.queue().len().await, 2);

        handle.shutdown().await;
        fx.service.request_refill();
    }

    #[tokio::test]
    async fn test_reset_discards_refill_started_under_old_preferences() {
        let gate = Arc::new(Semaphore::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = GatedProvider {
            gate: gate.clone(),
            calls: calls.clone(),
        };
        let fx = fixture_with(Arc::new(provider), 2).await;

        let handle = fx.service.spawn_refill_worker(fx.jobs);
        fx.service.request_refill();
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let mut doc = fx.service.store.load().await;
        doc.preferences.keywords = vec!["heist".to_string()];
        fx.service.store.save(&doc).await;
        fx.service.reset_queue().await;
        gate.add_permits(1000);

        // One held call from the abandoned fill, then 2 slots * 5 attempts * 2 retries
        for _ in 0..200 {
            if calls.load(Ordering::SeqCst) >= 21 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;

        assert!(fx.service.queue().titles().await.is_empty());
    }
}
