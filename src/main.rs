use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reel_api::{
    api::{create_router, AppState},
    config::Config,
    services::{
        providers::build_provider, MovieLibrary, RejectionMemory, SuggestionService,
        SuggestionSettings,
    },
    storage::{MovieStore, RecommendationCache, YamlMovieStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reel_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let provider = build_provider(&config)?;

    let (rejections, rejection_writer) =
        RejectionMemory::load(config.rejects_path.clone(), config.rejection_capacity).await;

    let store: Arc<dyn MovieStore> = Arc::new(YamlMovieStore::new(config.movies_path.clone()));
    let library = Arc::new(MovieLibrary::new(store.clone()));

    let (suggestions, refill_jobs) = SuggestionService::new(
        store,
        provider,
        Arc::new(rejections),
        RecommendationCache::new(config.cache_dir.clone()),
        SuggestionSettings::from(&config),
    );
    let suggestions = Arc::new(suggestions);

    let refill_worker = suggestions.spawn_refill_worker(refill_jobs);
    // Initial fill so the first suggestion is served from the queue
    suggestions.request_refill();

    let app = create_router(AppState::new(library, suggestions));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(address = %address, "Movie suggestion service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refill_worker.shutdown().await;
    rejection_writer.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
