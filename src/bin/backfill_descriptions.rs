//! Generates descriptions for listed movies that have none.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reel_api::{
    config::Config,
    services::{
        providers::build_provider, DuplicateDetector, MovieLibrary, RejectionMemory,
        SuggestionGenerator,
    },
    storage::YamlMovieStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "reel_api=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let provider = build_provider(&config)?;

    // Detail lookups never consult rejections, so nothing needs persisting
    let detector = Arc::new(DuplicateDetector::new(Arc::new(RejectionMemory::in_memory(
        config.rejection_capacity,
    ))));
    let generator = SuggestionGenerator::new(provider, detector, config.generation_timeout());
    let library = MovieLibrary::new(Arc::new(YamlMovieStore::new(config.movies_path.clone())));

    let updated = library
        .backfill_descriptions(
            &generator,
            config.max_retries,
            Duration::from_millis(config.backfill_delay_ms),
        )
        .await;

    tracing::info!(updated, "Backfill complete");
    Ok(())
}
