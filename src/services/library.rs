use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{ListName, MovieDocument, MovieRecord, MovieUpdate, NewMovie, Preferences},
    services::{
        duplicates,
        generator::{GenerationRequest, SuggestionGenerator},
        titles,
    },
    storage::MovieStore,
};

const MAX_SCORE: u8 = 10;

/// The user's movie lists and preferences
///
/// Every read-modify-write runs under one lock, so writers in this process
/// never overwrite each other's changes.
pub struct MovieLibrary {
    store: Arc<dyn MovieStore>,
    write_lock: Mutex<()>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// A watched movie needs a score in 0..=10
fn require_score(title: &str, score: Option<u8>) -> AppResult<u8> {
    match score {
        None => {
            tracing::error!(title = %title, "No score provided for watched movie");
            Err(AppError::InvalidInput(
                "Score is required for watched movies".to_string(),
            ))
        }
        Some(score) if score > MAX_SCORE => {
            tracing::error!(title = %title, score, "Invalid score for movie");
            Err(AppError::InvalidInput(
                "Score must be between 0 and 10".to_string(),
            ))
        }
        Some(score) => Ok(score),
    }
}

impl MovieLibrary {
    pub fn new(store: Arc<dyn MovieStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn document(&self) -> MovieDocument {
        self.store.load().await
    }

    /// Adds a new movie to `list`
    pub async fn add_movie(&self, list: ListName, movie: NewMovie) -> AppResult<MovieRecord> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.store.load().await;

        let title = movie.title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Title must not be empty".to_string()));
        }

        if let Some(existing) = duplicates::find_exact_in_lists(&titles::normalize(title), &doc) {
            tracing::warn!(title = %title, list = %existing, "Movie already exists in a list");
            return Err(AppError::InvalidInput(format!(
                "Movie already exists in {}",
                existing
            )));
        }

        let mut record = MovieRecord::new(title);
        record.added_date = Some(today());
        record.keywords = movie.keywords.unwrap_or_default();
        record.description = movie.description;
        record.credits = movie.credits;

        if list == ListName::Watched {
            record.score = Some(require_score(title, movie.score)?);
            record.date_watched = Some(today());
        }

        doc.list_mut(list).push(record.clone());
        self.store.save(&doc).await;

        tracing::info!(title = %record.title, list = %list, "Added movie");
        Ok(record)
    }

    /// Removes the movie with exactly this title from whichever list holds it
    pub async fn delete_movie(&self, title: &str) -> AppResult<MovieRecord> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.store.load().await;

        let Some((list, index)) = doc.position(title) else {
            tracing::warn!(title = %title, "Movie not found for deletion");
            return Err(AppError::NotFound(format!("Movie not found: {}", title)));
        };

        let removed = doc.list_mut(list).remove(index);
        self.store.save(&doc).await;

        tracing::info!(title = %title, list = %list, "Deleted movie");
        Ok(removed)
    }

    /// Moves a movie to another list or re-scores a watched movie
    ///
    /// A move keeps keywords, description and credits but restarts
    /// `added_date`. Moving into `watched` needs a score; moving out of it
    /// drops the score.
    pub async fn update_movie(&self, update: MovieUpdate) -> AppResult<MovieRecord> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.store.load().await;

        let Some((from, index)) = doc.position(&update.title) else {
            tracing::warn!(title = %update.title, "Movie not found for update");
            return Err(AppError::NotFound(format!(
                "Movie not found: {}",
                update.title
            )));
        };

        let updated = match update.new_list {
            Some(to) => {
                let score = if to == ListName::Watched {
                    Some(require_score(&update.title, update.new_score)?)
                } else {
                    None
                };

                let old = doc.list_mut(from).remove(index);
                let mut moved = MovieRecord::new(old.title);
                moved.added_date = Some(today());
                moved.keywords = old.keywords;
                moved.description = old.description;
                moved.credits = old.credits;
                if let Some(score) = score {
                    moved.score = Some(score);
                    moved.date_watched = Some(today());
                }

                doc.list_mut(to).push(moved.clone());
                tracing::info!(title = %moved.title, from = %from, to = %to, "Moved movie");
                moved
            }
            None => {
                let movie = &mut doc.list_mut(from)[index];
                if let (Some(score), ListName::Watched) = (update.new_score, from) {
                    movie.score = Some(require_score(&update.title, Some(score))?);
                    tracing::info!(title = %movie.title, score, "Updated score");
                }
                movie.clone()
            }
        };

        self.store.save(&doc).await;
        Ok(updated)
    }

    /// Replaces the preferences after validating the genres
    pub async fn update_preferences(&self, preferences: Preferences) -> AppResult<Preferences> {
        let invalid = preferences.invalid_genres();
        if !invalid.is_empty() {
            tracing::warn!(invalid = ?invalid, "Rejected preferences with unknown genres");
            return Err(AppError::InvalidInput(format!(
                "Invalid genres: {}",
                invalid.join(", ")
            )));
        }

        let _guard = self.write_lock.lock().await;
        let mut doc = self.store.load().await;
        doc.preferences = preferences.clone();
        self.store.save(&doc).await;

        tracing::info!(
            genres = preferences.genres.len(),
            keywords = preferences.keywords.len(),
            "Updated preferences"
        );
        Ok(preferences)
    }

    /// Generates descriptions for every movie that lacks one
    ///
    /// Each description is saved as soon as it arrives so an interrupted
    /// run keeps its progress. Missing keywords and credits are filled from
    /// the same reply. Returns how many movies were updated.
    pub async fn backfill_descriptions(
        &self,
        generator: &SuggestionGenerator,
        max_retries: u32,
        delay: Duration,
    ) -> usize {
        let pending: Vec<String> = self
            .store
            .load()
            .await
            .lists()
            .flat_map(|(_, movies)| movies.iter())
            .filter(|m| m.description.as_deref().map_or(true, |d| d.trim().is_empty()))
            .map(|m| m.title.clone())
            .collect();

        let total = pending.len();
        tracing::info!(total, "Backfilling movie descriptions");

        let mut updated = 0;
        for (i, title) in pending.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(delay).await;
            }
            tracing::info!(title = %title, progress = i + 1, total, "Generating description");

            let doc = self.store.load().await;
            let details = match generator
                .generate(&doc, GenerationRequest::details(title, max_retries))
                .await
            {
                Ok(details) => details,
                Err(e) => {
                    tracing::error!(title = %title, error = %e, "Error generating description");
                    continue;
                }
            };

            let _guard = self.write_lock.lock().await;
            let mut doc = self.store.load().await;
            let Some((list, index)) = doc.position(title) else {
                tracing::warn!(title = %title, "Movie disappeared during backfill");
                continue;
            };

            let movie = &mut doc.list_mut(list)[index];
            movie.description = Some(details.description);
            if movie.keywords.is_empty() {
                movie.keywords = details.keywords;
            }
            if movie.credits.is_none() {
                movie.credits = Some(details.credits);
            }
            self.store.save(&doc).await;

            updated += 1;
            tracing::info!(title = %title, "Saved description");
        }

        tracing::info!(updated, total, "Finished generating descriptions");
        updated
    }
}
