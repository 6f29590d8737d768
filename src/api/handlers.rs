use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{
        DuplicateCheck, KeywordAnalysis, ListName, MovieDocument, MovieUpdate, NewMovie,
        Preferences, RelatedRequest, Suggestion, MOVIE_GENRES,
    },
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct DuplicateQuery {
    pub title: String,
}

fn success(message: &str) -> Json<Value> {
    Json(json!({ "status": "success", "message": message }))
}

/// Service status
pub async fn root() -> Json<Value> {
    Json(json!({ "status": "Movie Tracker API is running" }))
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// The whole movie document
pub async fn get_movies(State(state): State<AppState>) -> Json<MovieDocument> {
    Json(state.library.document().await)
}

pub async fn get_genres() -> Json<Value> {
    Json(json!({ "genres": MOVIE_GENRES }))
}

pub async fn get_keyword_analysis(State(state): State<AppState>) -> Json<KeywordAnalysis> {
    let analysis = state.suggestions.analyze_keywords().await;
    tracing::info!(
        liked = analysis.liked.len(),
        disliked = analysis.disliked.len(),
        "Keyword analysis"
    );
    Json(analysis)
}

/// Next movie suggestion
pub async fn suggest_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<Suggestion>> {
    tracing::info!(request_id = %request_id, "Received suggestion request");

    let suggestion = state.suggestions.get_suggestion().await?;

    tracing::info!(request_id = %request_id, title = %suggestion.title, "Returning suggestion");
    Ok(Json(suggestion))
}

/// Generated details for one movie
pub async fn get_movie_details(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(title): Path<String>,
) -> AppResult<Json<Suggestion>> {
    tracing::info!(request_id = %request_id, title = %title, "Getting movie details");

    let details = state.suggestions.get_details(&title).await?;

    tracing::info!(request_id = %request_id, title = %details.title, "Generated details");
    Ok(Json(details))
}

/// A movie related to `title`
pub async fn get_related_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(title): Path<String>,
    Json(request): Json<RelatedRequest>,
) -> AppResult<Json<Suggestion>> {
    tracing::info!(
        request_id = %request_id,
        title = %title,
        previous = request.previous_suggestions.len(),
        "Getting related movie"
    );

    let related = state
        .suggestions
        .get_related(&title, &request.previous_suggestions)
        .await?;

    tracing::info!(request_id = %request_id, related = %related.title, "Returning related movie");
    Ok(Json(related))
}

pub async fn check_duplicate(
    State(state): State<AppState>,
    Query(query): Query<DuplicateQuery>,
) -> Json<DuplicateCheck> {
    Json(state.suggestions.check_duplicate(&query.title).await)
}

/// Adds a movie to the list named in the path
pub async fn add_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(list_name): Path<String>,
    Json(movie): Json<NewMovie>,
) -> AppResult<Json<Value>> {
    tracing::info!(request_id = %request_id, title = %movie.title, list = %list_name, "Adding movie");

    let list: ListName = list_name.parse().map_err(AppError::InvalidInput)?;
    state.library.add_movie(list, movie).await?;

    Ok(success("Movie added successfully"))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(title): Path<String>,
) -> AppResult<Json<Value>> {
    tracing::info!(request_id = %request_id, title = %title, "Deleting movie");

    state.library.delete_movie(&title).await?;

    Ok(success("Movie deleted successfully"))
}

/// Re-scores a movie or moves it to another list
pub async fn update_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(update): Json<MovieUpdate>,
) -> AppResult<Json<Value>> {
    tracing::info!(request_id = %request_id, title = %update.title, "Updating movie");

    state.library.update_movie(update).await?;

    Ok(success("Movie updated successfully"))
}

/// Saves new preferences and restarts the suggestion queue
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(preferences): Json<Preferences>,
) -> AppResult<Json<Value>> {
    tracing::info!(request_id = %request_id, preferences = ?preferences, "Updating preferences");

    state.library.update_preferences(preferences).await?;
    // Queued suggestions were generated for the old preferences
    state.suggestions.reset_queue().await;

    Ok(success("Preferences updated successfully"))
}
