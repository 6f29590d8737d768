use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/genres", get(handlers::get_genres))
        .route("/preferences", put(handlers::update_preferences))
        // Movie lists
        .route(
            "/movies",
            get(handlers::get_movies).put(handlers::update_movie),
        )
        .route(
            "/movies/:name",
            post(handlers::add_movie).delete(handlers::delete_movie),
        )
        // Suggestions
        .route("/movies/keywords", get(handlers::get_keyword_analysis))
        .route("/movies/suggest", get(handlers::suggest_movie))
        .route("/movies/duplicate", get(handlers::check_duplicate))
        .route("/movies/details/:title", get(handlers::get_movie_details))
        .route("/movies/related/:title", post(handlers::get_related_movie))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}
