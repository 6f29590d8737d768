use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use reel_api::{
    api::{create_router, AppState},
    services::{
        providers::{GenerationProvider, ProviderError},
        MovieLibrary, RefillJobs, RejectionMemory, SuggestionService, SuggestionSettings,
    },
    storage::{MovieStore, RecommendationCache, YamlMovieStore},
};

/// Answers prompts with the given titles in turn, wrapping around
struct StubProvider {
    titles: Vec<&'static str>,
    calls: AtomicUsize,
}

impl StubProvider {
    fn new(titles: &[&'static str]) -> Self {
        Self {
            titles: titles.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl GenerationProvider for StubProvider {
    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let title = self.titles[call % self.titles.len()];
        Ok(json!({
            "title": title,
            "description": format!("About {}.", title),
            "keywords": ["heist", "crime"],
            "credits": {"directors": ["Someone"], "cast": [], "writers": []}
        })
        .to_string())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

struct TestApp {
    server: TestServer,
    _refill_jobs: RefillJobs,
    _dir: TempDir,
}

fn create_test_app(titles: &[&'static str]) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn MovieStore> = Arc::new(YamlMovieStore::new(dir.path().join("movies.yaml")));

    let settings = SuggestionSettings {
        max_retries: 2,
        refill_max_retries: 1,
        queue_capacity: 5,
        generation_timeout: Duration::from_secs(5),
    };
    let (suggestions, refill_jobs) = SuggestionService::new(
        store.clone(),
        Arc::new(StubProvider::new(titles)),
        Arc::new(RejectionMemory::in_memory(50)),
        RecommendationCache::new(dir.path().join("cache")),
        settings,
    );

    let state = AppState::new(Arc::new(MovieLibrary::new(store)), Arc::new(suggestions));
    let server = TestServer::new(create_router(state)).unwrap();

    TestApp {
        server,
        _refill_jobs: refill_jobs,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_root_and_health() {
    let app = create_test_app(&["Ronin (1998)"]);

    let response = app.server.get("/").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "Movie Tracker API is running");

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_genres() {
    let app = create_test_app(&["Ronin (1998)"]);

    let response = app.server.get("/genres").await;
    response.assert_status_ok();
    let genres = response.json::<Value>()["genres"].as_array().unwrap().clone();
    assert_eq!(genres.len(), 21);
    assert!(genres.contains(&json!("Sci-Fi")));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = create_test_app(&["Ronin (1998)"]);

    let response = app
        .server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("frontend-123"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "frontend-123");

    let response = app.server.get("/health").await;
    assert!(!response.header("x-request-id").is_empty());
}

#[tokio::test]
async fn test_add_list_and_delete_movie() {
    let app = create_test_app(&["Ronin (1998)"]);

    let response = app
        .server
        .post("/movies/watched")
        .json(&json!({
            "title": "Heat (1995)",
            "score": 9,
            "keywords": ["heist", "crime"]
        }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "success");

    let movies: Value = app.server.get("/movies").await.json();
    assert_eq!(movies["watched"][0]["title"], "Heat (1995)");
    assert_eq!(movies["watched"][0]["score"], 9);
    assert!(movies["watched"][0]["date_watched"].is_string());
    assert_eq!(movies["want_to_watch"], json!([]));

    // Same movie under a different spelling
    let response = app
        .server
        .post("/movies/undecided")
        .json(&json!({ "title": "heat (1995)" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app.server.delete("/movies/Heat%20(1995)").await;
    response.assert_status_ok();

    let response = app.server.delete("/movies/Heat%20(1995)").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert!(response.json::<Value>()["error"]
        .as_str()
        .unwrap()
        .contains("Movie not found"));
}

#[tokio::test]
async fn test_add_movie_validation() {
    let app = create_test_app(&["Ronin (1998)"]);

    let response = app
        .server
        .post("/movies/favorites")
        .json(&json!({ "title": "Heat (1995)" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "Invalid list name: favorites"
    );

    let response = app
        .server
        .post("/movies/watched")
        .json(&json!({ "title": "Heat (1995)" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "Score is required for watched movies"
    );
}

#[tokio::test]
async fn test_update_movie_moves_between_lists() {
    let app = create_test_app(&["Ronin (1998)"]);

    app.server
        .post("/movies/want_to_watch")
        .json(&json!({ "title": "Heat (1995)", "description": "LA crime saga." }))
        .await
        .assert_status_ok();

    let response = app
        .server
        .put("/movies")
        .json(&json!({ "title": "Heat (1995)", "new_list": "watched", "new_score": 8 }))
        .await;
    response.assert_status_ok();

    let movies: Value = app.server.get("/movies").await.json();
    assert_eq!(movies["want_to_watch"], json!([]));
    assert_eq!(movies["watched"][0]["score"], 8);
    assert_eq!(movies["watched"][0]["description"], "LA crime saga.");

    let response = app
        .server
        .put("/movies")
        .json(&json!({ "title": "Ronin (1998)", "new_score": 5 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_preferences() {
    let app = create_test_app(&["Ronin (1998)"]);

    let response = app
        .server
        .put("/preferences")
        .json(&json!({ "genres": ["Crime", "Polka"], "keywords": [] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Invalid genres: Polka");

    let response = app
        .server
        .put("/preferences")
        .json(&json!({
            "genres": ["Crime", "Thriller"],
            "keywords": ["heist"],
            "comments": "Slow burners welcome"
        }))
        .await;
    response.assert_status_ok();

    let movies: Value = app.server.get("/movies").await.json();
    assert_eq!(movies["preferences"]["genres"], json!(["Crime", "Thriller"]));
    assert_eq!(movies["preferences"]["comments"], "Slow burners welcome");
}

#[tokio::test]
async fn test_suggest_movie() {
    let app = create_test_app(&["Ronin (1998)"]);

    let response = app.server.get("/movies/suggest").await;
    response.assert_status_ok();
    let suggestion: Value = response.json();
    assert_eq!(suggestion["title"], "Ronin (1998)");
    assert_eq!(suggestion["credits"]["directors"], json!(["Someone"]));
}

#[tokio::test]
async fn test_suggest_skips_listed_movies() {
    let app = create_test_app(&["Heat (1995)", "Ronin (1998)"]);
    app.server
        .post("/movies/watched")
        .json(&json!({ "title": "Heat (1995)", "score": 9 }))
        .await
        .assert_status_ok();

    let response = app.server.get("/movies/suggest").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["title"], "Ronin (1998)");
}

#[tokio::test]
async fn test_suggest_exhaustion_is_server_error() {
    let app = create_test_app(&["Heat (1995)"]);
    app.server
        .post("/movies/watched")
        .json(&json!({ "title": "Heat (1995)", "score": 9 }))
        .await
        .assert_status_ok();

    let response = app.server.get("/movies/suggest").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<Value>()["error"],
        "Could not generate a movie suggestion after 2 attempts"
    );
}

#[tokio::test]
async fn test_movie_details_allow_listed_movies() {
    let app = create_test_app(&["Heat (1995)"]);
    app.server
        .post("/movies/watched")
        .json(&json!({ "title": "Heat (1995)", "score": 9 }))
        .await
        .assert_status_ok();

    let response = app.server.get("/movies/details/Heat").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["description"], "About Heat (1995).");
}

#[tokio::test]
async fn test_related_movie_uses_cache() {
    let app = create_test_app(&["Ronin (1998)", "Thief (1981)"]);

    let response = app
        .server
        .post("/movies/related/Heat%20(1995)")
        .json(&json!({ "previous_suggestions": [] }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["title"], "Ronin (1998)");

    // Served from the cache, no new generation
    let response = app
        .server
        .post("/movies/related/Heat%20(1995)")
        .json(&json!({ "previous_suggestions": [] }))
        .await;
    assert_eq!(response.json::<Value>()["title"], "Ronin (1998)");

    // Cached entry already shown, so the next title is generated
    let response = app
        .server
        .post("/movies/related/Heat%20(1995)")
        .json(&json!({ "previous_suggestions": ["Ronin (1998)"] }))
        .await;
    assert_eq!(response.json::<Value>()["title"], "Thief (1981)");
}

#[tokio::test]
async fn test_duplicate_check_and_keywords() {
    let app = create_test_app(&["Ronin (1998)"]);
    app.server
        .post("/movies/watched")
        .json(&json!({ "title": "The Matrix (1999)", "score": 9, "keywords": ["simulation"] }))
        .await
        .assert_status_ok();
    app.server
        .post("/movies/watched")
        .json(&json!({ "title": "Cats (2019)", "score": 2, "keywords": ["musical"] }))
        .await
        .assert_status_ok();

    let response = app
        .server
        .get("/movies/duplicate")
        .add_query_param("title", "Matrix (1999)")
        .await;
    response.assert_status_ok();
    let check: Value = response.json();
    assert_eq!(check["is_duplicate"], true);
    assert_eq!(check["reason"], "exists in watched");

    let check: Value = app
        .server
        .get("/movies/duplicate")
        .add_query_param("title", "Ronin (1998)")
        .await
        .json();
    assert_eq!(check["is_duplicate"], false);

    let analysis: Value = app.server.get("/movies/keywords").await.json();
    assert_eq!(analysis["liked"], json!({ "simulation": 1 }));
    assert_eq!(analysis["disliked"], json!({ "musical": 1 }));
}
