use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod movie;

pub use movie::{Credits, ListName, MovieDocument, MovieRecord};

/// Genre vocabulary accepted in preferences
pub const MOVIE_GENRES: [&str; 21] = [
    "Action",
    "Adventure",
    "Animation",
    "Biography",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "Film-Noir",
    "History",
    "Horror",
    "Musical",
    "Mystery",
    "Romance",
    "Sci-Fi",
    "Sport",
    "Thriller",
    "War",
    "Western",
];

/// Genre and keyword preferences steering suggestions
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl Preferences {
    /// Genres that are not part of [`MOVIE_GENRES`]
    pub fn invalid_genres(&self) -> Vec<String> {
        self.genres
            .iter()
            .filter(|g| !MOVIE_GENRES.contains(&g.as_str()))
            .cloned()
            .collect()
    }
}

/// A generated movie that has not been placed in any list yet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub credits: Credits,
}

/// Keyword frequencies across scored watched movies
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KeywordAnalysis {
    /// Keywords from movies scored 7 or higher
    pub liked: HashMap<String, usize>,
    /// Keywords from movies scored below 7
    pub disliked: HashMap<String, usize>,
}

/// Outcome of a duplicate check
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub reason: Option<String>,
}

impl DuplicateCheck {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            reason: None,
        }
    }

    pub fn duplicate(reason: impl Into<String>) -> Self {
        Self {
            is_duplicate: true,
            reason: Some(reason.into()),
        }
    }
}

/// A title recently rejected as a duplicate or mismatch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectionRecord {
    pub title: String,
    /// Normalized comparison key of `title`
    pub normalized: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body for adding a movie to a list
#[derive(Debug, Clone, Deserialize)]
pub struct NewMovie {
    pub title: String,
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub credits: Option<Credits>,
}

/// Body for re-scoring a movie or moving it between lists
#[derive(Debug, Clone, Deserialize)]
pub struct MovieUpdate {
    pub title: String,
    #[serde(default)]
    pub new_score: Option<u8>,
    #[serde(default)]
    pub new_list: Option<ListName>,
}

/// Body for a related-movie request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedRequest {
    #[serde(default)]
    pub previous_suggestions: Vec<String>,
}
