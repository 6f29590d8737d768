use std::sync::Arc;

use crate::services::{MovieLibrary, SuggestionService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<MovieLibrary>,
    pub suggestions: Arc<SuggestionService>,
}

impl AppState {
    pub fn new(library: Arc<MovieLibrary>, suggestions: Arc<SuggestionService>) -> Self {
        Self {
            library,
            suggestions,
        }
    }
}
