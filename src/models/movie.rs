use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use super::Preferences;

/// The four lists a tracked movie can live in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListName {
    Watched,
    WantToWatch,
    NotInterested,
    Undecided,
}

impl ListName {
    /// All lists, in the order duplicate checks visit them
    pub const ALL: [ListName; 4] = [
        ListName::Watched,
        ListName::WantToWatch,
        ListName::NotInterested,
        ListName::Undecided,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListName::Watched => "watched",
            ListName::WantToWatch => "want_to_watch",
            ListName::NotInterested => "not_interested",
            ListName::Undecided => "undecided",
        }
    }
}

impl Display for ListName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListName::ALL
            .into_iter()
            .find(|list| list.as_str() == s)
            .ok_or_else(|| format!("Invalid list name: {}", s))
    }
}

/// Cast and crew for a movie
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Credits {
    #[serde(default)]
    pub directors: Vec<String>,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub writers: Vec<String>,
}

/// A movie held in exactly one of the user's lists
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieRecord {
    /// Display title, usually with the year embedded as "Title (YYYY)"
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_date: Option<NaiveDate>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<Credits>,
    /// 0-10, only present on watched movies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_watched: Option<NaiveDate>,
}

impl MovieRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            added_date: None,
            keywords: Vec::new(),
            description: None,
            credits: None,
            score: None,
            date_watched: None,
        }
    }
}

/// The persisted movie-list document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MovieDocument {
    #[serde(default)]
    pub watched: Vec<MovieRecord>,
    #[serde(default)]
    pub want_to_watch: Vec<MovieRecord>,
    #[serde(default)]
    pub not_interested: Vec<MovieRecord>,
    #[serde(default)]
    pub undecided: Vec<MovieRecord>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl MovieDocument {
    pub fn list(&self, name: ListName) -> &[MovieRecord] {
        match name {
            ListName::Watched => &self.watched,
            ListName::WantToWatch => &self.want_to_watch,
            ListName::NotInterested => &self.not_interested,
            ListName::Undecided => &self.undecided,
        }
    }

    pub fn list_mut(&mut self, name: ListName) -> &mut Vec<MovieRecord> {
        match name {
            ListName::Watched => &mut self.watched,
            ListName::WantToWatch => &mut self.want_to_watch,
            ListName::NotInterested => &mut self.not_interested,
            ListName::Undecided => &mut self.undecided,
        }
    }

    /// Iterates the lists in duplicate-check order
    pub fn lists(&self) -> impl Iterator<Item = (ListName, &[MovieRecord])> {
        ListName::ALL.into_iter().map(move |name| (name, self.list(name)))
    }

    /// Locates a movie by its exact display title
    pub fn position(&self, title: &str) -> Option<(ListName, usize)> {
        self.lists().find_map(|(name, movies)| {
            movies
                .iter()
                .position(|m| m.title == title)
                .map(|index| (name, index))
        })
    }
}
