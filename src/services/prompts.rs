//! Prompt text for detail and discovery generation.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{KeywordAnalysis, MovieDocument, MovieRecord};

const RESPONSE_SHAPE: &str = r#"{
  "title": "Movie Title (YEAR)",
  "description": "2-3 sentence description focusing on what makes this movie special",
  "keywords": ["keyword1", "keyword2", "keyword3"],
  "credits": {
    "directors": ["name1", "name2"],
    "cast": ["name1", "name2", "name3", "name4"],
    "writers": ["name1", "name2"]
  }
}"#;

/// Inputs for a discovery prompt
pub struct DiscoveryPrompt<'a> {
    pub doc: &'a MovieDocument,
    pub analysis: &'a KeywordAnalysis,
    /// Title the suggestion should resemble, if any
    pub anchor: Option<&'a str>,
    /// Caller-supplied titles that must not be suggested
    pub avoid_titles: &'a [String],
    pub recent_rejects: &'a [String],
}

/// Asks for the fixed-shape description of one known movie
pub fn detail_prompt(title: &str) -> String {
    format!(
        r#"You are a movie expert. For the movie "{title}", provide detailed information as a raw JSON object (not in markdown code blocks) in this exact format:
{RESPONSE_SHAPE}

Requirements:
1. Include the year in the title (e.g., "The Matrix (1999)")
2. The description should highlight key aspects like plot elements, themes, or stylistic choices
3. The keywords must accurately describe the movie's themes, genres, and notable elements
4. Include all major cast and crew members"#
    )
}

impl DiscoveryPrompt<'_> {
    /// Renders the prompt, shuffling list and keyword order with `rng`
    pub fn render<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let doc = self.doc;
        let prefs = &doc.preferences;

        let mut negatives = String::new();
        if !self.recent_rejects.is_empty() {
            negatives.push_str(&format!(
                "\n\nCRITICAL - DO NOT SUGGEST THESE RECENTLY REJECTED MOVIES:\n{}",
                self.recent_rejects.join(", ")
            ));
        }
        if !self.avoid_titles.is_empty() {
            negatives.push_str(&format!(
                "\n\nIMPORTANT: DO NOT suggest any of these previously suggested movies:\n{}",
                self.avoid_titles.join(", ")
            ));
        }

        let request = match self.anchor {
            Some(anchor) => format!(
                "For a movie similar to \"{}\", suggest a related movie based on these preferences:",
                anchor
            ),
            None => "Based on these preferences, suggest a movie that matches the user's interests."
                .to_string(),
        };

        let mut scored: Vec<&MovieRecord> =
            doc.watched.iter().filter(|m| m.score.is_some()).collect();
        scored.shuffle(rng);
        let watched = scored
            .iter()
            .filter_map(|m| m.score.map(|score| format!("{} ({}/10)", m.title, score)))
            .collect::<Vec<_>>()
            .join(", ");

        let mut preferences = String::new();
        if !prefs.genres.is_empty() {
            preferences.push_str(&format!("\nPreferred Genres: {}", prefs.genres.join(", ")));
        }
        if !prefs.keywords.is_empty() {
            preferences.push_str(&format!("\nPreferred Keywords: {}", prefs.keywords.join(", ")));
        }
        if let Some(comments) = prefs.comments.as_deref().filter(|c| !c.trim().is_empty()) {
            preferences.push_str(&format!("\nUser Comments: {}", comments));
        }

        let keyword_requirement = if prefs.keywords.is_empty() {
            String::new()
        } else {
            format!(
                "\nIMPORTANT: The suggested movie MUST include at least one of these keywords: {}",
                prefs.keywords.join(", ")
            )
        };

        format!(
            r#"You are a movie expert. Based on the user's movie preferences:

IMPORTANT: You must NOT suggest any movies that were recently rejected.{negatives}

{request}

Movie History:
- Watched Movies (with scores):
{watched}
- Want to Watch: {want}
- Undecided About: {undecided}
- Not Interested In: {not_interested}
{preferences}

Keyword Analysis:
- Keywords from Highly Rated Movies: {liked}
- Keywords from Lower Rated Movies: {disliked}{keyword_requirement}

Return ONLY a raw JSON object (not in markdown code blocks) in this exact format:
{RESPONSE_SHAPE}

Requirements:
1. Include the year in the title (e.g., "The Matrix (1999)")
2. Do not suggest any movies from the lists above
3. If preferred keywords are specified, the movie MUST match at least one of them
4. Weight the user's preferences:
   - Highly rated watched movies are strong positive indicators
   - Movies in "Want to Watch" suggest interest in similar films
   - Movies in "Not Interested" indicate strong negative preferences
   - "Undecided" movies should be considered neutral
   - Preferred genres should heavily influence suggestions
5. The keywords you provide must be accurate and descriptive, as they will be used for future matching"#,
            want = shuffled_titles(&doc.want_to_watch, rng),
            undecided = shuffled_titles(&doc.undecided, rng),
            not_interested = shuffled_titles(&doc.not_interested, rng),
            liked = shuffled_counts(&self.analysis.liked, rng),
            disliked = shuffled_counts(&self.analysis.disliked, rng),
        )
    }
}

fn shuffled_titles<R: Rng + ?Sized>(movies: &[MovieRecord], rng: &mut R) -> String {
    let mut titles: Vec<&str> = movies.iter().map(|m| m.title.as_str()).collect();
    titles.shuffle(rng);
    titles.join(", ")
}

/// Keyword counts as a JSON object in random key order
fn shuffled_counts<R: Rng + ?Sized>(counts: &HashMap<String, usize>, rng: &mut R) -> String {
    let mut entries: Vec<(&String, &usize)> = counts.iter().collect();
    entries.shuffle(rng);
    let body = entries
        .iter()
        .map(|(keyword, count)| {
            format!(
                "{}: {}",
                serde_json::Value::String((*keyword).clone()),
                count
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}

/// Removes a surrounding markdown code fence, including any language tag
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(end) = rest.rfind("```") else {
        return trimmed;
    };
    let inner = &rest[..end];
    match inner.find('\n') {
        Some(newline) => inner[newline + 1..].trim(),
        None => inner.trim(),
    }
}
