use std::collections::BTreeSet;

use crate::models::{KeywordAnalysis, MovieRecord};

/// Scores at or above this mark a watched movie as liked
pub const LIKED_SCORE: u8 = 7;

/// Counts keywords across watched movies, split into liked and disliked
///
/// Movies without a score count toward neither side. A keyword repeated
/// within one movie is counted once for that movie.
pub fn analyze(watched: &[MovieRecord]) -> KeywordAnalysis {
    let mut analysis = KeywordAnalysis::default();

    for movie in watched {
        let Some(score) = movie.score else {
            continue;
        };
        let counts = if score >= LIKED_SCORE {
            &mut analysis.liked
        } else {
            &mut analysis.disliked
        };
        let distinct: BTreeSet<&str> = movie.keywords.iter().map(String::as_str).collect();
        for keyword in distinct {
            *counts.entry(keyword.to_string()).or_insert(0) += 1;
        }
    }

    analysis
}

/// Sum of liked-keyword counts for the given keywords
pub fn liked_affinity(analysis: &KeywordAnalysis, keywords: &[String]) -> usize {
    keywords
        .iter()
        .filter_map(|k| analysis.liked.get(k))
        .sum()
}

/// Whether any keyword matches a preferred keyword, ignoring case
pub fn matches_any(keywords: &[String], preferred: &[String]) -> bool {
    keywords.iter().any(|k| {
        preferred
            .iter()
            .any(|p| p.trim().eq_ignore_ascii_case(k.trim()))
    })
}
