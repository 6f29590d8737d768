//! Title normalization used for every duplicate comparison.
//!
//! Two titles are an exact match when their [`normalize`] keys are equal and
//! similar when their [`base_key`]s are equal, i.e. the same name regardless
//! of year (re-releases, remakes, or entries stored without a year).

const STOPWORDS: [&str; 3] = ["the", "a", "an"];

/// Splits a title into its base title and an optional parenthesized year
///
/// The year is the first parenthesized group holding exactly four digits;
/// the base title is everything before its opening parenthesis, trimmed.
pub fn extract_year(title: &str) -> (&str, Option<&str>) {
    for (open, _) in title.match_indices('(') {
        let rest = &title[open + 1..];
        let Some(close) = rest.find(')') else {
            break;
        };
        let inner = rest[..close].trim();
        if inner.len() == 4 && inner.bytes().all(|b| b.is_ascii_digit()) {
            return (title[..open].trim(), Some(inner));
        }
    }
    (title, None)
}

/// Canonical comparison key: lowercase, alphanumeric, stopword-free, year appended
pub fn normalize(title: &str) -> String {
    let (base, year) = extract_year(title);
    let mut key = normalize_words(base);
    if let Some(year) = year {
        if !key.is_empty() {
            key.push(' ');
        }
        key.push_str(year);
    }
    key
}

/// Comparison key of the base title only, ignoring any year
pub fn base_key(title: &str) -> String {
    normalize_words(extract_year(title).0)
}

fn normalize_words(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| !STOPWORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_year_present() {
        assert_eq!(extract_year("The Matrix (1999)"), ("The Matrix", Some("1999")));
    }

    #[test]
    fn test_extract_year_absent() {
        assert_eq!(extract_year("The Matrix"), ("The Matrix", None));
    }

    #[test]
    fn test_extract_year_ignores_non_year_parentheses() {
        assert_eq!(extract_year("Alien (Director's Cut)"), ("Alien (Director's Cut)", None));
        assert_eq!(extract_year("Heat (95)"), ("Heat (95)", None));
    }

    #[test]
    fn test_extract_year_skips_leading_group() {
        assert_eq!(
            extract_year("Borat (Cultural Learnings) (2006)"),
            ("Borat (Cultural Learnings)", Some("2006"))
        );
    }

    #[test]
    fn test_extract_year_reassembles() {
        for title in ["Heat (1995)", "Seven Samurai (1954)", "Up (2009)"] {
            let (base, year) = extract_year(title);
            assert_eq!(format!("{} ({})", base, year.unwrap()), title);
        }
    }

    #[test]
    fn test_normalize_strips_stopwords() {
        assert_eq!(normalize("The Matrix (1999)"), normalize("Matrix (1999)"));
        assert_eq!(normalize("The Matrix (1999)"), "matrix 1999");
    }

    #[test]
    fn test_normalize_keeps_year_distinct() {
        assert_ne!(normalize("The Matrix (1999)"), normalize("The Matrix (2003)"));
    }

    #[test]
    fn test_normalize_punctuation_and_case() {
        assert_eq!(normalize("Schindler's List (1993)"), "schindlers list 1993");
        assert_eq!(normalize("  AN  American   Werewolf in London "), "american werewolf in london");
        assert_eq!(normalize("Amélie (2001)"), "amélie 2001");
    }

    #[test]
    fn test_normalize_only_removes_whole_stopwords() {
        assert_eq!(normalize("Theater Camp"), "theater camp");
        assert_eq!(normalize("A Quiet Place"), "quiet place");
    }

    #[test]
    fn test_normalize_year_only() {
        assert_eq!(normalize("(1999)"), "1999");
    }

    #[test]
    fn test_base_key_ignores_year() {
        assert_eq!(base_key("Dune (1984)"), base_key("Dune (2021)"));
        assert_eq!(base_key("Dune (2021)"), base_key("Dune"));
        assert_eq!(base_key("The Thing (1982)"), "thing");
    }
}
