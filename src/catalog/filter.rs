use regex::Regex;
use std::{collections::HashSet, sync::OnceLock};

use crate::core::model::Book;

const SYNONYMS: &[(&str, &[&str])] = &[
    ("personal growth", &["personal development", "self-improvement"]),
    ("mindfulness", &["meditation"]),
    ("self-help", &["self-improvement", "personal development"]),
    ("mental health", &["psychology"]),
    ("motivation", &["inspiration", "success"]),
    ("productivity", &["time management"]),
];

static UNRELATED_REGEX: OnceLock<Regex> = OnceLock::new();
static FICTION_REGEX: OnceLock<Regex> = OnceLock::new();
static NON_FICTION_REGEX: OnceLock<Regex> = OnceLock::new();

fn unrelated_regex() -> &'static Regex {
    UNRELATED_REGEX.get_or_init(|| {
        Regex::new(r"(?i)\b(romance|mystery|fantasy|cooking|travel|history)\b")
            .expect("UNRELATED_REGEX is valid")
    })
}

fn fiction_regex() -> &'static Regex {
    FICTION_REGEX.get_or_init(|| Regex::new(r"(?i)\bfiction\b").expect("FICTION_REGEX is valid"))
}

fn non_fiction_regex() -> &'static Regex {
    NON_FICTION_REGEX
        .get_or_init(|| Regex::new(r"(?i)\bnon-?fiction\b").expect("NON_FICTION_REGEX is valid"))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CategoryFilter {
    /// Keep books filed under the target or one of its synonyms.
    Matching(String),
    /// Keep everything not filed under a clearly unrelated genre.
    Wellness,
    Unfiltered,
}

/// Stable, first occurrence wins. Books without an id are dropped.
pub fn deduplicate(books: Vec<Book>) -> Vec<Book> {
    let mut seen = HashSet::new();
    books
        .into_iter()
        .filter(|book| !book.catalog_id.is_blank() && seen.insert(book.catalog_id.clone()))
        .collect()
}

pub fn matches_category(book: &Book, target: &str) -> bool {
    let target = target.trim().to_lowercase();
    let synonyms = SYNONYMS
        .iter()
        .find(|(subject, _)| *subject == target)
        .map(|(_, synonyms)| *synonyms)
        .unwrap_or_default();

    book.categories.iter().any(|category| {
        let category = category.to_lowercase();
        category.contains(&target) || synonyms.iter().any(|synonym| category.contains(synonym))
    })
}

fn is_unrelated_category(category: &str) -> bool {
    let fiction = fiction_regex().is_match(category) && !non_fiction_regex().is_match(category);
    let biography = category.to_lowercase().contains("biography")
        && !category.to_lowercase().contains("self");

    fiction || biography || unrelated_regex().is_match(category)
}

pub fn is_unrelated(book: &Book) -> bool {
    book.categories
        .iter()
        .any(|category| is_unrelated_category(category))
}

/// Books without a description never match.
pub fn describes_any(book: &Book, description_query: &str) -> bool {
    let Some(description) = book.description.as_deref().map(str::to_lowercase) else {
        return false;
    };

    description_query
        .split_whitespace()
        .map(str::to_lowercase)
        .any(|token| description.contains(&token))
}

/// Merges provider result sets into one page.
#[derive(Clone, Debug)]
pub struct Aggregate {
    pub category: CategoryFilter,
    pub description: Option<String>,
    pub limit: usize,
}

impl Aggregate {
    pub fn new(category: CategoryFilter, limit: usize) -> Self {
        Self {
            category,
            description: None,
            limit,
        }
    }

    pub fn with_description(self, description: Option<&str>) -> Self {
        Self {
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_owned),
            ..self
        }
    }

    fn keeps(&self, book: &Book) -> bool {
        let category = match &self.category {
            CategoryFilter::Matching(target) => matches_category(book, target),
            CategoryFilter::Wellness => !is_unrelated(book),
            CategoryFilter::Unfiltered => true,
        };

        category
            && self
                .description
                .as_deref()
                .map_or(true, |query| describes_any(book, query))
    }

    pub fn apply(&self, results: Vec<Book>) -> Vec<Book> {
        deduplicate(results)
            .into_iter()
            .filter(|book| self.keeps(book))
            .take(self.limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: &str, categories: &[&str]) -> Book {
        Book {
            catalog_id: id.into(),
            title: Some(format!("Book {id}")),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    fn ids(books: &[Book]) -> Vec<&str> {
        books.iter().map(|b| b.catalog_id.as_str()).collect()
    }

    #[test]
    fn deduplicate_keeps_first_occurrence() {
        let first = Book {
            subtitle: Some("first".to_owned()),
            ..book("a", &[])
        };
        let repeat = Book {
            subtitle: Some("second".to_owned()),
            ..book("a", &[])
        };

        let once = deduplicate(vec![first, book("b", &[]), repeat, book("", &[])]);
        assert_eq!(ids(&once), vec!["a", "b"]);
        assert_eq!(once[0].subtitle.as_deref(), Some("first"));

        let twice = deduplicate(once.clone());
        assert_eq!(twice, once);
    }

    #[test]
    fn category_match_uses_substrings_and_synonyms() {
        assert!(matches_category(&book("a", &["Self-Help / Personal Growth"]), "personal growth"));
        assert!(matches_category(&book("b", &["Body, Mind & Spirit / Meditation"]), "Mindfulness"));
        assert!(matches_category(&book("c", &["Self-Improvement"]), "personal growth"));
        assert!(!matches_category(&book("d", &["Cooking"]), "mindfulness"));
        assert!(!matches_category(&book("e", &[]), "mindfulness"));
    }

    #[test]
    fn single_category_mode_ignores_the_denylist() {
        let aggregate = Aggregate::new(CategoryFilter::Matching("self-help".to_owned()), 10);
        let kept = aggregate.apply(vec![book("a", &["Fiction", "Self-Help"]), book("b", &["Fiction"])]);

        assert_eq!(ids(&kept), vec!["a"]);
    }

    #[test]
    fn wellness_mode_drops_unrelated_genres() {
        let aggregate = Aggregate::new(CategoryFilter::Wellness, 10);
        let kept = aggregate.apply(vec![
            book("novel", &["Fiction"]),
            book("teen", &["Juvenile Nonfiction"]),
            book("essays", &["Non-Fiction"]),
            book("memoir", &["Biography & Autobiography"]),
            book("recovery", &["Biography & Autobiography / Self-Help"]),
            book("recipes", &["Cooking / Vegetarian"]),
            book("calm", &["Psychology"]),
            book("untagged", &[]),
        ]);

        assert_eq!(ids(&kept), vec!["teen", "essays", "recovery", "calm", "untagged"]);
    }

    #[test]
    fn description_filter_needs_one_token() {
        let with_description = |id: &str, description: Option<&str>| Book {
            description: description.map(str::to_owned),
            ..book(id, &[])
        };

        let aggregate =
            Aggregate::new(CategoryFilter::Unfiltered, 10).with_description(Some("Anxiety SLEEP"));
        let kept = aggregate.apply(vec![
            with_description("a", Some("Better sleep in thirty days")),
            with_description("b", Some("A history of tea")),
            with_description("c", None),
        ]);

        assert_eq!(ids(&kept), vec!["a"]);
    }

    #[test]
    fn never_exceeds_the_limit() {
        let many: Vec<_> = (0..30).map(|i| book(&i.to_string(), &[])).collect();

        for limit in [1, 8, 29, 30, 31] {
            let kept = Aggregate::new(CategoryFilter::Unfiltered, limit).apply(many.clone());
            assert_eq!(kept.len(), limit.min(30));
        }
    }
}
