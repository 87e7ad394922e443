use super::filter::{Condition, Predicate};
use super::params::QueryParams;

/// Document fields scanned by the `search` parameter.
pub const SEARCH_FIELDS: [&str; 6] = [
    "title",
    "description",
    "location.city",
    "location.address",
    "type",
    "amenities",
];

/// Adds the free-text clause to a predicate.
pub struct SearchAugmenter;

impl SearchAugmenter {
    /// Safe to call more than once on the same predicate: an identical text
    /// clause is never added twice.
    pub fn augment(predicate: Predicate, params: &QueryParams) -> Predicate {
        match params.search() {
            Some(text) => Self::with_text(predicate, text),
            None => predicate,
        }
    }

    pub fn with_text(predicate: Predicate, text: &str) -> Predicate {
        let condition = Self::condition(text);
        if predicate.contains(&condition) {
            predicate
        } else {
            predicate.and(condition)
        }
    }

    /// Matched literally; regex metacharacters in the input carry no meaning.
    pub fn condition(text: &str) -> Condition {
        Condition::TextMatch {
            fields: SEARCH_FIELDS.iter().map(|field| field.to_string()).collect(),
            needle: text.trim().to_string(),
        }
    }
}
