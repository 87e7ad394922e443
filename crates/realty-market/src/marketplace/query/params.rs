use std::collections::BTreeMap;

/// Keys that steer the pipeline and never become filter conditions.
pub const RESERVED_KEYS: [&str; 5] = ["page", "limit", "sort", "fields", "search"];

/// Client supplied query-string parameters, keyed by their raw name.
///
/// A repeated key keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: BTreeMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self { entries }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn is_reserved(key: &str) -> bool {
        RESERVED_KEYS.contains(&key)
    }

    /// Non-reserved entries in key order.
    pub fn filters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(key, _)| !Self::is_reserved(key))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn page(&self) -> Option<&str> {
        self.get("page")
    }

    pub fn limit(&self) -> Option<&str> {
        self.get("limit")
    }

    pub fn sort(&self) -> Option<&str> {
        self.get("sort")
    }

    pub fn fields(&self) -> Option<&str> {
        self.get("fields")
    }

    /// Trimmed search text, `None` when absent or blank.
    pub fn search(&self) -> Option<&str> {
        self.get("search")
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}
