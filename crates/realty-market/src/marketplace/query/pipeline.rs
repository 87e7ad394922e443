use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::filter::{Predicate, PredicateBuilder, QueryError};
use super::matcher;
use super::params::QueryParams;
use super::search::SearchAugmenter;

/// Entities exposed to the query engine in their serialized form.
pub trait Document {
    fn to_document(&self) -> Value;
}

/// Page-size policy applied when the client omits or abuses `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDefaults {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Ordered sort keys; `-field` sorts descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::descending("createdAt")
    }
}

impl SortSpec {
    pub fn descending(field: &str) -> Self {
        Self {
            keys: vec![SortKey {
                field: field.to_string(),
                descending: true,
            }],
        }
    }

    pub fn parse(raw: Option<&str>) -> Self {
        let keys: Vec<SortKey> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty() && *segment != "-")
            .map(|segment| match segment.strip_prefix('-') {
                Some(field) => SortKey {
                    field: field.to_string(),
                    descending: true,
                },
                None => SortKey {
                    field: segment.to_string(),
                    descending: false,
                },
            })
            .collect();

        if keys.is_empty() {
            Self::default()
        } else {
            Self { keys }
        }
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn compare(&self, left: &Value, right: &Value) -> Ordering {
        for key in &self.keys {
            let ordering = matcher::compare(
                matcher::sort_key(left, &key.field),
                matcher::sort_key(right, &key.field),
            );
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Stable, so documents with equal keys keep their incoming order.
    pub fn sort(&self, documents: &mut [Value]) {
        documents.sort_by(|left, right| self.compare(left, right));
    }
}

/// Field selection applied to every returned document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Default for Projection {
    fn default() -> Self {
        Self::Exclude(vec!["revision".to_string()])
    }
}

impl Projection {
    /// `fields=title,price` keeps those fields (plus `id`); a list made only of
    /// `-field` entries drops them instead.
    pub fn parse(raw: Option<&str>) -> Self {
        let fields: Vec<&str> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect();

        if fields.is_empty() {
            return Self::default();
        }

        if fields.iter().all(|field| field.starts_with('-')) {
            let excluded = fields
                .iter()
                .map(|field| field.trim_start_matches('-'))
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect();
            return Self::Exclude(excluded);
        }

        Self::Include(
            fields
                .into_iter()
                .filter(|field| !field.starts_with('-'))
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn apply(&self, document: Value) -> Value {
        match self {
            Projection::Include(fields) => {
                let mut projected = Map::new();
                if let Some(id) = document.get("id") {
                    projected.insert("id".to_string(), id.clone());
                }
                for field in fields {
                    copy_path(&document, &mut projected, field);
                }
                Value::Object(projected)
            }
            Projection::Exclude(fields) => {
                let mut document = document;
                for field in fields {
                    remove_path(&mut document, field);
                }
                document
            }
        }
    }
}

fn copy_path(source: &Value, target: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            if let Some(value) = source.get(path) {
                target.insert(path.to_string(), value.clone());
            }
        }
        Some((head, rest)) => {
            let Some(child) = source.get(head).filter(|value| value.is_object()) else {
                return;
            };
            let slot = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(nested) = slot {
                copy_path(child, nested, rest);
            }
        }
    }
}

fn remove_path(document: &mut Value, path: &str) {
    match path.split_once('.') {
        None => {
            if let Value::Object(map) = document {
                map.remove(path);
            }
        }
        Some((head, rest)) => {
            if let Some(child) = document.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

/// Requested page slice, already normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Missing, unparsable or non-positive values fall back to page 1 and the
    /// default limit; limits above the maximum are clamped.
    pub fn parse(page: Option<&str>, limit: Option<&str>, defaults: PageDefaults) -> Self {
        let page = page
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|page| *page >= 1)
            .map(|page| page as u64)
            .unwrap_or(1);
        let limit = limit
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|limit| *limit >= 1)
            .map(|limit| limit as u64)
            .unwrap_or(defaults.default_limit)
            .min(defaults.max_limit.max(1));
        Self { page, limit }
    }

    pub fn from_params(params: &QueryParams, defaults: PageDefaults) -> Self {
        Self::parse(params.page(), params.limit(), defaults)
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Pagination metadata returned next to every page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_docs: u64,
    pub items_per_page: u64,
    pub has_next: bool,
    pub has_prev: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<u64>,
}

impl Pagination {
    pub fn compute(request: PageRequest, total_docs: u64) -> Self {
        if total_docs == 0 {
            return Self::empty(request);
        }

        let total_pages = total_docs.div_ceil(request.limit.max(1));
        let has_next = request.page < total_pages;
        let has_prev = request.page > 1;

        Self {
            current_page: request.page,
            total_pages,
            total_docs,
            items_per_page: request.limit,
            has_next,
            has_prev,
            next: has_next.then_some(request.page + 1),
            prev: has_prev.then_some(request.page - 1),
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self {
            current_page: request.page,
            total_pages: 0,
            total_docs: 0,
            items_per_page: request.limit,
            has_next: false,
            has_prev: false,
            next: None,
            prev: None,
        }
    }
}

/// One page of documents with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Fully resolved query: what to match, in which order, which fields, which slice.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub predicate: Predicate,
    pub sort: SortSpec,
    pub projection: Projection,
    pub page: PageRequest,
}

impl QueryPlan {
    pub fn from_params(params: &QueryParams, defaults: PageDefaults) -> Result<Self, QueryError> {
        let predicate = PredicateBuilder::from_params(params)?;
        let predicate = SearchAugmenter::augment(predicate, params);

        Ok(Self {
            predicate,
            sort: SortSpec::parse(params.sort()),
            projection: Projection::parse(params.fields()),
            page: PageRequest::from_params(params, defaults),
        })
    }

    /// Prepends conditions the client cannot lift.
    pub fn with_base(mut self, base: Predicate) -> Self {
        self.predicate = base.merge(self.predicate);
        self
    }

    /// Number of documents matching the predicate, ignoring the slice.
    pub fn count<'a>(&self, documents: impl IntoIterator<Item = &'a Value>) -> u64 {
        count(documents, &self.predicate)
    }

    /// Filter, sort, slice, then project.
    pub fn execute(&self, documents: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut matched = select(documents, &self.predicate, &self.sort);
        let skip = usize::try_from(self.page.skip()).unwrap_or(usize::MAX);
        let take = usize::try_from(self.page.limit).unwrap_or(usize::MAX);
        matched
            .drain(..)
            .skip(skip)
            .take(take)
            .map(|document| self.projection.apply(document))
            .collect()
    }

    /// Count and slice over the same document set.
    pub fn run(&self, documents: Vec<Value>) -> Page<Value> {
        let total = self.count(documents.iter());
        if total == 0 {
            return Page {
                data: Vec::new(),
                pagination: Pagination::empty(self.page),
            };
        }
        Page {
            data: self.execute(documents),
            pagination: Pagination::compute(self.page, total),
        }
    }
}

pub fn count<'a>(documents: impl IntoIterator<Item = &'a Value>, predicate: &Predicate) -> u64 {
    documents
        .into_iter()
        .filter(|document| predicate.matches(document))
        .count() as u64
}

/// Matching documents in sort order, unsliced.
pub fn select(
    documents: impl IntoIterator<Item = Value>,
    predicate: &Predicate,
    sort: &SortSpec,
) -> Vec<Value> {
    let mut matched: Vec<Value> = documents
        .into_iter()
        .filter(|document| predicate.matches(document))
        .collect();
    sort.sort(&mut matched);
    matched
}
