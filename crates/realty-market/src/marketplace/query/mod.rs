//! Filterable, searchable, paginated queries over marketplace documents.
//!
//! Raw query-string pairs flow through [`PredicateBuilder`] (filters),
//! [`SearchAugmenter`] (free-text search) and [`QueryPlan`] (sort, projection,
//! page slice). Evaluation runs against the JSON document form of an entity so
//! dotted paths such as `location.city` address nested fields directly.

pub mod filter;
pub(crate) mod matcher;
pub mod params;
pub mod pipeline;
pub mod search;

pub use filter::{
    Condition, FilterValue, Predicate, PredicateBuilder, QueryError, RangeBound, RangeOp,
    NUMERIC_FIELDS,
};
pub use params::{QueryParams, RESERVED_KEYS};
pub use pipeline::{
    Document, Page, PageDefaults, PageRequest, Pagination, Projection, QueryPlan, SortKey,
    SortSpec,
};
pub use search::{SearchAugmenter, SEARCH_FIELDS};
