use serde_json::Value;

use super::domain::Listing;
use crate::error::RepositoryError;
use crate::marketplace::ids::{InquiryId, ListingId, UserId};
use crate::marketplace::query::{Predicate, QueryPlan, SortSpec};

/// Storage abstraction for listings so the service can be exercised in isolation.
///
/// The counter and set mutations are single calls so a store can apply them
/// atomically without a read-modify-write in the service.
pub trait ListingRepository: Send + Sync {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError>;
    fn update(&self, listing: Listing) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError>;
    fn remove(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError>;

    /// Documents matching the predicate, ignoring paging.
    fn count(&self, predicate: &Predicate) -> Result<u64, RepositoryError>;
    /// Sorted, sliced and projected documents for one page.
    fn page(&self, plan: &QueryPlan) -> Result<Vec<Value>, RepositoryError>;
    /// Every matching listing, sorted.
    fn select(&self, predicate: &Predicate, sort: &SortSpec)
        -> Result<Vec<Listing>, RepositoryError>;

    fn increment_views(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError>;
    fn add_favorite(&self, id: &ListingId, user: UserId)
        -> Result<Option<Listing>, RepositoryError>;
    fn remove_favorite(
        &self,
        id: &ListingId,
        user: UserId,
    ) -> Result<Option<Listing>, RepositoryError>;
    fn attach_inquiry(&self, id: &ListingId, inquiry: InquiryId) -> Result<(), RepositoryError>;
    fn detach_inquiry(&self, id: &ListingId, inquiry: InquiryId) -> Result<(), RepositoryError>;
}
