//! Property listings: the polymorphic sale/rent/student model, its
//! validation, the listing workflows and their HTTP surface.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod similar;
pub mod slug;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    Amenity, Category, CategoryTerms, City, ContactInfo, ImageDescriptor, Listing, ListingDraft,
    ListingStatus, Location, PropertyType, RentTerms, SaleTerms, StudentHousingDetails,
    StudentTerms,
};
pub use repository::ListingRepository;
pub use router::listing_router;
pub use service::{public_predicate, ApprovalDecision, ListingService};
pub use similar::{rank_similar, similarity_score};
pub use slug::{generate_slug, slugify};
pub use validation::{check_category_keys, validate_listing};
