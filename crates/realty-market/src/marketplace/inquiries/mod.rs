//! Inquiries sent by visitors about a listing, routed to its agent or owner.

pub mod domain;
pub mod router;
pub mod service;

pub use domain::{Inquiry, InquiryDraft, InquiryRepository, InquiryStatus};
pub use router::inquiry_router;
pub use service::{AgentLoad, InquiryOverview, InquiryService, InquiryStats};
