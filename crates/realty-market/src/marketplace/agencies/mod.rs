//! Agencies marketing listings on behalf of owners.

pub mod domain;
pub mod router;
pub mod service;

pub use domain::{Agency, AgencyDraft, AgencyPatch, AgencyRepository, LogoDescriptor};
pub use router::agency_router;
pub use service::{AgencyDetails, AgencyService};
