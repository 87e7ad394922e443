//! Real-estate marketplace: listings, agencies, inquiries, testimonials,
//! contact messages and the query engine they share.

pub mod actor;
pub mod agencies;
pub mod collaborators;
pub mod contact;
pub mod ids;
pub mod inquiries;
pub mod listings;
pub mod memory;
pub mod query;
pub(crate) mod respond;
pub mod testimonials;
pub mod users;
pub mod validation;

use std::sync::Arc;

use axum::Router;

use self::agencies::{agency_router, AgencyRepository, AgencyService};
use self::collaborators::{MediaStore, Notifier};
use self::contact::{contact_router, ContactRepository, ContactService};
use self::inquiries::{inquiry_router, InquiryRepository, InquiryService};
use self::listings::{listing_router, ListingRepository, ListingService};
use self::query::PageDefaults;
use self::testimonials::{testimonial_router, TestimonialRepository, TestimonialService};
use self::users::{users_router, UserRepository, UserService};

/// Versioned prefix every marketplace route lives under.
pub const API_PREFIX: &str = "/api/saknly/v1";

/// Every service behind the marketplace routes.
#[derive(Clone)]
pub struct MarketplaceServices {
    pub listings: Arc<ListingService>,
    pub agencies: Arc<AgencyService>,
    pub users: Arc<UserService>,
    pub inquiries: Arc<InquiryService>,
    pub testimonials: Arc<TestimonialService>,
    pub contacts: Arc<ContactService>,
}

/// Storage handles and outbound collaborators the services are built from.
pub struct MarketplaceStores {
    pub listings: Arc<dyn ListingRepository>,
    pub agencies: Arc<dyn AgencyRepository>,
    pub users: Arc<dyn UserRepository>,
    pub inquiries: Arc<dyn InquiryRepository>,
    pub testimonials: Arc<dyn TestimonialRepository>,
    pub contacts: Arc<dyn ContactRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub media: Arc<dyn MediaStore>,
}

impl MarketplaceStores {
    /// Every repository backed by one in-memory store.
    pub fn in_memory(
        store: Arc<memory::InMemoryMarketplace>,
        notifier: Arc<dyn Notifier>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            listings: store.clone(),
            agencies: store.clone(),
            users: store.clone(),
            inquiries: store.clone(),
            testimonials: store.clone(),
            contacts: store,
            notifier,
            media,
        }
    }
}

impl MarketplaceServices {
    pub fn build(stores: MarketplaceStores, page_defaults: PageDefaults) -> Self {
        let listings = ListingService::new(
            stores.listings.clone(),
            stores.agencies.clone(),
            stores.users.clone(),
            stores.notifier.clone(),
            stores.media.clone(),
        )
        .with_page_defaults(page_defaults);
        let agencies = AgencyService::new(
            stores.agencies,
            stores.listings.clone(),
            stores.media,
        );
        let users = UserService::new(stores.users.clone(), stores.listings.clone());
        let inquiries = InquiryService::new(
            stores.inquiries,
            stores.listings,
            stores.users,
            stores.notifier,
        )
        .with_page_defaults(page_defaults);

        Self {
            listings: Arc::new(listings),
            agencies: Arc::new(agencies),
            users: Arc::new(users),
            inquiries: Arc::new(inquiries),
            testimonials: Arc::new(TestimonialService::new(stores.testimonials)),
            contacts: Arc::new(ContactService::new(stores.contacts)),
        }
    }
}

/// All marketplace routes under [`API_PREFIX`].
pub fn marketplace_router(services: &MarketplaceServices) -> Router {
    Router::new()
        .nest(
            &format!("{API_PREFIX}/properties"),
            listing_router(services.listings.clone()),
        )
        .nest(
            &format!("{API_PREFIX}/agencies"),
            agency_router(services.agencies.clone()),
        )
        .nest(
            &format!("{API_PREFIX}/users"),
            users_router(services.users.clone()),
        )
        .nest(
            &format!("{API_PREFIX}/property-inquiry"),
            inquiry_router(services.inquiries.clone()),
        )
        .nest(
            &format!("{API_PREFIX}/testimonial"),
            testimonial_router(services.testimonials.clone()),
        )
        .nest(
            &format!("{API_PREFIX}/contact"),
            contact_router(services.contacts.clone()),
        )
}
