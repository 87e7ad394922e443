use std::sync::Arc;

use axum::response::Response;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::error::RepositoryError;
use crate::marketplace::actor::{Actor, Role};
use crate::marketplace::agencies::{Agency, AgencyRepository, LogoDescriptor};
use crate::marketplace::ids::{InquiryId, ListingId, UserId};
use crate::marketplace::listings::domain::{
    Category, CategoryTerms, City, ContactInfo, ImageDescriptor, Listing, ListingDraft,
    ListingStatus, Location, PropertyType, RentTerms, SaleTerms, StudentHousingDetails,
    StudentTerms,
};
use crate::marketplace::listings::{ListingRepository, ListingService};
use crate::marketplace::memory::{InMemoryMarketplace, RecordingMediaStore, RecordingNotifier};
use crate::marketplace::query::{Predicate, QueryPlan, SortSpec};
use crate::marketplace::users::{User, UserRepository};

pub(super) fn terms(category: Category) -> CategoryTerms {
    match category {
        Category::Sale => CategoryTerms::Sale(SaleTerms::default()),
        Category::Rent => CategoryTerms::Rent(RentTerms::default()),
        Category::Student => CategoryTerms::Student(StudentTerms::default()),
    }
}

pub(super) fn draft(category: Category) -> ListingDraft {
    ListingDraft {
        title: "Bright apartment near the university".to_string(),
        description: "Third floor apartment with a balcony and a view of the canal.".to_string(),
        property_type: PropertyType::Apartment,
        price: 1_500_000.0,
        area: 120.0,
        bedrooms: 3,
        bathrooms: 2,
        floor: Some(3),
        total_floors: Some(6),
        location: Location {
            address: "12 El Gomhoria St".to_string(),
            city: City::ShebinElKom,
            district: None,
            latitude: Some(30.55),
            longitude: Some(31.01),
        },
        images: Vec::new(),
        amenities: Vec::new(),
        agent: None,
        agency: None,
        contact_info: ContactInfo {
            name: "Omar".to_string(),
            phone: "01000000000".to_string(),
            email: Some("omar@example.com".to_string()),
            whatsapp: None,
        },
        is_active: false,
        is_negotiable: false,
        is_student_friendly: false,
        student_housing_details: StudentHousingDetails::default(),
        terms: terms(category),
    }
}

/// A JSON create body as a client would send it.
pub(super) fn draft_json(category: &str) -> Value {
    json!({
        "title": "Bright apartment near the university",
        "description": "Third floor apartment with a balcony and a view of the canal.",
        "type": "شقة",
        "category": category,
        "price": 1500000,
        "area": 120,
        "bedrooms": 3,
        "bathrooms": 2,
        "location": { "address": "12 El Gomhoria St", "city": "شبين الكوم" },
        "images": [
            { "storageId": "img-a", "url": "https://cdn.example.com/a.jpg" },
            { "storageId": "img-b", "url": "https://cdn.example.com/b.jpg" }
        ],
        "contactInfo": { "name": "Omar", "phone": "01000000000" }
    })
}

pub(super) fn images(count: usize) -> Vec<ImageDescriptor> {
    (0..count)
        .map(|index| {
            ImageDescriptor::new(
                format!("img-{index}"),
                format!("https://cdn.example.com/{index}.jpg"),
            )
        })
        .collect()
}

/// Approved, active sale listing; `age_minutes` spaces out creation times.
pub(super) fn published(owner: UserId, age_minutes: i64) -> Listing {
    let created = Utc::now() - Duration::minutes(age_minutes);
    let mut listing = draft(Category::Sale).into_listing(owner, "slug".to_string(), created);
    listing.slug = format!("listing-{}", listing.id);
    listing.status = ListingStatus::Available;
    listing.is_approved = true;
    listing.is_active = true;
    listing
}

pub(super) fn logo() -> LogoDescriptor {
    LogoDescriptor {
        storage_id: "logo-1".to_string(),
        url: "https://cdn.example.com/logo.png".to_string(),
    }
}

pub(super) fn agency() -> Agency {
    let now = Utc::now();
    Agency {
        id: Default::default(),
        name: "Nile Homes".to_string(),
        logo: logo(),
        description: None,
        is_featured: true,
        listings: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

pub(super) struct Fixture {
    pub(super) store: Arc<InMemoryMarketplace>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) media: Arc<RecordingMediaStore>,
    pub(super) service: ListingService,
    pub(super) owner: Actor,
    pub(super) agent: Actor,
    pub(super) admin: Actor,
    pub(super) stranger: Actor,
}

fn register(store: &InMemoryMarketplace, name: &str, role: Role) -> Actor {
    let mut user = User::new(name, format!("{name}@example.com"), role);
    user.password_hash = Some("$argon2id$fixture".to_string());
    let user = UserRepository::insert(store, user).expect("user stored");
    Actor::new(user.id, role)
}

pub(super) fn fixture_with(
    notifier: Arc<RecordingNotifier>,
    media: Arc<RecordingMediaStore>,
) -> Fixture {
    let store = Arc::new(InMemoryMarketplace::new());
    let owner = register(&store, "owner_user", Role::User);
    let agent = register(&store, "field_agent", Role::Agent);
    let admin = register(&store, "site_admin", Role::Admin);
    let stranger = register(&store, "someone_else", Role::User);
    let service = ListingService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        media.clone(),
    );
    Fixture {
        store,
        notifier,
        media,
        service,
        owner,
        agent,
        admin,
        stranger,
    }
}

pub(super) fn fixture() -> Fixture {
    fixture_with(
        Arc::new(RecordingNotifier::default()),
        Arc::new(RecordingMediaStore::default()),
    )
}

impl Fixture {
    pub(super) fn insert(&self, listing: Listing) -> Listing {
        ListingRepository::insert(self.store.as_ref(), listing).expect("listing stored")
    }

    pub(super) fn insert_agency(&self) -> Agency {
        AgencyRepository::insert(self.store.as_ref(), agency()).expect("agency stored")
    }

    pub(super) fn fetch(&self, id: &ListingId) -> Option<Listing> {
        ListingRepository::fetch(self.store.as_ref(), id).expect("fetch succeeds")
    }

    pub(super) fn fetch_agency(&self, agency: &Agency) -> Agency {
        AgencyRepository::fetch(self.store.as_ref(), &agency.id)
            .expect("fetch succeeds")
            .expect("agency present")
    }

    pub(super) fn user(&self, actor: &Actor) -> User {
        UserRepository::fetch(self.store.as_ref(), &actor.id)
            .expect("fetch succeeds")
            .expect("user present")
    }

    /// A pending listing submitted by the fixture owner.
    pub(super) fn pending(&self) -> Listing {
        self.service
            .create(&self.owner, draft(Category::Rent))
            .expect("pending listing")
    }
}

/// Every call fails as if the database were offline.
pub(super) struct UnavailableListings;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl ListingRepository for UnavailableListings {
    fn insert(&self, _listing: Listing) -> Result<Listing, RepositoryError> {
        offline()
    }
    fn update(&self, _listing: Listing) -> Result<(), RepositoryError> {
        offline()
    }
    fn fetch(&self, _id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        offline()
    }
    fn remove(&self, _id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        offline()
    }
    fn count(&self, _predicate: &Predicate) -> Result<u64, RepositoryError> {
        offline()
    }
    fn page(&self, _plan: &QueryPlan) -> Result<Vec<Value>, RepositoryError> {
        offline()
    }
    fn select(
        &self,
        _predicate: &Predicate,
        _sort: &SortSpec,
    ) -> Result<Vec<Listing>, RepositoryError> {
        offline()
    }
    fn increment_views(&self, _id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        offline()
    }
    fn add_favorite(
        &self,
        _id: &ListingId,
        _user: UserId,
    ) -> Result<Option<Listing>, RepositoryError> {
        offline()
    }
    fn remove_favorite(
        &self,
        _id: &ListingId,
        _user: UserId,
    ) -> Result<Option<Listing>, RepositoryError> {
        offline()
    }
    fn attach_inquiry(&self, _id: &ListingId, _inquiry: InquiryId) -> Result<(), RepositoryError> {
        offline()
    }
    fn detach_inquiry(&self, _id: &ListingId, _inquiry: InquiryId) -> Result<(), RepositoryError> {
        offline()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
