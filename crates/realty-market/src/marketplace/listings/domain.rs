use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::marketplace::actor::Actor;
use crate::marketplace::ids::{AgencyId, InquiryId, ListingId, UserId};
use crate::marketplace::query::Document;

/// Closed set of property types, serialized with their Arabic labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "شقة")]
    Apartment,
    #[serde(rename = "فيلا")]
    Villa,
    #[serde(rename = "محل")]
    Shop,
    #[serde(rename = "استوديو")]
    Studio,
    #[serde(rename = "دوبلكس")]
    Duplex,
}

impl PropertyType {
    pub fn label(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "شقة",
            PropertyType::Villa => "فيلا",
            PropertyType::Shop => "محل",
            PropertyType::Studio => "استوديو",
            PropertyType::Duplex => "دوبلكس",
        }
    }
}

/// Cities served by the marketplace. Ashmoun is accepted with and without hamza.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum City {
    #[serde(rename = "شبين الكوم")]
    ShebinElKom,
    #[serde(rename = "منوف")]
    Menouf,
    #[serde(rename = "تلا")]
    Tala,
    #[serde(rename = "اشمون")]
    Ashmoun,
    #[serde(rename = "أشمون")]
    AshmounHamza,
    #[serde(rename = "قويسنا")]
    Quesna,
    #[serde(rename = "بركة السبع")]
    BerketElSabaa,
    #[serde(rename = "الباجور")]
    ElBagour,
    #[serde(rename = "طنطا")]
    Tanta,
    #[serde(rename = "مدينة السادات")]
    SadatCity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Amenity {
    #[serde(rename = "تكييف")]
    AirConditioning,
    #[serde(rename = "مصعد")]
    Elevator,
    #[serde(rename = "شرفة")]
    Balcony,
    #[serde(rename = "موقف سيارات")]
    Parking,
    #[serde(rename = "مسموح بالحيوانات الأليفة")]
    PetsAllowed,
    #[serde(rename = "مفروشة جزئياً")]
    PartlyFurnished,
    #[serde(rename = "أمن")]
    Security,
    #[serde(rename = "نظام كهرباء ذكي")]
    SmartElectricity,
    #[serde(rename = "مطبخ مجهز")]
    EquippedKitchen,
    #[serde(rename = "مخزن")]
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Available,
    Rented,
    Sold,
    Pending,
    Inactive,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Rented => "rented",
            ListingStatus::Sold => "sold",
            ListingStatus::Pending => "pending",
            ListingStatus::Inactive => "inactive",
        }
    }

    /// Label shown on the public slider.
    pub fn arabic_label(&self) -> &'static str {
        match self {
            ListingStatus::Available => "متاح",
            ListingStatus::Rented => "مؤجر",
            ListingStatus::Sold => "مباع",
            ListingStatus::Pending => "قيد المراجعة",
            ListingStatus::Inactive => "غير نشط",
        }
    }
}

fn default_alt_text() -> String {
    "Property image".to_string()
}

/// An image already stored by the media service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub storage_id: String,
    pub url: String,
    #[serde(default = "default_alt_text")]
    pub alt_text: String,
    #[serde(default)]
    pub is_main: bool,
}

impl ImageDescriptor {
    pub fn new(storage_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            storage_id: storage_id.into(),
            url: url.into(),
            alt_text: default_alt_text(),
            is_main: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub address: String,
    pub city: City,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Private,
    Shared,
    Dormitory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderPolicy {
    Male,
    Female,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Semester {
    Fall,
    Spring,
    Summer,
    AcademicYear,
    FullYear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyUniversity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_in_km: Option<f64>,
}

fn one_student() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentHousingDetails {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub nearby_universities: Vec<NearbyUniversity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<RoomType>,
    #[serde(default = "one_student")]
    pub students_per_room: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender_policy: Option<GenderPolicy>,
    #[serde(default)]
    pub academic_year_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<Semester>,
}

impl Default for StudentHousingDetails {
    fn default() -> Self {
        Self {
            is_enabled: false,
            nearby_universities: Vec::new(),
            room_type: None,
            students_per_room: one_student(),
            gender_policy: None,
            academic_year_only: false,
            semester: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Installment,
    CashOrInstallment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OwnershipType {
    #[default]
    FirstOwner,
    Resale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstructionStatus {
    #[default]
    Ready,
    UnderConstruction,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleTerms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_terms: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_payment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment_period_in_years: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_installment_amount: Option<f64>,
    #[serde(default)]
    pub ownership_type: OwnershipType,
    #[serde(default)]
    pub property_status: ConstructionStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utilities {
    /// Unset until category defaults are applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseRules {
    #[serde(default)]
    pub pets: bool,
    #[serde(default)]
    pub parties: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentTerms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_from: Option<NaiveDate>,
    /// Months.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_duration: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit: Option<f64>,
    #[serde(default)]
    pub utilities: Utilities,
    #[serde(default)]
    pub rules: HouseRules,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTerms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_duration: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit: Option<f64>,
    #[serde(default)]
    pub utilities: Utilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sale,
    Rent,
    Student,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sale => "sale",
            Category::Rent => "rent",
            Category::Student => "student",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sale" => Some(Category::Sale),
            "rent" => Some(Category::Rent),
            "student" => Some(Category::Student),
            _ => None,
        }
    }
}

/// Category-specific extension; the tag is stored as `category` next to the
/// extension fields in the flat listing document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum CategoryTerms {
    Sale(SaleTerms),
    Rent(RentTerms),
    Student(StudentTerms),
}

impl CategoryTerms {
    pub fn category(&self) -> Category {
        match self {
            CategoryTerms::Sale(_) => Category::Sale,
            CategoryTerms::Rent(_) => Category::Rent,
            CategoryTerms::Student(_) => Category::Student,
        }
    }

    /// Fill creation-time defaults: availability starts today and student
    /// housing includes utilities unless stated otherwise.
    pub fn apply_defaults(&mut self, today: NaiveDate) {
        match self {
            CategoryTerms::Sale(_) => {}
            CategoryTerms::Rent(terms) => {
                terms.available_from.get_or_insert(today);
                terms.utilities.included.get_or_insert(false);
            }
            CategoryTerms::Student(terms) => {
                terms.available_from.get_or_insert(today);
                terms.utilities.included.get_or_insert(true);
            }
        }
    }
}

/// A property record as persisted and served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub slug: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub price: f64,
    pub area: f64,
    pub bedrooms: u8,
    pub bathrooms: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_floors: Option<u16>,
    pub location: Location,
    #[serde(default)]
    pub images: Vec<ImageDescriptor>,
    #[serde(default)]
    pub amenities: Vec<Amenity>,
    pub owner: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<AgencyId>,
    pub status: ListingStatus,
    pub is_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub favorites: Vec<UserId>,
    #[serde(default)]
    pub inquiries: Vec<InquiryId>,
    pub contact_info: ContactInfo,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_negotiable: bool,
    #[serde(default)]
    pub is_student_friendly: bool,
    #[serde(default)]
    pub student_housing_details: StudentHousingDetails,
    #[serde(flatten)]
    pub terms: CategoryTerms,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

impl Listing {
    pub fn category(&self) -> Category {
        self.terms.category()
    }

    /// The flagged main image, else the first image.
    pub fn main_image(&self) -> Option<&ImageDescriptor> {
        self.images
            .iter()
            .find(|image| image.is_main)
            .or_else(|| self.images.first())
    }

    pub fn favorites_count(&self) -> usize {
        self.favorites.len()
    }

    pub fn inquiries_count(&self) -> usize {
        self.inquiries.len()
    }

    pub fn record_view(&mut self) {
        self.views = self.views.saturating_add(1);
    }

    /// Returns `false` when the user was already a favorite.
    pub fn add_to_favorites(&mut self, user: UserId) -> bool {
        if self.favorites.contains(&user) {
            return false;
        }
        self.favorites.push(user);
        true
    }

    /// Returns `false` when the user was not a favorite.
    pub fn remove_from_favorites(&mut self, user: UserId) -> bool {
        let before = self.favorites.len();
        self.favorites.retain(|favorite| *favorite != user);
        before != self.favorites.len()
    }

    pub fn is_favorited_by(&self, user: UserId) -> bool {
        self.favorites.contains(&user)
    }

    pub fn attach_inquiry(&mut self, inquiry: InquiryId) {
        if !self.inquiries.contains(&inquiry) {
            self.inquiries.push(inquiry);
        }
    }

    pub fn detach_inquiry(&mut self, inquiry: InquiryId) {
        self.inquiries.retain(|existing| *existing != inquiry);
    }

    /// Exactly one main image whenever there are images: the first flagged
    /// one, else the first image.
    pub fn normalize_images(&mut self) {
        let main = self
            .images
            .iter()
            .position(|image| image.is_main)
            .unwrap_or(0);
        for (index, image) in self.images.iter_mut().enumerate() {
            image.is_main = index == main;
        }
    }

    pub fn enforce_invariants(&mut self) {
        if self.category() == Category::Student {
            self.is_student_friendly = true;
        }
        if self.is_student_friendly {
            self.student_housing_details.is_enabled = true;
        }
    }

    pub fn is_public(&self) -> bool {
        self.is_approved && self.is_active
    }

    /// Admin, owner, or the assigned agent.
    pub fn can_be_managed_by(&self, actor: &Actor) -> bool {
        actor.is_admin() || self.owner == actor.id || self.agent == Some(actor.id)
    }

    pub fn storage_ids(&self) -> Vec<String> {
        self.images
            .iter()
            .map(|image| image.storage_id.clone())
            .collect()
    }
}

impl Document for Listing {
    /// Stored fields plus `mainImage`, `favoritesCount` and `inquiriesCount`.
    fn to_document(&self) -> Value {
        let mut document = serde_json::to_value(self).unwrap_or_default();
        if let Value::Object(map) = &mut document {
            map.insert(
                "mainImage".to_string(),
                self.main_image()
                    .and_then(|image| serde_json::to_value(image).ok())
                    .unwrap_or(Value::Null),
            );
            map.insert(
                "favoritesCount".to_string(),
                Value::from(self.favorites_count()),
            );
            map.insert(
                "inquiriesCount".to_string(),
                Value::from(self.inquiries_count()),
            );
        }
        document
    }
}

/// Client payload for a new listing. Ownership, moderation, counters, slug
/// and timestamps are assigned by the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub price: f64,
    pub area: f64,
    pub bedrooms: u8,
    pub bathrooms: u8,
    #[serde(default)]
    pub floor: Option<u16>,
    #[serde(default)]
    pub total_floors: Option<u16>,
    pub location: Location,
    #[serde(default)]
    pub images: Vec<ImageDescriptor>,
    #[serde(default)]
    pub amenities: Vec<Amenity>,
    #[serde(default)]
    pub agent: Option<UserId>,
    #[serde(default)]
    pub agency: Option<AgencyId>,
    pub contact_info: ContactInfo,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_negotiable: bool,
    #[serde(default)]
    pub is_student_friendly: bool,
    #[serde(default)]
    pub student_housing_details: StudentHousingDetails,
    #[serde(flatten)]
    pub terms: CategoryTerms,
}

impl ListingDraft {
    /// Pending, unapproved listing owned by `owner`; the caller applies the
    /// moderation rule afterwards.
    pub fn into_listing(self, owner: UserId, slug: String, now: DateTime<Utc>) -> Listing {
        let mut terms = self.terms;
        terms.apply_defaults(now.date_naive());

        let mut listing = Listing {
            id: ListingId::new(),
            slug,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            property_type: self.property_type,
            price: self.price,
            area: self.area,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            floor: self.floor,
            total_floors: self.total_floors,
            location: self.location,
            images: self.images,
            amenities: self.amenities,
            owner,
            agent: self.agent,
            agency: self.agency,
            status: ListingStatus::Pending,
            is_approved: false,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            views: 0,
            favorites: Vec::new(),
            inquiries: Vec::new(),
            contact_info: self.contact_info,
            is_active: self.is_active,
            is_negotiable: self.is_negotiable,
            is_student_friendly: self.is_student_friendly,
            student_housing_details: self.student_housing_details,
            terms,
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        listing.normalize_images();
        listing.enforce_invariants();
        listing
    }
}
