use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RepositoryError;
use crate::marketplace::ids::{InquiryId, ListingId, UserId};
use crate::marketplace::query::{Document, Predicate, QueryPlan, SortSpec};
use crate::marketplace::validation::{ValidationErrors, Validator};

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+*\(?[0-9]{1,4}\)?[-\s./0-9]*$").expect("phone pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InquiryStatus {
    #[default]
    New,
    InProgress,
    Responded,
    Closed,
}

impl InquiryStatus {
    pub const ALL: [InquiryStatus; 4] = [
        InquiryStatus::New,
        InquiryStatus::InProgress,
        InquiryStatus::Responded,
        InquiryStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InquiryStatus::New => "new",
            InquiryStatus::InProgress => "in-progress",
            InquiryStatus::Responded => "responded",
            InquiryStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
    }
}

/// A prospective tenant or buyer asking about a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub id: InquiryId,
    #[serde(rename = "propertyId")]
    pub listing: ListingId,
    /// Listing agent, else the listing owner.
    pub agent: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    #[serde(default)]
    pub status: InquiryStatus,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Inquiry {
    pub fn is_assigned_to(&self, user: UserId) -> bool {
        self.agent == user
    }
}

impl Document for Inquiry {
    fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryDraft {
    #[serde(rename = "propertyId", alias = "property")]
    pub listing: ListingId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub message: String,
}

impl InquiryDraft {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.char_range("name", &self.name, 2, 50);
        v.email("email", &self.email);
        v.required("phone", &self.phone);
        let phone = self.phone.trim();
        if !phone.is_empty() {
            v.check(PHONE.is_match(phone), "phone", "is not a valid phone number");
        }
        v.char_range("message", &self.message, 10, 500);
        v.finish()
    }

    pub fn into_inquiry(self, agent: UserId, now: DateTime<Utc>) -> Inquiry {
        Inquiry {
            id: InquiryId::new(),
            listing: self.listing,
            agent,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            phone: self.phone.trim().to_string(),
            message: self.message.trim().to_string(),
            status: InquiryStatus::New,
            is_read: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Storage abstraction for inquiries.
pub trait InquiryRepository: Send + Sync {
    fn insert(&self, inquiry: Inquiry) -> Result<Inquiry, RepositoryError>;
    fn update(&self, inquiry: Inquiry) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &InquiryId) -> Result<Option<Inquiry>, RepositoryError>;
    fn remove(&self, id: &InquiryId) -> Result<Option<Inquiry>, RepositoryError>;
    fn count(&self, predicate: &Predicate) -> Result<u64, RepositoryError>;
    fn page(&self, plan: &QueryPlan) -> Result<Vec<Value>, RepositoryError>;
    fn select(&self, predicate: &Predicate, sort: &SortSpec)
        -> Result<Vec<Inquiry>, RepositoryError>;
}
