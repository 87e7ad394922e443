use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RepositoryError;
use crate::marketplace::ids::{AgencyId, ListingId};
use crate::marketplace::query::Document;
use crate::marketplace::validation::{ValidationErrors, Validator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoDescriptor {
    pub storage_id: String,
    pub url: String,
}

/// A real-estate agency and the listings it markets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    pub id: AgencyId,
    pub name: String,
    pub logo: LogoDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_featured: bool,
    #[serde(default)]
    pub listings: Vec<ListingId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agency {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.required("name", &self.name);
        v.max_chars("name", &self.name, 70);
        v.required("logo.storageId", &self.logo.storage_id);
        v.required("logo.url", &self.logo.url);
        if let Some(description) = &self.description {
            v.max_chars("description", description, 512);
        }
        v.finish()
    }
}

impl Document for Agency {
    fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn featured_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyDraft {
    pub name: String,
    pub logo: LogoDescriptor,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "featured_by_default")]
    pub is_featured: bool,
}

impl AgencyDraft {
    pub fn into_agency(self, now: DateTime<Utc>) -> Agency {
        Agency {
            id: AgencyId::new(),
            name: self.name.trim().to_string(),
            logo: self.logo,
            description: self.description.map(|text| text.trim().to_string()),
            is_featured: self.is_featured,
            listings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyPatch {
    pub name: Option<String>,
    pub logo: Option<LogoDescriptor>,
    pub description: Option<String>,
    pub is_featured: Option<bool>,
}

/// Storage abstraction for agencies.
pub trait AgencyRepository: Send + Sync {
    fn insert(&self, agency: Agency) -> Result<Agency, RepositoryError>;
    fn update(&self, agency: Agency) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError>;
    fn remove(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError>;
    fn featured(&self) -> Result<Vec<Agency>, RepositoryError>;
    /// Set semantics: attaching twice keeps one reference.
    fn attach_listing(&self, id: &AgencyId, listing: ListingId) -> Result<(), RepositoryError>;
    fn detach_listing(&self, id: &AgencyId, listing: ListingId) -> Result<(), RepositoryError>;
}
