//! Visitor testimonials about the site, a listing, or an agency.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::actor::Actor;
use super::ids::{AgencyId, ListingId, TestimonialId};
use super::query::{Condition, Document, Predicate, SortSpec};
use super::respond;
use super::validation::{ValidationErrors, Validator};
use crate::error::{MarketError, RepositoryError};

/// Role shown when the author gave none ("visitor").
pub const DEFAULT_AUTHOR_ROLE: &str = "زائر";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestimonialKind {
    General,
    Property,
    Agency,
}

impl TestimonialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestimonialKind::General => "general",
            TestimonialKind::Property => "property",
            TestimonialKind::Agency => "agency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestimonialStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl TestimonialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestimonialStatus::Pending => "pending",
            TestimonialStatus::Approved => "approved",
            TestimonialStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub id: TestimonialId,
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub image: String,
    pub role: String,
    pub status: TestimonialStatus,
    #[serde(rename = "type")]
    pub kind: TestimonialKind,
    #[serde(default)]
    pub property_id: Option<ListingId>,
    #[serde(default)]
    pub agency_id: Option<AgencyId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Testimonial {
    fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<TestimonialKind>,
    #[serde(default)]
    pub property_id: Option<ListingId>,
    #[serde(default)]
    pub agency_id: Option<AgencyId>,
}

impl TestimonialDraft {
    pub fn validate(&self) -> Result<TestimonialKind, ValidationErrors> {
        let mut v = Validator::new();
        v.char_range("name", &self.name, 2, 50);
        v.char_range("text", &self.text, 5, 1000);
        if let Some(image) = self.image.as_deref().filter(|image| !image.is_empty()) {
            v.check(
                image.starts_with("http://") || image.starts_with("https://"),
                "image",
                "must be a URL",
            );
        }
        match self.kind {
            None => v.reject("type", "must be one of general, property, agency"),
            Some(TestimonialKind::Property) => {
                v.check(self.property_id.is_some(), "propertyId", "is required")
            }
            Some(TestimonialKind::Agency) => {
                v.check(self.agency_id.is_some(), "agencyId", "is required")
            }
            Some(TestimonialKind::General) => {}
        }
        v.finish()?;
        self.kind
            .ok_or_else(|| ValidationErrors::single("type", "is required"))
    }

    /// Agency testimonials are published immediately; the others await review.
    /// Target ids are kept only for the matching kind.
    pub fn into_testimonial(
        self,
        kind: TestimonialKind,
        now: DateTime<Utc>,
    ) -> Testimonial {
        let status = match kind {
            TestimonialKind::Agency => TestimonialStatus::Approved,
            _ => TestimonialStatus::Pending,
        };
        let role = self
            .role
            .map(|role| role.trim().to_string())
            .filter(|role| !role.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTHOR_ROLE.to_string());
        Testimonial {
            id: TestimonialId::new(),
            name: self.name.trim().to_string(),
            text: self.text.trim().to_string(),
            image: self.image.unwrap_or_default(),
            role,
            status,
            kind,
            property_id: self
                .property_id
                .filter(|_| kind == TestimonialKind::Property),
            agency_id: self.agency_id.filter(|_| kind == TestimonialKind::Agency),
            created_at: now,
            updated_at: now,
        }
    }
}

pub trait TestimonialRepository: Send + Sync {
    fn insert(&self, testimonial: Testimonial) -> Result<Testimonial, RepositoryError>;
    fn update(&self, testimonial: Testimonial) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &TestimonialId) -> Result<Option<Testimonial>, RepositoryError>;
    fn remove(&self, id: &TestimonialId) -> Result<Option<Testimonial>, RepositoryError>;
    fn select(
        &self,
        predicate: &Predicate,
        sort: &SortSpec,
    ) -> Result<Vec<Testimonial>, RepositoryError>;
}

/// Query keys accepted by the testimonial listing.
pub const TESTIMONIAL_FILTERS: [&str; 4] = ["status", "type", "propertyId", "agencyId"];

pub struct TestimonialService {
    testimonials: Arc<dyn TestimonialRepository>,
}

impl TestimonialService {
    pub fn new(testimonials: Arc<dyn TestimonialRepository>) -> Self {
        Self { testimonials }
    }

    pub fn submit(&self, draft: TestimonialDraft) -> Result<Testimonial, MarketError> {
        let kind = draft.validate()?;
        let stored = self
            .testimonials
            .insert(draft.into_testimonial(kind, Utc::now()))?;
        tracing::info!(
            testimonial_id = %stored.id,
            kind = kind.as_str(),
            status = stored.status.as_str(),
            "testimonial submitted"
        );
        Ok(stored)
    }

    /// Newest first; only the known filter keys are applied.
    pub fn list(
        &self,
        params: &super::query::QueryParams,
    ) -> Result<Vec<Testimonial>, MarketError> {
        let predicate = TESTIMONIAL_FILTERS
            .iter()
            .filter_map(|key| params.get(key).map(|value| (*key, value)))
            .filter(|(_, value)| !value.is_empty())
            .fold(Predicate::all(), |predicate, (key, value)| {
                predicate.and(Condition::equals(key, value))
            });
        Ok(self
            .testimonials
            .select(&predicate, &SortSpec::default())?)
    }

    pub fn set_status(
        &self,
        actor: &Actor,
        id: &TestimonialId,
        status: TestimonialStatus,
    ) -> Result<Testimonial, MarketError> {
        actor.require_admin()?;
        if status == TestimonialStatus::Pending {
            return Err(ValidationErrors::single("status", "must be approved or rejected").into());
        }
        let mut testimonial = self
            .testimonials
            .fetch(id)?
            .ok_or_else(|| MarketError::not_found("testimonial", id))?;
        testimonial.status = status;
        testimonial.updated_at = Utc::now();
        self.testimonials.update(testimonial.clone())?;
        Ok(testimonial)
    }

    pub fn delete(&self, actor: &Actor, id: &TestimonialId) -> Result<(), MarketError> {
        actor.require_admin()?;
        self.testimonials
            .remove(id)?
            .ok_or_else(|| MarketError::not_found("testimonial", id))?;
        Ok(())
    }
}

/// Routes mounted under `/api/saknly/v1/testimonial`.
pub fn testimonial_router(service: Arc<TestimonialService>) -> Router {
    Router::new()
        .route("/", get(list_handler).post(submit_handler))
        .route("/:id/status", patch(status_handler))
        .route("/:id", delete(delete_handler))
        .with_state(service)
}

async fn submit_handler(
    State(service): State<Arc<TestimonialService>>,
    payload: Result<Json<TestimonialDraft>, JsonRejection>,
) -> Result<Response, MarketError> {
    let draft = respond::json_body(payload)?;
    let testimonial = service.submit(draft)?;
    let message = if testimonial.status == TestimonialStatus::Approved {
        "Testimonial added successfully"
    } else {
        "Testimonial submitted for review"
    };
    Ok(respond::created(message, testimonial))
}

async fn list_handler(
    State(service): State<Arc<TestimonialService>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, MarketError> {
    let params = respond::query_params(query)?;
    let testimonials = service.list(&params)?;
    Ok(respond::counted("Testimonials fetched successfully", testimonials))
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: TestimonialStatus,
}

async fn status_handler(
    State(service): State<Arc<TestimonialService>>,
    actor: Actor,
    Path(id): Path<String>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Response, MarketError> {
    let id: TestimonialId = respond::parse_id(&id)?;
    let change = respond::json_body(payload)?;
    let testimonial = service.set_status(&actor, &id, change.status)?;
    Ok(respond::ok("Testimonial status updated successfully", testimonial))
}

async fn delete_handler(
    State(service): State<Arc<TestimonialService>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: TestimonialId = respond::parse_id(&id)?;
    service.delete(&actor, &id)?;
    Ok(respond::message("Testimonial deleted successfully"))
}
