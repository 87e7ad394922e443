//! "Contact us" messages sent from the public site and triaged by admins.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::actor::Actor;
use super::ids::ContactId;
use super::query::{Condition, Document, Predicate, QueryParams, SortSpec};
use super::respond;
use super::validation::{ValidationErrors, Validator};
use crate::error::{MarketError, RepositoryError};

pub const SUBJECT_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContactStatus {
    #[default]
    Pending,
    InProgress,
    Closed,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Pending => "pending",
            ContactStatus::InProgress => "in-progress",
            ContactStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: ContactId,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for ContactMessage {
    fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContactDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

impl ContactDraft {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.required("name", self.name.trim());
        v.email("email", self.email.trim());
        v.required("subject", self.subject.trim());
        v.max_chars("subject", self.subject.trim(), SUBJECT_MAX_CHARS);
        v.required("message", self.message.trim());
        v.finish()
    }

    pub fn into_message(self, now: DateTime<Utc>) -> ContactMessage {
        ContactMessage {
            id: ContactId::new(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
            status: ContactStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

pub trait ContactRepository: Send + Sync {
    fn insert(&self, message: ContactMessage) -> Result<ContactMessage, RepositoryError>;
    fn update(&self, message: ContactMessage) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ContactId) -> Result<Option<ContactMessage>, RepositoryError>;
    fn remove(&self, id: &ContactId) -> Result<Option<ContactMessage>, RepositoryError>;
    fn select(
        &self,
        predicate: &Predicate,
        sort: &SortSpec,
    ) -> Result<Vec<ContactMessage>, RepositoryError>;
}

pub struct ContactService {
    messages: Arc<dyn ContactRepository>,
}

impl ContactService {
    pub fn new(messages: Arc<dyn ContactRepository>) -> Self {
        Self { messages }
    }

    pub fn submit(&self, draft: ContactDraft) -> Result<ContactMessage, MarketError> {
        draft.validate()?;
        let stored = self.messages.insert(draft.into_message(Utc::now()))?;
        tracing::info!(contact_id = %stored.id, "contact message received");
        Ok(stored)
    }

    /// Newest first, optionally narrowed by `status`.
    pub fn list(
        &self,
        actor: &Actor,
        params: &QueryParams,
    ) -> Result<Vec<ContactMessage>, MarketError> {
        actor.require_admin()?;
        let predicate = match params.get("status").filter(|value| !value.is_empty()) {
            Some(status) => Predicate::all().and(Condition::equals("status", status)),
            None => Predicate::all(),
        };
        Ok(self.messages.select(&predicate, &SortSpec::default())?)
    }

    pub fn set_status(
        &self,
        actor: &Actor,
        id: &ContactId,
        status: ContactStatus,
    ) -> Result<ContactMessage, MarketError> {
        actor.require_admin()?;
        let mut message = self
            .messages
            .fetch(id)?
            .ok_or_else(|| MarketError::not_found("message", id))?;
        message.status = status;
        message.updated_at = Utc::now();
        self.messages.update(message.clone())?;
        tracing::info!(contact_id = %id, status = status.as_str(), "contact message triaged");
        Ok(message)
    }

    pub fn delete(&self, actor: &Actor, id: &ContactId) -> Result<(), MarketError> {
        actor.require_admin()?;
        self.messages
            .remove(id)?
            .ok_or_else(|| MarketError::not_found("message", id))?;
        Ok(())
    }
}

/// Routes mounted under `/api/saknly/v1/contact`.
pub fn contact_router(service: Arc<ContactService>) -> Router {
    Router::new()
        .route("/contact-us", post(submit_handler))
        .route("/get-all-contacts", get(list_handler))
        .route("/update-contact-status/:id", put(status_handler))
        .route("/delete-contact/:id", delete(delete_handler))
        .with_state(service)
}

async fn submit_handler(
    State(service): State<Arc<ContactService>>,
    payload: Result<Json<ContactDraft>, JsonRejection>,
) -> Result<Response, MarketError> {
    let draft = respond::json_body(payload)?;
    let message = service.submit(draft)?;
    Ok(respond::created("Message sent successfully", message))
}

async fn list_handler(
    State(service): State<Arc<ContactService>>,
    actor: Actor,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, MarketError> {
    let params = respond::query_params(query)?;
    let messages = service.list(&actor, &params)?;
    Ok(respond::counted("Messages fetched successfully", messages))
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: ContactStatus,
}

async fn status_handler(
    State(service): State<Arc<ContactService>>,
    actor: Actor,
    Path(id): Path<String>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Response, MarketError> {
    let id: ContactId = respond::parse_id(&id)?;
    let change = respond::json_body(payload)?;
    let message = service.set_status(&actor, &id, change.status)?;
    Ok(respond::ok("Message status updated successfully", message))
}

async fn delete_handler(
    State(service): State<Arc<ContactService>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: ContactId = respond::parse_id(&id)?;
    service.delete(&actor, &id)?;
    Ok(respond::message("Message deleted successfully"))
}
