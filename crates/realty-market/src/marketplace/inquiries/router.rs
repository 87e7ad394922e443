use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use super::domain::{InquiryDraft, InquiryStatus};
use super::service::InquiryService;
use crate::error::MarketError;
use crate::marketplace::actor::Actor;
use crate::marketplace::ids::InquiryId;
use crate::marketplace::respond;
use crate::marketplace::validation::ValidationErrors;

/// Routes mounted under `/api/saknly/v1/property-inquiry`.
pub fn inquiry_router(service: Arc<InquiryService>) -> Router {
    Router::new()
        .route("/add-property-inquiry", post(submit_handler))
        .route("/get-all-property-inquiries", get(list_handler))
        .route("/get-property-inquiry-by-id/:id", get(get_handler))
        .route("/update-property-inquiry-status/:id", put(status_handler))
        .route("/delete-property-inquiry/:id", delete(delete_handler))
        .route("/get-inquiry-stats", get(stats_handler))
        .with_state(service)
}

pub(crate) async fn submit_handler(
    State(service): State<Arc<InquiryService>>,
    payload: Result<Json<InquiryDraft>, JsonRejection>,
) -> Result<Response, MarketError> {
    let draft = respond::json_body(payload)?;
    let inquiry = service.submit(draft)?;
    Ok(respond::created(
        "Property inquiry submitted successfully",
        inquiry,
    ))
}

pub(crate) async fn list_handler(
    State(service): State<Arc<InquiryService>>,
    actor: Actor,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, MarketError> {
    let params = respond::query_params(query)?;
    let page = service.list(&actor, &params)?;
    Ok(respond::paged(
        "Property inquiries retrieved successfully",
        "No property inquiries found",
        page,
    ))
}

async fn get_handler(
    State(service): State<Arc<InquiryService>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: InquiryId = respond::parse_id(&id)?;
    let inquiry = service.get(&actor, &id)?;
    Ok(respond::ok("Property inquiry retrieved successfully", inquiry))
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    #[serde(default)]
    status: String,
}

async fn status_handler(
    State(service): State<Arc<InquiryService>>,
    actor: Actor,
    Path(id): Path<String>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Response, MarketError> {
    let id: InquiryId = respond::parse_id(&id)?;
    let change = respond::json_body(payload)?;
    let status = InquiryStatus::parse(change.status.trim()).ok_or_else(|| {
        ValidationErrors::single(
            "status",
            "must be one of new, in-progress, responded, closed",
        )
    })?;
    let inquiry = service.update_status(&actor, &id, status)?;
    Ok(respond::ok("Inquiry status updated successfully", inquiry))
}

async fn delete_handler(
    State(service): State<Arc<InquiryService>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: InquiryId = respond::parse_id(&id)?;
    service.delete(&actor, &id)?;
    Ok(respond::message("Property inquiry deleted successfully"))
}

async fn stats_handler(
    State(service): State<Arc<InquiryService>>,
    actor: Actor,
) -> Result<Response, MarketError> {
    let stats = service.stats(&actor)?;
    Ok(respond::ok("Inquiry statistics retrieved successfully", stats))
}
