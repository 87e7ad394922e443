use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;

use super::domain::{AgencyDraft, AgencyPatch};
use super::service::AgencyService;
use crate::error::MarketError;
use crate::marketplace::actor::Actor;
use crate::marketplace::ids::AgencyId;
use crate::marketplace::respond;

/// Routes mounted under `/api/saknly/v1/agencies`.
pub fn agency_router(service: Arc<AgencyService>) -> Router {
    Router::new()
        .route("/", axum::routing::post(create_handler))
        .route("/featured", get(featured_handler))
        .route(
            "/:id",
            get(details_handler)
                .put(update_handler)
                .delete(delete_handler),
        )
        .route("/:id/feature", patch(feature_handler))
        .with_state(service)
}

async fn featured_handler(
    State(service): State<Arc<AgencyService>>,
) -> Result<Response, MarketError> {
    let agencies = service.featured()?;
    Ok(respond::ok("Featured agencies fetched successfully", agencies))
}

async fn create_handler(
    State(service): State<Arc<AgencyService>>,
    actor: Actor,
    payload: Result<Json<AgencyDraft>, JsonRejection>,
) -> Result<Response, MarketError> {
    let draft = respond::json_body(payload)?;
    let agency = service.create(&actor, draft)?;
    Ok(respond::created("Agency created successfully", agency))
}

async fn update_handler(
    State(service): State<Arc<AgencyService>>,
    actor: Actor,
    Path(id): Path<String>,
    payload: Result<Json<AgencyPatch>, JsonRejection>,
) -> Result<Response, MarketError> {
    let id: AgencyId = respond::parse_id(&id)?;
    let patch = respond::json_body(payload)?;
    let agency = service.update(&actor, &id, patch)?;
    Ok(respond::ok("Agency updated successfully", agency))
}

async fn delete_handler(
    State(service): State<Arc<AgencyService>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: AgencyId = respond::parse_id(&id)?;
    service.delete(&actor, &id)?;
    Ok(respond::message("Agency deleted successfully"))
}

async fn details_handler(
    State(service): State<Arc<AgencyService>>,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: AgencyId = respond::parse_id(&id)?;
    let details = service.details(&id)?;
    Ok(respond::ok("Agency fetched successfully", details))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureToggle {
    is_featured: bool,
}

async fn feature_handler(
    State(service): State<Arc<AgencyService>>,
    actor: Actor,
    Path(id): Path<String>,
    payload: Result<Json<FeatureToggle>, JsonRejection>,
) -> Result<Response, MarketError> {
    let id: AgencyId = respond::parse_id(&id)?;
    let toggle = respond::json_body(payload)?;
    let agency = service.set_featured(&actor, &id, toggle.is_featured)?;
    let message = if toggle.is_featured {
        "Agency featured successfully"
    } else {
        "Agency unfeatured successfully"
    };
    Ok(respond::ok(message, agency))
}
