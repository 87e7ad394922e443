use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::domain::{Category, Listing};
use super::service::{ApprovalDecision, ListingService};
use crate::error::MarketError;
use crate::marketplace::actor::Actor;
use crate::marketplace::ids::ListingId;
use crate::marketplace::query::Document;
use crate::marketplace::respond;
use crate::marketplace::validation::ValidationErrors;

type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

/// Routes mounted under `/api/saknly/v1/properties`.
pub fn listing_router(service: Arc<ListingService>) -> Router {
    Router::new()
        .route("/allProperties", get(browse_handler))
        .route("/search", get(search_handler))
        .route("/featured", get(featured_handler))
        .route("/propertyDetails/:id", get(details_handler))
        .route("/similar/:id", get(similar_handler))
        .route("/addProperty", post(create_handler))
        .route("/updateProperty/:id", put(update_handler))
        .route("/deleteProperty/:id", delete(delete_handler))
        .route("/myProperties", get(owned_handler))
        .route("/pending", get(pending_handler))
        .route("/:id/approve", put(approve_handler))
        .route("/:id/deny", delete(deny_handler))
        .route(
            "/:id/favorite",
            post(add_favorite_handler)
                .delete(remove_favorite_handler)
                .get(is_favorite_handler),
        )
        .with_state(service)
}

fn documents(listings: Vec<Listing>) -> Vec<Value> {
    listings.iter().map(Listing::to_document).collect()
}

pub(crate) async fn browse_handler(
    State(service): State<Arc<ListingService>>,
    query: QueryPairs,
) -> Result<Response, MarketError> {
    let params = respond::query_params(query)?;
    let page = service.browse(&params)?;
    Ok(respond::paged(
        "Properties fetched successfully",
        "No properties found",
        page,
    ))
}

pub(crate) async fn search_handler(
    State(service): State<Arc<ListingService>>,
    query: QueryPairs,
) -> Result<Response, MarketError> {
    let params = respond::query_params(query)?;
    let page = service.search(&params)?;
    Ok(respond::paged(
        "Properties fetched successfully",
        "No properties found",
        page,
    ))
}

async fn featured_handler(
    State(service): State<Arc<ListingService>>,
) -> Result<Response, MarketError> {
    let featured = service.featured()?;
    Ok(respond::counted("Most viewed properties fetched successfully", featured))
}

pub(crate) async fn details_handler(
    State(service): State<Arc<ListingService>>,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: ListingId = respond::parse_id(&id)?;
    let listing = service.details(&id)?;
    Ok(respond::ok(
        "Property fetched successfully",
        listing.to_document(),
    ))
}

async fn similar_handler(
    State(service): State<Arc<ListingService>>,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: ListingId = respond::parse_id(&id)?;
    let similar = service.similar(&id)?;
    Ok(respond::counted(
        "Similar properties fetched successfully",
        documents(similar),
    ))
}

pub(crate) async fn create_handler(
    State(service): State<Arc<ListingService>>,
    actor: Actor,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, MarketError> {
    let body = respond::json_body(payload)?;
    let listing = service.create_from_json(&actor, body)?;
    let message = if listing.is_approved {
        "Property created successfully"
    } else {
        "Property submitted for review"
    };
    Ok(respond::created(message, listing.to_document()))
}

pub(crate) async fn update_handler(
    State(service): State<Arc<ListingService>>,
    actor: Actor,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, MarketError> {
    let id: ListingId = respond::parse_id(&id)?;
    let patch = respond::json_body(payload)?;
    let listing = service.update(&actor, &id, patch)?;
    Ok(respond::ok(
        "Property updated successfully",
        listing.to_document(),
    ))
}

async fn delete_handler(
    State(service): State<Arc<ListingService>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: ListingId = respond::parse_id(&id)?;
    service.delete(&actor, &id)?;
    Ok(respond::message("Property deleted successfully"))
}

async fn owned_handler(
    State(service): State<Arc<ListingService>>,
    actor: Actor,
) -> Result<Response, MarketError> {
    let listings = service.owned_by(&actor)?;
    Ok(respond::counted(
        "Your properties fetched successfully",
        documents(listings),
    ))
}

pub(crate) async fn pending_handler(
    State(service): State<Arc<ListingService>>,
    actor: Actor,
    query: QueryPairs,
) -> Result<Response, MarketError> {
    let params = respond::query_params(query)?;
    let category = match params.get("category") {
        None => None,
        Some(raw) => Some(Category::parse(raw).ok_or_else(|| {
            ValidationErrors::single("category", "must be one of sale, rent, student")
        })?),
    };
    let listings = service.pending(&actor, category)?;
    Ok(respond::counted(
        "Pending properties fetched successfully",
        documents(listings),
    ))
}

/// An empty body approves with the default decision.
pub(crate) async fn approve_handler(
    State(service): State<Arc<ListingService>>,
    actor: Actor,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, MarketError> {
    let id: ListingId = respond::parse_id(&id)?;
    let decision: ApprovalDecision = respond::optional_json_body(&body)?;
    let listing = service.approve(&actor, &id, decision)?;
    Ok(respond::ok(
        "Property approved successfully",
        listing.to_document(),
    ))
}

pub(crate) async fn deny_handler(
    State(service): State<Arc<ListingService>>,
    actor: Actor,
    Path(id): Path<String>,
    query: QueryPairs,
) -> Result<Response, MarketError> {
    let id: ListingId = respond::parse_id(&id)?;
    let mut params = respond::query_params(query)?;
    service.deny(&actor, &id, params.remove("reason"))?;
    Ok(respond::message("Property denied and removed"))
}

async fn add_favorite_handler(
    State(service): State<Arc<ListingService>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: ListingId = respond::parse_id(&id)?;
    let listing = service.add_favorite(&actor, &id)?;
    Ok(respond::ok(
        "Property added to favorites",
        json!({ "favoritesCount": listing.favorites_count() }),
    ))
}

async fn remove_favorite_handler(
    State(service): State<Arc<ListingService>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: ListingId = respond::parse_id(&id)?;
    let listing = service.remove_favorite(&actor, &id)?;
    Ok(respond::ok(
        "Property removed from favorites",
        json!({ "favoritesCount": listing.favorites_count() }),
    ))
}

async fn is_favorite_handler(
    State(service): State<Arc<ListingService>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, MarketError> {
    let id: ListingId = respond::parse_id(&id)?;
    let favorite = service.is_favorite(&actor, &id)?;
    Ok(respond::ok(
        "Favorite status fetched successfully",
        json!({ "isFavorite": favorite }),
    ))
}
