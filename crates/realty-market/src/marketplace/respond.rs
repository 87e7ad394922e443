//! Response envelope shared by the marketplace routers.

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::query::{Page, QueryParams};
use super::validation::ValidationErrors;
use crate::error::MarketError;

pub(crate) fn ok<T: Serialize>(message: &str, data: T) -> Response {
    with_status(StatusCode::OK, message, data)
}

pub(crate) fn created<T: Serialize>(message: &str, data: T) -> Response {
    with_status(StatusCode::CREATED, message, data)
}

pub(crate) fn message(message: &str) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": message })),
    )
        .into_response()
}

fn with_status<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    let payload = json!({
        "success": true,
        "message": message,
        "data": data,
    });
    (status, Json(payload)).into_response()
}

/// `{success, message, count, data}` for unpaginated collections.
pub(crate) fn counted<T: Serialize>(message: &str, data: Vec<T>) -> Response {
    let payload = json!({
        "success": true,
        "message": message,
        "count": data.len(),
        "data": data,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) fn paged(found: &str, empty: &str, page: Page<Value>) -> Response {
    let message = if page.data.is_empty() { empty } else { found };
    let payload = json!({
        "success": true,
        "message": message,
        "data": page.data,
        "pagination": page.pagination,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

/// Malformed JSON bodies are client errors in the marketplace taxonomy.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, MarketError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ValidationErrors::single("body", rejection.body_text()).into())
}

/// A blank body stands for `T::default()`.
pub(crate) fn optional_json_body<T: DeserializeOwned + Default>(
    body: &Bytes,
) -> Result<T, MarketError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| ValidationErrors::single("body", err.to_string()).into())
}

pub(crate) fn query_params(
    pairs: Result<axum::extract::Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<QueryParams, MarketError> {
    pairs
        .map(|axum::extract::Query(pairs)| QueryParams::from_pairs(pairs))
        .map_err(|rejection| ValidationErrors::single("query", rejection.body_text()).into())
}

/// Path identifiers that are not UUIDs are rejected before any lookup.
pub(crate) fn parse_id<T: std::str::FromStr>(raw: &str) -> Result<T, MarketError> {
    raw.parse::<T>().map_err(|_| {
        ValidationErrors::single("id", format!("'{raw}' is not a valid identifier")).into()
    })
}
