//! Evaluation of filter conditions and sort keys against JSON documents.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use super::filter::{FilterValue, RangeBound};

/// Values reachable through a dotted path. Arrays met along the way are
/// traversed element-wise, so `images.url` yields every image url.
pub(crate) fn resolve<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![document];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => next.extend(map.get(segment)),
                Value::Array(items) => next.extend(
                    items
                        .iter()
                        .filter_map(|item| item.as_object().and_then(|map| map.get(segment))),
                ),
                _ => {}
            }
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

/// Resolved values with terminal arrays flattened one level.
fn scalars<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    resolve(document, path)
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

pub(crate) fn equals(document: &Value, field: &str, expected: &FilterValue) -> bool {
    scalars(document, field)
        .into_iter()
        .any(|value| loosely_equal(value, expected))
}

fn loosely_equal(value: &Value, expected: &FilterValue) -> bool {
    match (value, expected) {
        (Value::String(actual), FilterValue::Text(text)) => actual == text,
        (Value::Number(actual), FilterValue::Text(text)) => {
            match (actual.as_f64(), text.trim().parse::<f64>()) {
                (Some(actual), Ok(parsed)) => actual == parsed,
                _ => false,
            }
        }
        (Value::Bool(actual), FilterValue::Text(text)) => {
            text == if *actual { "true" } else { "false" }
        }
        (Value::Number(actual), FilterValue::Number(number)) => actual.as_f64() == Some(*number),
        (Value::String(actual), FilterValue::Number(number)) => {
            actual.trim().parse::<f64>().ok() == Some(*number)
        }
        (Value::Bool(actual), FilterValue::Bool(flag)) => actual == flag,
        (Value::String(actual), FilterValue::Bool(flag)) => {
            actual == if *flag { "true" } else { "false" }
        }
        _ => false,
    }
}

pub(crate) fn in_range(document: &Value, field: &str, bounds: &[RangeBound]) -> bool {
    scalars(document, field)
        .into_iter()
        .filter_map(Value::as_f64)
        .any(|value| bounds.iter().all(|bound| bound.op.admits(value, bound.value)))
}

pub(crate) fn contains_text(document: &Value, fields: &[String], needle: &str) -> bool {
    let needle = needle.to_lowercase();
    fields.iter().any(|field| {
        scalars(document, field)
            .into_iter()
            .filter_map(Value::as_str)
            .any(|text| text.to_lowercase().contains(&needle))
    })
}

/// First value at `path`, used as the sort key.
pub(crate) fn sort_key<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    resolve(document, path).into_iter().next()
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn as_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

/// Total order over optional JSON values: missing and null first, then
/// numbers, strings, objects, arrays, booleans. RFC 3339 strings compare as
/// instants.
pub(crate) fn compare(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (as_timestamp(a), as_timestamp(b)) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Array(a)), Some(Value::Array(b))) => a.len().cmp(&b.len()),
        (left, right) => type_rank(left).cmp(&type_rank(right)),
    }
}
