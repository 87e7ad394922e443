use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use super::matcher;
use super::params::QueryParams;

/// Fields whose scalar filter values are coerced to numbers.
pub const NUMERIC_FIELDS: [&str; 6] = [
    "bedrooms",
    "bathrooms",
    "area",
    "price",
    "downPayment",
    "installmentPeriodInYears",
];

/// Comparison operator accepted inside `field[op]` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RangeOp {
    Gte,
    Gt,
    Lte,
    Lt,
}

impl RangeOp {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gte" => Some(Self::Gte),
            "gt" => Some(Self::Gt),
            "lte" => Some(Self::Lte),
            "lt" => Some(Self::Lt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gte => "gte",
            Self::Gt => "gt",
            Self::Lte => "lte",
            Self::Lt => "lt",
        }
    }

    pub fn admits(&self, value: f64, bound: f64) -> bool {
        match self {
            Self::Gte => value >= bound,
            Self::Gt => value > bound,
            Self::Lte => value <= bound,
            Self::Lt => value < bound,
        }
    }
}

impl fmt::Display for RangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeBound {
    pub op: RangeOp,
    pub value: f64,
}

/// Typed right-hand side of an equality or membership condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One node of the filter AST. Field names are dotted document paths.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Every bound must hold for the same numeric value.
    Range {
        field: String,
        bounds: Vec<RangeBound>,
    },
    /// Matches when the field equals any listed value.
    Membership {
        field: String,
        values: Vec<FilterValue>,
    },
    Equality {
        field: String,
        value: FilterValue,
    },
    /// Case-insensitive substring match on at least one of `fields`.
    TextMatch { fields: Vec<String>, needle: String },
}

impl Condition {
    pub fn equals(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Equality {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Condition::Range { field, bounds } => matcher::in_range(document, field, bounds),
            Condition::Membership { field, values } => values
                .iter()
                .any(|value| matcher::equals(document, field, value)),
            Condition::Equality { field, value } => matcher::equals(document, field, value),
            Condition::TextMatch { fields, needle } => {
                matcher::contains_text(document, fields, needle)
            }
        }
    }
}

/// Conjunction of conditions; the empty predicate matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn merge(mut self, other: Predicate) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn contains(&self, condition: &Condition) -> bool {
        self.conditions.contains(condition)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(document))
    }
}

/// Raised when a filter value cannot be coerced to the type its field needs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("range bound {field}[{operator}] must be numeric (got '{value}')")]
    InvalidRangeBound {
        field: String,
        operator: RangeOp,
        value: String,
    },
    #[error("filter {field} expects a number (got '{value}')")]
    InvalidNumber { field: String, value: String },
}

/// Translates raw query parameters into a [`Predicate`].
///
/// Field names are not checked against the listing schema: an unknown field
/// yields a condition that simply matches nothing.
pub struct PredicateBuilder;

impl PredicateBuilder {
    pub fn from_params(params: &QueryParams) -> Result<Predicate, QueryError> {
        let mut ranges: BTreeMap<String, Vec<RangeBound>> = BTreeMap::new();
        let mut predicate = Predicate::all();

        for (key, raw) in params.filters() {
            let range = split_range_key(key);
            // A blank numeric value (`bedrooms=`, `price[gte]=`) is an unset filter.
            if raw.trim().is_empty() && (range.is_some() || is_numeric_field(key)) {
                continue;
            }
            if let Some((field, op)) = range {
                let value = parse_number(raw).ok_or_else(|| QueryError::InvalidRangeBound {
                    field: field.to_string(),
                    operator: op,
                    value: raw.to_string(),
                })?;
                ranges
                    .entry(field.to_string())
                    .or_default()
                    .push(RangeBound { op, value });
                continue;
            }

            let condition = if raw.contains(',') {
                let values = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| membership_value(key, segment))
                    .collect::<Result<Vec<_>, _>>()?;
                Condition::Membership {
                    field: key.to_string(),
                    values,
                }
            } else {
                Condition::Equality {
                    field: key.to_string(),
                    value: scalar_value(key, raw)?,
                }
            };
            predicate = predicate.and(condition);
        }

        for (field, bounds) in ranges {
            predicate = predicate.and(Condition::Range { field, bounds });
        }

        tracing::debug!(?predicate, "compiled filter predicate");
        Ok(predicate)
    }
}

/// `price[gte]` → (`price`, Gte). Unrecognized operators are not range keys.
fn split_range_key(key: &str) -> Option<(&str, RangeOp)> {
    let inner = key.strip_suffix(']')?;
    let (field, op) = inner.split_once('[')?;
    if field.is_empty() {
        return None;
    }
    RangeOp::parse(op).map(|op| (field, op))
}

fn is_numeric_field(field: &str) -> bool {
    NUMERIC_FIELDS.contains(&field)
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn scalar_value(field: &str, raw: &str) -> Result<FilterValue, QueryError> {
    match raw {
        "true" => return Ok(FilterValue::Bool(true)),
        "false" => return Ok(FilterValue::Bool(false)),
        _ => {}
    }
    if is_numeric_field(field) {
        return parse_number(raw)
            .map(FilterValue::Number)
            .ok_or_else(|| QueryError::InvalidNumber {
                field: field.to_string(),
                value: raw.to_string(),
            });
    }
    Ok(FilterValue::Text(raw.to_string()))
}

fn membership_value(field: &str, raw: &str) -> Result<FilterValue, QueryError> {
    if is_numeric_field(field) {
        parse_number(raw)
            .map(FilterValue::Number)
            .ok_or_else(|| QueryError::InvalidNumber {
                field: field.to_string(),
                value: raw.to_string(),
            })
    } else {
        Ok(FilterValue::Text(raw.to_string()))
    }
}
