//! Field-level validation shared by every marketplace entity.

use serde::Serialize;
use std::fmt;

/// One rejected field together with a human readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation::new(field, message)],
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "validation failed: {joined}")
    }
}

impl std::error::Error for ValidationErrors {}

/// Accumulates violations so callers report every bad field at once.
#[derive(Debug, Default)]
pub struct Validator {
    violations: Vec<FieldViolation>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(FieldViolation::new(field, message));
    }

    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.reject(field, message);
        }
    }

    pub fn required(&mut self, field: &str, value: &str) {
        self.check(!value.trim().is_empty(), field, "is required");
    }

    /// Length is measured in characters so Arabic text is not penalized.
    pub fn max_chars(&mut self, field: &str, value: &str, max: usize) {
        let count = value.chars().count();
        self.check(
            count <= max,
            field,
            format!("must be at most {max} characters (got {count})"),
        );
    }

    pub fn char_range(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let count = value.trim().chars().count();
        self.check(
            (min..=max).contains(&count),
            field,
            format!("must be between {min} and {max} characters"),
        );
    }

    pub fn range<T>(&mut self, field: &str, value: T, min: T, max: T)
    where
        T: PartialOrd + fmt::Display + Copy,
    {
        self.check(
            value >= min && value <= max,
            field,
            format!("must be between {min} and {max}"),
        );
    }

    pub fn at_least<T>(&mut self, field: &str, value: T, min: T)
    where
        T: PartialOrd + fmt::Display + Copy,
    {
        self.check(value >= min, field, format!("must be at least {min}"));
    }

    pub fn email(&mut self, field: &str, value: &str) {
        self.check(is_email(value), field, "must be a valid email address");
    }

    pub fn extend(&mut self, errors: ValidationErrors) {
        self.violations.extend(errors.violations);
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                violations: self.violations,
            })
        }
    }
}

/// `local@domain.tld` with no whitespace; deliverability is the mailer's concern.
pub fn is_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2,
        None => false,
    }
}
