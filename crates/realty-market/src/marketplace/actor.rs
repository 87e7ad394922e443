//! Caller identity forwarded by the authentication layer.
//!
//! Sessions and tokens are handled upstream; by the time a request reaches the
//! marketplace routes the caller is described by two headers.

use std::fmt;
use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use super::ids::UserId;
use crate::error::MarketError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Ordered so that `role >= Role::Agent` reads as "privileged".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Agent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }

    pub fn is_privileged(&self) -> bool {
        *self >= Role::Agent
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MarketError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            other => Err(MarketError::Forbidden(format!("unknown role '{other}'"))),
        }
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), MarketError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(MarketError::Forbidden("admin role required".to_string()))
        }
    }

    pub fn require_privileged(&self) -> Result<(), MarketError> {
        if self.role.is_privileged() {
            Ok(())
        } else {
            Err(MarketError::Forbidden(
                "agent or admin role required".to_string(),
            ))
        }
    }

    fn from_parts(parts: &Parts) -> Result<Option<Self>, MarketError> {
        let Some(raw_id) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(None);
        };
        let id = raw_id
            .to_str()
            .ok()
            .and_then(|value| value.parse::<UserId>().ok())
            .ok_or(MarketError::Unauthenticated)?;

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            Some(raw) => raw
                .to_str()
                .map_err(|_| MarketError::Unauthenticated)?
                .parse::<Role>()?,
            None => Role::User,
        };

        Ok(Some(Self { id, role }))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Actor::from_parts(parts)?.ok_or(MarketError::Unauthenticated)
    }
}

/// Caller on public routes; absent headers are not an error.
#[derive(Debug, Clone, Copy)]
pub struct OptionalActor(pub Option<Actor>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalActor
where
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Actor::from_parts(parts).map(OptionalActor)
    }
}
