//! Marketplace users and their wishlists.
//!
//! Registration, passwords and sessions belong to the auth service; this
//! module keeps the profile fields the marketplace reads and the wishlist it
//! writes when a listing is favorited.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::actor::{Actor, Role};
use super::ids::{ListingId, UserId};
use super::listings::ListingRepository;
use super::query::Document;
use super::respond;
use super::validation::{ValidationErrors, Validator};
use crate::error::{MarketError, RepositoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    #[default]
    Local,
    Google,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub listing: ListingId,
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub user_name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub provider: AuthProvider,
    /// Never serialized.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub is_confirmed: bool,
    #[serde(default)]
    pub is_logged_in: bool,
    #[serde(default)]
    pub wishlist: Vec<WishlistEntry>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(user_name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(),
            user_name: user_name.into(),
            email: email.into().trim().to_lowercase(),
            role,
            provider: AuthProvider::Local,
            password_hash: None,
            is_confirmed: false,
            is_logged_in: false,
            wishlist: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.char_range("userName", &self.user_name, 3, 30);
        v.email("email", &self.email);
        if self.provider == AuthProvider::Local {
            v.check(
                self.password_hash
                    .as_deref()
                    .is_some_and(|hash| !hash.is_empty()),
                "password",
                "is required for local accounts",
            );
        }
        v.finish()
    }

    pub fn has_in_wishlist(&self, listing: ListingId) -> bool {
        self.wishlist.iter().any(|entry| entry.listing == listing)
    }

    /// Returns `false` when the listing was already wishlisted.
    pub fn add_to_wishlist(&mut self, listing: ListingId, now: DateTime<Utc>) -> bool {
        self.add_noted_to_wishlist(listing, None, now)
    }

    /// Like [`add_to_wishlist`](Self::add_to_wishlist); an existing entry keeps
    /// its note.
    pub fn add_noted_to_wishlist(
        &mut self,
        listing: ListingId,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.has_in_wishlist(listing) {
            return false;
        }
        self.wishlist.push(WishlistEntry {
            listing,
            added_at: now,
            note,
        });
        true
    }

    pub fn remove_from_wishlist(&mut self, listing: ListingId) -> bool {
        let before = self.wishlist.len();
        self.wishlist.retain(|entry| entry.listing != listing);
        before != self.wishlist.len()
    }
}

/// Longest note a user can attach to a wishlist entry.
pub const WISHLIST_NOTE_MAX_CHARS: usize = 300;

/// Storage abstraction for user profiles.
pub trait UserRepository: Send + Sync {
    fn insert(&self, user: User) -> Result<User, RepositoryError>;
    fn update(&self, user: User) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    /// Drops `listing` from every wishlist; returns how many users changed.
    fn forget_listing(&self, listing: &ListingId) -> Result<usize, RepositoryError>;
}

/// A wishlist entry with the listing it points at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WishlistItem {
    #[serde(flatten)]
    pub entry: WishlistEntry,
    pub property: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WishlistNote {
    #[serde(default, alias = "notes")]
    pub note: Option<String>,
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    listings: Arc<dyn ListingRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, listings: Arc<dyn ListingRepository>) -> Self {
        Self { users, listings }
    }

    /// Validate and store a profile handed over by the auth service.
    pub fn register(&self, user: User) -> Result<User, MarketError> {
        user.validate()?;
        let stored = self.users.insert(user)?;
        tracing::info!(user_id = %stored.id, role = %stored.role, "user registered");
        Ok(stored)
    }

    /// Entries whose listing no longer exists are left out.
    pub fn wishlist(&self, actor: &Actor) -> Result<Vec<WishlistItem>, MarketError> {
        let user = self.load(actor)?;
        let mut items = Vec::with_capacity(user.wishlist.len());
        for entry in user.wishlist {
            if let Some(listing) = self.listings.fetch(&entry.listing)? {
                items.push(WishlistItem {
                    property: listing.to_document(),
                    entry,
                });
            }
        }
        Ok(items)
    }

    /// Returns `false` when the listing was already wishlisted.
    pub fn add_to_wishlist(
        &self,
        actor: &Actor,
        listing: &ListingId,
        note: Option<String>,
    ) -> Result<bool, MarketError> {
        let note = note
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if let Some(note) = &note {
            let mut v = Validator::new();
            v.max_chars("note", note, WISHLIST_NOTE_MAX_CHARS);
            v.finish()?;
        }
        if self.listings.fetch(listing)?.is_none() {
            return Err(MarketError::not_found("listing", listing));
        }
        let mut user = self.load(actor)?;
        let added = user.add_noted_to_wishlist(*listing, note, Utc::now());
        if added {
            self.users.update(user)?;
        }
        Ok(added)
    }

    pub fn remove_from_wishlist(
        &self,
        actor: &Actor,
        listing: &ListingId,
    ) -> Result<bool, MarketError> {
        let mut user = self.load(actor)?;
        let removed = user.remove_from_wishlist(*listing);
        if removed {
            self.users.update(user)?;
        }
        Ok(removed)
    }

    /// Returns how many entries were dropped.
    pub fn clear_wishlist(&self, actor: &Actor) -> Result<usize, MarketError> {
        let mut user = self.load(actor)?;
        let cleared = user.wishlist.len();
        if cleared > 0 {
            user.wishlist.clear();
            self.users.update(user)?;
        }
        Ok(cleared)
    }

    fn load(&self, actor: &Actor) -> Result<User, MarketError> {
        self.users
            .fetch(&actor.id)?
            .ok_or_else(|| MarketError::not_found("user", actor.id))
    }
}

/// Routes mounted under `/api/saknly/v1/users`.
pub fn users_router(service: Arc<UserService>) -> Router {
    Router::new()
        .route(
            "/me/wishlist",
            get(wishlist_handler).delete(clear_wishlist_handler),
        )
        .route(
            "/me/wishlist/:property_id",
            post(add_to_wishlist_handler).delete(remove_from_wishlist_handler),
        )
        .with_state(service)
}

pub(crate) async fn wishlist_handler(
    State(service): State<Arc<UserService>>,
    actor: Actor,
) -> Result<Response, MarketError> {
    let wishlist = service.wishlist(&actor)?;
    Ok(respond::counted("Wishlist fetched successfully", wishlist))
}

pub(crate) async fn add_to_wishlist_handler(
    State(service): State<Arc<UserService>>,
    actor: Actor,
    Path(property_id): Path<String>,
    body: Bytes,
) -> Result<Response, MarketError> {
    let listing: ListingId = respond::parse_id(&property_id)?;
    let WishlistNote { note } = respond::optional_json_body(&body)?;
    let message = if service.add_to_wishlist(&actor, &listing, note)? {
        "Property added to wishlist successfully"
    } else {
        "Property is already in wishlist"
    };
    Ok(respond::ok(message, json!({ "propertyId": listing })))
}

pub(crate) async fn remove_from_wishlist_handler(
    State(service): State<Arc<UserService>>,
    actor: Actor,
    Path(property_id): Path<String>,
) -> Result<Response, MarketError> {
    let listing: ListingId = respond::parse_id(&property_id)?;
    service.remove_from_wishlist(&actor, &listing)?;
    Ok(respond::ok(
        "Property removed from wishlist successfully",
        json!({ "propertyId": listing }),
    ))
}

pub(crate) async fn clear_wishlist_handler(
    State(service): State<Arc<UserService>>,
    actor: Actor,
) -> Result<Response, MarketError> {
    service.clear_wishlist(&actor)?;
    Ok(respond::ok(
        "Wishlist cleared successfully",
        json!({ "count": 0 }),
    ))
}
