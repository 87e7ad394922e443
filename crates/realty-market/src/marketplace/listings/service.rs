use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::domain::{Category, ImageDescriptor, Listing, ListingDraft, ListingStatus};
use super::repository::ListingRepository;
use super::similar::rank_similar;
use super::slug::generate_slug;
use super::validation::{check_category_keys, validate_listing};
use crate::error::MarketError;
use crate::marketplace::actor::Actor;
use crate::marketplace::agencies::AgencyRepository;
use crate::marketplace::collaborators::{MediaStore, Notice, NoticeTemplate, Notifier};
use crate::marketplace::ids::{AgencyId, ListingId};
use crate::marketplace::query::{
    Condition, Document, Page, PageDefaults, Pagination, Predicate, QueryParams, QueryPlan,
    SortSpec,
};
use crate::marketplace::users::UserRepository;
use crate::marketplace::validation::{ValidationErrors, Validator};

/// Number of listings on the home page slider.
pub const FEATURED_LIMIT: usize = 10;

/// Fields a client can never set through an update.
pub const PROTECTED_FIELDS: [&str; 17] = [
    "id",
    "slug",
    "owner",
    "status",
    "isApproved",
    "approvedBy",
    "approvedAt",
    "rejectionReason",
    "views",
    "favorites",
    "inquiries",
    "createdAt",
    "updatedAt",
    "revision",
    "mainImage",
    "favoritesCount",
    "inquiriesCount",
];

/// Admin decision applied when approving a pending listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub status: Option<ListingStatus>,
    pub is_active: Option<bool>,
    pub is_approved: Option<bool>,
}

/// Listing workflows: browsing, moderation, mutation and favorites.
pub struct ListingService {
    listings: Arc<dyn ListingRepository>,
    agencies: Arc<dyn AgencyRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
    media: Arc<dyn MediaStore>,
    page_defaults: PageDefaults,
}

/// Conditions every publicly searchable listing satisfies.
pub fn public_predicate() -> Predicate {
    Predicate::all()
        .and(Condition::equals("isApproved", true))
        .and(Condition::equals("isActive", true))
}

impl ListingService {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        agencies: Arc<dyn AgencyRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn Notifier>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            listings,
            agencies,
            users,
            notifier,
            media,
            page_defaults: PageDefaults::default(),
        }
    }

    pub fn with_page_defaults(mut self, page_defaults: PageDefaults) -> Self {
        self.page_defaults = page_defaults;
        self
    }

    /// Filtered, searched, sorted page over every listing.
    pub fn browse(&self, params: &QueryParams) -> Result<Page<Value>, MarketError> {
        let plan = QueryPlan::from_params(params, self.page_defaults)?;
        self.run(&plan)
    }

    /// Same as [`browse`](Self::browse) restricted to approved, active listings.
    pub fn search(&self, params: &QueryParams) -> Result<Page<Value>, MarketError> {
        let plan = QueryPlan::from_params(params, self.page_defaults)?.with_base(public_predicate());
        self.run(&plan)
    }

    fn run(&self, plan: &QueryPlan) -> Result<Page<Value>, MarketError> {
        let total = self.listings.count(&plan.predicate)?;
        if total == 0 {
            return Ok(Page {
                data: Vec::new(),
                pagination: Pagination::empty(plan.page),
            });
        }
        let data = self.listings.page(plan)?;
        Ok(Page {
            data,
            pagination: Pagination::compute(plan.page, total),
        })
    }

    /// Fetch one listing, counting the view.
    pub fn details(&self, id: &ListingId) -> Result<Listing, MarketError> {
        self.listings
            .increment_views(id)?
            .ok_or_else(|| MarketError::not_found("listing", id))
    }

    pub fn similar(&self, id: &ListingId) -> Result<Vec<Listing>, MarketError> {
        let source = self.load(id)?;
        let candidates = self
            .listings
            .select(&public_predicate(), &SortSpec::parse(Some("createdAt")))?;
        Ok(rank_similar(&source, candidates))
    }

    /// Most viewed public listings with slider image urls and a display label
    /// for their status.
    pub fn featured(&self) -> Result<Vec<Value>, MarketError> {
        let listings = self
            .listings
            .select(&public_predicate(), &SortSpec::descending("views"))?;
        Ok(listings
            .into_iter()
            .take(FEATURED_LIMIT)
            .map(|listing| {
                let mut document = listing.to_document();
                if let Value::Object(map) = &mut document {
                    let slider: Vec<Value> = listing
                        .images
                        .iter()
                        .map(|image| Value::from(image.url.as_str()))
                        .collect();
                    map.insert("sliderImages".to_string(), Value::Array(slider));
                    map.insert(
                        "statusLabel".to_string(),
                        Value::from(listing.status.arabic_label()),
                    );
                }
                document
            })
            .collect())
    }

    /// Validate a raw JSON body, then create.
    pub fn create_from_json(&self, actor: &Actor, body: Value) -> Result<Listing, MarketError> {
        let category = body
            .get("category")
            .and_then(Value::as_str)
            .and_then(Category::parse)
            .ok_or_else(|| {
                ValidationErrors::single("category", "must be one of sale, rent, student")
            })?;
        check_category_keys(category, &body)?;
        let draft: ListingDraft = serde_json::from_value(body)
            .map_err(|err| ValidationErrors::single("body", err.to_string()))?;
        self.create(actor, draft)
    }

    /// Agents and admins publish directly; everyone else waits for review.
    pub fn create(&self, actor: &Actor, draft: ListingDraft) -> Result<Listing, MarketError> {
        if let Some(agency) = draft.agency {
            self.require_agency(&agency)?;
        }

        let now = Utc::now();
        let slug = generate_slug(&draft.title);
        let mut listing = draft.into_listing(actor.id, slug, now);

        if actor.role.is_privileged() {
            listing.status = ListingStatus::Available;
            listing.is_approved = true;
            listing.is_active = true;
            listing.approved_by = Some(actor.id);
            listing.approved_at = Some(now);
        } else {
            listing.status = ListingStatus::Pending;
            listing.is_approved = false;
            listing.is_active = false;
        }

        validate_listing(&listing)?;
        let stored = self.listings.insert(listing)?;

        if let Some(agency) = stored.agency {
            self.agencies.attach_listing(&agency, stored.id)?;
        }

        tracing::info!(
            listing_id = %stored.id,
            owner = %stored.owner,
            category = stored.category().as_str(),
            status = stored.status.as_str(),
            "listing created"
        );
        Ok(stored)
    }

    /// Merge-patch update by the admin, the owner or the assigned agent.
    /// Visibility (`isActive`) is left to agents and admins.
    ///
    /// Image keys: `imagesToDelete` (storage ids to drop), `newImages`
    /// (appended), and `images` (the full list as managed by the client; only
    /// known or newly added images survive).
    pub fn update(
        &self,
        actor: &Actor,
        id: &ListingId,
        patch: Value,
    ) -> Result<Listing, MarketError> {
        let current = self.load(id)?;
        if !current.can_be_managed_by(actor) {
            return Err(MarketError::Forbidden(
                "not allowed to update this listing".to_string(),
            ));
        }

        let Value::Object(mut patch) = patch else {
            return Err(ValidationErrors::single("body", "must be a JSON object").into());
        };
        if patch.contains_key("isActive") && !actor.role.is_privileged() {
            return Err(MarketError::Forbidden(
                "only agents and admins can change isActive".to_string(),
            ));
        }

        let mut v = Validator::new();
        for field in PROTECTED_FIELDS {
            if patch.contains_key(field) {
                v.reject(field, "cannot be changed through an update");
            }
        }
        if let Some(category) = patch.remove("category") {
            if category.as_str() != Some(current.category().as_str()) {
                v.reject("category", "cannot be changed after creation");
            }
        }
        if let Err(errors) = check_category_keys(current.category(), &Value::Object(patch.clone()))
        {
            v.extend(errors);
        }

        let images_to_delete: Vec<String> = take_field(&mut patch, "imagesToDelete", &mut v);
        let new_images: Vec<ImageDescriptor> = take_field(&mut patch, "newImages", &mut v);
        let managed: Option<Vec<ImageDescriptor>> = take_field(&mut patch, "images", &mut v);
        v.finish()?;

        let images = merge_images(&current.images, &images_to_delete, new_images, managed);

        let mut document = serde_json::to_value(&current)
            .map_err(|err| ValidationErrors::single("body", err.to_string()))?;
        merge_patch(&mut document, Value::Object(patch));
        if let Value::Object(map) = &mut document {
            let images = serde_json::to_value(&images)
                .map_err(|err| ValidationErrors::single("images", err.to_string()))?;
            map.insert("images".to_string(), images);
        }

        let mut updated: Listing = serde_json::from_value(document)
            .map_err(|err| ValidationErrors::single("body", err.to_string()))?;

        if updated.title != current.title {
            updated.slug = generate_slug(&updated.title);
        }
        updated.normalize_images();
        updated.enforce_invariants();
        updated.updated_at = Utc::now();
        updated.revision = current.revision + 1;
        validate_listing(&updated)?;

        if updated.agency != current.agency {
            if let Some(agency) = updated.agency {
                self.require_agency(&agency)?;
            }
        }

        self.listings.update(updated.clone())?;

        if updated.agency != current.agency {
            if let Some(previous) = current.agency {
                self.agencies.detach_listing(&previous, updated.id)?;
            }
            if let Some(next) = updated.agency {
                self.agencies.attach_listing(&next, updated.id)?;
            }
        }

        let kept: BTreeSet<&str> = updated
            .images
            .iter()
            .map(|image| image.storage_id.as_str())
            .collect();
        let removed: Vec<String> = current
            .images
            .iter()
            .filter(|image| !kept.contains(image.storage_id.as_str()))
            .map(|image| image.storage_id.clone())
            .collect();
        self.discard_images(&updated.id, &removed);

        tracing::info!(listing_id = %updated.id, revision = updated.revision, "listing updated");
        Ok(updated)
    }

    /// Images are discarded first, then the agency reference, then the record,
    /// then wishlist entries. A later failure does not restore earlier steps.
    pub fn delete(&self, actor: &Actor, id: &ListingId) -> Result<Listing, MarketError> {
        let listing = self.load(id)?;
        if !listing.can_be_managed_by(actor) {
            return Err(MarketError::Forbidden(
                "not allowed to delete this listing".to_string(),
            ));
        }
        self.discard_images(id, &listing.storage_ids());
        if let Some(agency) = listing.agency {
            self.agencies.detach_listing(&agency, listing.id)?;
        }
        self.listings.remove(id)?;
        self.forget_wishlisted(id);
        tracing::info!(listing_id = %id, "listing deleted");
        Ok(listing)
    }

    pub fn owned_by(&self, actor: &Actor) -> Result<Vec<Listing>, MarketError> {
        let predicate =
            Predicate::all().and(Condition::equals("owner", actor.id.to_string()));
        Ok(self.listings.select(&predicate, &SortSpec::default())?)
    }

    pub fn pending(
        &self,
        actor: &Actor,
        category: Option<Category>,
    ) -> Result<Vec<Listing>, MarketError> {
        actor.require_admin()?;
        let mut predicate = Predicate::all().and(Condition::equals(
            "status",
            ListingStatus::Pending.as_str(),
        ));
        if let Some(category) = category {
            predicate = predicate.and(Condition::equals("category", category.as_str()));
        }
        Ok(self.listings.select(&predicate, &SortSpec::default())?)
    }

    pub fn approve(
        &self,
        actor: &Actor,
        id: &ListingId,
        decision: ApprovalDecision,
    ) -> Result<Listing, MarketError> {
        actor.require_admin()?;
        let mut listing = self.load_pending(id, "approved")?;

        let now = Utc::now();
        listing.status = decision.status.unwrap_or(ListingStatus::Available);
        listing.is_active = decision.is_active.unwrap_or(true);
        listing.is_approved = decision.is_approved.unwrap_or(true);
        listing.approved_by = Some(actor.id);
        listing.approved_at = Some(now);
        listing.rejection_reason = None;
        listing.updated_at = now;
        listing.revision += 1;
        self.listings.update(listing.clone())?;

        tracing::info!(
            listing_id = %listing.id,
            approver = %actor.id,
            status = listing.status.as_str(),
            "listing approved"
        );

        if let Some(recipient) = self.owner_email(&listing) {
            self.notify(
                Notice::new(NoticeTemplate::ListingApproved, recipient)
                    .detail("listing_id", listing.id.to_string())
                    .detail("title", listing.title.clone())
                    .detail("status", listing.status.as_str()),
            );
        }
        Ok(listing)
    }

    /// Notify the owner, then unlink and delete the pending listing; its
    /// images are discarded last.
    pub fn deny(
        &self,
        actor: &Actor,
        id: &ListingId,
        reason: Option<String>,
    ) -> Result<(), MarketError> {
        actor.require_admin()?;
        let listing = self.load_pending(id, "denied")?;
        let reason = reason
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        if let Some(recipient) = self.owner_email(&listing) {
            let mut notice = Notice::new(NoticeTemplate::ListingDenied, recipient)
                .detail("listing_id", listing.id.to_string())
                .detail("title", listing.title.clone());
            if let Some(reason) = &reason {
                notice = notice.detail("reason", reason.clone());
            }
            self.notify(notice);
        }

        if let Some(agency) = listing.agency {
            self.agencies.detach_listing(&agency, listing.id)?;
        }
        self.listings.remove(id)?;
        self.forget_wishlisted(id);
        self.discard_images(id, &listing.storage_ids());

        tracing::info!(
            listing_id = %id,
            reviewer = %actor.id,
            reason = reason.as_deref().unwrap_or(""),
            "listing denied"
        );
        Ok(())
    }

    /// Favorite a listing; the wishlist is updated independently afterwards.
    pub fn add_favorite(&self, actor: &Actor, id: &ListingId) -> Result<Listing, MarketError> {
        let mut user = self
            .users
            .fetch(&actor.id)?
            .ok_or_else(|| MarketError::not_found("user", actor.id))?;
        let listing = self
            .listings
            .add_favorite(id, actor.id)?
            .ok_or_else(|| MarketError::not_found("listing", id))?;
        if user.add_to_wishlist(*id, Utc::now()) {
            self.users.update(user)?;
        }
        Ok(listing)
    }

    pub fn remove_favorite(&self, actor: &Actor, id: &ListingId) -> Result<Listing, MarketError> {
        let mut user = self
            .users
            .fetch(&actor.id)?
            .ok_or_else(|| MarketError::not_found("user", actor.id))?;
        let listing = self
            .listings
            .remove_favorite(id, actor.id)?
            .ok_or_else(|| MarketError::not_found("listing", id))?;
        if user.remove_from_wishlist(*id) {
            self.users.update(user)?;
        }
        Ok(listing)
    }

    pub fn is_favorite(&self, actor: &Actor, id: &ListingId) -> Result<bool, MarketError> {
        Ok(self.load(id)?.is_favorited_by(actor.id))
    }

    fn load(&self, id: &ListingId) -> Result<Listing, MarketError> {
        self.listings
            .fetch(id)?
            .ok_or_else(|| MarketError::not_found("listing", id))
    }

    fn load_pending(&self, id: &ListingId, action: &str) -> Result<Listing, MarketError> {
        let listing = self.load(id)?;
        if listing.status != ListingStatus::Pending {
            return Err(MarketError::Conflict(format!(
                "only pending listings can be {action} (listing is {})",
                listing.status.as_str()
            )));
        }
        Ok(listing)
    }

    fn require_agency(&self, id: &AgencyId) -> Result<(), MarketError> {
        match self.agencies.fetch(id)? {
            Some(_) => Ok(()),
            None => Err(MarketError::not_found("agency", id)),
        }
    }

    /// Contact e-mail on the listing, else the owner's account e-mail.
    fn owner_email(&self, listing: &Listing) -> Option<String> {
        if let Some(email) = listing.contact_info.email.as_ref().filter(|e| !e.is_empty()) {
            return Some(email.clone());
        }
        match self.users.fetch(&listing.owner) {
            Ok(user) => user.map(|user| user.email),
            Err(err) => {
                tracing::warn!(listing_id = %listing.id, error = %err, "owner lookup failed");
                None
            }
        }
    }

    fn notify(&self, notice: Notice) {
        let template = notice.template;
        if let Err(err) = self.notifier.send(notice) {
            tracing::warn!(template = template.as_str(), error = %err, "notification failed");
        }
    }

    fn forget_wishlisted(&self, id: &ListingId) {
        match self.users.forget_listing(id) {
            Ok(0) => {}
            Ok(users) => tracing::debug!(listing_id = %id, users, "listing dropped from wishlists"),
            Err(err) => {
                tracing::warn!(listing_id = %id, error = %err, "failed to prune wishlists");
            }
        }
    }

    fn discard_images(&self, id: &ListingId, storage_ids: &[String]) {
        if storage_ids.is_empty() {
            return;
        }
        if let Err(err) = self.media.discard(storage_ids) {
            tracing::warn!(listing_id = %id, error = %err, "failed to discard listing images");
        }
    }
}

fn take_field<T>(patch: &mut Map<String, Value>, key: &str, v: &mut Validator) -> T
where
    T: Default + serde::de::DeserializeOwned,
{
    match patch.remove(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
            v.reject(key, err.to_string());
            T::default()
        }),
    }
}

/// Existing images minus `to_delete`, plus `new_images`. A client-managed
/// list replaces that result with the new images followed by the managed
/// entries that refer to already stored images, keeping stored urls.
fn merge_images(
    existing: &[ImageDescriptor],
    to_delete: &[String],
    new_images: Vec<ImageDescriptor>,
    managed: Option<Vec<ImageDescriptor>>,
) -> Vec<ImageDescriptor> {
    let new_images: Vec<ImageDescriptor> = new_images
        .into_iter()
        .map(|image| ImageDescriptor {
            is_main: false,
            ..image
        })
        .collect();

    let Some(managed) = managed else {
        return existing
            .iter()
            .filter(|image| !to_delete.contains(&image.storage_id))
            .cloned()
            .chain(new_images)
            .collect();
    };

    let mut seen: BTreeSet<String> = new_images
        .iter()
        .map(|image| image.storage_id.clone())
        .collect();
    let mut combined = new_images;
    for wanted in managed {
        if to_delete.contains(&wanted.storage_id) || !seen.insert(wanted.storage_id.clone()) {
            continue;
        }
        if let Some(stored) = existing
            .iter()
            .find(|image| image.storage_id == wanted.storage_id)
        {
            combined.push(ImageDescriptor {
                storage_id: stored.storage_id.clone(),
                url: stored.url.clone(),
                alt_text: wanted.alt_text,
                is_main: wanted.is_main,
            });
        }
    }
    combined
}

/// JSON merge patch: objects merge recursively, `null` removes a key, any
/// other value replaces.
fn merge_patch(target: &mut Value, patch: Value) {
    let Value::Object(patch) = patch else {
        *target = patch;
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        for (key, value) in patch {
            if value.is_null() {
                map.remove(&key);
            } else {
                merge_patch(map.entry(key).or_insert(Value::Null), value);
            }
        }
    }
}
