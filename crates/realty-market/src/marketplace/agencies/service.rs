use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::domain::{Agency, AgencyDraft, AgencyPatch, AgencyRepository};
use crate::error::MarketError;
use crate::marketplace::actor::Actor;
use crate::marketplace::collaborators::MediaStore;
use crate::marketplace::ids::AgencyId;
use crate::marketplace::listings::ListingRepository;
use crate::marketplace::query::Document;

/// Agency with its listing references resolved to documents.
#[derive(Debug, Clone, Serialize)]
pub struct AgencyDetails {
    #[serde(flatten)]
    pub agency: Agency,
    #[serde(rename = "listingDetails")]
    pub listing_details: Vec<Value>,
}

pub struct AgencyService {
    agencies: Arc<dyn AgencyRepository>,
    listings: Arc<dyn ListingRepository>,
    media: Arc<dyn MediaStore>,
}

impl AgencyService {
    pub fn new(
        agencies: Arc<dyn AgencyRepository>,
        listings: Arc<dyn ListingRepository>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            agencies,
            listings,
            media,
        }
    }

    pub fn featured(&self) -> Result<Vec<Agency>, MarketError> {
        Ok(self.agencies.featured()?)
    }

    pub fn create(&self, actor: &Actor, draft: AgencyDraft) -> Result<Agency, MarketError> {
        actor.require_admin()?;
        let agency = draft.into_agency(Utc::now());
        agency.validate()?;
        let stored = self.agencies.insert(agency)?;
        tracing::info!(agency_id = %stored.id, name = %stored.name, "agency created");
        Ok(stored)
    }

    pub fn update(
        &self,
        actor: &Actor,
        id: &AgencyId,
        patch: AgencyPatch,
    ) -> Result<Agency, MarketError> {
        actor.require_admin()?;
        let mut agency = self.load(id)?;

        if let Some(logo) = patch.logo {
            if logo.storage_id != agency.logo.storage_id {
                self.discard_logo(&agency);
            }
            agency.logo = logo;
        }
        if let Some(name) = patch.name {
            agency.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            agency.description = Some(description.trim().to_string());
        }
        if let Some(featured) = patch.is_featured {
            agency.is_featured = featured;
        }
        agency.updated_at = Utc::now();
        agency.validate()?;

        self.agencies.update(agency.clone())?;
        Ok(agency)
    }

    pub fn delete(&self, actor: &Actor, id: &AgencyId) -> Result<Agency, MarketError> {
        actor.require_admin()?;
        let agency = self.load(id)?;
        self.discard_logo(&agency);
        self.agencies.remove(id)?;
        tracing::info!(agency_id = %id, "agency deleted");
        Ok(agency)
    }

    pub fn details(&self, id: &AgencyId) -> Result<AgencyDetails, MarketError> {
        let agency = self.load(id)?;
        let mut listing_details = Vec::with_capacity(agency.listings.len());
        for listing_id in &agency.listings {
            if let Some(listing) = self.listings.fetch(listing_id)? {
                listing_details.push(listing.to_document());
            }
        }
        Ok(AgencyDetails {
            agency,
            listing_details,
        })
    }

    pub fn set_featured(
        &self,
        actor: &Actor,
        id: &AgencyId,
        featured: bool,
    ) -> Result<Agency, MarketError> {
        self.update(
            actor,
            id,
            AgencyPatch {
                is_featured: Some(featured),
                ..AgencyPatch::default()
            },
        )
    }

    fn load(&self, id: &AgencyId) -> Result<Agency, MarketError> {
        self.agencies
            .fetch(id)?
            .ok_or_else(|| MarketError::not_found("agency", id))
    }

    fn discard_logo(&self, agency: &Agency) {
        if let Err(err) = self.media.discard(&[agency.logo.storage_id.clone()]) {
            tracing::warn!(agency_id = %agency.id, error = %err, "failed to discard agency logo");
        }
    }
}
