use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::domain::{Inquiry, InquiryDraft, InquiryRepository, InquiryStatus};
use crate::error::MarketError;
use crate::marketplace::actor::Actor;
use crate::marketplace::collaborators::{Notice, NoticeTemplate, Notifier};
use crate::marketplace::ids::{InquiryId, UserId};
use crate::marketplace::listings::ListingRepository;
use crate::marketplace::query::{
    Condition, Page, PageDefaults, PageRequest, Pagination, Predicate, Projection, QueryParams,
    QueryPlan, SortSpec,
};
use crate::marketplace::users::UserRepository;
use crate::marketplace::validation::ValidationErrors;

/// Fields scanned by the inquiry `search` parameter.
pub const INQUIRY_SEARCH_FIELDS: [&str; 3] = ["name", "email", "message"];

const TOP_AGENTS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryOverview {
    pub total_inquiries: u64,
    pub new_inquiries: u64,
    pub in_progress_inquiries: u64,
    pub responded_inquiries: u64,
    pub closed_inquiries: u64,
    pub unread_inquiries: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentLoad {
    pub agent: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub total_inquiries: u64,
    pub new_inquiries: u64,
    pub unread_inquiries: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryStats {
    pub overview: InquiryOverview,
    pub status_distribution: BTreeMap<&'static str, u64>,
    pub top_agents: Vec<AgentLoad>,
}

pub struct InquiryService {
    inquiries: Arc<dyn InquiryRepository>,
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
    page_defaults: PageDefaults,
}

impl InquiryService {
    pub fn new(
        inquiries: Arc<dyn InquiryRepository>,
        listings: Arc<dyn ListingRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inquiries,
            listings,
            users,
            notifier,
            page_defaults: PageDefaults::default(),
        }
    }

    pub fn with_page_defaults(mut self, page_defaults: PageDefaults) -> Self {
        self.page_defaults = page_defaults;
        self
    }

    /// Public entry point; assigns the inquiry to the listing agent, else the owner.
    pub fn submit(&self, draft: InquiryDraft) -> Result<Inquiry, MarketError> {
        draft.validate()?;
        let listing = self
            .listings
            .fetch(&draft.listing)?
            .ok_or_else(|| MarketError::not_found("listing", draft.listing))?;
        if !listing.is_public() {
            return Err(ValidationErrors::single(
                "propertyId",
                "listing is not available for inquiries",
            )
            .into());
        }

        let assignee = listing.agent.unwrap_or(listing.owner);
        let inquiry = self
            .inquiries
            .insert(draft.into_inquiry(assignee, Utc::now()))?;
        self.listings.attach_inquiry(&listing.id, inquiry.id)?;

        tracing::info!(
            inquiry_id = %inquiry.id,
            listing_id = %listing.id,
            assignee = %assignee,
            "inquiry submitted"
        );

        match self.users.fetch(&assignee) {
            Ok(Some(user)) => {
                let notice = Notice::new(NoticeTemplate::InquiryReceived, user.email)
                    .detail("inquiry_id", inquiry.id.to_string())
                    .detail("title", listing.title.clone())
                    .detail("from", inquiry.name.clone())
                    .detail("email", inquiry.email.clone())
                    .detail("phone", inquiry.phone.clone())
                    .detail("message", inquiry.message.clone());
                if let Err(err) = self.notifier.send(notice) {
                    tracing::warn!(inquiry_id = %inquiry.id, error = %err, "notification failed");
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(inquiry_id = %inquiry.id, error = %err, "assignee lookup failed");
            }
        }

        Ok(inquiry)
    }

    /// Newest first. Agents only see inquiries assigned to them.
    pub fn list(&self, actor: &Actor, params: &QueryParams) -> Result<Page<Value>, MarketError> {
        actor.require_privileged()?;

        let mut predicate = Predicate::all();
        if !actor.is_admin() {
            predicate = predicate.and(Condition::equals("agent", actor.id.to_string()));
        }
        if let Some(raw) = params.get("status") {
            let status = InquiryStatus::parse(raw).ok_or_else(|| {
                ValidationErrors::single(
                    "status",
                    "must be one of new, in-progress, responded, closed",
                )
            })?;
            predicate = predicate.and(Condition::equals("status", status.as_str()));
        }
        if let Some(listing) = params.get("propertyId") {
            predicate = predicate.and(Condition::equals("propertyId", listing));
        }
        if let Some(raw) = params.get("isRead") {
            predicate = predicate.and(Condition::equals("isRead", raw == "true"));
        }
        if let Some(text) = params.search() {
            predicate = predicate.and(Condition::TextMatch {
                fields: INQUIRY_SEARCH_FIELDS
                    .iter()
                    .map(|field| field.to_string())
                    .collect(),
                needle: text.to_string(),
            });
        }

        let plan = QueryPlan {
            predicate,
            sort: SortSpec::default(),
            projection: Projection::default(),
            page: PageRequest::from_params(params, self.page_defaults),
        };
        let total = self.inquiries.count(&plan.predicate)?;
        if total == 0 {
            return Ok(Page {
                data: Vec::new(),
                pagination: Pagination::empty(plan.page),
            });
        }
        Ok(Page {
            data: self.inquiries.page(&plan)?,
            pagination: Pagination::compute(plan.page, total),
        })
    }

    /// Reading an inquiry marks it read.
    pub fn get(&self, actor: &Actor, id: &InquiryId) -> Result<Inquiry, MarketError> {
        let mut inquiry = self.load_for(actor, id, "access")?;
        if !inquiry.is_read {
            inquiry.is_read = true;
            inquiry.updated_at = Utc::now();
            self.inquiries.update(inquiry.clone())?;
        }
        Ok(inquiry)
    }

    pub fn update_status(
        &self,
        actor: &Actor,
        id: &InquiryId,
        status: InquiryStatus,
    ) -> Result<Inquiry, MarketError> {
        let mut inquiry = self.load_for(actor, id, "update")?;
        inquiry.status = status;
        inquiry.updated_at = Utc::now();
        self.inquiries.update(inquiry.clone())?;
        tracing::info!(inquiry_id = %id, status = status.as_str(), "inquiry status updated");
        Ok(inquiry)
    }

    pub fn delete(&self, actor: &Actor, id: &InquiryId) -> Result<(), MarketError> {
        actor.require_admin()?;
        let inquiry = self
            .inquiries
            .remove(id)?
            .ok_or_else(|| MarketError::not_found("inquiry", id))?;
        self.listings.detach_inquiry(&inquiry.listing, inquiry.id)?;
        tracing::info!(inquiry_id = %id, listing_id = %inquiry.listing, "inquiry deleted");
        Ok(())
    }

    pub fn stats(&self, actor: &Actor) -> Result<InquiryStats, MarketError> {
        actor.require_admin()?;
        let inquiries = self
            .inquiries
            .select(&Predicate::all(), &SortSpec::default())?;

        let mut overview = InquiryOverview::default();
        let mut status_distribution: BTreeMap<&'static str, u64> = BTreeMap::new();
        let mut per_agent: BTreeMap<UserId, AgentLoad> = BTreeMap::new();

        for inquiry in &inquiries {
            overview.total_inquiries += 1;
            match inquiry.status {
                InquiryStatus::New => overview.new_inquiries += 1,
                InquiryStatus::InProgress => overview.in_progress_inquiries += 1,
                InquiryStatus::Responded => overview.responded_inquiries += 1,
                InquiryStatus::Closed => overview.closed_inquiries += 1,
            }
            if !inquiry.is_read {
                overview.unread_inquiries += 1;
            }
            *status_distribution
                .entry(inquiry.status.as_str())
                .or_default() += 1;

            let load = per_agent.entry(inquiry.agent).or_insert_with(|| AgentLoad {
                agent: inquiry.agent,
                user_name: None,
                total_inquiries: 0,
                new_inquiries: 0,
                unread_inquiries: 0,
            });
            load.total_inquiries += 1;
            if inquiry.status == InquiryStatus::New {
                load.new_inquiries += 1;
            }
            if !inquiry.is_read {
                load.unread_inquiries += 1;
            }
        }

        let mut top_agents: Vec<AgentLoad> = per_agent.into_values().collect();
        top_agents.sort_by(|a, b| b.total_inquiries.cmp(&a.total_inquiries));
        top_agents.truncate(TOP_AGENTS);
        for load in &mut top_agents {
            load.user_name = self.users.fetch(&load.agent)?.map(|user| user.user_name);
        }

        Ok(InquiryStats {
            overview,
            status_distribution,
            top_agents,
        })
    }

    /// Admins see every inquiry; agents only their own.
    fn load_for(&self, actor: &Actor, id: &InquiryId, action: &str) -> Result<Inquiry, MarketError> {
        actor.require_privileged()?;
        let inquiry = self
            .inquiries
            .fetch(id)?
            .ok_or_else(|| MarketError::not_found("inquiry", id))?;
        if !actor.is_admin() && !inquiry.is_assigned_to(actor.id) {
            return Err(MarketError::Forbidden(format!(
                "not authorized to {action} this inquiry"
            )));
        }
        Ok(inquiry)
    }
}
