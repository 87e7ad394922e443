//! Process-local store backing every repository trait, plus recording
//! collaborators. Used by the demo binary and the test suites.

use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::agencies::{Agency, AgencyRepository};
use super::collaborators::{MediaError, MediaStore, Notice, Notifier, NotifyError};
use super::contact::{ContactMessage, ContactRepository};
use super::ids::{AgencyId, ContactId, InquiryId, ListingId, TestimonialId, UserId};
use super::inquiries::{Inquiry, InquiryRepository};
use super::listings::{Listing, ListingRepository};
use super::query::pipeline;
use super::query::{Condition, Document, Predicate, QueryPlan, SortSpec};
use super::testimonials::{Testimonial, TestimonialRepository};
use super::users::{User, UserRepository};
use crate::error::RepositoryError;

/// Records with a stable identity inside a [`Collection`].
pub trait Keyed {
    type Key: PartialEq + Copy;

    fn key(&self) -> Self::Key;
}

macro_rules! keyed {
    ($record:ty, $key:ty) => {
        impl Keyed for $record {
            type Key = $key;

            fn key(&self) -> $key {
                self.id
            }
        }
    };
}

keyed!(Listing, ListingId);
keyed!(Agency, AgencyId);
keyed!(User, UserId);
keyed!(Inquiry, InquiryId);
keyed!(Testimonial, TestimonialId);
keyed!(ContactMessage, ContactId);

/// Insertion-ordered rows behind a mutex. Ties in a sort keep insertion order.
#[derive(Debug)]
pub struct Collection<T> {
    rows: Mutex<Vec<T>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Keyed + Clone> Collection<T> {
    fn lock(&self) -> Result<MutexGuard<'_, Vec<T>>, RepositoryError> {
        self.rows
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    pub fn insert(&self, row: T) -> Result<T, RepositoryError> {
        let mut rows = self.lock()?;
        if rows.iter().any(|existing| existing.key() == row.key()) {
            return Err(RepositoryError::Conflict);
        }
        rows.push(row.clone());
        Ok(row)
    }

    pub fn update(&self, row: T) -> Result<(), RepositoryError> {
        let mut rows = self.lock()?;
        let slot = rows
            .iter_mut()
            .find(|existing| existing.key() == row.key())
            .ok_or(RepositoryError::NotFound)?;
        *slot = row;
        Ok(())
    }

    pub fn fetch(&self, key: T::Key) -> Result<Option<T>, RepositoryError> {
        Ok(self.lock()?.iter().find(|row| row.key() == key).cloned())
    }

    pub fn remove(&self, key: T::Key) -> Result<Option<T>, RepositoryError> {
        let mut rows = self.lock()?;
        Ok(rows
            .iter()
            .position(|row| row.key() == key)
            .map(|index| rows.remove(index)))
    }

    /// Applies `change` under the lock so read-modify-write is atomic.
    pub fn modify<R>(
        &self,
        key: T::Key,
        change: impl FnOnce(&mut T) -> R,
    ) -> Result<Option<R>, RepositoryError> {
        let mut rows = self.lock()?;
        Ok(rows.iter_mut().find(|row| row.key() == key).map(change))
    }

    /// Applies `change` to every row; returns how many reported a change.
    pub fn modify_all(
        &self,
        mut change: impl FnMut(&mut T) -> bool,
    ) -> Result<usize, RepositoryError> {
        let mut rows = self.lock()?;
        Ok(rows.iter_mut().filter_map(|row| change(row).then_some(())).count())
    }

    pub fn snapshot(&self) -> Result<Vec<T>, RepositoryError> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.is_empty())
    }
}

impl<T: Keyed + Clone + Document> Collection<T> {
    fn documents(&self) -> Result<Vec<Value>, RepositoryError> {
        Ok(self.lock()?.iter().map(Document::to_document).collect())
    }

    fn count(&self, predicate: &Predicate) -> Result<u64, RepositoryError> {
        Ok(pipeline::count(self.documents()?.iter(), predicate))
    }

    fn page(&self, plan: &QueryPlan) -> Result<Vec<Value>, RepositoryError> {
        Ok(plan.execute(self.documents()?))
    }

    /// Matching records in sort order; ordering is decided on the documents.
    fn select(&self, predicate: &Predicate, sort: &SortSpec) -> Result<Vec<T>, RepositoryError> {
        let mut matched: Vec<(Value, T)> = self
            .snapshot()?
            .into_iter()
            .map(|row| (row.to_document(), row))
            .filter(|(document, _)| predicate.matches(document))
            .collect();
        matched.sort_by(|left, right| sort.compare(&left.0, &right.0));
        Ok(matched.into_iter().map(|(_, row)| row).collect())
    }
}

/// Every marketplace collection in one process-local store.
#[derive(Debug, Default)]
pub struct InMemoryMarketplace {
    pub listings: Collection<Listing>,
    pub agencies: Collection<Agency>,
    pub users: Collection<User>,
    pub inquiries: Collection<Inquiry>,
    pub testimonials: Collection<Testimonial>,
    pub contacts: Collection<ContactMessage>,
}

impl InMemoryMarketplace {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ListingRepository for InMemoryMarketplace {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        self.listings.insert(listing)
    }

    fn update(&self, listing: Listing) -> Result<(), RepositoryError> {
        self.listings.update(listing)
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        self.listings.fetch(*id)
    }

    fn remove(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        self.listings.remove(*id)
    }

    fn count(&self, predicate: &Predicate) -> Result<u64, RepositoryError> {
        self.listings.count(predicate)
    }

    fn page(&self, plan: &QueryPlan) -> Result<Vec<Value>, RepositoryError> {
        self.listings.page(plan)
    }

    fn select(&self, predicate: &Predicate, sort: &SortSpec) -> Result<Vec<Listing>, RepositoryError> {
        self.listings.select(predicate, sort)
    }

    fn increment_views(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        self.listings.modify(*id, |listing| {
            listing.record_view();
            listing.clone()
        })
    }

    fn add_favorite(&self, id: &ListingId, user: UserId) -> Result<Option<Listing>, RepositoryError> {
        self.listings.modify(*id, |listing| {
            listing.add_to_favorites(user);
            listing.clone()
        })
    }

    fn remove_favorite(
        &self,
        id: &ListingId,
        user: UserId,
    ) -> Result<Option<Listing>, RepositoryError> {
        self.listings.modify(*id, |listing| {
            listing.remove_from_favorites(user);
            listing.clone()
        })
    }

    fn attach_inquiry(&self, id: &ListingId, inquiry: InquiryId) -> Result<(), RepositoryError> {
        self.listings
            .modify(*id, |listing| listing.attach_inquiry(inquiry))?
            .ok_or(RepositoryError::NotFound)
    }

    /// A listing that is already gone has nothing to detach.
    fn detach_inquiry(&self, id: &ListingId, inquiry: InquiryId) -> Result<(), RepositoryError> {
        self.listings
            .modify(*id, |listing| listing.detach_inquiry(inquiry))?;
        Ok(())
    }
}

impl AgencyRepository for InMemoryMarketplace {
    fn insert(&self, agency: Agency) -> Result<Agency, RepositoryError> {
        self.agencies.insert(agency)
    }

    fn update(&self, agency: Agency) -> Result<(), RepositoryError> {
        self.agencies.update(agency)
    }

    fn fetch(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError> {
        self.agencies.fetch(*id)
    }

    fn remove(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError> {
        self.agencies.remove(*id)
    }

    fn featured(&self) -> Result<Vec<Agency>, RepositoryError> {
        let predicate = Predicate::all().and(Condition::equals("isFeatured", true));
        self.agencies.select(&predicate, &SortSpec::default())
    }

    fn attach_listing(&self, id: &AgencyId, listing: ListingId) -> Result<(), RepositoryError> {
        self.agencies
            .modify(*id, |agency| {
                if !agency.listings.contains(&listing) {
                    agency.listings.push(listing);
                }
            })?
            .ok_or(RepositoryError::NotFound)
    }

    fn detach_listing(&self, id: &AgencyId, listing: ListingId) -> Result<(), RepositoryError> {
        self.agencies.modify(*id, |agency| {
            agency.listings.retain(|existing| *existing != listing);
        })?;
        Ok(())
    }
}

impl UserRepository for InMemoryMarketplace {
    fn insert(&self, user: User) -> Result<User, RepositoryError> {
        let rows = self.users.snapshot()?;
        if rows.iter().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::Conflict);
        }
        self.users.insert(user)
    }

    fn update(&self, user: User) -> Result<(), RepositoryError> {
        self.users.update(user)
    }

    fn fetch(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.users.fetch(*id)
    }

    fn forget_listing(&self, listing: &ListingId) -> Result<usize, RepositoryError> {
        self.users
            .modify_all(|user| user.remove_from_wishlist(*listing))
    }
}

impl InquiryRepository for InMemoryMarketplace {
    fn insert(&self, inquiry: Inquiry) -> Result<Inquiry, RepositoryError> {
        self.inquiries.insert(inquiry)
    }

    fn update(&self, inquiry: Inquiry) -> Result<(), RepositoryError> {
        self.inquiries.update(inquiry)
    }

    fn fetch(&self, id: &InquiryId) -> Result<Option<Inquiry>, RepositoryError> {
        self.inquiries.fetch(*id)
    }

    fn remove(&self, id: &InquiryId) -> Result<Option<Inquiry>, RepositoryError> {
        self.inquiries.remove(*id)
    }

    fn count(&self, predicate: &Predicate) -> Result<u64, RepositoryError> {
        self.inquiries.count(predicate)
    }

    fn page(&self, plan: &QueryPlan) -> Result<Vec<Value>, RepositoryError> {
        self.inquiries.page(plan)
    }

    fn select(&self, predicate: &Predicate, sort: &SortSpec) -> Result<Vec<Inquiry>, RepositoryError> {
        self.inquiries.select(predicate, sort)
    }
}

impl TestimonialRepository for InMemoryMarketplace {
    fn insert(&self, testimonial: Testimonial) -> Result<Testimonial, RepositoryError> {
        self.testimonials.insert(testimonial)
    }

    fn update(&self, testimonial: Testimonial) -> Result<(), RepositoryError> {
        self.testimonials.update(testimonial)
    }

    fn fetch(&self, id: &TestimonialId) -> Result<Option<Testimonial>, RepositoryError> {
        self.testimonials.fetch(*id)
    }

    fn remove(&self, id: &TestimonialId) -> Result<Option<Testimonial>, RepositoryError> {
        self.testimonials.remove(*id)
    }

    fn select(
        &self,
        predicate: &Predicate,
        sort: &SortSpec,
    ) -> Result<Vec<Testimonial>, RepositoryError> {
        self.testimonials.select(predicate, sort)
    }
}

impl ContactRepository for InMemoryMarketplace {
    fn insert(&self, message: ContactMessage) -> Result<ContactMessage, RepositoryError> {
        self.contacts.insert(message)
    }

    fn update(&self, message: ContactMessage) -> Result<(), RepositoryError> {
        self.contacts.update(message)
    }

    fn fetch(&self, id: &ContactId) -> Result<Option<ContactMessage>, RepositoryError> {
        self.contacts.fetch(*id)
    }

    fn remove(&self, id: &ContactId) -> Result<Option<ContactMessage>, RepositoryError> {
        self.contacts.remove(*id)
    }

    fn select(
        &self,
        predicate: &Predicate,
        sort: &SortSpec,
    ) -> Result<Vec<ContactMessage>, RepositoryError> {
        self.contacts.select(predicate, sort)
    }
}

/// Keeps every notice instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notice>>,
    failing: bool,
}

impl RecordingNotifier {
    /// A notifier whose transport always fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<Notice> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notice: Notice) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError::Transport("smtp relay refused".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| NotifyError::Transport("recorder lock poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}

/// Keeps every discarded storage id.
#[derive(Debug, Default)]
pub struct RecordingMediaStore {
    discarded: Mutex<Vec<String>>,
    failing: bool,
}

impl RecordingMediaStore {
    pub fn failing() -> Self {
        Self {
            discarded: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn discarded(&self) -> Vec<String> {
        self.discarded
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }
}

impl MediaStore for RecordingMediaStore {
    fn discard(&self, storage_ids: &[String]) -> Result<(), MediaError> {
        if self.failing {
            return Err(MediaError::Unavailable("image host timed out".to_string()));
        }
        self.discarded
            .lock()
            .map_err(|_| MediaError::Unavailable("recorder lock poisoned".to_string()))?
            .extend(storage_ids.iter().cloned());
        Ok(())
    }
}
