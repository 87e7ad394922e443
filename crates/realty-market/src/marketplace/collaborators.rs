use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Templates understood by the outbound mail service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeTemplate {
    ListingApproved,
    ListingDenied,
    InquiryReceived,
}

impl NoticeTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeTemplate::ListingApproved => "listing_approved",
            NoticeTemplate::ListingDenied => "listing_denied",
            NoticeTemplate::InquiryReceived => "inquiry_received",
        }
    }
}

/// Payload handed to the notifier; rendering happens on the other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub template: NoticeTemplate,
    pub recipient: String,
    pub details: BTreeMap<String, String>,
}

impl Notice {
    pub fn new(template: NoticeTemplate, recipient: impl Into<String>) -> Self {
        Self {
            template,
            recipient: recipient.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Outbound e-mail hook.
pub trait Notifier: Send + Sync {
    fn send(&self, notice: Notice) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Image hosting hook. Only deletion is driven from here; uploads arrive as
/// already-stored descriptors.
pub trait MediaStore: Send + Sync {
    fn discard(&self, storage_ids: &[String]) -> Result<(), MediaError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media store unavailable: {0}")]
    Unavailable(String),
}
