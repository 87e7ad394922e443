use metrics_exporter_prometheus::PrometheusHandle;
use realty_market::marketplace::collaborators::{
    MediaError, MediaStore, Notice, Notifier, NotifyError,
};
use realty_market::marketplace::memory::InMemoryMarketplace;
use realty_market::marketplace::query::PageDefaults;
use realty_market::marketplace::{MarketplaceServices, MarketplaceStores};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Logs notices in place of the mail service.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn send(&self, notice: Notice) -> Result<(), NotifyError> {
        info!(
            template = notice.template.as_str(),
            recipient = %notice.recipient,
            details = ?notice.details,
            "notice dispatched"
        );
        Ok(())
    }
}

/// Logs image removals in place of the media service.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingMediaStore;

impl MediaStore for TracingMediaStore {
    fn discard(&self, storage_ids: &[String]) -> Result<(), MediaError> {
        info!(count = storage_ids.len(), storage_ids = ?storage_ids, "images discarded");
        Ok(())
    }
}

pub(crate) fn in_memory_services(page_defaults: PageDefaults) -> MarketplaceServices {
    let stores = MarketplaceStores::in_memory(
        Arc::new(InMemoryMarketplace::new()),
        Arc::new(TracingNotifier),
        Arc::new(TracingMediaStore),
    );
    MarketplaceServices::build(stores, page_defaults)
}
