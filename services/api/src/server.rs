use crate::cli::ServeArgs;
use crate::demo::seed;
use crate::infra::{in_memory_services, AppState};
use crate::routes::app_router;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use realty_market::config::AppConfig;
use realty_market::error::AppError;
use realty_market::ratelimit::RateLimiter;
use realty_market::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let services = in_memory_services(config.query.page_defaults());
    if !args.no_seed {
        let summary = seed(&services)?;
        info!(
            users = summary.users,
            agencies = summary.agencies,
            listings = summary.listings,
            pending = summary.pending,
            "demo catalogue seeded"
        );
    }

    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));

    let app = app_router(&services, limiter)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "saknly marketplace api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
