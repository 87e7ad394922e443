//! Fixed-window request limiting keyed by caller.
//!
//! Counters live in an injected [`TtlStore`], a moka cache whose entries
//! expire one window after they were opened.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use moka::sync::Cache;
use serde_json::json;

use crate::config::RateLimitConfig;
use crate::marketplace::actor::USER_ID_HEADER;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Seconds until the current window resets.
pub const RESET_HEADER: &str = "x-ratelimit-reset";

const ANONYMOUS: &str = "anonymous";

/// Upper bound on callers tracked at once.
const MAX_TRACKED_KEYS: u64 = 100_000;

/// Keyed values that expire a fixed time after they were inserted.
#[derive(Clone)]
pub struct TtlStore<V: Clone + Send + Sync + 'static> {
    entries: Cache<String, V>,
}

impl<V: Clone + Send + Sync + 'static> TtlStore<V> {
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(MAX_TRACKED_KEYS)
            .time_to_live(ttl)
            .build();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key)
    }

    /// The live value for `key`, else `init()` stored with a fresh ttl.
    pub fn get_or_insert_with(&self, key: &str, init: impl FnOnce() -> V) -> V {
        self.entries.entry_by_ref(key).or_insert_with(init).into_value()
    }

    /// Replaces the value for `key`; its ttl starts over.
    pub fn insert(&self, key: &str, value: V) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone + Send + Sync + 'static> fmt::Debug for TtlStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlStore")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

/// Requests counted for one caller since the window opened.
#[derive(Debug)]
pub struct Window {
    opened_at: Instant,
    hits: AtomicU32,
}

impl Window {
    fn open(now: Instant) -> Arc<Self> {
        Arc::new(Self {
            opened_at: now,
            hits: AtomicU32::new(0),
        })
    }

    fn closes_at(&self, length: Duration) -> Instant {
        self.opened_at + length
    }

    /// Counts one request and returns the total so far.
    fn hit(&self) -> u32 {
        match self
            .hits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |hits| {
                Some(hits.saturating_add(1))
            }) {
            Ok(previous) | Err(previous) => previous.saturating_add(1),
        }
    }
}

pub type Counters = TtlStore<Arc<Window>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Whitelisted caller; no headers are set.
    Exempt,
    Allowed {
        limit: u32,
        remaining: u32,
        reset_in: Duration,
    },
    Limited {
        limit: u32,
        retry_after: Duration,
    },
}

#[derive(Debug)]
pub struct RateLimiter {
    store: Counters,
    window: Duration,
    max_requests: u32,
    whitelist: HashSet<String>,
}

impl RateLimiter {
    pub fn new(store: Counters, config: &RateLimitConfig) -> Self {
        Self {
            store,
            window: config.window,
            max_requests: config.max_requests,
            whitelist: config.whitelist.iter().cloned().collect(),
        }
    }

    /// Limiter with its own counter store expiring once per window.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(TtlStore::new(config.window), config)
    }

    pub fn store(&self) -> &Counters {
        &self.store
    }

    pub fn check(&self, key: &str, now: Instant) -> RateDecision {
        if self.whitelist.contains(key) {
            return RateDecision::Exempt;
        }
        let mut window = self.store.get_or_insert_with(key, || Window::open(now));
        if window.closes_at(self.window) <= now {
            window = Window::open(now);
            self.store.insert(key, window.clone());
        }

        let limit = self.max_requests;
        let count = window.hit();
        let reset_in = window.closes_at(self.window).saturating_duration_since(now);
        if count > limit {
            RateDecision::Limited {
                limit,
                retry_after: reset_in,
            }
        } else {
            RateDecision::Allowed {
                limit,
                remaining: limit - count,
                reset_in,
            }
        }
    }
}

/// Caller id from the auth layer, else the first forwarded address.
pub fn client_key(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    header(USER_ID_HEADER)
        .or_else(|| header("x-forwarded-for").and_then(|value| value.split(',').next()))
        .or_else(|| header("x-real-ip"))
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: u64) {
    headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
}

/// Axum middleware; attach with `middleware::from_fn_with_state`.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(request.headers());
    match limiter.check(&key, Instant::now()) {
        RateDecision::Exempt => next.run(request).await,
        RateDecision::Allowed {
            limit,
            remaining,
            reset_in,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            set_header(headers, LIMIT_HEADER, u64::from(limit));
            set_header(headers, REMAINING_HEADER, u64::from(remaining));
            set_header(headers, RESET_HEADER, ceil_secs(reset_in));
            response
        }
        RateDecision::Limited { limit, retry_after } => {
            let retry_after = ceil_secs(retry_after);
            tracing::warn!(client = %key, retry_after, "rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "success": false,
                    "message": "Too many requests, please try again later",
                    "retryAfter": retry_after,
                })),
            )
                .into_response();
            let headers = response.headers_mut();
            set_header(headers, LIMIT_HEADER, u64::from(limit));
            set_header(headers, REMAINING_HEADER, 0);
            set_header(headers, RESET_HEADER, retry_after);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn limiter(max_requests: u32, whitelist: &[&str]) -> RateLimiter {
        RateLimiter::from_config(&RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests,
            whitelist: whitelist.iter().map(|key| key.to_string()).collect(),
        })
    }

    #[test]
    fn counts_requests_within_a_window() {
        let limiter = limiter(2, &[]);
        let start = Instant::now();

        assert!(matches!(
            limiter.check("10.0.0.9", start),
            RateDecision::Allowed { remaining: 1, .. }
        ));
        assert!(matches!(
            limiter.check("10.0.0.9", start + Duration::from_secs(1)),
            RateDecision::Allowed { remaining: 0, .. }
        ));
        match limiter.check("10.0.0.9", start + Duration::from_secs(2)) {
            RateDecision::Limited { retry_after, .. } => {
                assert_eq!(retry_after, Duration::from_secs(58));
            }
            other => panic!("expected limit, got {other:?}"),
        }
        assert!(matches!(
            limiter.check("10.0.0.10", start + Duration::from_secs(2)),
            RateDecision::Allowed { remaining: 1, .. }
        ));
    }

    #[test]
    fn window_restarts_after_expiry() {
        let limiter = limiter(1, &[]);
        let start = Instant::now();
        limiter.check("caller", start);
        assert!(matches!(
            limiter.check("caller", start + Duration::from_secs(1)),
            RateDecision::Limited { .. }
        ));
        assert!(matches!(
            limiter.check("caller", start + Duration::from_secs(61)),
            RateDecision::Allowed { remaining: 0, .. }
        ));
    }

    #[test]
    fn whitelisted_keys_bypass_the_limiter() {
        let limiter = limiter(1, &["ops-monitor"]);
        let now = Instant::now();
        for _ in 0..5 {
            assert_eq!(limiter.check("ops-monitor", now), RateDecision::Exempt);
        }
        assert!(limiter.store().is_empty());
    }

    #[test]
    fn stored_entries_expire_after_their_ttl() {
        let store = TtlStore::new(Duration::from_millis(30));
        store.insert("caller", 7u32);
        assert_eq!(store.get("caller"), Some(7));
        assert_eq!(store.get_or_insert_with("caller", || 1), 7);

        std::thread::sleep(Duration::from_millis(90));
        assert_eq!(store.get("caller"), None);
        assert_eq!(store.get_or_insert_with("caller", || 1), 1);
    }

    #[test]
    fn client_key_prefers_the_authenticated_caller() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "anonymous");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_key(&headers), "203.0.113.7");

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("user-42"));
        assert_eq!(client_key(&headers), "user-42");
    }

    #[tokio::test]
    async fn middleware_sets_headers_and_rejects_excess() {
        let limiter = Arc::new(limiter(1, &[]));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(limiter, rate_limit));

        let request = || {
            axum::http::Request::builder()
                .uri("/")
                .header("x-forwarded-for", "198.51.100.4")
                .body(Body::empty())
                .expect("request")
        };

        let first = app.clone().oneshot(request()).await.expect("response");
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[LIMIT_HEADER], "1");
        assert_eq!(first.headers()[REMAINING_HEADER], "0");

        let second = app.oneshot(request()).await.expect("response");
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = axum::body::to_bytes(second.into_body(), 1024)
            .await
            .expect("read body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(payload["success"], false);
        assert!(payload["retryAfter"].as_u64().is_some());
    }
}
