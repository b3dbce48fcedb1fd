//! Per-client rate limiting.
//!
//! # Responsibilities
//! - Fixed-window request counting keyed by client identity
//! - Quota headers on every gated response
//! - 429 with `Retry-After` once the window is exhausted
//!
//! # Design Decisions
//! - Strategy chosen once at startup: a counter-store backed limiter when a
//!   store is configured, otherwise a limiter that admits everything
//! - Fail open: store errors admit the request and report the full quota
//! - Fixed window, so a client can spend its quota at the end of one window
//!   and again right after rollover

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::RateLimitConfig;
use crate::error::{GatewayError, StoreError};
use crate::observability::metrics;
use crate::security::headers::ClientIdentity;
use crate::security::store::CounterStore;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request admitted. `reset_at` is epoch seconds, 0 when unknown.
    Allowed { remaining: u32, reset_at: u64 },
    /// Quota exhausted for the current window.
    Rejected { retry_after_secs: u64 },
}

/// Admission strategy.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn admit(&self, identity: &ClientIdentity) -> RateDecision;

    /// Requests allowed per window.
    fn limit(&self) -> u32;
}

/// Fixed-window counter over a shared store.
pub struct FixedWindowLimiter {
    store: Arc<dyn CounterStore>,
    limit: u32,
    window: Duration,
    key_prefix: String,
}

impl FixedWindowLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            limit: config.limit,
            window: Duration::from_secs(config.window_secs),
            key_prefix: config.key_prefix.clone(),
        }
    }

    fn key(&self, identity: &ClientIdentity) -> String {
        format!("{}{}", self.key_prefix, identity)
    }

    async fn try_admit(&self, key: &str) -> Result<RateDecision, StoreError> {
        let current = self.store.get(key).await?.unwrap_or(0);

        if current >= u64::from(self.limit) {
            let remaining = self.window_ttl(key).await?;
            return Ok(RateDecision::Rejected {
                retry_after_secs: ceil_secs(remaining),
            });
        }

        let count = self.store.increment(key).await?;
        if count == 1 {
            self.store.expire(key, self.window).await?;
        }

        let remaining = u64::from(self.limit).saturating_sub(count) as u32;
        let reset_at = epoch_secs() + ceil_secs(self.window_ttl(key).await?);

        Ok(RateDecision::Allowed {
            remaining,
            reset_at,
        })
    }
}

impl FixedWindowLimiter {
    /// Remaining window time for an existing counter.
    ///
    /// A counter without expiry (an earlier `expire` failed) is given a
    /// fresh window, otherwise it would never roll over.
    async fn window_ttl(&self, key: &str) -> Result<Duration, StoreError> {
        match self.store.ttl(key).await? {
            Some(ttl) => Ok(ttl),
            None => {
                tracing::warn!("Rate limit counter had no expiry, restarting its window");
                self.store.expire(key, self.window).await?;
                Ok(self.window)
            }
        }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn admit(&self, identity: &ClientIdentity) -> RateDecision {
        let key = self.key(identity);
        match self.try_admit(&key).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(error = %e, "Counter store unavailable, admitting request");
                metrics::record_rate_limit_fail_open();
                RateDecision::Allowed {
                    remaining: self.limit,
                    reset_at: 0,
                }
            }
        }
    }

    fn limit(&self) -> u32 {
        self.limit
    }
}

/// Admits everything. Used when no counter store is configured.
#[derive(Debug, Clone)]
pub struct NoopRateLimiter {
    limit: u32,
}

impl NoopRateLimiter {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn admit(&self, _identity: &ClientIdentity) -> RateDecision {
        RateDecision::Allowed {
            remaining: self.limit,
            reset_at: 0,
        }
    }

    fn limit(&self) -> u32 {
        self.limit
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Middleware state.
pub struct RateLimitState {
    pub limiter: Arc<dyn RateLimiter>,
    pub path_prefix: String,
    pub trust_forwarded_headers: bool,
}

impl RateLimitState {
    pub fn new(limiter: Arc<dyn RateLimiter>, config: &RateLimitConfig) -> Self {
        Self {
            limiter,
            path_prefix: config.path_prefix.clone(),
            trust_forwarded_headers: config.trust_forwarded_headers,
        }
    }
}

/// Middleware gating requests under the rate-limited prefix.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !request.uri().path().starts_with(&state.path_prefix) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity =
        ClientIdentity::from_request(request.headers(), peer, state.trust_forwarded_headers);
    let limit = state.limiter.limit();

    match state.limiter.admit(&identity).await {
        RateDecision::Allowed {
            remaining,
            reset_at,
        } => {
            tracing::debug!(client = %identity, remaining, "Request admitted");
            let mut response = next.run(request).await;
            quota_headers(response.headers_mut(), limit, remaining, reset_at);
            response
        }
        RateDecision::Rejected { retry_after_secs } => {
            tracing::warn!(client = %identity, retry_after_secs, "Rate limit exceeded");
            metrics::record_rate_limited("window_exhausted");
            let mut response = GatewayError::RateLimitExceeded {
                limit,
                retry_after_secs,
            }
            .into_response();
            quota_headers(response.headers_mut(), limit, 0, 0);
            response
        }
    }
}

fn quota_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_at: u64) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    if reset_at > 0 {
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_at));
    }
}
