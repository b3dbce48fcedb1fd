//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every collaborator from validated configuration
//! - Choose the rate limiting strategy once, up front
//! - Announce trust-boundary settings (development mode) loudly
//!
//! # Design Decisions
//! - Fail fast: any construction error is fatal
//! - Collaborators are injected, so tests can swap the model and store

use std::sync::Arc;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::error::{StoreError, UpstreamError};
use crate::http::AppState;
use crate::resilience::{BreakerRegistry, ResilientOrchestrator};
use crate::security::{
    AuthMode, Authenticator, CounterStore, FixedWindowLimiter, InputSanitizer, NoopRateLimiter,
    RateLimitState, RateLimiter, RedisStore,
};
use crate::upstream::{GeminiClient, GenerativeModel};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to compile sanitizer patterns: {0}")]
    Sanitizer(#[from] regex::Error),

    #[error("failed to create upstream client: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("failed to create counter store: {0}")]
    Store(#[from] StoreError),
}

/// Build application state with the production collaborators.
pub fn build_state(config: GatewayConfig) -> Result<AppState, StartupError> {
    let model: Arc<dyn GenerativeModel> = Arc::new(GeminiClient::new(&config.upstream)?);

    let store: Option<Arc<dyn CounterStore>> = match &config.rate_limit.redis_url {
        Some(url) if config.rate_limit.enabled => Some(Arc::new(RedisStore::new(url)?)),
        _ => None,
    };

    build_state_with(config, model, store)
}

/// Build application state around the given model and counter store.
///
/// Without a store, or with rate limiting disabled, every request is
/// admitted.
pub fn build_state_with(
    config: GatewayConfig,
    model: Arc<dyn GenerativeModel>,
    store: Option<Arc<dyn CounterStore>>,
) -> Result<AppState, StartupError> {
    let authenticator = Authenticator::new(&config.auth);
    if authenticator.mode() == AuthMode::Development {
        tracing::warn!(
            "Development mode: every caller is authenticated without a credential. \
             Never enable this in production"
        );
    }

    let limiter: Arc<dyn RateLimiter> = match (&store, config.rate_limit.enabled) {
        (Some(store), true) => {
            tracing::info!(
                backend = store.backend(),
                limit = config.rate_limit.limit,
                window_secs = config.rate_limit.window_secs,
                "Rate limiting enabled"
            );
            Arc::new(FixedWindowLimiter::new(store.clone(), &config.rate_limit))
        }
        (None, true) => {
            tracing::warn!("No counter store configured, rate limiting admits every request");
            Arc::new(NoopRateLimiter::new(config.rate_limit.limit))
        }
        (_, false) => {
            tracing::info!("Rate limiting disabled");
            Arc::new(NoopRateLimiter::new(config.rate_limit.limit))
        }
    };

    let sanitizer = InputSanitizer::new(&config.sanitizer)?;

    let breakers = Arc::new(BreakerRegistry::new(
        config.resilience.circuit_breaker.clone(),
    ));
    let orchestrator = ResilientOrchestrator::new(
        model,
        config.upstream.model.clone(),
        &config.resilience,
        breakers,
    );

    Ok(AppState {
        rate_limit: Arc::new(RateLimitState::new(limiter, &config.rate_limit)),
        authenticator: Arc::new(authenticator),
        sanitizer: Arc::new(sanitizer),
        orchestrator: Arc::new(orchestrator),
        store,
        config: Arc::new(config),
    })
}
