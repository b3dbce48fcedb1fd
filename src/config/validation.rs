//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and the
//! combinations serde cannot express. Every violation is reported, not
//! just the first one.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::resilience::RetryPolicy;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("auth.api_key must be set unless auth.development is enabled")]
    MissingApiKey,

    #[error("listener.bind_address '{0}' is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("resilience.circuit_breaker.failure_rate_threshold must be in (0, 100], got {0}")]
    FailureRateOutOfRange(f64),

    #[error("resilience.circuit_breaker.minimum_calls ({minimum}) must be between 1 and sliding_window_size ({window})")]
    MinimumCallsOutOfRange { minimum: usize, window: usize },

    #[error("upstream.base_url '{0}' is not a valid URL")]
    InvalidUpstreamUrl(String),

    #[error("upstream.model must not be empty")]
    MissingModel,

    #[error("listener.request_timeout_secs ({request_secs}s) must exceed the worst-case upstream time ({upstream_secs}s)")]
    RequestTimeoutTooShort { request_secs: u64, upstream_secs: u64 },
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.auth.development && config.auth.api_key.trim().is_empty() {
        errors.push(ValidationError::MissingApiKey);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let positive = [
        ("listener.max_body_size", config.listener.max_body_size as u64),
        ("listener.request_timeout_secs", config.listener.request_timeout_secs),
        ("rate_limit.limit", config.rate_limit.limit as u64),
        ("rate_limit.window_secs", config.rate_limit.window_secs),
        ("sanitizer.max_chars", config.sanitizer.max_chars as u64),
        ("sanitizer.max_lines", config.sanitizer.max_lines as u64),
        ("sanitizer.max_special_run", config.sanitizer.max_special_run as u64),
        ("sanitizer.min_encoded_run", config.sanitizer.min_encoded_run as u64),
        ("resilience.timeout_secs", config.resilience.timeout_secs),
        ("resilience.retry.max_attempts", config.resilience.retry.max_attempts as u64),
        (
            "resilience.circuit_breaker.sliding_window_size",
            config.resilience.circuit_breaker.sliding_window_size as u64,
        ),
        (
            "resilience.circuit_breaker.open_duration_secs",
            config.resilience.circuit_breaker.open_duration_secs,
        ),
        (
            "resilience.circuit_breaker.half_open_permitted_calls",
            config.resilience.circuit_breaker.half_open_permitted_calls as u64,
        ),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let breaker = &config.resilience.circuit_breaker;
    if !(breaker.failure_rate_threshold > 0.0 && breaker.failure_rate_threshold <= 100.0) {
        errors.push(ValidationError::FailureRateOutOfRange(
            breaker.failure_rate_threshold,
        ));
    }
    if breaker.minimum_calls == 0 || breaker.minimum_calls > breaker.sliding_window_size {
        errors.push(ValidationError::MinimumCallsOutOfRange {
            minimum: breaker.minimum_calls,
            window: breaker.sliding_window_size,
        });
    }

    if url::Url::parse(&config.upstream.base_url).is_err() {
        errors.push(ValidationError::InvalidUpstreamUrl(
            config.upstream.base_url.clone(),
        ));
    }
    if config.upstream.model.trim().is_empty() {
        errors.push(ValidationError::MissingModel);
    }

    // every upstream attempt and backoff must fit inside the listener timeout
    let request_timeout = Duration::from_secs(config.listener.request_timeout_secs);
    let upstream = RetryPolicy::from_config(&config.resilience.retry)
        .worst_case(Duration::from_secs(config.resilience.timeout_secs));
    if !request_timeout.is_zero() && upstream >= request_timeout {
        let upstream_secs = upstream.as_secs() + u64::from(upstream.subsec_nanos() > 0);
        errors.push(ValidationError::RequestTimeoutTooShort {
            request_secs: config.listener.request_timeout_secs,
            upstream_secs,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
