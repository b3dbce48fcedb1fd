//! Error taxonomy for the request pipeline.
//!
//! Authentication, rate-limit and input failures are terminal at their
//! stage. Upstream failures are absorbed by the orchestrator on the recap
//! path and only surface from the plain-text generation endpoint.

use std::time::Duration;
use thiserror::Error;

/// Caller authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,

    #[error("invalid credential")]
    InvalidCredential,
}

impl AuthError {
    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential => "invalid_credential",
        }
    }
}

/// Reasons untrusted input is rejected.
///
/// The `Display` text is meant for logs only; callers receive a generic
/// message so that offending content is never echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("input exceeds {max} characters")]
    TooLong { max: usize },

    #[error("input exceeds {max} lines")]
    TooManyLines { max: usize },

    #[error("input matches an injection pattern")]
    InjectionPattern,

    #[error("input contains excessive special characters")]
    ExcessiveSpecialCharacters,

    #[error("input contains {runs} encoded-looking runs")]
    EncodedPayload { runs: usize },

    #[error("unsupported style")]
    InvalidStyle,

    #[error("days must be at least 1")]
    InvalidDays,

    #[error("{0} must not be blank")]
    Blank(&'static str),

    #[error("malformed request body")]
    MalformedBody,
}

impl SanitizeError {
    /// Name of the check that rejected the input, for metrics.
    pub fn check(&self) -> &'static str {
        match self {
            Self::TooLong { .. } => "length",
            Self::TooManyLines { .. } => "lines",
            Self::InjectionPattern => "injection",
            Self::ExcessiveSpecialCharacters => "special_characters",
            Self::EncodedPayload { .. } => "encoded_payload",
            Self::InvalidStyle => "style",
            Self::InvalidDays => "days",
            Self::Blank(_) => "blank",
            Self::MalformedBody => "body",
        }
    }
}

/// Failures of the upstream generative model call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The attempt exceeded its deadline.
    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or I/O failure.
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("upstream returned status {status}")]
    Status { status: u16 },

    /// Empty or unparsable structured response.
    #[error("malformed upstream response: {0}")]
    Malformed(String),

    /// The circuit breaker rejected the call without contacting upstream.
    #[error("upstream unavailable: circuit '{0}' is open")]
    CircuitOpen(String),
}

impl UpstreamError {
    /// Whether another attempt may succeed.
    ///
    /// Timeouts, transport failures, 5xx and 429 are transient. Malformed
    /// responses and other client-side statuses are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Status { status } => *status >= 500 || *status == 429,
            Self::Malformed(_) | Self::CircuitOpen(_) => false,
        }
    }

    /// Short label for logs and metrics.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::Status { status } if *status >= 500 || *status == 429 => "transient_status",
            Self::Status { .. } => "client_status",
            Self::Malformed(_) => "malformed",
            Self::CircuitOpen(_) => "circuit_open",
        }
    }
}

/// Counter store failures. Always handled by failing open.
#[derive(Debug, Clone, Error)]
#[error("counter store error: {0}")]
pub struct StoreError(pub String);

/// Umbrella error for the HTTP pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { limit: u32, retry_after_secs: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(#[from] SanitizeError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Result type for pipeline operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(UpstreamError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(UpstreamError::Transport("reset".into()).is_retryable());
        assert!(UpstreamError::Status { status: 503 }.is_retryable());
        assert!(UpstreamError::Status { status: 429 }.is_retryable());
        assert!(!UpstreamError::Status { status: 400 }.is_retryable());
        assert!(!UpstreamError::Malformed("empty".into()).is_retryable());
        assert!(!UpstreamError::CircuitOpen("recap".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::RateLimitExceeded {
            limit: 5,
            retry_after_secs: 42,
        };
        assert_eq!(err.to_string(), "rate limit exceeded, retry after 42s");

        let err: GatewayError = SanitizeError::TooLong { max: 10 }.into();
        assert_eq!(err.to_string(), "invalid input: input exceeds 10 characters");
    }
}
