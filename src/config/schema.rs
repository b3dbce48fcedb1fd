//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the recap gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Caller authentication.
    pub auth: AuthConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Untrusted input checks.
    pub sanitizer: SanitizerConfig,

    /// Generative model endpoint.
    pub upstream: UpstreamConfig,

    /// Timeout, retry and circuit breaker policies around the upstream call.
    pub resilience: ResilienceConfig,

    /// Cross-origin settings for the API surface.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Total time allowed for a request/response cycle, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 8 * 1024 * 1024,
            request_timeout_secs: 180,
        }
    }
}

/// Caller authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Grant every caller a fixed development identity without checking
    /// credentials. Never enable in a production deployment.
    pub development: bool,

    /// Shared secret expected in the credential header.
    pub api_key: String,

    /// Paths starting with this prefix require a credential.
    pub protected_prefix: String,

    /// Header carrying the caller credential.
    pub header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            development: false,
            api_key: String::new(),
            protected_prefix: "/api/".to_string(),
            header: "X-API-Key".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting. When disabled every request is admitted.
    pub enabled: bool,

    /// Redis URL for the shared counter store. Without one the limiter
    /// degrades to admitting everything.
    pub redis_url: Option<String>,

    /// Requests allowed per window.
    pub limit: u32,

    /// Window length in seconds, measured from the first request.
    pub window_secs: u64,

    /// Prefix for counter keys in the store.
    pub key_prefix: String,

    /// Paths starting with this prefix are rate limited.
    pub path_prefix: String,

    /// Derive the client identity from X-Forwarded-For / X-Real-IP.
    /// Turn off when the gateway is not behind a trusted proxy.
    pub trust_forwarded_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: None,
            limit: 5,
            window_secs: 3 * 60 * 60,
            key_prefix: "rate_limit:".to_string(),
            path_prefix: "/api/recap".to_string(),
            trust_forwarded_headers: true,
        }
    }
}

/// Input sanitizer limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Maximum characters in a transcript.
    pub max_chars: usize,

    /// Maximum lines in a transcript.
    pub max_lines: usize,

    /// Shortest run of consecutive symbol characters that is rejected.
    pub max_special_run: usize,

    /// Shortest base64-alphabet run counted as an encoded payload.
    pub min_encoded_run: usize,

    /// Number of encoded runs tolerated before rejecting.
    pub max_encoded_runs: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            max_chars: 4_000_000,
            max_lines: 50_000,
            max_special_run: 20,
            min_encoded_run: 50,
            max_encoded_runs: 3,
        }
    }
}

/// Generative model endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the generative language API.
    pub base_url: String,

    /// API key sent to the upstream service.
    pub api_key: String,

    /// Model identifier.
    pub model: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// Resilience policies around the upstream call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Per-attempt upstream timeout in seconds.
    pub timeout_secs: u64,

    /// Retry configuration.
    pub retry: RetryConfig,

    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 45,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure rate (percent) at which the breaker opens.
    pub failure_rate_threshold: f64,

    /// Number of most recent calls the failure rate is computed over.
    pub sliding_window_size: usize,

    /// Calls that must be recorded before the failure rate is evaluated.
    pub minimum_calls: usize,

    /// How long the breaker stays open before allowing trial calls.
    pub open_duration_secs: u64,

    /// Concurrent trial calls allowed while half-open.
    pub half_open_permitted_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_size: 10,
            minimum_calls: 5,
            open_duration_secs: 30,
            half_open_permitted_calls: 3,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call the API.
    pub allowed_origins: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
