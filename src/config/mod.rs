//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env file (dotenvy, optional)
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Environment variables win over file values
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, CircuitBreakerConfig, CorsConfig, GatewayConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RateLimitConfig, ResilienceConfig, RetryConfig, SanitizerConfig,
    UpstreamConfig,
};
