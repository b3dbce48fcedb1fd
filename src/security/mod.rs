//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → auth.rs (credential check, identity attached to the request)
//!     → rate_limit.rs (per-client fixed window, via store.rs)
//!     → handler → sanitizer.rs (screen and normalize untrusted text)
//!     → Pass to the orchestrator
//! ```
//!
//! # Design Decisions
//! - Each stage short-circuits with a typed error
//! - Rejections never echo caller input
//! - The rate limiter fails open; authentication and input checks fail closed

pub mod auth;
pub mod headers;
pub mod rate_limit;
pub mod sanitizer;
pub mod store;

pub use auth::{auth_middleware, AuthMode, AuthenticatedIdentity, Authenticator};
pub use headers::ClientIdentity;
pub use rate_limit::{
    rate_limit_middleware, FixedWindowLimiter, NoopRateLimiter, RateDecision, RateLimitState,
    RateLimiter,
};
pub use sanitizer::{InputSanitizer, SanitizedInput};
pub use store::{CounterStore, MemoryStore, RedisStore};
