//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream call:
//!     → circuit_breaker.rs (reject fast while open, record logical outcomes)
//!     → retries.rs (re-run transient failures with backoff.rs delays)
//!     → timeouts.rs (deadline per attempt)
//!     → orchestrator.rs (composition + fallback)
//! ```
//!
//! # Design Decisions
//! - Policies are plain values composed explicitly, outermost first
//! - Breaker state is shared per operation through `BreakerRegistry`
//! - Every upstream attempt has a deadline

pub mod backoff;
pub mod circuit_breaker;
pub mod orchestrator;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitState};
pub use orchestrator::{Execution, ResilientOrchestrator};
pub use retries::RetryPolicy;
