//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, body deserialization)
//!     → security (auth, rate limit, sanitizer)
//!     → resilience orchestrator → upstream model
//!     → response.rs (success bodies, error mapping)
//!     → Send to client
//! ```

pub mod cors;
pub mod health;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{build_router, AppState, HttpServer};
