//! Recap gateway library.
//!
//! Authenticated, rate-limited, input-screened front door for a generative
//! model that turns chat transcripts into structured recaps.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
