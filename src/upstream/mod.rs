//! Generative model integration.
//!
//! # Data Flow
//! ```text
//! GenerationRequest
//!     → prompt.rs (system instruction + response schema)
//!     → client.rs (GenerativeModel::generate over HTTP)
//!     → raw text → GenerationResult (parsed by the orchestrator)
//! ```

pub mod client;
pub mod prompt;
pub mod types;

pub use client::{GeminiClient, GenerateConfig, GenerativeModel};
pub use types::{GenerationRequest, GenerationResult, Style, UnknownStyle};
