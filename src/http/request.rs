//! Request payloads and request identification.
//!
//! # Responsibilities
//! - Deserialize API request bodies
//! - Convert body rejections into generic input errors
//!
//! # Design Decisions
//! - Every field is optional at the serde level so missing fields are
//!   reported through the same generic 400 as any other invalid input
//! - Request ID is assigned as early as possible for tracing

use axum::extract::rejection::JsonRejection;
use serde::Deserialize;

use crate::error::SanitizeError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Body of `POST /api/recap`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecapRequest {
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(default)]
    pub days: Option<i64>,
    #[serde(default)]
    pub style: Option<String>,
}

impl RecapRequest {
    /// Conversation text, rejected when absent or blank.
    pub fn conversation(&self) -> Result<&str, SanitizeError> {
        non_blank(self.conversation.as_deref(), "conversation")
    }

    /// Style selector, rejected when absent or blank.
    pub fn style(&self) -> Result<&str, SanitizeError> {
        non_blank(self.style.as_deref(), "style")
    }
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateTextRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl GenerateTextRequest {
    pub fn prompt(&self) -> Result<&str, SanitizeError> {
        non_blank(self.prompt.as_deref(), "prompt")
    }
}

fn non_blank<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, SanitizeError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(SanitizeError::Blank(field))
}

/// Unwrap a JSON extractor result, mapping rejections to `MalformedBody`.
pub fn json_body<T>(
    payload: Result<axum::Json<T>, JsonRejection>,
) -> Result<T, SanitizeError> {
    match payload {
        Ok(axum::Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::warn!(reason = %rejection.body_text(), "Rejected request body");
            Err(SanitizeError::MalformedBody)
        }
    }
}
