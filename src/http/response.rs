//! Response bodies and error mapping.
//!
//! # Responsibilities
//! - Shape successful recap and generation responses
//! - Map `GatewayError` to a status code and a generic JSON body
//!
//! # Design Decisions
//! - Error bodies never include caller input or internal detail
//! - Degraded recaps are still 200 and are flagged by a header

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{AuthError, GatewayError};
use crate::upstream::GenerationResult;

pub const X_RECAP_DEGRADED: &str = "x-recap-degraded";

/// Body of a successful `POST /api/recap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecapResponse {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Users")]
    pub users: Vec<String>,
    #[serde(rename = "Recap")]
    pub recap: String,
}

impl From<GenerationResult> for RecapResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            title: result.title,
            users: result.participants,
            recap: result.recap,
        }
    }
}

/// Body of a successful `POST /api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateTextResponse {
    pub text: String,
}

/// Body of an authenticated status probe.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub message: &'static str,
    pub status: &'static str,
}

/// JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    fn new(error: &'static str, message: &'static str) -> Self {
        Self {
            error,
            message,
            retry_after: None,
        }
    }
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::MissingCredential) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::InvalidCredential) => StatusCode::FORBIDDEN,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Auth(AuthError::MissingCredential) => ErrorBody::new(
                "Authentication failed",
                "Missing API key or authentication credentials",
            ),
            Self::Auth(AuthError::InvalidCredential) => {
                ErrorBody::new("Access denied", "Invalid API key")
            }
            Self::RateLimitExceeded {
                retry_after_secs, ..
            } => ErrorBody {
                retry_after: Some(*retry_after_secs),
                ..ErrorBody::new(
                    "Rate limit exceeded",
                    "Too many requests. Please try again later.",
                )
            },
            Self::InvalidInput(_) => ErrorBody::new(
                "Invalid input",
                "The provided input is invalid. Please check your request and try again.",
            ),
            Self::Upstream(_) => ErrorBody::new(
                "Service unavailable",
                "The service is temporarily unavailable. Please try again later.",
            ),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = (self.status_code(), Json(self.body())).into_response();
        if let Self::RateLimitExceeded {
            retry_after_secs, ..
        } = self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SanitizeError, UpstreamError};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_response_has_retry_after() {
        let response = GatewayError::RateLimitExceeded {
            limit: 5,
            retry_after_secs: 120,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "120");
        let body = body_json(response).await;
        assert_eq!(body["retry_after"], 120);
    }

    #[tokio::test]
    async fn test_invalid_input_is_generic() {
        let response: Response =
            GatewayError::from(SanitizeError::InjectionPattern).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid input");
        assert!(body.get("retry_after").is_none());
        assert!(!body.to_string().contains("injection"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::from(AuthError::MissingCredential).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::from(AuthError::InvalidCredential).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::from(UpstreamError::CircuitOpen("generate".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_recap_response_field_names() {
        let response = RecapResponse::from(GenerationResult {
            title: "T".into(),
            participants: vec!["A".into()],
            recap: "R".into(),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["Title"], "T");
        assert_eq!(json["Users"][0], "A");
        assert_eq!(json["Recap"], "R");
    }
}
