//! Cross-origin policy for the API surface.
//!
//! Development mode adds the usual local front-end origins. In production
//! only configured origins are allowed; with none configured every
//! cross-origin request is refused.

use axum::http::{header, HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

const DEVELOPMENT_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:8080",
    "http://localhost:5173",
];

/// Origins allowed for a deployment, deduplicated in first-seen order.
pub fn allowed_origins(config: &CorsConfig, development: bool) -> Vec<String> {
    let mut origins: Vec<String> = Vec::new();
    let extra: &[&str] = if development {
        &DEVELOPMENT_ORIGINS[..]
    } else {
        &[]
    };

    for origin in config
        .allowed_origins
        .iter()
        .map(|o| o.trim())
        .chain(extra.iter().copied())
    {
        if !origin.is_empty() && !origins.iter().any(|o| o == origin) {
            origins.push(origin.to_string());
        }
    }
    origins
}

/// Build the CORS layer for `/api` routes.
pub fn cors_layer(config: &CorsConfig, development: bool, credential_header: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins(config, development)
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let mut headers = vec![header::CONTENT_TYPE, header::AUTHORIZATION];
    if let Ok(name) = HeaderName::from_bytes(credential_header.as_bytes()) {
        headers.push(name);
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(headers)
        .allow_credentials(false)
        .max_age(Duration::from_secs(3600))
}
