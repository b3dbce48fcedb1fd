//! Liveness and readiness endpoints.
//!
//! # Endpoints
//! - `GET /`: service banner
//! - `GET /health`: plain liveness
//! - `GET /health/details`: configuration summary, breaker states and
//!   counter-store reachability
//! - `GET /keep-alive`: pings the counter store so idle hosted instances
//!   keep their connections warm

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::security::AuthMode;

pub const BANNER: &str = "RecapMe gateway is running";

#[derive(Debug, Serialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StoreStatus {
    pub backend: &'static str,
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthDetails {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub development_mode: bool,
    pub rate_limit_per_window: u32,
    pub circuits: Vec<BreakerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_store: Option<StoreStatus>,
}

pub async fn root() -> &'static str {
    BANNER
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn health_details(State(state): State<AppState>) -> Json<HealthDetails> {
    let circuits = state
        .orchestrator
        .breakers()
        .snapshot()
        .into_iter()
        .map(|(name, s)| BreakerStatus {
            name,
            state: s.as_str(),
        })
        .collect();

    let counter_store = match &state.store {
        Some(store) => Some(StoreStatus {
            backend: store.backend(),
            reachable: store.ping().await.is_ok(),
        }),
        None => None,
    };

    Json(HealthDetails {
        status: "UP",
        version: env!("CARGO_PKG_VERSION"),
        model: state.orchestrator.model_name().to_string(),
        development_mode: state.authenticator.mode() == AuthMode::Development,
        rate_limit_per_window: state.rate_limit.limiter.limit(),
        circuits,
        counter_store,
    })
}

pub async fn keep_alive(State(state): State<AppState>) -> Response {
    if let Some(store) = &state.store {
        match store.ping().await {
            Ok(()) => tracing::info!(backend = store.backend(), "Keep-alive ping succeeded"),
            Err(e) => tracing::warn!(backend = store.backend(), error = %e, "Keep-alive ping failed"),
        }
    }

    let mut response = "OK".into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}
