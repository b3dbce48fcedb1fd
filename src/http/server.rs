//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, limits, auth, rate limit)
//! - Bind the server to a listener and shut down gracefully
//!
//! # Middleware Order (outermost first)
//! ```text
//! request id → trace → timeout → body limit → cors → metrics
//!     → auth → rate limit → handler
//! ```

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::{GatewayResult, SanitizeError};
use crate::http::cors::cors_layer;
use crate::http::health;
use crate::http::request::{json_body, GenerateTextRequest, RecapRequest, X_REQUEST_ID};
use crate::http::response::{GenerateTextResponse, RecapResponse, StatusResponse, X_RECAP_DEGRADED};
use crate::observability::metrics;
use crate::resilience::ResilientOrchestrator;
use crate::security::{
    auth_middleware, rate_limit_middleware, Authenticator, CounterStore, InputSanitizer,
    RateLimitState,
};
use crate::upstream::GenerationRequest;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub authenticator: Arc<Authenticator>,
    pub rate_limit: Arc<RateLimitState>,
    pub sanitizer: Arc<InputSanitizer>,
    pub orchestrator: Arc<ResilientOrchestrator>,
    pub store: Option<Arc<dyn CounterStore>>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let development = config.auth.development;

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/health/details", get(health::health_details))
        .route("/keep-alive", get(health::keep_alive))
        .route("/api/recap", post(recap_handler))
        .route("/api/generate", post(generate_handler))
        .route("/api/status", get(status_handler))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.authenticator.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn(track_metrics))
        .layer(cors_layer(&config.cors, development, &config.auth.header))
        .layer(DefaultBodyLimit::max(config.listener.max_body_size))
        .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.listener.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "request",
                request_id = %request_id,
                method = %request.method(),
                path = %request.uri().path(),
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Metric label for a path. Unknown paths share one label.
fn route_label(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/health/details" => "/health/details",
        "/keep-alive" => "/keep-alive",
        "/api/recap" => "/api/recap",
        "/api/generate" => "/api/generate",
        "/api/status" => "/api/status",
        _ => "other",
    }
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = route_label(request.uri().path());

    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), route, start);
    response
}

async fn recap_handler(
    State(state): State<AppState>,
    payload: Result<Json<RecapRequest>, JsonRejection>,
) -> GatewayResult<Response> {
    let body = json_body(payload)?;

    let input = state.sanitizer.sanitize(body.conversation()?)?;
    if input.is_empty() {
        return Err(SanitizeError::Blank("conversation").into());
    }
    let days = state.sanitizer.validate_days(body.days)?;
    let style = state.sanitizer.validate_style(body.style()?)?;

    let request = GenerationRequest::new(input, days, style);
    tracing::info!(
        style = %request.style,
        days = ?request.days,
        chars = request.text.chars().count(),
        "Generating recap"
    );

    let execution = state.orchestrator.execute_detailed(&request).await;
    let degraded = execution.is_degraded();
    if !degraded {
        tracing::info!(participants = execution.result.participants.len(), "Recap generated");
    }

    let mut response = Json(RecapResponse::from(execution.result)).into_response();
    if degraded {
        response
            .headers_mut()
            .insert(X_RECAP_DEGRADED, HeaderValue::from_static("true"));
    }
    Ok(response)
}

async fn generate_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateTextRequest>, JsonRejection>,
) -> GatewayResult<Json<GenerateTextResponse>> {
    let body = json_body(payload)?;
    let input = state.sanitizer.sanitize(body.prompt()?)?;
    if input.is_empty() {
        return Err(SanitizeError::Blank("prompt").into());
    }

    let text = state.orchestrator.generate_text(input.as_str()).await?;
    Ok(Json(GenerateTextResponse { text }))
}

async fn status_handler() -> (StatusCode, Json<StatusResponse>) {
    (
        StatusCode::OK,
        Json(StatusResponse {
            message: "API is working",
            status: "success",
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_labels_are_bounded() {
        assert_eq!(route_label("/api/recap"), "/api/recap");
        assert_eq!(route_label("/api/recap/../../etc"), "other");
        assert_eq!(route_label("/random"), "other");
    }
}
