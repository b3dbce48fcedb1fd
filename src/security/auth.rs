//! Caller authentication.
//!
//! # Modes
//! - Development: every caller gets a fixed development identity, no
//!   credential is inspected. This is a trust boundary and is logged loudly
//!   at startup.
//! - Production: paths under the protected prefix need the credential header
//!   and it must match the configured secret exactly.
//!
//! The comparison runs in constant time so response latency does not leak
//! how much of the secret a guess got right.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::error::{AuthError, GatewayError};
use crate::observability::metrics;

/// Identity attached to a request once it has been authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatedIdentity {
    /// Granted unconditionally in development mode.
    Developer,
    /// Granted to callers presenting the configured secret.
    Service,
}

impl AuthenticatedIdentity {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Developer => "dev-user",
            Self::Service => "api-user",
        }
    }
}

/// Whether credentials are checked at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Development,
    Production,
}

/// Validates caller credentials against the configured secret.
#[derive(Debug, Clone)]
pub struct Authenticator {
    mode: AuthMode,
    api_key: String,
    protected_prefix: String,
    header: String,
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            mode: if config.development {
                AuthMode::Development
            } else {
                AuthMode::Production
            },
            api_key: config.api_key.clone(),
            protected_prefix: config.protected_prefix.clone(),
            header: config.header.clone(),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Name of the header carrying the credential.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Resolve the identity for a request path and credential.
    ///
    /// Returns `Ok(None)` for unprotected paths in production mode; those
    /// are not challenged. Only an absent header counts as missing; a blank
    /// one is checked like any other value. An unset secret matches nothing.
    pub fn authenticate(
        &self,
        path: &str,
        credential: Option<&[u8]>,
    ) -> Result<Option<AuthenticatedIdentity>, AuthError> {
        if self.mode == AuthMode::Development {
            return Ok(Some(AuthenticatedIdentity::Developer));
        }

        if !path.starts_with(&self.protected_prefix) {
            return Ok(None);
        }

        let credential = credential.ok_or(AuthError::MissingCredential)?;

        if !self.api_key.is_empty() && bool::from(credential.ct_eq(self.api_key.as_bytes())) {
            Ok(Some(AuthenticatedIdentity::Service))
        } else {
            Err(AuthError::InvalidCredential)
        }
    }
}

/// Middleware rejecting unauthenticated requests before any other stage.
pub async fn auth_middleware(
    State(authenticator): State<Arc<Authenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    let path = request.uri().path().to_string();
    let credential = request
        .headers()
        .get(authenticator.header())
        .map(|v| v.as_bytes());

    match authenticator.authenticate(&path, credential) {
        Ok(Some(identity)) => {
            tracing::debug!(identity = identity.name(), path = %path, "Request authenticated");
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Ok(None) => Ok(next.run(request).await),
        Err(e) => {
            tracing::warn!(path = %path, reason = e.as_str(), "Authentication failed");
            metrics::record_auth_failure(e.as_str());
            Err(e.into())
        }
    }
}
