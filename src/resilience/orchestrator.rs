//! Resilient orchestration of upstream model calls.
//!
//! # Policy Composition
//! ```text
//! circuit breaker (per operation)
//!     → retry (bounded, jittered backoff, transient errors only)
//!         → timeout (per attempt)
//!             → GenerativeModel::generate → parse
//! ```
//!
//! The breaker sits outermost, so it records one outcome per logical call
//! after retries are exhausted. Recap calls never fail: any unrecovered
//! error yields the labeled fallback result.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ResilienceConfig;
use crate::error::UpstreamError;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::BreakerRegistry;
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::with_timeout;
use crate::upstream::{prompt, GenerateConfig, GenerationRequest, GenerationResult, GenerativeModel};

pub const RECAP_OPERATION: &str = "recap";
pub const GENERATE_OPERATION: &str = "generate";

/// Outcome of a recap call, with the reason when the fallback was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub result: GenerationResult,
    pub degraded_by: Option<UpstreamError>,
}

impl Execution {
    pub fn is_degraded(&self) -> bool {
        self.degraded_by.is_some()
    }
}

/// Wraps the model with timeout, retry and circuit breaker policies.
pub struct ResilientOrchestrator {
    model: Arc<dyn GenerativeModel>,
    model_name: String,
    attempt_timeout: Duration,
    retry: RetryPolicy,
    breakers: Arc<BreakerRegistry>,
}

impl ResilientOrchestrator {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        model_name: impl Into<String>,
        config: &ResilienceConfig,
        breakers: Arc<BreakerRegistry>,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            attempt_timeout: Duration::from_secs(config.timeout_secs),
            retry: RetryPolicy::from_config(&config.retry),
            breakers,
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Produce a recap. Never fails; degraded results come from the fallback.
    pub async fn execute(&self, request: &GenerationRequest) -> GenerationResult {
        self.execute_detailed(request).await.result
    }

    /// Like `execute`, but also reports why the fallback was used.
    pub async fn execute_detailed(&self, request: &GenerationRequest) -> Execution {
        let config = GenerateConfig::structured(
            prompt::system_instruction(request.style, request.days),
            prompt::recap_schema(),
        );

        let outcome = self
            .guarded(RECAP_OPERATION, || async {
                let text = self
                    .model
                    .generate(&self.model_name, &request.text, &config)
                    .await?;
                parse_result(&text)
            })
            .await;

        match outcome {
            Ok(result) => Execution {
                result,
                degraded_by: None,
            },
            Err(e) => {
                tracing::warn!(
                    operation = RECAP_OPERATION,
                    error_class = e.class(),
                    error = %e,
                    "Upstream unavailable, serving fallback recap"
                );
                metrics::record_fallback(e.class());
                Execution {
                    result: GenerationResult::fallback(),
                    degraded_by: Some(e),
                }
            }
        }
    }

    /// Free-form text generation. Errors are returned to the caller.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, UpstreamError> {
        let config = GenerateConfig::default();
        self.guarded(GENERATE_OPERATION, || {
            self.model.generate(&self.model_name, prompt, &config)
        })
        .await
    }

    async fn guarded<F, Fut, T>(&self, operation: &'static str, mut call: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, UpstreamError>>,
    {
        let breaker = self.breakers.get_or_create(operation);
        let timeout = self.attempt_timeout;
        breaker
            .call(self.retry.run(operation, |_| with_timeout(timeout, call())))
            .await
    }
}

/// Parse the model's JSON reply into a result.
pub fn parse_result(text: &str) -> Result<GenerationResult, UpstreamError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(UpstreamError::Malformed("empty response".into()));
    }
    serde_json::from_str(text).map_err(|e| UpstreamError::Malformed(e.to_string()))
}
