//! Circuit breaker for the upstream model.
//!
//! # States
//! - Closed: calls pass through, outcomes feed a count-based sliding window
//! - Open: calls are rejected immediately without contacting upstream
//! - Half-Open: a limited number of trial calls are let through
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure rate over the window >= threshold
//!                (evaluated once minimum_calls outcomes are recorded)
//! Open → Half-Open: on the first call after the cool-down elapses
//! Half-Open → Closed: a trial call succeeds
//! Half-Open → Open: a trial call fails (cool-down restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per operation class, shared by all requests
//! - State lives behind a std mutex that is never held across an await
//! - Rejections do not count as failures in the window

use dashmap::DashMap;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::UpstreamError;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    outcomes: VecDeque<bool>,
    opened_at: Option<Instant>,
    trials_in_flight: u32,
}

/// Failure-rate circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_rate_threshold: f64,
    window_size: usize,
    minimum_calls: usize,
    open_duration: Duration,
    half_open_permitted: u32,
    core: Mutex<BreakerCore>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        let window_size = config.sliding_window_size.max(1);
        Self {
            name: name.into(),
            failure_rate_threshold: config.failure_rate_threshold,
            window_size,
            minimum_calls: config.minimum_calls.clamp(1, window_size),
            open_duration: Duration::from_secs(config.open_duration_secs),
            half_open_permitted: config.half_open_permitted_calls.max(1),
            core: Mutex::new(BreakerCore {
                state: CircuitState::Closed,
                outcomes: VecDeque::with_capacity(window_size),
                opened_at: None,
                trials_in_flight: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, without triggering the lazy Open → Half-Open move.
    pub fn state(&self) -> CircuitState {
        self.core.lock().expect("circuit breaker mutex poisoned").state
    }

    /// Failure rate (percent) over the recorded window.
    pub fn failure_rate(&self) -> f64 {
        let core = self.core.lock().expect("circuit breaker mutex poisoned");
        failure_rate(&core.outcomes)
    }

    /// Ask for permission to make a call. `None` means the call is rejected.
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut core = self.core.lock().expect("circuit breaker mutex poisoned");

        if core.state == CircuitState::Open {
            let cooled = core
                .opened_at
                .map_or(true, |at| at.elapsed() >= self.open_duration);
            if !cooled {
                return None;
            }
            self.transition(&mut core, CircuitState::HalfOpen);
        }

        match core.state {
            CircuitState::HalfOpen => {
                if core.trials_in_flight >= self.half_open_permitted {
                    return None;
                }
                core.trials_in_flight += 1;
                Some(CallPermit::new(self, true))
            }
            _ => Some(CallPermit::new(self, false)),
        }
    }

    /// Run `fut` under the breaker. Rejected calls never poll `fut`.
    pub async fn call<F, T>(&self, fut: F) -> Result<T, UpstreamError>
    where
        F: Future<Output = Result<T, UpstreamError>>,
    {
        let permit = match self.try_acquire() {
            Some(permit) => permit,
            None => {
                tracing::debug!(breaker = %self.name, "Circuit open, rejecting call");
                return Err(UpstreamError::CircuitOpen(self.name.clone()));
            }
        };

        match fut.await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(e) => {
                permit.failure();
                Err(e)
            }
        }
    }

    fn on_success(&self, trial: bool) {
        let mut core = self.core.lock().expect("circuit breaker mutex poisoned");
        match core.state {
            CircuitState::HalfOpen if trial => self.transition(&mut core, CircuitState::Closed),
            CircuitState::Closed => self.record(&mut core, true),
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut core = self.core.lock().expect("circuit breaker mutex poisoned");
        match core.state {
            CircuitState::HalfOpen if trial => self.transition(&mut core, CircuitState::Open),
            CircuitState::Closed => {
                self.record(&mut core, false);
                if core.outcomes.len() >= self.minimum_calls
                    && failure_rate(&core.outcomes) >= self.failure_rate_threshold
                {
                    self.transition(&mut core, CircuitState::Open);
                }
            }
            _ => {}
        }
    }

    fn release_trial(&self) {
        let mut core = self.core.lock().expect("circuit breaker mutex poisoned");
        core.trials_in_flight = core.trials_in_flight.saturating_sub(1);
    }

    fn record(&self, core: &mut BreakerCore, success: bool) {
        if core.outcomes.len() == self.window_size {
            core.outcomes.pop_front();
        }
        core.outcomes.push_back(success);
    }

    fn transition(&self, core: &mut BreakerCore, to: CircuitState) {
        let from = core.state;
        core.state = to;
        core.trials_in_flight = 0;
        match to {
            CircuitState::Open => {
                core.opened_at = Some(Instant::now());
                tracing::warn!(
                    breaker = %self.name,
                    from = from.as_str(),
                    failure_rate = failure_rate(&core.outcomes),
                    open_secs = self.open_duration.as_secs(),
                    "Circuit opened"
                );
            }
            CircuitState::HalfOpen => {
                tracing::info!(breaker = %self.name, "Circuit half-open, allowing trial calls");
            }
            CircuitState::Closed => {
                core.outcomes.clear();
                core.opened_at = None;
                tracing::info!(breaker = %self.name, "Circuit closed");
            }
        }
        metrics::record_circuit_state(&self.name, to);
    }
}

fn failure_rate(outcomes: &VecDeque<bool>) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let failures = outcomes.iter().filter(|ok| !**ok).count();
    failures as f64 * 100.0 / outcomes.len() as f64
}

/// Permission to make one call. Report the outcome with `success` or
/// `failure`; dropping it unreported frees a half-open trial slot without
/// recording anything.
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self { breaker, trial }
    }

    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(self) {
        self.breaker.on_success(self.trial);
    }

    pub fn failure(self) {
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.trial {
            self.breaker.release_trial();
        }
    }
}

/// Breakers keyed by operation name.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(name) {
            return breaker.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, &self.config)))
            .clone()
    }

    /// Name and state of every breaker, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        let mut states: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}
