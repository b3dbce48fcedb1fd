//! Counter stores backing the rate limiter.
//!
//! # Responsibilities
//! - Atomic per-key counters with an expiry
//! - Report remaining time-to-live for a key
//!
//! # Design Decisions
//! - The Redis store connects lazily and reconnects on the next call after a
//!   failure, so the gateway can start before Redis is reachable
//! - The in-memory store is for single-instance deployments and tests; it
//!   expires keys lazily on access and sweeps expired keys every
//!   `PURGE_EVERY` new windows

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::error::StoreError;

/// Shared counter storage with expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value of a counter, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Atomically increment a counter, creating it at 1. Returns the new value.
    async fn increment(&self, key: &str) -> Result<u64, StoreError>;

    /// Set the expiry of an existing counter.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remaining lifetime of a counter, `None` if absent or without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: u64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

const PURGE_EVERY: u64 = 1024;

/// Process-local counter store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: DashMap<String, Counter>,
    windows_started: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.counters.retain(|_, counter| !counter.is_expired(now));
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = Instant::now();
        let expired = match self.counters.get(key) {
            Some(counter) if !counter.is_expired(now) => return Ok(Some(counter.value)),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.counters.remove_if(key, |_, c| c.is_expired(now));
        }
        Ok(None)
    }

    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entry = self.counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: None,
        });
        if entry.is_expired(now) {
            *entry = Counter {
                value: 0,
                expires_at: None,
            };
        }
        entry.value += 1;
        let value = entry.value;
        drop(entry);

        let sweep = value == 1
            && self.windows_started.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1;
        if sweep {
            self.purge_expired();
        }
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        if let Some(mut counter) = self.counters.get_mut(key) {
            counter.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        Ok(self.counters.get(key).and_then(|counter| {
            counter
                .expires_at
                .filter(|at| *at > now)
                .map(|at| at.duration_since(now))
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Redis-backed counter store shared across gateway instances.
pub struct RedisStore {
    client: redis::Client,
    connection: Arc<AsyncMutex<Option<ConnectionManager>>>,
}

impl RedisStore {
    /// Create a store for the given URL. No connection is made until first use.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError(e.to_string()))?;
        Ok(Self {
            client,
            connection: Arc::new(AsyncMutex::new(None)),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        match ConnectionManager::new(self.client.clone()).await {
            Ok(conn) => {
                tracing::info!("Connected to Redis counter store");
                *guard = Some(conn.clone());
                Ok(conn)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to connect to Redis counter store");
                Err(StoreError(e.to_string()))
            }
        }
    }

    async fn reset_on_error<T>(&self, result: redis::RedisResult<T>) -> Result<T, StoreError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    *self.connection.lock().await = None;
                }
                Err(StoreError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.connection().await?;
        let result = conn.get::<_, Option<u64>>(key).await;
        self.reset_on_error(result).await
    }

    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let result = conn.incr::<_, _, u64>(key, 1u64).await;
        self.reset_on_error(result).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1) as usize;
        let result = conn.expire::<_, ()>(key, seconds).await;
        self.reset_on_error(result).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.connection().await?;
        let result = conn.ttl::<_, i64>(key).await;
        let seconds = self.reset_on_error(result).await?;
        // -2: no such key, -1: no expiry
        Ok((seconds >= 0).then(|| Duration::from_secs(seconds as u64)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let result = redis::cmd("PING").query_async::<_, String>(&mut conn).await;
        self.reset_on_error(result).await.map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
