//! Recap gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request
//!   ──────────────▶ request id → trace → limits → cors
//!                       │
//!                       ▼
//!                 Authenticator ──✗──▶ 401 / 403
//!                       │
//!                       ▼
//!                  RateLimiter ───✗──▶ 429 + Retry-After
//!                       │              (counter store, fails open)
//!                       ▼
//!                InputSanitizer ──✗──▶ 400 (generic)
//!                       │
//!                       ▼
//!            ResilientOrchestrator
//!        breaker → retry → timeout → model
//!                       │
//!                       ▼
//!   ◀────────────── structured recap (or labeled fallback)
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use recap_gateway::config::load_config;
use recap_gateway::lifecycle::{build_state, signals, Shutdown};
use recap_gateway::observability::{logging, metrics};
use recap_gateway::HttpServer;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "recap-gateway", version, about = "Gateway in front of a generative recap model")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "RECAP_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "recap-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        model = %config.upstream.model,
        rate_limit = config.rate_limit.limit,
        window_secs = config.rate_limit.window_secs,
        redis = config.rate_limit.redis_url.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let state = build_state(config)?;
    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(state);
    server.run(listener, shutdown.subscribe()).await?;

    if !shutdown.drained(SHUTDOWN_GRACE).await {
        tracing::warn!("Shutdown grace period elapsed with tasks still running");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
