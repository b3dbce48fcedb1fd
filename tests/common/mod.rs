//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use recap_gateway::config::GatewayConfig;
use recap_gateway::error::UpstreamError;
use recap_gateway::lifecycle::build_state_with;
use recap_gateway::security::{CounterStore, MemoryStore};
use recap_gateway::upstream::{GenerateConfig, GenerativeModel};
use recap_gateway::HttpServer;

pub const API_KEY: &str = "integration-secret";

pub const RECAP_JSON: &str =
    r#"{"title":"Weekend plans","participants":["Ana","Ben"],"recap":"Ana and Ben agreed to hike on Saturday."}"#;

pub const TRANSCRIPT: &str = "Ana: hike on Saturday?\nBen: sure, 9am at the trailhead";

/// Gateway configuration with a known key and fast resilience policies.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.api_key = API_KEY.to_string();
    config.resilience.timeout_secs = 1;
    config.resilience.retry.base_delay_ms = 10;
    config.resilience.retry.max_delay_ms = 50;
    config
}

/// Layered router backed by `model` and an in-memory counter store.
pub fn gateway(config: GatewayConfig, model: Arc<dyn GenerativeModel>) -> Router {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
    let state = build_state_with(config, model, Some(store)).unwrap();
    HttpServer::new(state).router()
}

pub fn recap_request(key: Option<&str>, client: &str, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/recap")
        .header("content-type", "application/json")
        .header("x-forwarded-for", client);
    if let Some(key) = key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn recap_body() -> Value {
    json!({ "conversation": TRANSCRIPT, "style": "concise" })
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// In-process model that replays a fixed reply and counts calls.
pub struct ScriptedModel {
    reply: Result<String, UpstreamError>,
    calls: AtomicU32,
}

impl ScriptedModel {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn failing(error: UpstreamError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(
        &self,
        _model: &str,
        _prompt: &str,
        _config: &GenerateConfig,
    ) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

/// What the mock upstream answers for one call.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    /// A `generateContent` success carrying `text` as the only part.
    pub fn text(text: &str) -> Self {
        let body = json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        });
        Self {
            status: 200,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: json!({ "error": { "code": status } }).to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Start a programmable mock generative endpoint on an ephemeral port.
///
/// `f` receives the zero-based call index. Returns the base URL and the
/// shared call counter.
pub async fn start_mock_upstream<F>(f: F) -> (String, Arc<AtomicU32>)
where
    F: Fn(u32) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let f = Arc::new(f);

    let counter = calls.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let index = counter.fetch_add(1, Ordering::SeqCst);
                        let reply = f(index);
                        serve_one(socket, reply).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (format!("http://{}", addr), calls)
}

async fn serve_one(mut socket: TcpStream, reply: MockReply) {
    if read_request(&mut socket).await.is_none() {
        return;
    }
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let status_text = match reply.status {
        200 => "200 OK",
        400 => "400 Bad Request",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "500 Internal Server Error",
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        reply.body.len(),
        reply.body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Consume one request (headers plus `Content-Length` body).
async fn read_request(socket: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(buf)
}
