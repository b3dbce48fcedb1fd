//! Generative model collaborator and its HTTP implementation.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Per-call generation settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateConfig {
    pub system_instruction: Option<String>,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<Value>,
}

impl GenerateConfig {
    /// Settings asking for a JSON reply matching `schema`.
    pub fn structured(system_instruction: String, schema: Value) -> Self {
        Self {
            system_instruction: Some(system_instruction),
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema),
        }
    }
}

/// A text generation backend.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        config: &GenerateConfig,
    ) -> Result<String, UpstreamError>;
}

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        config: &GenerateConfig,
    ) -> Result<String, UpstreamError> {
        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request_body(prompt, config))
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), model, "Upstream returned error status");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        extract_text(&body)
    }
}

/// Build a `generateContent` request body.
pub fn request_body(prompt: &str, config: &GenerateConfig) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
    });

    if let Some(instruction) = &config.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
    }

    let mut generation = serde_json::Map::new();
    if let Some(mime) = &config.response_mime_type {
        generation.insert("responseMimeType".into(), json!(mime));
    }
    if let Some(schema) = &config.response_schema {
        generation.insert("responseSchema".into(), schema.clone());
    }
    if !generation.is_empty() {
        body["generationConfig"] = Value::Object(generation);
    }

    body
}

/// Concatenate the text parts of the first candidate.
pub fn extract_text(body: &Value) -> Result<String, UpstreamError> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| UpstreamError::Malformed("response has no candidate parts".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();

    if text.trim().is_empty() {
        return Err(UpstreamError::Malformed("empty response text".into()));
    }
    Ok(text)
}
