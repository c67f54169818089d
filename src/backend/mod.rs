//! Backend module - model server trait, HTTP clients, and stream framing

pub mod framing;
pub mod ollama;
pub mod openai;
pub mod traits;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendConfig, ProtocolType};
use crate::error::{AppError, Result};

pub use ollama::OllamaBackend;
pub use openai::OpenAICompatibleBackend;
pub use traits::{
    ChatBackend, ChatMessage, ChatStreamRequest, ChunkStream, ModelDescriptor, StreamChunk,
};

/// Connection settings shared by the HTTP backends
#[derive(Debug, Clone)]
pub struct HttpSettings {
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
    auth_token: Option<String>,
}

impl HttpSettings {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            request_timeout: (config.request_timeout_ms > 0)
                .then(|| Duration::from_millis(config.request_timeout_ms)),
            auth_token: config.auth.resolve_token(),
        }
    }

    /// Get headers with authentication
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }
}

/// Build the HTTP client.
///
/// Streams can legitimately run for minutes, so only the connect phase is
/// bounded unless a whole-request timeout is configured.
pub fn build_http_client(settings: &HttpSettings) -> Result<Client> {
    let mut builder = Client::builder().connect_timeout(settings.connect_timeout);
    if let Some(timeout) = settings.request_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-2xx response into a backend error carrying the body text
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error").and_then(|e| {
                e.as_str()
                    .map(str::to_string)
                    .or_else(|| e.get("message").and_then(|m| m.as_str()).map(str::to_string))
            })
        })
        .unwrap_or(body);

    Err(AppError::BackendError(format!(
        "Backend returned {}: {}",
        status, detail
    )))
}

/// Create the backend described by the configuration
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn ChatBackend>> {
    match config.protocol {
        ProtocolType::Ollama => Ok(Arc::new(OllamaBackend::new(config)?)),
        ProtocolType::OpenAI => Ok(Arc::new(OpenAICompatibleBackend::new(config)?)),
    }
}
