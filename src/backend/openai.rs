//! OpenAI API compatible backend (vLLM, llama.cpp server, Ollama's `/v1`, ...)
//! streaming over server-sent events

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::backend::framing::{SseData, SseDecoder};
use crate::backend::traits::{
    ChatBackend, ChatStreamRequest, ChunkStream, ModelDescriptor, StreamChunk,
};
use crate::backend::{build_http_client, ensure_success, HttpSettings};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};

/// Model information
#[derive(Debug, Clone, Deserialize)]
struct ModelInfo {
    id: String,
    #[serde(default)]
    created: Option<i64>,
}

/// Models list response
#[derive(Debug, Clone, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    message: String,
}

/// Decode one SSE payload; `None` when it carries no text (role-only deltas, usage)
pub(crate) fn decode_payload(payload: &str) -> Result<Option<StreamChunk>> {
    let chunk: CompletionChunk = serde_json::from_str(payload)
        .map_err(|e| AppError::MalformedChunk(format!("{}: {}", e, payload)))?;

    if let Some(error) = chunk.error {
        return Err(AppError::BackendError(error.message));
    }

    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();

    Ok((!text.is_empty()).then(|| StreamChunk::new(text)))
}

/// OpenAI API compatible text backend
pub struct OpenAICompatibleBackend {
    name: String,
    base_url: String,
    client: Client,
    http: HttpSettings,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI compatible backend
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = HttpSettings::from_config(config);
        Ok(Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: build_http_client(&http)?,
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatBackend for OpenAICompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> &str {
        "openai"
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let response = self
            .client
            .get(self.url("/models"))
            .headers(self.http.headers())
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let models = response.json::<ModelsResponse>().await.map_err(|e| {
            warn!(backend = %self.name, error = %e, "Failed to parse models response");
            AppError::BackendError(format!("Failed to parse response: {}", e))
        })?;

        Ok(models
            .data
            .into_iter()
            .map(|m| ModelDescriptor {
                modified_at: m
                    .created
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
                ..ModelDescriptor::named(m.id)
            })
            .collect())
    }

    async fn chat_stream(&self, request: ChatStreamRequest) -> Result<ChunkStream> {
        debug!(backend = %self.name, model = %request.model, "Sending streaming chat completion request");

        let response = self
            .client
            .post(self.url("/chat/completions"))
            .headers(self.http.headers())
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let mut body = Box::pin(response.bytes_stream());
        let stream = stream! {
            let mut decoder = SseDecoder::new();
            while let Some(bytes) = body.next().await {
                let events = match bytes.map_err(AppError::from).and_then(|b| decoder.push(&b)) {
                    Ok(events) => events,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                for event in events {
                    let payload = match event {
                        SseData::Done => return,
                        SseData::Payload(payload) => payload,
                    };
                    match decode_payload(&payload) {
                        Ok(Some(chunk)) => {
                            yield Ok(chunk);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
            let tail = match decoder.finish() {
                Ok(Some(SseData::Done)) => return,
                Ok(Some(SseData::Payload(payload))) => decode_payload(&payload),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            };
            match tail {
                Ok(Some(chunk)) => {
                    yield Ok(chunk);
                }
                Ok(None) => {}
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
            // The body closed without `data: [DONE]`.
            yield Err(AppError::MalformedChunk("stream ended before completion".to_string()));
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> bool {
        let result = self
            .client
            .get(self.url("/models"))
            .headers(self.http.headers())
            .send()
            .await;

        match result {
            // 401 means server is up but needs auth - still reachable
            Ok(response) => response.status().is_success() || response.status().as_u16() == 401,
            Err(e) => {
                debug!(backend = %self.name, error = %e, "Health check failed");
                false
            }
        }
    }
}
