//! Native Ollama backend (`/api/tags`, `/api/chat` with NDJSON streaming)

use async_stream::stream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::backend::framing::LineDecoder;
use crate::backend::traits::{
    ChatBackend, ChatStreamRequest, ChunkStream, ModelDescriptor, StreamChunk,
};
use crate::backend::{build_http_client, ensure_success, HttpSettings};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    digest: Option<String>,
}

impl From<TagEntry> for ModelDescriptor {
    fn from(entry: TagEntry) -> Self {
        Self {
            name: entry.name,
            modified_at: entry.modified_at,
            size: entry.size,
            digest: entry.digest,
        }
    }
}

/// One NDJSON record of a streamed `/api/chat` response
#[derive(Debug, Deserialize)]
struct ChatRecord {
    #[serde(default)]
    message: Option<RecordMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordMessage {
    #[serde(default)]
    content: String,
}

/// Outcome of decoding one record
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Record {
    Chunk(StreamChunk),
    /// Closing record that still carries text
    Final(StreamChunk),
    Done,
    Skip,
}

/// Decode one NDJSON line into a chunk, the terminal marker, or an error
pub(crate) fn decode_record(line: &str) -> Result<Record> {
    let record: ChatRecord = serde_json::from_str(line)
        .map_err(|e| AppError::MalformedChunk(format!("{}: {}", e, truncate(line, 200))))?;

    if let Some(error) = record.error {
        return Err(AppError::BackendError(error));
    }

    let content = record.message.map(|m| m.content).unwrap_or_default();
    if record.done {
        if content.is_empty() {
            return Ok(Record::Done);
        }
        return Ok(Record::Final(StreamChunk::new(content)));
    }

    if content.is_empty() {
        Ok(Record::Skip)
    } else {
        Ok(Record::Chunk(StreamChunk::new(content)))
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Ollama backend
pub struct OllamaBackend {
    name: String,
    base_url: String,
    client: Client,
    http: HttpSettings,
}

impl OllamaBackend {
    /// Create a new Ollama backend
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
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> &str {
        "ollama"
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .headers(self.http.headers())
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let tags = response.json::<TagsResponse>().await.map_err(|e| {
            warn!(backend = %self.name, error = %e, "Failed to parse model list");
            AppError::BackendError(format!("Failed to parse model list: {}", e))
        })?;

        Ok(tags.models.into_iter().map(ModelDescriptor::from).collect())
    }

    async fn chat_stream(&self, request: ChatStreamRequest) -> Result<ChunkStream> {
        debug!(backend = %self.name, model = %request.model, "Opening chat stream");

        let response = self
            .client
            .post(self.url("/api/chat"))
            .headers(self.http.headers())
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let mut body = Box::pin(response.bytes_stream());
        let stream = stream! {
            let mut decoder = LineDecoder::new();
            while let Some(bytes) = body.next().await {
                let lines = match bytes.map_err(AppError::from).and_then(|b| decoder.push(&b)) {
                    Ok(lines) => lines,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                for line in lines {
                    match decode_record(&line) {
                        Ok(Record::Chunk(chunk)) => {
                            yield Ok(chunk);
                        }
                        Ok(Record::Final(chunk)) => {
                            yield Ok(chunk);
                            return;
                        }
                        Ok(Record::Done) => return,
                        Ok(Record::Skip) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
            match decoder.finish().and_then(|tail| tail.map(|line| decode_record(&line)).transpose()) {
                Ok(Some(Record::Final(chunk))) => {
                    yield Ok(chunk);
                    return;
                }
                Ok(Some(Record::Done)) => return,
                Ok(Some(Record::Chunk(chunk))) => {
                    yield Ok(chunk);
                }
                Ok(Some(Record::Skip)) | Ok(None) => {}
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
            // The body closed without the `done: true` record.
            yield Err(AppError::MalformedChunk("stream ended before completion".to_string()));
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.url("/api/version"))
            .headers(self.http.headers())
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(backend = %self.name, error = %e, "Health check failed");
                false
            }
        }
    }
}
