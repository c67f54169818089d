//! Per-submission chat state

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::ChatStreamRequest;
use crate::error::{AppError, Result};

/// A prompt and the model it is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub model_id: String,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model_id: model_id.into(),
        }
    }

    /// Reject requests the backend cannot route
    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(AppError::InvalidRequest("model must not be empty".to_string()));
        }
        Ok(())
    }

    pub(crate) fn to_backend_request(&self) -> ChatStreamRequest {
        ChatStreamRequest::single_prompt(&self.model_id, &self.prompt)
    }
}

/// State of one in-flight submission.
///
/// Created fresh for every request and moved into the relay, which owns it
/// until the terminal event. The accumulator only ever grows.
#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    request: ChatRequest,
    accumulated: String,
    chunks: usize,
}

impl ChatSession {
    pub fn new(request: ChatRequest) -> Self {
        Self::with_id(Uuid::new_v4(), request)
    }

    pub fn with_id(id: Uuid, request: ChatRequest) -> Self {
        Self {
            id,
            request,
            accumulated: String::new(),
            chunks: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    /// Response text accumulated so far
    pub fn text(&self) -> &str {
        &self.accumulated
    }

    /// Number of chunks applied so far
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Append the next fragment and return the full text
    pub fn append(&mut self, fragment: &str) -> &str {
        self.accumulated.push_str(fragment);
        self.chunks += 1;
        &self.accumulated
    }
}
