//! Messages exchanged with the chat panel, tagged by `command`

use serde::{Deserialize, Serialize};

use crate::error::{AppError, RelayErrorKind, Result};
use crate::relay::{ChatRequest, RelayEvent};

/// Panel to host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum UiMessage {
    /// Submit a prompt to a model
    Chat { text: String, model: String },
    /// Abort the in-flight request, if any
    Cancel,
}

impl UiMessage {
    /// The request carried by a `chat` message
    pub fn into_request(self) -> Option<ChatRequest> {
        match self {
            UiMessage::Chat { text, model } => Some(ChatRequest::new(text, model)),
            UiMessage::Cancel => None,
        }
    }

    /// Parse one text frame from the panel
    pub fn parse(frame: &str) -> Result<Self> {
        serde_json::from_str(frame)
            .map_err(|e| AppError::InvalidRequest(format!("unrecognised panel message: {}", e)))
    }
}

/// Host to panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum HostMessage {
    /// Model identifiers in backend order
    ModelsList { models: Vec<String> },
    /// Cumulative response text; the panel replaces what it shows
    ChatResponse { text: String },
    /// The request failed; no more responses follow for it
    ChatError { kind: RelayErrorKind, message: String },
    /// The response stream ended normally
    ChatComplete,
    /// Clear the conversation view
    Reset,
    /// The last panel message could not be understood
    ProtocolError { message: String },
}

impl HostMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"command":"protocolError","message":"serialization failed"}"#.to_string()
        })
    }
}

impl From<RelayEvent> for HostMessage {
    fn from(event: RelayEvent) -> Self {
        match event {
            RelayEvent::Partial(text) => HostMessage::ChatResponse { text },
            RelayEvent::Failed(error) => HostMessage::ChatError {
                kind: error.kind(),
                message: error.message().to_string(),
            },
        }
    }
}
