//! API request and response models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::backend::ModelDescriptor;

/// Chat request for the streaming endpoint
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ApiChatRequest {
    /// The prompt to send
    pub prompt: String,

    /// Model identifier as reported by `/v1/models`
    pub model: String,
}

/// A model offered by the backend
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ModelInfo {
    pub name: String,

    /// RFC 3339 timestamp of the last modification, when the backend reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,

    /// Size on disk in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl From<ModelDescriptor> for ModelInfo {
    fn from(model: ModelDescriptor) -> Self {
        Self {
            name: model.name,
            modified_at: model.modified_at.map(|t| t.to_rfc3339()),
            size: model.size,
        }
    }
}

/// Models list response
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ModelsResponse {
    /// Backend order is preserved
    pub models: Vec<ModelInfo>,
}

/// Backend section of the health report
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct BackendHealth {
    pub name: String,
    pub protocol: String,
    pub reachable: bool,
}

/// Health check response
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: BackendHealth,
    /// Models known from the last successful listing
    pub models_known: usize,
    /// Streaming sessions currently in flight over HTTP
    pub active_sessions: usize,
}

/// Result of broadcasting a host command
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CommandResponse {
    pub command: String,
    /// Number of panels the command was delivered to
    pub panels: usize,
}

/// Generic success response
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
