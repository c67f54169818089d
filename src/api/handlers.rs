//! HTTP request handlers

use async_stream::stream;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::api::models::{
    ApiChatRequest, BackendHealth, CommandResponse, HealthResponse, ModelInfo, ModelsResponse,
    SuccessResponse,
};
use crate::error::AppError;
use crate::protocol::HostMessage;
use crate::relay::{ChatRequest, ChatSession, RelayEvent};
use crate::AppState;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let reachable = state.backend.health_check().await;

    Json(HealthResponse {
        status: if reachable { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: BackendHealth {
            name: state.backend.name().to_string(),
            protocol: state.backend.protocol().to_string(),
            reachable,
        },
        models_known: state.registry.snapshot().len(),
        active_sessions: state.sessions.len(),
    })
}

/// List the backend's models
#[utoipa::path(
    get,
    path = "/v1/models",
    tag = "Models",
    responses(
        (status = 200, description = "Models in backend order", body = ModelsResponse),
        (status = 503, description = "The backend could not list its models", body = ErrorResponse)
    )
)]
pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ModelsResponse>, AppError> {
    let models = state.registry.fetch().await?;

    Ok(Json(ModelsResponse {
        models: models.into_iter().map(ModelInfo::from).collect(),
    }))
}

/// Stream a chat response as server-sent events
///
/// Emits one `session` event with the session id, then `partial` events with
/// the cumulative text, then either `failed` or `complete`.
#[utoipa::path(
    post,
    path = "/v1/chat",
    tag = "Chat",
    request_body = ApiChatRequest,
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ApiChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let request = ChatRequest::new(request.prompt, request.model);
    request.validate()?;

    let session = ChatSession::new(request);
    let id = session.id();
    info!(session = %id, model = %session.request().model_id, "Received chat request");

    let (cancel, guard) = state.sessions.register(id);
    let mut events = state.relay.submit(session, cancel.clone());

    let stream = stream! {
        let _guard = guard;
        yield Ok::<_, Infallible>(Event::default().event("session").data(id.to_string()));

        let mut failed = false;
        while let Some(event) = events.next().await {
            let sse = match event {
                RelayEvent::Partial(text) => Event::default()
                    .event("partial")
                    .data(json!({ "text": text }).to_string()),
                RelayEvent::Failed(error) => {
                    failed = true;
                    Event::default().event("failed").data(
                        json!({ "kind": error.kind(), "message": error.message() }).to_string(),
                    )
                }
            };
            yield Ok(sse);
        }

        if !failed && !cancel.is_cancelled() {
            yield Ok(Event::default().event("complete").data("{}"));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// Cancel an in-flight chat session
#[utoipa::path(
    delete,
    path = "/v1/chat/{id}",
    tag = "Chat",
    params(("id" = String, Path, description = "Session id from the `session` event")),
    responses(
        (status = 200, description = "Session cancelled", body = SuccessResponse),
        (status = 404, description = "No such session in flight", body = ErrorResponse)
    )
)]
pub async fn cancel_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.sessions.cancel(&id) {
        return Err(AppError::SessionNotFound(id.to_string()));
    }

    Ok(Json(SuccessResponse {
        success: true,
        message: format!("Session '{}' cancelled", id),
    }))
}

/// Tell every connected panel to clear its conversation
#[utoipa::path(
    post,
    path = "/v1/commands/reset",
    tag = "Commands",
    responses((status = 200, description = "Reset broadcast", body = CommandResponse))
)]
pub async fn reset(State(state): State<Arc<AppState>>) -> Json<CommandResponse> {
    // Sending fails only when no panel is subscribed.
    let panels = state.host_commands.send(HostMessage::Reset).unwrap_or(0);
    info!(panels, "Broadcast reset");

    Json(CommandResponse {
        command: "reset".to_string(),
        panels,
    })
}
