//! HTTP route definitions

use crate::api::models::*;
use crate::api::{handlers, panel};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ClipCode Relay API",
        description = "Streams chat completions from a local model server to the ClipCode chat panel.",
        license(name = "MIT"),
    ),
    servers(
        (url = "http://127.0.0.1:7878", description = "Local relay")
    ),
    paths(
        handlers::health_check,
        handlers::list_models,
        handlers::chat,
        handlers::cancel_chat,
        handlers::reset,
        panel::panel_socket,
    ),
    components(schemas(
        ApiChatRequest,
        ModelInfo,
        ModelsResponse,
        BackendHealth,
        HealthResponse,
        CommandResponse,
        SuccessResponse,
        ErrorResponse,
    )),
    tags(
        (name = "Chat", description = "Streaming chat endpoints"),
        (name = "Models", description = "Model discovery"),
        (name = "Panel", description = "Chat panel channel"),
        (name = "Commands", description = "Host commands forwarded to panels"),
        (name = "Health", description = "Health and monitoring endpoints"),
    )
)]
pub struct ApiDoc;

/// Create the main application router
pub fn create_router(state: Arc<crate::AppState>) -> Router {
    let api_routes = Router::new()
        .route("/models", get(handlers::list_models))
        .route("/chat", post(handlers::chat))
        .route("/chat/:id", delete(handlers::cancel_chat))
        .route("/commands/reset", post(handlers::reset))
        .route("/panel", get(panel::panel_socket));

    // Panels are served from editor webviews with their own origin scheme
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check endpoint
        .route("/health", get(handlers::health_check))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // API routes under /v1 prefix
        .nest("/v1", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
