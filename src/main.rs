//! Main entry point for the ClipCode relay

use clipcode_relay::{api, backend, config::LoggingConfig, config::Settings, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    init_tracing(&settings.logging);

    info!("Starting ClipCode relay");
    info!(
        server = %settings.bind_address(),
        backend = %settings.backend.name,
        protocol = %settings.backend.protocol,
        base_url = %settings.backend.base_url,
        "Loaded configuration"
    );

    let backend = backend::create_backend(&settings.backend)?;
    let addr = settings.bind_address();
    let app_state = Arc::new(AppState::new(settings, backend));

    // Report backend reachability without delaying startup
    {
        let backend = app_state.backend.clone();
        tokio::spawn(async move {
            if backend.health_check().await {
                info!(backend = %backend.name(), "Backend reachable");
            } else {
                warn!(backend = %backend.name(), "Backend not reachable yet; panels will see an empty model list");
            }
        });
    }

    let app = api::routes::create_router(app_state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
