//! ClipCode Relay
//!
//! Relays chat prompts from the ClipCode editor panel to a locally running
//! model server (Ollama or any OpenAI compatible server) and streams the
//! cumulative response text back, one partial render at a time.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod panel;
pub mod protocol;
pub mod registry;
pub mod relay;

pub use error::{AppError, RelayError, Result};

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use backend::ChatBackend;
use protocol::HostMessage;
use registry::ModelRegistry;
use relay::{ChatRelay, SessionTracker};

/// Capacity of the host command broadcast; commands are rare and tiny
const HOST_COMMAND_CAPACITY: usize = 16;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<RwLock<config::Settings>>,
    pub backend: Arc<dyn ChatBackend>,
    pub registry: Arc<ModelRegistry>,
    pub relay: ChatRelay,
    pub sessions: SessionTracker,
    pub host_commands: broadcast::Sender<HostMessage>,
}

impl AppState {
    /// Wire the registry and relay to one backend
    pub fn new(settings: config::Settings, backend: Arc<dyn ChatBackend>) -> Self {
        let (host_commands, _) = broadcast::channel(HOST_COMMAND_CAPACITY);

        Self {
            settings: Arc::new(RwLock::new(settings)),
            registry: Arc::new(ModelRegistry::new(backend.clone())),
            relay: ChatRelay::new(backend.clone()),
            backend,
            sessions: SessionTracker::new(),
            host_commands,
        }
    }
}
