//! Model registry: discovers the backend's models once per panel activation

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, ModelDescriptor};
use crate::error::RelayError;
use crate::protocol::HostMessage;

/// Registry of the models offered by the configured backend
pub struct ModelRegistry {
    backend: Arc<dyn ChatBackend>,
    last_known: RwLock<Option<Vec<ModelDescriptor>>>,
}

impl ModelRegistry {
    /// Create a new registry; nothing is fetched until asked
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            last_known: RwLock::new(None),
        }
    }

    /// Issue one list call. No retries.
    ///
    /// On failure the error is logged and the last known list is left untouched.
    pub async fn fetch(&self) -> Result<Vec<ModelDescriptor>, RelayError> {
        match self.backend.list_models().await {
            Ok(models) => {
                info!(backend = %self.backend.name(), count = models.len(), "Model list loaded");
                *self.last_known.write() = Some(models.clone());
                Ok(models)
            }
            Err(e) => {
                warn!(backend = %self.backend.name(), error = %e, "Failed to list models");
                Err(RelayError::ModelListUnavailable(e.to_string()))
            }
        }
    }

    /// Models from the most recent successful fetch
    pub fn snapshot(&self) -> Vec<ModelDescriptor> {
        self.last_known.read().clone().unwrap_or_default()
    }

    /// Whether any fetch has succeeded yet
    pub fn has_loaded(&self) -> bool {
        self.last_known.read().is_some()
    }

    /// Fetch and deliver a single `modelsList` notification.
    ///
    /// Returns whether a notification was sent. A failed fetch sends nothing,
    /// leaving the panel with an empty selector.
    pub async fn announce(&self, outbound: &mpsc::Sender<HostMessage>) -> bool {
        let models = match self.fetch().await {
            Ok(models) => models,
            Err(_) => return false,
        };

        let message = HostMessage::ModelsList {
            models: models.into_iter().map(|m| m.name).collect(),
        };
        if outbound.send(message).await.is_err() {
            debug!("Panel closed before the model list arrived");
            return false;
        }
        true
    }

    /// Run [`announce`](Self::announce) on its own task
    pub fn spawn_announce(self: &Arc<Self>, outbound: mpsc::Sender<HostMessage>) -> JoinHandle<bool> {
        let registry = Arc::clone(self);
        tokio::spawn(async move { registry.announce(&outbound).await })
    }
}
