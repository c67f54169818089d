//! One connected chat panel: binds the panel protocol to the registry and relay

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{HostMessage, UiMessage};
use crate::registry::ModelRegistry;
use crate::relay::{ChatRelay, ChatRequest, ChatSession, RelayEvent, RelayStream};

struct InFlight {
    id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Host-side state of one panel connection.
///
/// Everything the panel receives goes through `outbound`, so messages reach
/// it in the order they were produced. At most one request is in flight; a
/// new `chat` supersedes the previous one.
pub struct PanelSession {
    relay: ChatRelay,
    registry: Arc<ModelRegistry>,
    outbound: mpsc::Sender<HostMessage>,
    in_flight: Option<InFlight>,
    /// Task of a cancelled request that may still be winding down
    retired: Option<JoinHandle<()>>,
}

impl PanelSession {
    pub fn new(
        relay: ChatRelay,
        registry: Arc<ModelRegistry>,
        outbound: mpsc::Sender<HostMessage>,
    ) -> Self {
        Self {
            relay,
            registry,
            outbound,
            in_flight: None,
            retired: None,
        }
    }

    /// Panel opened: start model discovery without waiting for it
    pub fn activate(&self) -> JoinHandle<bool> {
        self.registry.spawn_announce(self.outbound.clone())
    }

    /// Handle one raw text frame from the panel
    pub async fn handle_frame(&mut self, frame: &str) {
        match UiMessage::parse(frame) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                warn!(error = %e, "Rejected panel message");
                self.notify(HostMessage::ProtocolError {
                    message: e.to_string(),
                })
                .await;
            }
        }
    }

    /// Handle one decoded panel message
    pub async fn handle(&mut self, message: UiMessage) {
        match message {
            UiMessage::Chat { text, model } => {
                let request = ChatRequest::new(text, model);
                if let Err(e) = request.validate() {
                    self.notify(HostMessage::ProtocolError {
                        message: e.to_string(),
                    })
                    .await;
                    return;
                }
                self.submit(request);
            }
            UiMessage::Cancel => {
                if !self.cancel() {
                    debug!("Cancel requested with nothing in flight");
                }
            }
        }
    }

    /// Start a request, superseding any in flight; returns the new session id
    pub fn submit(&mut self, request: ChatRequest) -> Uuid {
        let predecessor = self.in_flight.take().map(|previous| {
            if !previous.task.is_finished() {
                info!(session = %previous.id, "Superseding in-flight request");
            }
            previous.cancel.cancel();
            previous.task
        });
        let predecessor = predecessor.or_else(|| self.retired.take());

        let session = ChatSession::new(request);
        let id = session.id();
        let cancel = CancellationToken::new();
        let events = self.relay.submit(session, cancel.clone());
        let task = tokio::spawn(forward(
            events,
            self.outbound.clone(),
            cancel.clone(),
            predecessor,
        ));

        self.in_flight = Some(InFlight { id, cancel, task });
        id
    }

    /// Cancel the in-flight request. Returns false if none was running.
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) if !in_flight.task.is_finished() => {
                info!(session = %in_flight.id, "Cancelling in-flight request");
                in_flight.cancel.cancel();
                self.retired = Some(in_flight.task);
                true
            }
            _ => false,
        }
    }

    /// Id of the request currently streaming, if any
    pub fn in_flight(&self) -> Option<Uuid> {
        self.in_flight
            .as_ref()
            .filter(|f| !f.task.is_finished())
            .map(|f| f.id)
    }

    /// Send a host-initiated message such as `reset`
    pub async fn notify(&self, message: HostMessage) {
        if self.outbound.send(message).await.is_err() {
            debug!("Panel outbound channel closed");
        }
    }

    /// Panel went away: stop whatever is streaming
    pub fn close(mut self) {
        self.cancel();
    }
}

/// Drive one relay stream into the panel's outbound queue.
///
/// Nothing is sent until the superseded request's task has exited, so a
/// late message from it can never follow this request's first message.
async fn forward(
    mut events: RelayStream,
    outbound: mpsc::Sender<HostMessage>,
    cancel: CancellationToken,
    predecessor: Option<JoinHandle<()>>,
) {
    if let Some(previous) = predecessor {
        let _ = previous.await;
    }

    while let Some(event) = events.next().await {
        let terminal = matches!(event, RelayEvent::Failed(_));
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = outbound.send(HostMessage::from(event)) => sent,
        };
        if sent.is_err() || terminal {
            return;
        }
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = outbound.send(HostMessage::ChatComplete) => {}
    }
}
