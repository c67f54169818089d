//! Chat relay: forwards one request to the backend and turns its fragment
//! stream into ordered cumulative-text events.

pub mod session;
pub mod tracker;

use async_stream::stream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backend::ChatBackend;
use crate::error::RelayError;

pub use session::{ChatRequest, ChatSession};
pub use tracker::{SessionGuard, SessionTracker};

/// Notification emitted by [`ChatRelay::submit`].
///
/// Completion has no event of its own: the stream simply ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Full response text so far, never a delta
    Partial(String),
    /// Terminal failure; nothing follows it
    Failed(RelayError),
}

pub type RelayStream = Pin<Box<dyn Stream<Item = RelayEvent> + Send>>;

/// Mediator between a request initiator and a streaming backend
#[derive(Clone)]
pub struct ChatRelay {
    backend: Arc<dyn ChatBackend>,
}

impl ChatRelay {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backend
    }

    /// Run one submission.
    ///
    /// The session is consumed; its accumulator lives exactly as long as the
    /// returned stream. Firing `cancel` drops the backend stream and ends the
    /// relay stream without any further event. Dropping the returned stream
    /// has the same effect on the backend connection.
    pub fn submit(&self, mut session: ChatSession, cancel: CancellationToken) -> RelayStream {
        let backend = self.backend.clone();

        Box::pin(stream! {
            let session_id = session.id();
            let model = session.request().model_id.clone();
            info!(session = %session_id, model = %model, backend = %backend.name(), "Submitting chat request");

            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                opened = backend.chat_stream(session.request().to_backend_request()) => Some(opened),
            };
            let mut chunks = match opened {
                None => {
                    debug!(session = %session_id, "Cancelled before the stream opened");
                    return;
                }
                Some(Ok(chunks)) => chunks,
                Some(Err(e)) => {
                    warn!(session = %session_id, model = %model, error = %e, "Backend request failed");
                    yield RelayEvent::Failed(RelayError::BackendUnavailable(e.to_string()));
                    return;
                }
            };

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = chunks.next() => Some(next),
                };

                match next {
                    None => {
                        info!(session = %session_id, chunks = session.chunks(), "Chat request cancelled");
                        return;
                    }
                    Some(Some(Ok(chunk))) => {
                        let text = session.append(&chunk.content).to_string();
                        trace!(session = %session_id, chunk = session.chunks(), len = text.len(), "Relaying partial");
                        yield RelayEvent::Partial(text);
                    }
                    Some(Some(Err(e))) => {
                        let error = if session.chunks() == 0 {
                            RelayError::BackendUnavailable(e.to_string())
                        } else {
                            RelayError::StreamInterrupted(e.to_string())
                        };
                        warn!(
                            session = %session_id,
                            chunks = session.chunks(),
                            error = %error,
                            "Chat stream failed"
                        );
                        yield RelayEvent::Failed(error);
                        return;
                    }
                    Some(None) => {
                        info!(
                            session = %session_id,
                            chunks = session.chunks(),
                            len = session.text().len(),
                            "Chat request complete"
                        );
                        return;
                    }
                }
            }
        })
    }
}
