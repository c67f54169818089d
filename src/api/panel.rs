//! WebSocket transport for the chat panel

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::panel::PanelSession;
use crate::protocol::HostMessage;
use crate::AppState;

/// Upgrade to the panel channel
#[utoipa::path(
    get,
    path = "/v1/panel",
    tag = "Panel",
    responses((status = 101, description = "Switching to the panel WebSocket protocol"))
)]
pub async fn panel_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_panel(socket, state))
}

async fn run_panel(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut incoming) = socket.split();

    let capacity = state.settings.read().await.relay.channel_capacity;
    let (outbound, mut queue) = mpsc::channel::<HostMessage>(capacity);

    let writer = tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            if sink.send(Message::Text(message.to_json())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut host_commands = state.host_commands.subscribe();
    let mut panel = PanelSession::new(state.relay.clone(), state.registry.clone(), outbound);
    panel.activate();
    info!("Panel connected");

    loop {
        tokio::select! {
            frame = incoming.next() => match frame {
                Some(Ok(Message::Text(text))) => panel.handle_frame(&text).await,
                Some(Ok(Message::Binary(_))) => {
                    panel
                        .notify(HostMessage::ProtocolError {
                            message: "binary frames are not supported".to_string(),
                        })
                        .await;
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(error = %e, "Panel socket error");
                    break;
                }
            },
            command = host_commands.recv() => match command {
                Ok(message) => panel.notify(message).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Panel missed host commands");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    panel.close();
    writer.abort();
    info!("Panel disconnected");
}
