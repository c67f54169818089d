//! Panel conversations from activation to completion

use crate::support::{ollama_ndjson, ScriptedBackend};
use clipcode_relay::backend::{create_backend, ChatBackend};
use clipcode_relay::config::BackendConfig;
use clipcode_relay::error::RelayErrorKind;
use clipcode_relay::panel::PanelSession;
use clipcode_relay::protocol::{HostMessage, UiMessage};
use clipcode_relay::registry::ModelRegistry;
use clipcode_relay::relay::{ChatRelay, ChatRequest};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn panel_with(backend: Arc<dyn ChatBackend>) -> (PanelSession, mpsc::Receiver<HostMessage>) {
    let (tx, rx) = mpsc::channel(64);
    let panel = PanelSession::new(
        ChatRelay::new(backend.clone()),
        Arc::new(ModelRegistry::new(backend)),
        tx,
    );
    (panel, rx)
}

fn response(text: &str) -> HostMessage {
    HostMessage::ChatResponse {
        text: text.to_string(),
    }
}

/// Receive until `ChatComplete` or `ChatError`, inclusive
async fn until_terminal(rx: &mut mpsc::Receiver<HostMessage>) -> Vec<HostMessage> {
    let mut seen = Vec::new();
    loop {
        let message = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for the panel")
            .expect("panel channel closed");
        let terminal = matches!(
            message,
            HostMessage::ChatComplete | HostMessage::ChatError { .. }
        );
        seen.push(message);
        if terminal {
            return seen;
        }
    }
}

#[tokio::test]
async fn test_activation_announces_models() {
    let backend = Arc::new(ScriptedBackend::streaming(&[]).with_models(&["llama3", "codellama"]));
    let (panel, mut rx) = panel_with(backend.clone());

    assert!(panel.activate().await.unwrap());

    assert_eq!(
        rx.recv().await,
        Some(HostMessage::ModelsList {
            models: vec!["llama3".to_string(), "codellama".to_string()],
        })
    );
    assert_eq!(backend.list_calls(), 1);
}

#[tokio::test]
async fn test_activation_with_broken_backend_stays_quiet() {
    let backend = Arc::new(ScriptedBackend::streaming(&[]).with_broken_model_list("refused"));
    let (panel, mut rx) = panel_with(backend);

    assert!(!panel.activate().await.unwrap());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_chat_frame_streams_to_completion() {
    let backend = Arc::new(ScriptedBackend::streaming(&["He", "llo!"]));
    let (mut panel, mut rx) = panel_with(backend.clone());

    panel
        .handle_frame(r#"{"command":"chat","text":"hello","model":"x"}"#)
        .await;

    assert_eq!(
        until_terminal(&mut rx).await,
        vec![response("He"), response("Hello!"), HostMessage::ChatComplete]
    );
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "x");
    assert_eq!(requests[0].messages[0].content, "hello");
}

#[tokio::test]
async fn test_failed_chat_reports_error_kind() {
    let backend = Arc::new(ScriptedBackend::streaming(&["x"]).refusing("connection refused"));
    let (mut panel, mut rx) = panel_with(backend);

    panel
        .handle(UiMessage::Chat {
            text: "hi".to_string(),
            model: "x".to_string(),
        })
        .await;

    match until_terminal(&mut rx).await.as_slice() {
        [HostMessage::ChatError { kind, message }] => {
            assert_eq!(*kind, RelayErrorKind::BackendUnavailable);
            assert!(message.contains("connection refused"));
        }
        other => panic!("unexpected messages: {:?}", other),
    }
}

#[tokio::test]
async fn test_interrupted_chat_keeps_partials() {
    let backend = Arc::new(ScriptedBackend::streaming(&["one", " two"]).then_fail("peer reset"));
    let (mut panel, mut rx) = panel_with(backend);

    panel.submit(ChatRequest::new("count", "x"));

    let messages = until_terminal(&mut rx).await;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], response("one"));
    assert_eq!(messages[1], response("one two"));
    assert!(matches!(
        messages[2],
        HostMessage::ChatError {
            kind: RelayErrorKind::StreamInterrupted,
            ..
        }
    ));
    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
}

#[tokio::test]
async fn test_new_chat_supersedes_previous() {
    let backend = Arc::new(
        ScriptedBackend::streaming(&["a", "b", "c"]).with_delay(Duration::from_millis(50)),
    );
    let (mut panel, mut rx) = panel_with(backend.clone());

    let first = panel.submit(ChatRequest::new("first", "x"));
    let second = panel.submit(ChatRequest::new("second", "x"));
    assert_ne!(first, second);
    assert_eq!(panel.in_flight(), Some(second));

    assert_eq!(
        until_terminal(&mut rx).await,
        vec![response("a"), response("ab"), response("abc"), HostMessage::ChatComplete]
    );
    assert!(timeout(Duration::from_millis(200), rx.recv()).await.is_err());
}

#[tokio::test]
async fn test_superseded_stream_never_follows_its_successor() {
    let backend = Arc::new(
        ScriptedBackend::streaming(&["a", "b", "c", "d"])
            .with_delay(Duration::from_millis(20))
            .echoing_prompt(),
    );
    let (mut panel, mut rx) = panel_with(backend);

    panel.submit(ChatRequest::new("first", "x"));
    assert_eq!(rx.recv().await, Some(response("first|a")));
    assert_eq!(rx.recv().await, Some(response("first|ab")));

    panel.submit(ChatRequest::new("second", "x"));
    let messages = until_terminal(&mut rx).await;

    let successor_start = messages
        .iter()
        .position(|m| matches!(m, HostMessage::ChatResponse { text } if text.starts_with("second|")))
        .expect("second request produced no response");
    for message in &messages[successor_start..] {
        if let HostMessage::ChatResponse { text } = message {
            assert!(text.starts_with("second|"), "stale response {:?}", text);
        }
    }
    assert_eq!(
        &messages[successor_start..],
        &[
            response("second|a"),
            response("second|ab"),
            response("second|abc"),
            response("second|abcd"),
            HostMessage::ChatComplete,
        ]
    );
    assert!(messages[..successor_start]
        .iter()
        .all(|m| !matches!(m, HostMessage::ChatComplete)));
    assert!(timeout(Duration::from_millis(200), rx.recv()).await.is_err());
}

#[tokio::test]
async fn test_chat_after_cancel_starts_clean() {
    let backend = Arc::new(
        ScriptedBackend::streaming(&["a", "b", "c"])
            .with_delay(Duration::from_millis(20))
            .echoing_prompt(),
    );
    let (mut panel, mut rx) = panel_with(backend);

    panel.submit(ChatRequest::new("first", "x"));
    assert_eq!(rx.recv().await, Some(response("first|a")));
    assert!(panel.cancel());

    panel.submit(ChatRequest::new("second", "x"));
    assert_eq!(
        until_terminal(&mut rx).await,
        vec![
            response("second|a"),
            response("second|ab"),
            response("second|abc"),
            HostMessage::ChatComplete,
        ]
    );
}

#[tokio::test]
async fn test_cancel_silences_the_stream() {
    let backend = Arc::new(
        ScriptedBackend::streaming(&["a", "b", "c"]).with_delay(Duration::from_millis(50)),
    );
    let (mut panel, mut rx) = panel_with(backend);

    panel.submit(ChatRequest::new("slow", "x"));
    assert_eq!(rx.recv().await, Some(response("a")));

    panel.handle_frame(r#"{"command":"cancel"}"#).await;
    assert_eq!(panel.in_flight(), None);
    assert!(timeout(Duration::from_millis(300), rx.recv()).await.is_err());
}

#[tokio::test]
async fn test_cancel_with_nothing_in_flight() {
    let (mut panel, mut rx) = panel_with(Arc::new(ScriptedBackend::streaming(&[])));

    assert!(!panel.cancel());
    panel.handle(UiMessage::Cancel).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_unknown_command_gets_protocol_error() {
    let (mut panel, mut rx) = panel_with(Arc::new(ScriptedBackend::streaming(&[])));

    panel.handle_frame(r#"{"command":"summon"}"#).await;

    match rx.recv().await {
        Some(HostMessage::ProtocolError { message }) => assert!(message.contains("summon")),
        other => panic!("unexpected message: {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_without_model_is_rejected() {
    let backend = Arc::new(ScriptedBackend::streaming(&["x"]));
    let (mut panel, mut rx) = panel_with(backend.clone());

    panel
        .handle_frame(r#"{"command":"chat","text":"hi","model":""}"#)
        .await;

    assert!(matches!(
        rx.recv().await,
        Some(HostMessage::ProtocolError { .. })
    ));
    assert!(backend.requests().is_empty());
    assert_eq!(panel.in_flight(), None);
}

#[tokio::test]
async fn test_reset_is_forwarded_without_touching_the_stream() {
    let backend = Arc::new(
        ScriptedBackend::streaming(&["a", "b"]).with_delay(Duration::from_millis(30)),
    );
    let (mut panel, mut rx) = panel_with(backend);

    panel.submit(ChatRequest::new("hi", "x"));
    panel.notify(HostMessage::Reset).await;

    let mut messages = vec![rx.recv().await.unwrap()];
    messages.extend(until_terminal(&mut rx).await);

    assert_eq!(
        messages,
        vec![HostMessage::Reset, response("a"), response("ab"), HostMessage::ChatComplete]
    );
}

#[tokio::test]
async fn test_panel_against_mock_ollama() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3:latest"}, {"name": "phi3:mini"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(ollama_ndjson(&["Sure", ", here", " it is."]), "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let config = BackendConfig {
        base_url: server.uri(),
        ..BackendConfig::default()
    };
    let (mut panel, mut rx) = panel_with(create_backend(&config).unwrap());

    assert!(panel.activate().await.unwrap());
    assert_eq!(
        rx.recv().await,
        Some(HostMessage::ModelsList {
            models: vec!["llama3:latest".to_string(), "phi3:mini".to_string()],
        })
    );

    panel
        .handle_frame(r#"{"command":"chat","text":"write it","model":"llama3:latest"}"#)
        .await;
    assert_eq!(
        until_terminal(&mut rx).await,
        vec![
            response("Sure"),
            response("Sure, here"),
            response("Sure, here it is."),
            HostMessage::ChatComplete,
        ]
    );
}
