//! Unit tests for configuration module

use clipcode_relay::config::{ProtocolType, Settings};
use std::io::Write;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_default_settings() {
    let settings = Settings::default();

    assert_eq!(settings.server.port, 7878);
    assert_eq!(settings.backend.name, "ollama");
    assert_eq!(settings.backend.protocol, ProtocolType::Ollama);
    assert_eq!(settings.relay.channel_capacity, 64);
    assert_eq!(settings.logging.format, "json");
    assert_eq!(settings.bind_address(), "127.0.0.1:7878");
}

#[test]
fn test_settings_validation_valid() {
    assert_ok!(Settings::default().validate());
}

#[test]
fn test_settings_validation_invalid_port() {
    let mut settings = Settings::default();
    settings.server.port = 0;
    assert_err!(settings.validate());
}

#[test]
fn test_settings_validation_empty_backend_name() {
    let mut settings = Settings::default();
    settings.backend.name = "  ".to_string();
    assert_err!(settings.validate());
}

#[test]
fn test_settings_validation_bad_url_scheme() {
    let mut settings = Settings::default();
    settings.backend.base_url = "ws://localhost:11434".to_string();
    assert_err!(settings.validate());

    settings.backend.base_url = String::new();
    assert_err!(settings.validate());
}

#[test]
fn test_settings_validation_zero_capacity() {
    let mut settings = Settings::default();
    settings.relay.channel_capacity = 0;
    assert_err!(settings.validate());
}

#[test]
fn test_load_from_yaml_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    writeln!(
        file,
        "server:\n  port: 9100\nbackend:\n  name: lab-vllm\n  protocol: openai\n  base_url: http://10.0.0.5:8000/v1\nlogging:\n  format: pretty\n"
    )
    .unwrap();

    let settings = Settings::load_from_path(file.path()).unwrap();

    assert_eq!(settings.server.port, 9100);
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.backend.name, "lab-vllm");
    assert_eq!(settings.backend.protocol, ProtocolType::OpenAI);
    assert_eq!(settings.backend.base_url, "http://10.0.0.5:8000/v1");
    assert_eq!(settings.backend.connect_timeout_ms, 5000);
    assert_eq!(settings.logging.format, "pretty");
    assert_eq!(settings.relay.channel_capacity, 64);
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::load_from_path(dir.path().join("absent.yaml")).unwrap();
    assert_eq!(settings.backend.base_url, "http://127.0.0.1:11434");
}

#[test]
fn test_invalid_file_is_rejected() {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    writeln!(file, "server:\n  port: 0\n").unwrap();

    assert!(Settings::load_from_path(file.path()).is_err());
}

#[test]
fn test_settings_yaml_shape() {
    let yaml = serde_yaml::to_string(&Settings::default()).unwrap();
    assert!(yaml.contains("protocol: ollama"));
    assert!(yaml.contains("channel_capacity: 64"));
}
