//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the optional configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/clipcode.yaml";

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "CLIPCODE_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7878
}

/// Wire protocol spoken by the model server
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    /// Native Ollama API with NDJSON streaming
    #[default]
    Ollama,
    /// OpenAI compatible API with SSE streaming
    OpenAI,
}

impl std::fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolType::Ollama => write!(f, "ollama"),
            ProtocolType::OpenAI => write!(f, "openai"),
        }
    }
}

/// Authentication for the model server
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BackendAuth {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Name of an environment variable holding the key; wins over `api_key`
    #[serde(default)]
    pub token_env: Option<String>,
}

impl BackendAuth {
    /// Resolve the bearer token, if any
    pub fn resolve_token(&self) -> Option<String> {
        match &self.token_env {
            Some(var) => std::env::var(var).ok().filter(|t| !t.is_empty()),
            None => self.api_key.clone().filter(|t| !t.is_empty()),
        }
    }
}

/// Model server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_name")]
    pub name: String,

    #[serde(default)]
    pub protocol: ProtocolType,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Upper bound on a whole request including the streamed body; 0 disables it
    #[serde(default)]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub auth: BackendAuth,
}

fn default_backend_name() -> String {
    "ollama".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

/// Relay configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Capacity of each panel's outbound message queue
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    64
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load settings from the default file location and environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load settings from a specific configuration file path.
    ///
    /// The file is optional; YAML is assumed unless the extension says TOML.
    /// Environment variables prefixed with `CLIPCODE__` override both.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let format = if path.extension().map_or(false, |ext| ext == "toml") {
            FileFormat::Toml
        } else {
            FileFormat::Yaml
        };

        let mut config_builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("backend.name", default_backend_name())?
            .set_default("backend.protocol", "ollama")?
            .set_default("backend.base_url", default_base_url())?
            .set_default("backend.connect_timeout_ms", default_connect_timeout() as i64)?
            .set_default("backend.request_timeout_ms", 0)?
            .set_default("relay.channel_capacity", default_channel_capacity() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?;

        if path.exists() {
            config_builder = config_builder.add_source(File::from(path).format(format));
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("CLIPCODE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = config_builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }

        if self.backend.name.trim().is_empty() {
            return Err(invalid("Backend name cannot be empty"));
        }

        let url = self.backend.base_url.trim();
        if url.is_empty() {
            return Err(invalid("Backend base_url cannot be empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(&format!(
                "Backend base_url '{}' must use http or https",
                url
            )));
        }

        if self.relay.channel_capacity == 0 {
            return Err(invalid("Relay channel_capacity must be at least 1"));
        }

        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn invalid(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            backend: BackendConfig::default(),
            relay: RelayConfig {
                channel_capacity: default_channel_capacity(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: default_backend_name(),
            protocol: ProtocolType::default(),
            base_url: default_base_url(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: 0,
            auth: BackendAuth::default(),
        }
    }
}
