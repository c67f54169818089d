//! Configuration loading

pub mod settings;

pub use settings::{
    BackendAuth, BackendConfig, LoggingConfig, ProtocolType, RelayConfig, ServerConfig, Settings,
};
