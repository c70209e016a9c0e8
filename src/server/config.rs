//! Server configuration
//!
//! Defaults, then an optional `config.toml`, then `CHAT_RELAY_*` environment
//! overrides.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Chat relay configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// IP address the listener binds to
    /// Environment: CHAT_RELAY_BIND_ADDRESS
    pub bind_address: String,

    /// Listening port (0 picks a free port)
    /// Environment: CHAT_RELAY_PORT
    pub port: u16,

    /// Line written to every new connection before its username is read
    #[serde(default)]
    pub welcome_prompt: Option<String>,

    /// Per-recipient write timeout in milliseconds, 0 disables it
    pub write_timeout_ms: u64,

    /// Longest line a client may send, in bytes
    pub max_line_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 1234,
            welcome_prompt: None,
            write_timeout_ms: 5000,
            max_line_length: 8192,
        }
    }
}

impl ChatConfig {
    /// Load configuration from `config.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from the given file stem (if present) with environment overrides
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let defaults = ChatConfig::default();

        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", defaults.port as i64)?
            .set_default("write_timeout_ms", defaults.write_timeout_ms as i64)?
            .set_default("max_line_length", defaults.max_line_length as i64)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("CHAT_RELAY").try_parsing(true))
            .build()?;

        let config: ChatConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if self.max_line_length == 0 {
            return Err(config::ConfigError::Message(
                "max_line_length must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Bind address and port as a socket address string
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Write timeout as Duration, `None` when disabled
    pub fn write_timeout(&self) -> Option<Duration> {
        match self.write_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
