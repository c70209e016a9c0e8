//! Error types
//!
//! Defines the error taxonomy of the chat relay.

use std::fmt;
use std::io;

/// General chat relay error
#[derive(Debug)]
pub enum ChatError {
    /// Transport read/write failure
    IoError(io::Error),
    /// The listening endpoint could not be acquired
    Bind { addr: String, source: io::Error },
    /// Configuration could not be loaded or failed validation
    Config(config::ConfigError),
    /// Write attempted on a connection that has already been closed
    ConnectionClosed,
    /// A recipient did not accept a line within the configured write timeout
    WriteTimeout,
    /// `Server::start` was called more than once
    AlreadyStarted,
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::IoError(e) => write!(f, "I/O error: {}", e),
            ChatError::Bind { addr, source } => write!(f, "Failed to bind to {}: {}", addr, source),
            ChatError::Config(e) => write!(f, "Configuration error: {}", e),
            ChatError::ConnectionClosed => write!(f, "Connection closed"),
            ChatError::WriteTimeout => write!(f, "Timed out writing to connection"),
            ChatError::AlreadyStarted => write!(f, "Server already started"),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChatError::IoError(e) => Some(e),
            ChatError::Bind { source, .. } => Some(source),
            ChatError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ChatError {
    fn from(error: io::Error) -> Self {
        ChatError::IoError(error)
    }
}

impl From<config::ConfigError> for ChatError {
    fn from(error: config::ConfigError) -> Self {
        ChatError::Config(error)
    }
}
