//! Server core functionality
//!
//! The accept loop, shutdown, and server configuration.

pub mod config;
pub mod core;

pub use config::ChatConfig;
pub use core::Server;
