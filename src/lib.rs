//! Chat relay
//!
//! A line-based chat server: each client names itself with its first line,
//! and every later line is relayed to all other connected clients.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod utils;

pub use error::ChatError;
pub use server::{ChatConfig, Server};
