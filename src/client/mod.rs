//! Client management system
//!
//! Connections, the registry of joined connections, and the per-connection
//! session that ties them together.

pub mod connection;
pub mod registry;
pub mod session;

pub use connection::{Connection, ConnectionId};
pub use registry::Registry;
pub use session::{Session, SessionState};
