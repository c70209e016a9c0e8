//! Utility functions
//!
//! Logging setup and shutdown signalling shared by the server and client.

pub mod logging;
pub mod shutdown;

pub use logging::setup_logging;
pub use shutdown::shutdown_requested;
