//! Chat relay - Entry Point
//!
//! Runs the relay until Ctrl-C.

use log::{error, info};
use std::sync::Arc;

use chat_relay::utils::setup_logging;
use chat_relay::{ChatConfig, Server};

#[tokio::main]
async fn main() {
    setup_logging();

    info!("Launching chat relay...");

    let config = match ChatConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config).await {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("Server startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let runner = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.start().await })
    };

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
    }
    server.stop().await;

    match runner.await {
        Ok(Ok(())) => info!("Chat relay stopped"),
        Ok(Err(e)) => error!("Chat relay stopped with error: {}", e),
        Err(e) => error!("Accept loop task failed: {}", e),
    }
}
