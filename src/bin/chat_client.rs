//! Console chat client
//!
//! Sends stdin lines to the relay and prints whatever the relay sends back.
//! The first line typed is the username.

use log::error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use chat_relay::ChatConfig;
use chat_relay::utils::setup_logging;

#[tokio::main]
async fn main() {
    setup_logging();

    let config = match ChatConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let addr = config.listen_socket();

    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Error connecting to server {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    let (read_half, mut write_half) = stream.into_split();

    println!("Connected to the chat server at {}", addr);
    println!("Enter your username:");

    tokio::spawn(async move {
        let mut keyboard = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match keyboard.next_line().await {
                Ok(Some(line)) => {
                    let sent = write_half.write_all(format!("{}\n", line).as_bytes()).await;
                    if let Err(e) = sent {
                        error!("Error sending to server: {}", e);
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Error reading from keyboard: {}", e);
                    break;
                }
            }
        }
        // Closing our side is how we leave the chat.
        let _ = write_half.shutdown().await;
    });

    let mut server_lines = BufReader::new(read_half).lines();
    loop {
        match server_lines.next_line().await {
            Ok(Some(line)) => println!("{}", line),
            Ok(None) => break,
            Err(e) => {
                error!("Error reading from server: {}", e);
                break;
            }
        }
    }

    // stdin is read on a blocking thread that would otherwise keep us alive.
    std::process::exit(0);
}
