//! Client session management
//!
//! Drives one connection through handshake, relay and teardown:
//! `Connecting -> AwaitingUsername -> Active -> Terminating -> Closed`.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::watch;

use crate::client::{Connection, Registry};
use crate::protocol::{chat_line, joined_notice, left_notice, normalize_line};
use crate::utils::shutdown_requested;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport accepted, nothing read yet
    Connecting,
    /// Waiting for the first line, which names the user
    AwaitingUsername,
    /// Registered and relaying lines
    Active,
    /// Releasing the connection and leaving the registry
    Terminating,
    /// Terminal
    Closed,
}

/// Per-connection controller.
pub struct Session {
    connection: Arc<Connection>,
    registry: Arc<Registry>,
    shutdown: watch::Receiver<bool>,
    welcome_prompt: Option<String>,
    max_line_length: Option<usize>,
    username: Option<String>,
    state: SessionState,
}

impl Session {
    pub fn new(
        connection: Arc<Connection>,
        registry: Arc<Registry>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            connection,
            registry,
            shutdown,
            welcome_prompt: None,
            max_line_length: None,
            username: None,
            state: SessionState::Connecting,
        }
    }

    /// Line written to the client before its username is read.
    pub fn with_welcome_prompt(mut self, prompt: Option<String>) -> Self {
        self.welcome_prompt = prompt;
        self
    }

    /// Longest accepted line in bytes, not counting the `\n` (a `\r` before
    /// it does count). A client that sends more without a newline is
    /// disconnected.
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = Some(max);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The username, once the handshake has completed.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Runs the session to completion over `reader`, the inbound half of the
    /// connection. Returns once the session is `Closed`.
    ///
    /// End of stream, read errors, a closed connection and server shutdown
    /// all end the session the same way.
    pub async fn run<R>(&mut self, mut reader: R)
    where
        R: AsyncBufRead + Unpin,
    {
        let id = self.connection.id();
        let mut buf = String::new();
        self.state = SessionState::AwaitingUsername;

        if let Some(prompt) = &self.welcome_prompt {
            if let Err(e) = self.connection.send(prompt).await {
                debug!("Could not send prompt to connection {}: {}", id, e);
            }
        }

        let limit = self.max_line_length;

        match next_line(&mut reader, &mut buf, limit, &self.connection, &mut self.shutdown).await {
            Some(username) => {
                // The username is fixed from here on.
                self.username = Some(username.clone());
                self.state = SessionState::Active;

                self.registry.add(self.connection.clone()).await;
                match self.connection.peer() {
                    Some(peer) => info!("{} joined from {} (connection {})", username, peer, id),
                    None => info!("{} joined (connection {})", username, id),
                }
                self.registry
                    .broadcast(&joined_notice(&username), Some(id))
                    .await;

                while let Some(line) =
                    next_line(&mut reader, &mut buf, limit, &self.connection, &mut self.shutdown)
                        .await
                {
                    debug!("Relaying line from {} (connection {})", username, id);
                    self.registry
                        .broadcast(&chat_line(&username, &line), Some(id))
                        .await;
                }
            }
            None => debug!("Connection {} closed before sending a username", id),
        }

        self.close().await;
    }

    /// Releases the connection, deregisters and, if the user had joined,
    /// announces the departure. A no-op once the session is closed.
    pub async fn close(&mut self) {
        if matches!(self.state, SessionState::Terminating | SessionState::Closed) {
            return;
        }
        self.state = SessionState::Terminating;

        release(&self.connection, &self.registry, self.username.as_deref()).await;

        self.state = SessionState::Closed;
    }
}

impl Drop for Session {
    /// A session dropped mid-flight (its task aborted) still leaves cleanly.
    fn drop(&mut self) {
        let username = match self.state {
            SessionState::Closed => return,
            // The leave notice may already be partly out; never send it twice.
            SessionState::Terminating => None,
            _ => self.username.take(),
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let connection = self.connection.clone();
        let registry = self.registry.clone();
        handle.spawn(async move {
            release(&connection, &registry, username.as_deref()).await;
        });
    }
}

async fn release(connection: &Arc<Connection>, registry: &Registry, username: Option<&str>) {
    let id = connection.id();

    connection.close().await;
    registry.remove(id).await;

    if let Some(username) = username {
        info!("{} left (connection {})", username, id);
        registry.broadcast(&left_notice(username), Some(id)).await;
    }
}

/// Reads the next line, or `None` once the session should end.
async fn next_line<R>(
    reader: &mut R,
    buf: &mut String,
    max_line_length: Option<usize>,
    connection: &Connection,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    // One byte past the limit tells an over-long line from one that just fits.
    let cap = max_line_length.map_or(u64::MAX, |max| (max as u64).saturating_add(1));
    let mut limited = (&mut *reader).take(cap);

    let result = tokio::select! {
        result = limited.read_line(buf) => result,
        _ = connection.closed() => return None,
        _ = shutdown_requested(shutdown) => return None,
    };

    match result {
        Ok(0) => None,
        Ok(n) if max_line_length.is_some_and(|max| n > max) && !buf.ends_with('\n') => {
            warn!("Line too long on connection {}, disconnecting", connection.id());
            None
        }
        Ok(_) => Some(normalize_line(buf).to_string()),
        Err(e) => {
            debug!("Read failed on connection {}: {}", connection.id(), e);
            None
        }
    }
}
