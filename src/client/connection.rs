//! Module `connection`
//!
//! Wraps the outbound half of one live client transport. The owning session
//! keeps the inbound half; everything else only ever writes through `send`.

use log::debug;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, watch};

use crate::error::ChatError;
use crate::utils::shutdown_requested;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identity, used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type LineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One live duplex line channel to a client.
///
/// `send` may be called concurrently from any number of broadcasting
/// sessions; writes are serialized so lines never interleave. After `close`,
/// or once server shutdown is signalled, every `send` fails with
/// [`ChatError::ConnectionClosed`].
pub struct Connection {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    writer: Mutex<Option<LineWriter>>,
    write_timeout: Option<Duration>,
    closed: watch::Sender<bool>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Connection {
    pub fn new<W>(writer: W, peer: Option<SocketAddr>, write_timeout: Option<Duration>) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (closed, _) = watch::channel(false);
        Self {
            id: ConnectionId::next(),
            peer,
            writer: Mutex::new(Some(Box::new(writer))),
            write_timeout,
            closed,
            shutdown: None,
        }
    }

    /// Abandons in-flight and future writes once `shutdown` flips to true.
    ///
    /// A broadcast stuck on a stalled peer holds the registry lock, so
    /// shutdown has to reach the write without going through the registry.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Writes `line` followed by a newline and flushes it.
    ///
    /// A write that fails or exceeds the write timeout marks the connection
    /// closed, which in turn ends the owning session's read loop.
    pub async fn send(&self, line: &str) -> Result<(), ChatError> {
        if self.is_closed() {
            return Err(ChatError::ConnectionClosed);
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ChatError::ConnectionClosed)?;

        let write = async {
            match self.write_timeout {
                Some(limit) => match tokio::time::timeout(limit, write_line(writer, line)).await {
                    Ok(result) => result.map_err(ChatError::from),
                    Err(_) => Err(ChatError::WriteTimeout),
                },
                None => write_line(writer, line).await.map_err(ChatError::from),
            }
        };

        let result = tokio::select! {
            biased;
            _ = self.closed() => Err(ChatError::ConnectionClosed),
            _ = self.shutdown_signalled() => Err(ChatError::ConnectionClosed),
            result = write => result,
        };
        drop(guard);

        if result.is_err() {
            self.closed.send_replace(true);
        }
        result
    }

    /// Closes the connection. Safe to call any number of times from any task.
    ///
    /// Wakes a session blocked in its read so it can terminate promptly.
    pub async fn close(&self) {
        // Signal first so an in-flight send gives up the writer lock.
        let was_closed = self.closed.send_replace(true);

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Error shutting down connection {}: {}", self.id, e);
            }
        }

        if !was_closed {
            debug!("Connection {} closed", self.id);
        }
    }

    /// Resolves once the connection has been closed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives in `self`, so `wait_for` can only end by matching.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    async fn shutdown_signalled(&self) {
        match &self.shutdown {
            Some(shutdown) => shutdown_requested(&mut shutdown.clone()).await,
            None => std::future::pending::<()>().await,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn write_line(writer: &mut LineWriter, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader, duplex};

    #[tokio::test]
    async fn test_send_writes_newline_terminated_line() {
        let (local, remote) = duplex(1024);
        let conn = Connection::new(local, None, None);

        conn.send("hello").await.unwrap();

        let mut reader = BufReader::new(remote);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "hello\n");
    }

    #[tokio::test]
    async fn test_send_after_close_fails_gracefully() {
        let (local, _remote) = duplex(1024);
        let conn = Connection::new(local, None, None);

        conn.close().await;
        conn.close().await;

        assert!(conn.is_closed());
        assert!(matches!(conn.send("late").await, Err(ChatError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_close_shuts_down_peer_stream() {
        let (local, remote) = duplex(1024);
        let conn = Connection::new(local, None, None);
        conn.close().await;

        let mut reader = BufReader::new(remote);
        let mut line = String::new();
        assert_eq!(reader.read_line(&mut line).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stalled_peer_times_out_and_closes() {
        // Nobody reads the remote end, so the tiny pipe fills up.
        let (local, _remote) = duplex(8);
        let conn = Connection::new(local, None, Some(Duration::from_millis(50)));

        let result = conn.send("this line does not fit in the pipe").await;
        assert!(matches!(result, Err(ChatError::WriteTimeout)));
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_aborts_write_to_stalled_peer() {
        // No write timeout and nobody reading: only shutdown can end the send.
        let (local, _remote) = duplex(8);
        let (tx, rx) = watch::channel(false);
        let conn = std::sync::Arc::new(Connection::new(local, None, None).with_shutdown(rx));

        let stalled = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.send("this line does not fit in the pipe").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!stalled.is_finished());

        tx.send_replace(true);
        let result = tokio::time::timeout(Duration::from_secs(1), stalled)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ChatError::ConnectionClosed)));
        assert!(conn.is_closed());

        // The writer lock was released, so closing does not hang either.
        tokio::time::timeout(Duration::from_secs(1), conn.close())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails_fast() {
        let (local, _remote) = duplex(1024);
        let (tx, rx) = watch::channel(false);
        let conn = Connection::new(local, None, None).with_shutdown(rx);

        conn.send("before").await.unwrap();
        tx.send_replace(true);
        assert!(matches!(conn.send("after").await, Err(ChatError::ConnectionClosed)));
    }

    #[test]
    fn test_peer_is_kept() {
        let (local, _) = duplex(8);
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let conn = Connection::new(local, Some(addr), None);
        assert_eq!(conn.peer(), Some(addr));
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let (local, _remote) = duplex(64);
        let conn = std::sync::Arc::new(Connection::new(local, None, None));

        let waiter = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.closed().await })
        };
        conn.close().await;

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _) = duplex(8);
        let (b, _) = duplex(8);
        let first = Connection::new(a, None, None);
        let second = Connection::new(b, None, None);
        assert_ne!(first.id(), second.id());
    }
}
