use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};

use crate::client::{Connection, Registry, Session};
use crate::error::ChatError;
use crate::server::config::ChatConfig;
use crate::utils::shutdown_requested;

/// Chat relay server: one listener, one registry, one task per connection.
pub struct Server {
    registry: Arc<Registry>,
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    config: Arc<ChatConfig>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl Server {
    /// Binds the listening endpoint. Failing here is the only fatal error.
    pub async fn bind(config: ChatConfig) -> Result<Self, ChatError> {
        let addr = config.listen_socket();

        let listener = TcpListener::bind(&addr).await.map_err(|source| ChatError::Bind {
            addr: addr.clone(),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        info!("Server bound to {}", local_addr);

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            registry: Arc::new(Registry::new()),
            listener: Mutex::new(Some(listener)),
            local_addr,
            config: Arc::new(config),
            running: AtomicBool::new(true),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Accepts connections until `stop` is called.
    ///
    /// Every connection gets its own task, so accepting never waits on a
    /// session. Can only be run once per server; returns at once if the
    /// server was already stopped.
    pub async fn start(&self) -> Result<(), ChatError> {
        let listener = match self.listener.lock().await.take() {
            Some(listener) => listener,
            // `stop` released the listener, possibly while we were waiting on the lock.
            None if !self.is_running() => return Ok(()),
            None => return Err(ChatError::AlreadyStarted),
        };
        let mut shutdown = self.shutdown.subscribe();

        info!("Starting chat relay on {}", self.local_addr);

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown_requested(&mut shutdown) => break,
            };

            match accepted {
                Ok((stream, addr)) => self.spawn_session(stream, addr),
                Err(_) if !self.is_running() => break,
                Err(e) => error!("Error accepting connection: {}", e),
            }
        }

        drop(listener);
        info!("Stopped accepting connections on {}", self.local_addr);
        Ok(())
    }

    /// Stops accepting and force-closes every joined connection. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.send_replace(true);

        // Only still present if `start` never ran.
        self.listener.lock().await.take();

        let connections = self.registry.snapshot().await;
        info!("Shutting down, closing {} connection(s)", connections.len());
        for connection in connections {
            connection.close().await;
        }
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        info!("Client connected: {}", addr);

        let (read_half, write_half) = stream.into_split();
        let connection = Arc::new(
            Connection::new(write_half, Some(addr), self.config.write_timeout())
                .with_shutdown(self.shutdown.subscribe()),
        );
        let mut session = Session::new(
            connection,
            Arc::clone(&self.registry),
            self.shutdown.subscribe(),
        )
        .with_welcome_prompt(self.config.welcome_prompt.clone())
        .with_max_line_length(self.config.max_line_length);

        // Spawn a task for each client so the accept loop doesn't block
        tokio::spawn(async move {
            session.run(BufReader::new(read_half)).await;
            info!("Client {} disconnected", addr);
        });
    }
}
