//! `PeerShareServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → rendezvous, with one
//! handler task per accepted connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use peershare_protocol::{Codec, JsonCodec};
use peershare_rendezvous::RendezvousDirectory;
use peershare_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{PeerShareError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) directory: Arc<RendezvousDirectory>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a signaling server.
///
/// # Example
///
/// ```rust,no_run
/// use peershare::prelude::*;
///
/// # async fn start() -> Result<(), PeerShareError> {
/// let server = PeerShareServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PeerShareServerBuilder {
    config: ServerConfig,
}

impl PeerShareServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a silent connection is kept open.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Binds the listener. Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<PeerShareServer<JsonCodec>, PeerShareError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            directory: Arc::new(RendezvousDirectory::new()),
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
        });

        Ok(PeerShareServer { transport, state })
    }
}

impl Default for PeerShareServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound signaling server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PeerShareServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl PeerShareServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PeerShareServerBuilder {
        PeerShareServerBuilder::new()
    }
}

impl<C: Codec> PeerShareServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the shared rendezvous directory.
    pub fn directory(&self) -> Arc<RendezvousDirectory> {
        Arc::clone(&self.state.directory)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(mut self) -> Result<(), PeerShareError> {
        tracing::info!(addr = ?self.local_addr().ok(), "PeerShare signaling server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
