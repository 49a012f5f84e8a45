//! Per-connection handler: decode, drive the state machine, reply.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Open the connection's slot in the rendezvous directory
//!   2. Loop: wait for a client message, a peer event, or the idle timeout
//!   3. Feed it to the `SignalingSession`; send back whatever it returns
//!   4. On exit, close the slot (unregistering any hosted token)

use std::sync::Arc;

use peershare_protocol::{Codec, ProtocolError, SignalMessage};
use peershare_rendezvous::RendezvousDirectory;
use peershare_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::mpsc;

use crate::PeerShareError;
use crate::server::ServerState;
use crate::session::SignalingSession;

/// Closes the connection's directory slot.
///
/// [`release`](Self::release) closes it before the handler returns. If
/// the handler unwinds first, `Drop` spawns the close instead.
struct SlotGuard {
    conn_id: ConnectionId,
    directory: Arc<RendezvousDirectory>,
    released: bool,
}

impl SlotGuard {
    async fn release(mut self) {
        self.released = true;
        close_slot(&self.directory, self.conn_id).await;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let conn_id = self.conn_id;
        let directory = Arc::clone(&self.directory);
        tokio::spawn(async move {
            close_slot(&directory, conn_id).await;
        });
    }
}

async fn close_slot(directory: &RendezvousDirectory, conn_id: ConnectionId) {
    if let Some(closed) = directory.close(conn_id).await {
        if let Some(token) = closed.token {
            tracing::debug!(%conn_id, %token, "hosted token released");
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<Conn, C>(
    conn: Conn,
    state: Arc<ServerState<C>>,
) -> Result<(), PeerShareError>
where
    Conn: Connection<Error = TransportError>,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::info!(%conn_id, "session opened");

    let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();
    state.directory.open(conn_id, peer_tx).await;
    let guard = SlotGuard {
        conn_id,
        directory: Arc::clone(&state.directory),
        released: false,
    };
    let mut session = SignalingSession::new(conn_id, Arc::clone(&state.directory));

    let result: Result<(), PeerShareError> = loop {
        // Client messages and peer events share one loop, so session
        // state is only touched from this task.
        let reply = tokio::select! {
            received = tokio::time::timeout(state.idle_timeout, conn.recv()) => {
                let data = match received {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break Ok(());
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break Err(e.into());
                    }
                    Err(_) => {
                        tracing::info!(%conn_id, "connection idle, closing");
                        let _ = conn.close().await;
                        break Ok(());
                    }
                };

                let msg: SignalMessage = match state.codec.decode(&data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "malformed signaling message");
                        let _ = conn.close().await;
                        break Err(e.into());
                    }
                };
                session.handle_message(msg).await
            }
            Some(event) = peer_rx.recv() => session.handle_peer_event(event),
        };

        if let Some(reply) = reply {
            if let Err(e) = send_message(&conn, &state.codec, &reply).await {
                tracing::debug!(%conn_id, error = %e, "reply send failed");
                break Err(e);
            }
        }
    };

    guard.release().await;
    tracing::info!(%conn_id, state = %session.state(), "session closed");
    result
}

/// Encodes `msg` and sends it as a text frame.
async fn send_message(
    conn: &impl Connection<Error = TransportError>,
    codec: &impl Codec,
    msg: &SignalMessage,
) -> Result<(), PeerShareError> {
    let bytes = codec.encode(msg)?;
    let text = std::str::from_utf8(&bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
    conn.send_text(text).await?;
    Ok(())
}
