//! # PeerShare
//!
//! Browser-to-browser file sharing: a rendezvous server that pairs two
//! anonymous peers through a short-lived token, and a chunked transfer
//! engine that moves files once their direct channel is up.
//!
//! ## Layers
//!
//! - `peershare-transport`: WebSocket byte pipe for signaling
//! - `peershare-protocol`: signaling messages and binary transfer frames
//! - `peershare-rendezvous`: token registry and exactly-once pairing
//! - `peershare-transfer`: file transfer engine over a data channel
//! - this crate: the signaling server, the per-connection state
//!   machine, and a signaling client
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use peershare::prelude::*;
//!
//! # async fn start() -> Result<(), PeerShareError> {
//! let server = PeerShareServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

#![allow(async_fn_in_trait)]

mod client;
mod config;
mod error;
mod handler;
mod server;
mod session;

pub use client::{Negotiator, PeerClient, SignalingClient};
pub use config::{BIND_ADDR_VAR, IDLE_TIMEOUT_VAR, ServerConfig};
pub use error::PeerShareError;
pub use server::{PeerShareServer, PeerShareServerBuilder};
pub use session::{SessionState, SignalingSession};

/// Everything needed to run a server or drive a peer.
pub mod prelude {
    pub use crate::{
        Negotiator, PeerClient, PeerShareError, PeerShareServer,
        PeerShareServerBuilder, ServerConfig, SessionState, SignalingClient,
        SignalingSession,
    };
    pub use peershare_protocol::{
        Codec, Frame, HostToken, JsonCodec, RejectReason, SignalMessage,
        SignalRequest,
    };
    pub use peershare_rendezvous::{PeerEvent, RendezvousDirectory, RendezvousError};
    pub use peershare_transfer::{
        ChannelEvent, DataChannel, Direction, DownloadedFile, OutgoingFile,
        TransferConfig, TransferEngine, TransferError, TransferHandle,
        TransferId, TransferSnapshot, TransferState, TransferUpdate,
    };
    pub use peershare_transport::ConnectionId;
}
