//! Unified error type for PeerShare.

use peershare_protocol::{ProtocolError, RejectReason, SignalRequest};
use peershare_rendezvous::RendezvousError;
use peershare_transfer::TransferError;
use peershare_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum PeerShareError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A rendezvous error (unknown token, already paired, ...).
    #[error(transparent)]
    Rendezvous(#[from] RendezvousError),

    /// A file transfer error.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The server refused a signaling request.
    #[error("{request} rejected: {reason:?}")]
    Rejected {
        request: SignalRequest,
        reason: RejectReason,
    },

    /// The local negotiator failed to produce or apply a description.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}
