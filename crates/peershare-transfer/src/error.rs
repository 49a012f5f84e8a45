//! Error types for the transfer engine.

use peershare_protocol::ProtocolError;

/// Errors produced while moving files over a data channel.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Reading from an outgoing file's source failed.
    #[error("failed to read file data: {0}")]
    Read(#[from] std::io::Error),

    /// The file does not fit the 32-bit length field of the wire format.
    #[error("file of {0} bytes exceeds the 4 GiB transfer limit")]
    FileTooLarge(u64),

    /// A frame could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The data channel refused a send.
    #[error("channel send failed: {0}")]
    Channel(String),

    /// The data channel has already closed.
    #[error("channel is closed")]
    ChannelClosed,

    /// A [`TransferConfig`](crate::TransferConfig) failed validation.
    #[error("invalid transfer config: {0}")]
    Config(String),

    /// The engine actor behind a [`TransferHandle`](crate::TransferHandle)
    /// has stopped.
    #[error("transfer engine is no longer running")]
    Unavailable,
}
