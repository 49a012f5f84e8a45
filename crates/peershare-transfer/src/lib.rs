//! File transfer engine for PeerShare.
//!
//! Once two peers share a direct data channel, each side runs one
//! [`TransferEngine`]. Files are offered, accepted, and then streamed as
//! `FileChunk` frames, with the send loop pausing whenever the channel's
//! buffered amount reaches the high-water mark.
//!
//! # Key Types
//!
//! - [`TransferEngine`]: per-endpoint transfer table and send loop
//! - [`TransferHandle`]: runs an engine as an actor task
//! - [`DataChannel`] / [`ChannelEvent`]: the channel the engine drives
//! - [`OutgoingFile`]: a local file picked for sending
//! - [`TransferSnapshot`] / [`TransferUpdate`]: what observers see

mod channel;
mod config;
mod engine;
mod error;
mod handle;
mod transfer;

pub use channel::{ChannelEvent, DataChannel};
pub use config::TransferConfig;
pub use engine::TransferEngine;
pub use error::TransferError;
pub use handle::TransferHandle;
pub use transfer::{
    DEFAULT_MIME_TYPE, Direction, DownloadedFile, FileSource, OutgoingFile,
    TransferId, TransferSnapshot, TransferState, TransferUpdate,
};
