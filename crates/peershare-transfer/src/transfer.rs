//! File transfer records and their observer-facing projections.

use std::fmt;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncSeek};

use crate::TransferError;

/// MIME type used when the caller does not supply one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

// ---------------------------------------------------------------------------
// TransferId
// ---------------------------------------------------------------------------

/// Identifier of one file transfer, shared by both peers.
///
/// The sender picks it; the receiver adopts whatever string arrives in the
/// `FileOffer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(String);

impl TransferId {
    /// Wraps an id received from the remote peer.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id (32 lowercase hex chars).
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Direction / TransferState
// ---------------------------------------------------------------------------

/// Which way the bytes flow, from the local endpoint's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Lifecycle of a transfer.
///
/// ```text
/// Ready → Active → Completed
/// ```
///
/// - **Ready**: offered, waiting for the receiver to accept.
/// - **Active**: accepted; chunks are flowing.
/// - **Completed**: every byte has been sent or received.
///
/// States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferState {
    Ready,
    Active,
    Completed,
}

impl TransferState {
    /// Returns the next state, or `None` if already completed.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Ready => Some(Self::Active),
            Self::Active => Some(Self::Completed),
            Self::Completed => None,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Active => write!(f, "Active"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

// ---------------------------------------------------------------------------
// OutgoingFile
// ---------------------------------------------------------------------------

/// A readable, seekable byte source for an outgoing file.
pub trait FileSource: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> FileSource for T {}

/// A file the local user picked for sending.
pub struct OutgoingFile {
    pub(crate) name: String,
    pub(crate) mime_type: String,
    pub(crate) length: u32,
    pub(crate) source: Box<dyn FileSource>,
}

impl OutgoingFile {
    /// Wraps an arbitrary source of `length` bytes.
    ///
    /// # Errors
    /// [`TransferError::FileTooLarge`] if `length` exceeds `u32::MAX`.
    pub fn new(
        name: impl Into<String>,
        source: impl FileSource + 'static,
        length: u64,
    ) -> Result<Self, TransferError> {
        let length =
            u32::try_from(length).map_err(|_| TransferError::FileTooLarge(length))?;
        Ok(Self {
            name: name.into(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            length,
            source: Box::new(source),
        })
    }

    /// Sends an in-memory buffer.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<Self, TransferError> {
        let bytes = bytes.into();
        let length = bytes.len() as u64;
        Self::new(name, std::io::Cursor::new(bytes), length)
    }

    /// Opens a file on disk. The display name is the path's file name.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(name, file, length)
    }

    /// Overrides the MIME type announced in the offer.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl fmt::Debug for OutgoingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// FileTransfer
// ---------------------------------------------------------------------------

/// Where a transfer's bytes live.
pub(crate) enum Payload {
    /// Outgoing: read chunk by chunk.
    Source(Box<dyn FileSource>),
    /// Incoming and accepted: pre-sized to the advertised length.
    Buffer(Vec<u8>),
    /// Incoming, not yet accepted.
    Pending,
}

/// One transfer as the engine tracks it.
pub(crate) struct FileTransfer {
    pub(crate) id: TransferId,
    pub(crate) direction: Direction,
    pub(crate) state: TransferState,
    pub(crate) name: String,
    pub(crate) mime_type: String,
    pub(crate) length: u32,
    /// Bytes sent (outgoing) or the end of the last chunk written (incoming).
    pub(crate) offset: u32,
    pub(crate) payload: Payload,
}

impl FileTransfer {
    pub(crate) fn outgoing(id: TransferId, file: OutgoingFile) -> Self {
        Self {
            id,
            direction: Direction::Outgoing,
            state: TransferState::Ready,
            name: file.name,
            mime_type: file.mime_type,
            length: file.length,
            offset: 0,
            payload: Payload::Source(file.source),
        }
    }

    pub(crate) fn incoming(
        id: TransferId,
        name: String,
        mime_type: String,
        length: u32,
    ) -> Self {
        Self {
            id,
            direction: Direction::Incoming,
            state: TransferState::Ready,
            name,
            mime_type,
            length,
            offset: 0,
            payload: Payload::Pending,
        }
    }

    /// Moves to `target` if it is the next state. Returns whether it moved.
    pub(crate) fn advance(&mut self, target: TransferState) -> bool {
        if self.state.next() == Some(target) {
            self.state = target;
            true
        } else {
            false
        }
    }

    pub(crate) fn snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            id: self.id.clone(),
            direction: self.direction,
            state: self.state,
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            length: self.length,
            offset: self.offset,
        }
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// A read-only view of a transfer, for UIs and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSnapshot {
    pub id: TransferId,
    pub direction: Direction,
    pub state: TransferState,
    pub name: String,
    pub mime_type: String,
    pub length: u32,
    pub offset: u32,
}

/// A change to the transfer list, pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferUpdate {
    /// A transfer appeared (local offer or remote offer).
    Added(TransferSnapshot),
    /// A transfer changed state or offset.
    Updated(TransferSnapshot),
    /// The channel closed and every transfer was discarded.
    Cleared,
}

/// A fully received file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}
