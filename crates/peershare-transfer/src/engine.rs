//! The per-endpoint transfer engine.
//!
//! # How frames flow
//!
//! ```text
//!  sender                                 receiver
//!  offer_files() ── FileOffer ──────────▶ (Ready, surfaced to observers)
//!  (Active)      ◀───────── FileAccept ── accept_file()
//!  pump() ────────── FileChunk × n ─────▶ write at offset
//!  (Completed)                            (Completed) → download_file()
//! ```
//!
//! The engine is driven from one task: every method takes `&mut self`,
//! so the send loop can never run twice at once. It suspends only while
//! reading the next chunk from a source.

use std::collections::HashMap;
use std::io::SeekFrom;

use peershare_protocol::Frame;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;

use crate::transfer::{FileTransfer, Payload};
use crate::{
    ChannelEvent, DataChannel, Direction, DownloadedFile, OutgoingFile,
    TransferConfig, TransferError, TransferId, TransferSnapshot, TransferState,
    TransferUpdate,
};

/// Tracks every transfer for one data channel and moves their bytes.
pub struct TransferEngine<C: DataChannel> {
    channel: C,
    config: TransferConfig,
    transfers: HashMap<TransferId, FileTransfer>,
    /// Insertion order of `transfers`, for the projection.
    order: Vec<TransferId>,
    observers: Vec<mpsc::UnboundedSender<TransferUpdate>>,
    closed: bool,
}

impl<C: DataChannel> TransferEngine<C> {
    /// Creates an engine with the default flow-control settings.
    pub fn new(channel: C) -> Self {
        Self::build(channel, TransferConfig::default())
    }

    /// Creates an engine with custom flow-control settings.
    ///
    /// # Errors
    /// [`TransferError::Config`] if `config` fails
    /// [`TransferConfig::validated`].
    pub fn with_config(channel: C, config: TransferConfig) -> Result<Self, TransferError> {
        Ok(Self::build(channel, config.validated()?))
    }

    /// Arms the channel's drain threshold. `config` must be valid.
    fn build(mut channel: C, config: TransferConfig) -> Self {
        channel.set_buffered_amount_low_threshold(config.low_water_mark);
        Self {
            channel,
            config,
            transfers: HashMap::new(),
            order: Vec::new(),
            observers: Vec::new(),
            closed: false,
        }
    }

    /// Registers an observer for transfer list changes.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TransferUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Returns the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Returns every transfer in the order it appeared.
    pub fn transfers(&self) -> Vec<TransferSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.transfers.get(id))
            .map(FileTransfer::snapshot)
            .collect()
    }

    /// Returns one transfer, if known.
    pub fn transfer(&self, id: &TransferId) -> Option<TransferSnapshot> {
        self.transfers.get(id).map(FileTransfer::snapshot)
    }

    // -- Channel events ---------------------------------------------------

    /// Feeds one channel event into the engine.
    pub async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Open => {
                tracing::info!("data channel open");
                self.pump().await;
            }
            ChannelEvent::Message(data) if self.closed => {
                tracing::debug!(len = data.len(), "frame after close dropped");
            }
            ChannelEvent::Message(data) => match Frame::decode(&data) {
                Ok(frame) => self.handle_frame(frame).await,
                Err(e) => {
                    tracing::warn!(error = %e, len = data.len(), "dropping malformed frame");
                }
            },
            ChannelEvent::BufferedAmountLow => self.pump().await,
            ChannelEvent::Close => self.clear(),
        }
    }

    async fn handle_frame(&mut self, frame: Frame) {
        match frame {
            Frame::FileOffer {
                id,
                name,
                length,
                mime_type,
            } => self.on_offer(TransferId::new(id), name, mime_type, length),
            Frame::FileAccept { id } => self.on_accept(TransferId::new(id)).await,
            Frame::FileChunk { id, offset, bytes } => {
                self.on_chunk(&TransferId::new(id), offset, &bytes)
            }
        }
    }

    fn on_offer(&mut self, id: TransferId, name: String, mime_type: String, length: u32) {
        if self.transfers.contains_key(&id) {
            tracing::debug!(transfer_id = %id, "duplicate offer ignored");
            return;
        }
        tracing::info!(transfer_id = %id, %name, length, "file offered by peer");
        let transfer = FileTransfer::incoming(id, name, mime_type, length);
        self.insert(transfer);
    }

    async fn on_accept(&mut self, id: TransferId) {
        let Some(transfer) = self.transfers.get_mut(&id) else {
            tracing::debug!(transfer_id = %id, "accept for unknown transfer");
            return;
        };
        if transfer.direction != Direction::Outgoing
            || !matches!(transfer.payload, Payload::Source(_))
            || !transfer.advance(TransferState::Active)
        {
            tracing::debug!(transfer_id = %id, state = %transfer.state, "accept ignored");
            return;
        }
        if transfer.length == 0 {
            transfer.advance(TransferState::Completed);
            tracing::info!(transfer_id = %id, "empty file sent");
        }
        let snapshot = transfer.snapshot();
        self.emit(TransferUpdate::Updated(snapshot));
        self.pump().await;
    }

    fn on_chunk(&mut self, id: &TransferId, offset: u32, bytes: &[u8]) {
        let Some(transfer) = self.transfers.get_mut(id) else {
            tracing::debug!(transfer_id = %id, "chunk for unknown transfer dropped");
            return;
        };
        if transfer.state != TransferState::Active {
            tracing::debug!(transfer_id = %id, state = %transfer.state, "chunk for inactive transfer dropped");
            return;
        }
        let Payload::Buffer(buffer) = &mut transfer.payload else {
            tracing::debug!(transfer_id = %id, "chunk for bufferless transfer dropped");
            return;
        };

        let start = offset as usize;
        let end = start + bytes.len();
        if end > buffer.len() {
            tracing::warn!(
                transfer_id = %id,
                offset,
                len = bytes.len(),
                length = transfer.length,
                "chunk past end of file dropped"
            );
            return;
        }
        if offset != transfer.offset {
            tracing::debug!(
                transfer_id = %id,
                expected = transfer.offset,
                offset,
                "non-contiguous chunk"
            );
        }

        buffer[start..end].copy_from_slice(bytes);
        // Bounded by the buffer, which is `length` bytes.
        transfer.offset = end as u32;
        if transfer.offset == transfer.length {
            transfer.advance(TransferState::Completed);
            tracing::info!(transfer_id = %id, length = transfer.length, "file received");
        }
        let snapshot = transfer.snapshot();
        self.emit(TransferUpdate::Updated(snapshot));
    }

    // -- User actions -----------------------------------------------------

    /// Offers each file to the peer, in order, and returns their ids.
    ///
    /// Every file offered before a failure stays offered.
    ///
    /// # Errors
    /// [`TransferError::ChannelClosed`] after a `Close` event, or the
    /// first send or encode failure.
    pub fn offer_files(
        &mut self,
        files: Vec<OutgoingFile>,
    ) -> Result<Vec<TransferId>, TransferError> {
        if self.closed {
            return Err(TransferError::ChannelClosed);
        }
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let id = TransferId::generate();
            let frame = Frame::FileOffer {
                id: id.as_str().to_owned(),
                name: file.name.clone(),
                length: file.length,
                mime_type: file.mime_type.clone(),
            };
            let data = frame.encode()?;
            tracing::info!(transfer_id = %id, name = %file.name, length = file.length, "offering file");
            self.send(data)?;
            self.insert(FileTransfer::outgoing(id.clone(), file));
            ids.push(id);
        }
        Ok(ids)
    }

    /// Accepts an incoming offer: allocates its buffer and asks the peer
    /// to start sending. Unknown or non-ready ids are ignored.
    ///
    /// # Errors
    /// [`TransferError::ChannelClosed`] after a `Close` event, or a failed
    /// `FileAccept` send.
    pub fn accept_file(&mut self, id: &TransferId) -> Result<(), TransferError> {
        if self.closed {
            return Err(TransferError::ChannelClosed);
        }
        let Some(transfer) = self.transfers.get_mut(id) else {
            tracing::debug!(transfer_id = %id, "accept_file: unknown transfer");
            return Ok(());
        };
        if transfer.direction != Direction::Incoming
            || !transfer.advance(TransferState::Active)
        {
            tracing::debug!(transfer_id = %id, state = %transfer.state, "accept_file ignored");
            return Ok(());
        }

        transfer.payload = Payload::Buffer(vec![0; transfer.length as usize]);
        if transfer.length == 0 {
            transfer.advance(TransferState::Completed);
        }
        let snapshot = transfer.snapshot();

        let data = Frame::FileAccept {
            id: id.as_str().to_owned(),
        }
        .encode()?;
        self.send(data)?;
        tracing::info!(transfer_id = %id, length = snapshot.length, "file accepted");
        self.emit(TransferUpdate::Updated(snapshot));
        Ok(())
    }

    /// Returns a completed incoming file. `None` for anything else.
    pub fn download_file(&self, id: &TransferId) -> Option<DownloadedFile> {
        let transfer = self.transfers.get(id)?;
        match (&transfer.payload, transfer.state) {
            (Payload::Buffer(bytes), TransferState::Completed) => Some(DownloadedFile {
                name: transfer.name.clone(),
                mime_type: transfer.mime_type.clone(),
                bytes: bytes.clone(),
            }),
            _ => None,
        }
    }

    // -- Send loop --------------------------------------------------------

    /// Sends chunks until the channel is saturated or nothing is active.
    ///
    /// Failures leave the transfer active so the next trigger retries the
    /// same chunk. A failed read skips that transfer for the rest of this
    /// pass; a failed send stops the pass.
    async fn pump(&mut self) {
        if self.closed {
            return;
        }
        let mut skipped = Vec::new();
        while self.channel.buffered_amount() < self.config.high_water_mark {
            let Some(id) = self.next_active(&skipped) else {
                break;
            };
            match self.send_next_chunk(&id).await {
                Ok(()) => {}
                Err(TransferError::Read(e)) => {
                    tracing::warn!(transfer_id = %id, error = %e, "chunk read failed");
                    skipped.push(id);
                }
                Err(e) => {
                    tracing::warn!(transfer_id = %id, error = %e, "chunk send failed");
                    break;
                }
            }
        }
    }

    /// The first active outgoing transfer not in `skipped`, in offer order.
    fn next_active(&self, skipped: &[TransferId]) -> Option<TransferId> {
        self.order
            .iter()
            .filter(|id| !skipped.contains(*id))
            .find(|id| {
                self.transfers.get(*id).is_some_and(|t| {
                    t.direction == Direction::Outgoing && t.state == TransferState::Active
                })
            })
            .cloned()
    }

    async fn send_next_chunk(&mut self, id: &TransferId) -> Result<(), TransferError> {
        let Some(transfer) = self.transfers.get_mut(id) else {
            return Ok(());
        };
        let Payload::Source(source) = &mut transfer.payload else {
            return Ok(());
        };

        let offset = transfer.offset;
        let chunk_size = u32::try_from(self.config.chunk_size).unwrap_or(u32::MAX);
        let len = (transfer.length - offset).min(chunk_size);
        let mut bytes = vec![0; len as usize];
        source.seek(SeekFrom::Start(u64::from(offset))).await?;
        source.read_exact(&mut bytes).await?;

        let data = Frame::FileChunk {
            id: id.as_str().to_owned(),
            offset,
            bytes,
        }
        .encode()?;
        self.channel
            .send(data)
            .map_err(|e| TransferError::Channel(e.to_string()))?;

        transfer.offset = offset + len;
        if transfer.offset == transfer.length {
            transfer.advance(TransferState::Completed);
            tracing::info!(transfer_id = %id, length = transfer.length, "file sent");
        }
        let snapshot = transfer.snapshot();
        self.emit(TransferUpdate::Updated(snapshot));
        Ok(())
    }

    // -- Internals --------------------------------------------------------

    fn send(&mut self, data: Vec<u8>) -> Result<(), TransferError> {
        self.channel
            .send(data)
            .map_err(|e| TransferError::Channel(e.to_string()))
    }

    fn insert(&mut self, transfer: FileTransfer) {
        let snapshot = transfer.snapshot();
        self.order.push(transfer.id.clone());
        self.transfers.insert(transfer.id.clone(), transfer);
        self.emit(TransferUpdate::Added(snapshot));
    }

    /// Drops every transfer. Partial downloads are lost.
    fn clear(&mut self) {
        tracing::info!(discarded = self.transfers.len(), "data channel closed");
        self.closed = true;
        self.transfers.clear();
        self.order.clear();
        self.emit(TransferUpdate::Cleared);
    }

    fn emit(&mut self, update: TransferUpdate) {
        self.observers.retain(|tx| tx.send(update.clone()).is_ok());
    }
}
