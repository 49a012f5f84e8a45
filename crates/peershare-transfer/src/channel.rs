//! The data channel the engine writes frames to.

/// A reliable, ordered, message-oriented channel to the remote peer.
///
/// `send` only queues: the bytes count toward [`buffered_amount`] until
/// the channel has flushed them. When the buffered amount falls to the
/// threshold set with [`set_buffered_amount_low_threshold`], the owner
/// of the channel feeds [`ChannelEvent::BufferedAmountLow`] back into
/// the engine.
///
/// [`buffered_amount`]: DataChannel::buffered_amount
/// [`set_buffered_amount_low_threshold`]: DataChannel::set_buffered_amount_low_threshold
pub trait DataChannel: Send + 'static {
    /// The error type for sends.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Queues one binary message.
    fn send(&mut self, data: Vec<u8>) -> Result<(), Self::Error>;

    /// Bytes queued but not yet flushed.
    fn buffered_amount(&self) -> usize;

    /// Sets the level at which `BufferedAmountLow` fires.
    fn set_buffered_amount_low_threshold(&mut self, threshold: usize);
}

/// Something that happened on the data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel is ready to carry frames.
    Open,
    /// A binary message from the remote peer.
    Message(Vec<u8>),
    /// The buffered amount dropped to the low threshold.
    BufferedAmountLow,
    /// The channel is gone; in-flight transfers are abandoned.
    Close,
}
