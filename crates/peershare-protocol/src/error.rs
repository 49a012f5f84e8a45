//! Error types for the protocol layer.
//!
//! Covers both formats the crate speaks: JSON signaling messages and
//! binary transfer frames.

/// Errors that can occur while encoding or decoding protocol data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a signaling message failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Parsing a signaling message failed: malformed JSON, an unknown
    /// `$type`, or missing fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A well-formed signaling message arrived where another was expected.
    #[error("unexpected {0} message")]
    UnexpectedMessage(&'static str),

    /// A binary frame ended before the field being read was complete.
    #[error("frame truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// The frame discriminator byte is not a known frame type.
    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),

    /// A length-prefixed string in a frame is not valid UTF-8.
    #[error("frame string is not valid UTF-8")]
    InvalidUtf8,

    /// A string or byte field is too long for its 32-bit length prefix.
    #[error("frame field of {0} bytes exceeds the 32-bit length limit")]
    TooLarge(usize),
}
