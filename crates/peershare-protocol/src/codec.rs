//! Codec trait and implementations for signaling messages.
//!
//! The signaling handler only needs "turn a message into bytes and back";
//! which format does that is a [`Codec`] choice. [`JsonCodec`] is the one
//! browsers speak.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec value is shared by every
/// connection task of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use peershare_protocol::{Codec, JsonCodec, SignalMessage};
///
/// let codec = JsonCodec;
/// let msg = SignalMessage::AddIceCandidate {
///     ice_candidate: "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host".into(),
/// };
///
/// let bytes = codec.encode(&msg).unwrap();
/// let decoded: SignalMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{HostToken, SignalMessage};

    #[test]
    fn test_json_codec_decodes_browser_payload() {
        let raw = br#"{"$type":"connectionRequest","connectionId":"abc123"}"#;
        let msg: SignalMessage = JsonCodec.decode(raw).unwrap();
        assert_eq!(
            msg,
            SignalMessage::ConnectionRequest {
                connection_id: HostToken::new("abc123"),
            }
        );
    }

    #[test]
    fn test_json_codec_decode_garbage_is_decode_error() {
        let result: Result<SignalMessage, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
