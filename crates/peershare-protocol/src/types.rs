//! Signaling message types.
//!
//! Every message a browser and the rendezvous server exchange is one
//! variant of [`SignalMessage`]. The JSON shape matches what the web
//! client sends: a `$type` discriminator plus camelCase fields, e.g.
//!
//! ```json
//! { "$type": "offerRequest", "localDescription": "{\"type\":\"offer\",...}" }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// HostToken
// ---------------------------------------------------------------------------

/// Opaque identifier handed to a host so a joiner can find it.
///
/// The server generates these (32 lowercase hex chars); clients echo them
/// back verbatim, so parsing accepts any string. Serialized as a plain
/// JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostToken(String);

impl HostToken {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// The client request a [`SignalMessage::Rejected`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalRequest {
    OfferRequest,
    ConnectionRequest,
    AnswerRequest,
}

impl fmt::Display for SignalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OfferRequest => write!(f, "offerRequest"),
            Self::ConnectionRequest => write!(f, "connectionRequest"),
            Self::AnswerRequest => write!(f, "answerRequest"),
        }
    }
}

/// Why a signaling request was refused.
///
/// Rejections are soft: the server answers and keeps the connection open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// No waiting host is registered under the token.
    UnknownToken,
    /// The host was already picked by another joiner.
    AlreadyPaired,
    /// The host has not published a description yet.
    NotReady,
    /// The partner's connection is gone; the relay had nowhere to go.
    PartnerUnavailable,
    /// This connection already registered an offer.
    AlreadyHosting,
    /// An answer was sent before the connection was paired.
    NotPaired,
    /// The request is not valid in the connection's current state.
    InvalidState,
}

// ---------------------------------------------------------------------------
// SignalMessage
// ---------------------------------------------------------------------------

/// One signaling message, in either direction.
///
/// Client → server: `OfferRequest`, `AddIceCandidate`, `ConnectionRequest`,
/// `AnswerRequest`. Server → client: `OfferResponse`, `ConnectionResponse`,
/// `AnswerResponse`, `Rejected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "$type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum SignalMessage {
    /// Client → Server: "Host a session with this offer description."
    OfferRequest { local_description: String },

    /// Server → Client: "Share this token with the peer who should join."
    OfferResponse { connection_id: HostToken },

    /// Client → Server: "Another reachability candidate for my session."
    /// Fire-and-forget; no response.
    AddIceCandidate { ice_candidate: String },

    /// Client → Server: "Pair me with the host behind this token."
    ConnectionRequest { connection_id: HostToken },

    /// Server → Client: the host's description plus the candidates the
    /// host had published at pairing time.
    ConnectionResponse {
        remote_description: String,
        #[serde(default)]
        ice_candidates: Vec<String>,
    },

    /// Client → Server: "Forward my answer to my partner."
    AnswerRequest { local_description: String },

    /// Server → Client: the partner's answer description.
    AnswerResponse { remote_description: String },

    /// Server → Client: a request was refused.
    Rejected {
        request: SignalRequest,
        reason: RejectReason,
    },
}

impl SignalMessage {
    /// Returns the `$type` tag of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OfferRequest { .. } => "offerRequest",
            Self::OfferResponse { .. } => "offerResponse",
            Self::AddIceCandidate { .. } => "addIceCandidate",
            Self::ConnectionRequest { .. } => "connectionRequest",
            Self::ConnectionResponse { .. } => "connectionResponse",
            Self::AnswerRequest { .. } => "answerRequest",
            Self::AnswerResponse { .. } => "answerResponse",
            Self::Rejected { .. } => "rejected",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
