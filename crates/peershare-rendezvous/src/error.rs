//! Error types for the rendezvous layer.

use peershare_protocol::{HostToken, RejectReason};
use peershare_transport::ConnectionId;

/// Errors returned by [`RendezvousDirectory`](crate::RendezvousDirectory).
///
/// All of these are soft: the signaling server turns them into a
/// `Rejected` message and keeps the connection open.
#[derive(Debug, thiserror::Error)]
pub enum RendezvousError {
    /// No host is registered under the token.
    #[error("no host registered for token {0}")]
    UnknownToken(HostToken),

    /// The host behind the token already has a partner.
    #[error("host {0} is already paired")]
    AlreadyPaired(HostToken),

    /// The host behind the token has no description yet.
    #[error("host {0} has no description yet")]
    NotReady(HostToken),

    /// The partner's slot is gone or no longer accepts events.
    #[error("partner {0} is unavailable")]
    PartnerUnavailable(ConnectionId),

    /// The session already registered an offer.
    #[error("session {0} is already hosting")]
    AlreadyHosting(ConnectionId),

    /// The session has no partner to relay to.
    #[error("session {0} is not paired")]
    NotPaired(ConnectionId),

    /// The operation does not fit the session's current role.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// The session's slot was never opened or has been closed.
    #[error("session {0} is closed")]
    SessionClosed(ConnectionId),
}

impl RendezvousError {
    /// Maps the error to the reason reported to the client.
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            Self::UnknownToken(_) => RejectReason::UnknownToken,
            Self::AlreadyPaired(_) => RejectReason::AlreadyPaired,
            Self::NotReady(_) => RejectReason::NotReady,
            Self::PartnerUnavailable(_) => RejectReason::PartnerUnavailable,
            Self::AlreadyHosting(_) => RejectReason::AlreadyHosting,
            Self::NotPaired(_) => RejectReason::NotPaired,
            Self::InvalidState(_) | Self::SessionClosed(_) => {
                RejectReason::InvalidState
            }
        }
    }
}
