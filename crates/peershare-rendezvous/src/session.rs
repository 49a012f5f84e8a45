//! Session slot types: what the directory remembers per connection.

use peershare_protocol::{HostToken, SignalMessage};
use peershare_transport::ConnectionId;
use tokio::sync::mpsc;

/// An event the directory pushes into a session's inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A joiner picked this session's offer.
    Paired { partner: ConnectionId },
    /// A message the partner asked to forward.
    Relay(SignalMessage),
}

/// Sending half of a session's inbound event queue.
pub type PeerSender = mpsc::UnboundedSender<PeerEvent>;

/// What a successful pairing hands to the joiner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingOffer {
    /// The host session, now the joiner's partner.
    pub host: ConnectionId,
    /// The host's description.
    pub description: String,
    /// The host's candidates at the instant of pairing. Candidates the
    /// host adds later are never sent to this joiner.
    pub candidates: Vec<String>,
}

/// What [`RendezvousDirectory::close`](crate::RendezvousDirectory::close)
/// removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedSession {
    /// The token the session was hosting under, now unregistered.
    pub token: Option<HostToken>,
    /// The partner, which is not notified.
    pub partner: Option<ConnectionId>,
}

/// One connection's entry in the session arena.
#[derive(Debug)]
pub(crate) struct SessionSlot {
    pub(crate) token: Option<HostToken>,
    pub(crate) description: Option<String>,
    pub(crate) candidates: Vec<String>,
    /// Set at most once, always together with the partner's own link.
    pub(crate) partner: Option<ConnectionId>,
    pub(crate) events: PeerSender,
}

impl SessionSlot {
    pub(crate) fn new(events: PeerSender) -> Self {
        Self {
            token: None,
            description: None,
            candidates: Vec::new(),
            partner: None,
            events,
        }
    }
}
