//! Rendezvous directory for PeerShare.
//!
//! Every signaling connection owns one slot in a shared session arena.
//! A host registers an offer and receives a [`HostToken`]; a joiner
//! presents that token and is paired with the host exactly once.
//!
//! # How it fits in the stack
//!
//! ```text
//! Signaling server (above)  ← one state machine per connection
//!     ↕
//! Rendezvous layer (this crate)  ← tokens, descriptions, candidates, partner links
//!     ↕
//! Protocol layer (below)  ← HostToken, SignalMessage
//! ```
//!
//! Partner links are connection ids, not references: when one side is
//! torn down the other side's link simply stops resolving.
//!
//! [`HostToken`]: peershare_protocol::HostToken

mod directory;
mod error;
mod session;

pub use directory::RendezvousDirectory;
pub use error::RendezvousError;
pub use session::{ClosedSession, PairingOffer, PeerEvent, PeerSender};
