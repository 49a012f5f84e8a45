//! Wire protocol for PeerShare.
//!
//! Two independent formats live here:
//!
//! - **Signaling** ([`SignalMessage`]): the JSON messages a browser
//!   exchanges with the rendezvous server to find its peer and trade
//!   session descriptions. Serialized through the [`Codec`] trait
//!   ([`JsonCodec`] by default).
//! - **Transfer frames** ([`Frame`]): the little-endian binary frames
//!   two connected peers exchange over their direct channel to offer,
//!   accept, and stream files.
//!
//! ```text
//! browser ──JSON──▶ signaling server ──JSON──▶ browser
//! browser ◀════════ binary frames (direct) ═══════▶ browser
//! ```

mod codec;
mod error;
mod frame;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use frame::{Frame, FrameKind};
pub use types::{HostToken, RejectReason, SignalMessage, SignalRequest};
