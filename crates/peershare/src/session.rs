//! Per-connection signaling state machine.
//!
//! ```text
//! New ──offerRequest──▶ Hosting ──(joiner picks us)──▶ Paired
//!  │
//!  └──connectionRequest──▶ Joining ──pair ok──▶ Paired
//!                             └──pair failed──▶ New
//! ```
//!
//! The machine never touches the socket. It turns one inbound message or
//! peer event into at most one outbound message, and the connection
//! handler writes that out.

use std::fmt;
use std::sync::Arc;

use peershare_protocol::{HostToken, RejectReason, SignalMessage, SignalRequest};
use peershare_rendezvous::{PeerEvent, RendezvousDirectory};
use peershare_transport::ConnectionId;

/// Where a signaling session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, neither hosting nor joined.
    New,
    /// Registered an offer; waiting for a joiner.
    Hosting,
    /// A pairing request is in flight.
    Joining,
    /// Linked to a partner; answers can be relayed.
    Paired,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::Hosting => write!(f, "Hosting"),
            Self::Joining => write!(f, "Joining"),
            Self::Paired => write!(f, "Paired"),
        }
    }
}

/// Signaling state for one connection.
pub struct SignalingSession {
    id: ConnectionId,
    state: SessionState,
    token: Option<HostToken>,
    partner: Option<ConnectionId>,
    directory: Arc<RendezvousDirectory>,
}

impl SignalingSession {
    /// Creates a session in state `New`. The caller must already have
    /// opened the connection's slot in `directory`.
    pub fn new(id: ConnectionId, directory: Arc<RendezvousDirectory>) -> Self {
        Self {
            id,
            state: SessionState::New,
            token: None,
            partner: None,
            directory,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The token this session hosts under, once it has offered.
    pub fn token(&self) -> Option<&HostToken> {
        self.token.as_ref()
    }

    pub fn partner(&self) -> Option<ConnectionId> {
        self.partner
    }

    /// Applies a message from the client and returns the reply, if any.
    pub async fn handle_message(&mut self, msg: SignalMessage) -> Option<SignalMessage> {
        let conn_id = self.id;
        tracing::debug!(%conn_id, kind = msg.kind(), state = %self.state, "signaling message");

        match msg {
            SignalMessage::OfferRequest { local_description } => {
                Some(self.on_offer(local_description).await)
            }
            SignalMessage::AddIceCandidate { ice_candidate } => {
                if let Err(e) = self.directory.add_candidate(self.id, ice_candidate).await {
                    tracing::debug!(%conn_id, error = %e, "candidate dropped");
                }
                None
            }
            SignalMessage::ConnectionRequest { connection_id } => {
                Some(self.on_connect(connection_id).await)
            }
            SignalMessage::AnswerRequest { local_description } => {
                self.on_answer(local_description).await
            }
            SignalMessage::OfferResponse { .. }
            | SignalMessage::ConnectionResponse { .. }
            | SignalMessage::AnswerResponse { .. }
            | SignalMessage::Rejected { .. } => {
                tracing::debug!(%conn_id, kind = msg.kind(), "ignoring server-only message");
                None
            }
        }
    }

    /// Applies an event the directory pushed to this session.
    pub fn handle_peer_event(&mut self, event: PeerEvent) -> Option<SignalMessage> {
        let conn_id = self.id;
        match event {
            PeerEvent::Paired { partner } => {
                if self.state == SessionState::Hosting {
                    self.state = SessionState::Paired;
                    self.partner = Some(partner);
                    tracing::debug!(%conn_id, %partner, "host paired");
                } else {
                    tracing::debug!(%conn_id, state = %self.state, "unexpected pairing notice");
                }
                None
            }
            PeerEvent::Relay(msg) => Some(msg),
        }
    }

    async fn on_offer(&mut self, description: String) -> SignalMessage {
        if self.state != SessionState::New {
            let reason = if self.token.is_some() {
                RejectReason::AlreadyHosting
            } else {
                RejectReason::InvalidState
            };
            return rejected(SignalRequest::OfferRequest, reason);
        }

        match self.directory.register_offer(self.id, description).await {
            Ok(token) => {
                self.state = SessionState::Hosting;
                self.token = Some(token.clone());
                SignalMessage::OfferResponse {
                    connection_id: token,
                }
            }
            Err(e) => {
                tracing::debug!(conn_id = %self.id, error = %e, "offer rejected");
                rejected(SignalRequest::OfferRequest, e.reject_reason())
            }
        }
    }

    async fn on_connect(&mut self, token: HostToken) -> SignalMessage {
        if self.state != SessionState::New {
            return rejected(SignalRequest::ConnectionRequest, RejectReason::InvalidState);
        }

        self.state = SessionState::Joining;
        match self.directory.pair(&token, self.id).await {
            Ok(offer) => {
                self.state = SessionState::Paired;
                self.partner = Some(offer.host);
                SignalMessage::ConnectionResponse {
                    remote_description: offer.description,
                    ice_candidates: offer.candidates,
                }
            }
            Err(e) => {
                self.state = SessionState::New;
                tracing::debug!(conn_id = %self.id, %token, error = %e, "pairing rejected");
                rejected(SignalRequest::ConnectionRequest, e.reject_reason())
            }
        }
    }

    async fn on_answer(&mut self, description: String) -> Option<SignalMessage> {
        if self.state != SessionState::Paired {
            return Some(rejected(SignalRequest::AnswerRequest, RejectReason::NotPaired));
        }

        let answer = SignalMessage::AnswerResponse {
            remote_description: description,
        };
        match self.directory.relay(self.id, answer).await {
            Ok(()) => None,
            Err(e) => {
                tracing::debug!(conn_id = %self.id, error = %e, "answer not relayed");
                Some(rejected(SignalRequest::AnswerRequest, e.reject_reason()))
            }
        }
    }
}

fn rejected(request: SignalRequest, reason: RejectReason) -> SignalMessage {
    SignalMessage::Rejected { request, reason }
}

// =========================================================================
// Tests
// =========================================================================
