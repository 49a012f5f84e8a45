//! The rendezvous directory: a shared arena of signaling sessions.
//!
//! # Concurrency
//!
//! Every connection task holds an `Arc<RendezvousDirectory>` and calls it
//! concurrently. All state sits behind one async mutex, and each public
//! method does its whole read-check-write under a single lock
//! acquisition. That is what makes [`pair`](RendezvousDirectory::pair)
//! exactly-once: the "does the host already have a partner?" check and
//! the linking of both sides happen in the same critical section.
//!
//! The lock is never held across an await point other than acquiring it,
//! and event delivery uses unbounded senders, which never block.

use std::collections::HashMap;

use peershare_protocol::{HostToken, SignalMessage};
use peershare_transport::ConnectionId;
use rand::Rng;
use tokio::sync::Mutex;

use crate::session::SessionSlot;
use crate::{ClosedSession, PairingOffer, PeerEvent, PeerSender, RendezvousError};

#[derive(Default)]
struct Arena {
    /// One slot per open signaling connection.
    slots: HashMap<ConnectionId, SessionSlot>,
    /// Index from host tokens to the hosting slot. Kept in sync with
    /// `SessionSlot::token`.
    tokens: HashMap<HostToken, ConnectionId>,
}

/// Registry of signaling sessions, host tokens, and partner links.
///
/// ## Lifecycle of a slot
///
/// ```text
/// open() ──→ register_offer() ──→ (pair() by a joiner) ──→ close()
///    │                                                      ▲
///    └──→ pair(token) as joiner ──→ relay() ────────────────┘
/// ```
#[derive(Default)]
pub struct RendezvousDirectory {
    inner: Mutex<Arena>,
}

impl RendezvousDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the slot for a freshly accepted connection.
    ///
    /// `events` is the connection's inbound queue; the directory uses it
    /// to deliver pairing notices and relayed messages.
    pub async fn open(&self, id: ConnectionId, events: PeerSender) {
        let mut arena = self.inner.lock().await;
        arena.slots.insert(id, SessionSlot::new(events));
        tracing::debug!(%id, "session slot opened");
    }

    /// Registers the session as a host with the given description and
    /// returns a fresh token.
    ///
    /// # Errors
    /// - [`RendezvousError::AlreadyHosting`]: the session already holds a token
    /// - [`RendezvousError::InvalidState`]: the session already joined someone
    /// - [`RendezvousError::SessionClosed`]: no slot for `id`
    pub async fn register_offer(
        &self,
        id: ConnectionId,
        description: String,
    ) -> Result<HostToken, RendezvousError> {
        let mut guard = self.inner.lock().await;
        let arena = &mut *guard;

        let slot = arena
            .slots
            .get_mut(&id)
            .ok_or(RendezvousError::SessionClosed(id))?;
        if slot.token.is_some() {
            return Err(RendezvousError::AlreadyHosting(id));
        }
        if slot.partner.is_some() {
            return Err(RendezvousError::InvalidState(
                "a paired session cannot host".into(),
            ));
        }

        let token = loop {
            let candidate = generate_token();
            if !arena.tokens.contains_key(&candidate) {
                break candidate;
            }
        };

        slot.description = Some(description);
        slot.token = Some(token.clone());
        arena.tokens.insert(token.clone(), id);

        tracing::info!(%id, %token, "offer registered");
        Ok(token)
    }

    /// Unregisters a token. Unknown tokens are ignored.
    pub async fn remove_offer(&self, token: &HostToken) {
        let mut guard = self.inner.lock().await;
        let arena = &mut *guard;

        if let Some(id) = arena.tokens.remove(token) {
            if let Some(slot) = arena.slots.get_mut(&id) {
                slot.token = None;
            }
            tracing::debug!(%id, %token, "offer removed");
        }
    }

    /// Returns the session hosting under `token`, if any.
    pub async fn lookup(&self, token: &HostToken) -> Option<ConnectionId> {
        self.inner.lock().await.tokens.get(token).copied()
    }

    /// Appends a candidate to the session's list. No dedup, no cap.
    ///
    /// # Errors
    /// [`RendezvousError::SessionClosed`] if the slot is gone.
    pub async fn add_candidate(
        &self,
        id: ConnectionId,
        candidate: String,
    ) -> Result<(), RendezvousError> {
        let mut arena = self.inner.lock().await;
        let slot = arena
            .slots
            .get_mut(&id)
            .ok_or(RendezvousError::SessionClosed(id))?;
        slot.candidates.push(candidate);
        Ok(())
    }

    /// Pairs `requester` with the host behind `token`.
    ///
    /// On success both slots point at each other, the host's queue
    /// receives [`PeerEvent::Paired`], and the requester gets the host's
    /// description plus a copy of the host's candidates as of now.
    ///
    /// Of any number of concurrent calls against one unpaired token,
    /// exactly one succeeds; the rest see `AlreadyPaired`.
    ///
    /// # Errors
    /// - [`RendezvousError::UnknownToken`]: nobody hosts under `token`
    /// - [`RendezvousError::AlreadyPaired`]: the host already has a partner
    /// - [`RendezvousError::NotReady`]: the host has no description
    /// - [`RendezvousError::InvalidState`]: self-pairing, or the requester
    ///   is hosting or paired itself
    /// - [`RendezvousError::SessionClosed`]: the requester has no slot
    pub async fn pair(
        &self,
        token: &HostToken,
        requester: ConnectionId,
    ) -> Result<PairingOffer, RendezvousError> {
        let mut guard = self.inner.lock().await;
        let arena = &mut *guard;

        let host_id = arena
            .tokens
            .get(token)
            .copied()
            .ok_or_else(|| RendezvousError::UnknownToken(token.clone()))?;
        if host_id == requester {
            return Err(RendezvousError::InvalidState(
                "a session cannot join its own offer".into(),
            ));
        }

        let host = arena
            .slots
            .get(&host_id)
            .ok_or_else(|| RendezvousError::UnknownToken(token.clone()))?;
        if host.partner.is_some() {
            return Err(RendezvousError::AlreadyPaired(token.clone()));
        }
        let description = host
            .description
            .clone()
            .ok_or_else(|| RendezvousError::NotReady(token.clone()))?;
        let candidates = host.candidates.clone();

        let joiner = arena
            .slots
            .get_mut(&requester)
            .ok_or(RendezvousError::SessionClosed(requester))?;
        if joiner.partner.is_some() || joiner.token.is_some() {
            return Err(RendezvousError::InvalidState(
                "only a fresh session can join".into(),
            ));
        }
        joiner.partner = Some(host_id);

        if let Some(host) = arena.slots.get_mut(&host_id) {
            host.partner = Some(requester);
            if host
                .events
                .send(PeerEvent::Paired { partner: requester })
                .is_err()
            {
                tracing::debug!(%host_id, "host queue closed before pairing notice");
            }
        }

        tracing::info!(
            host = %host_id,
            joiner = %requester,
            %token,
            candidates = candidates.len(),
            "sessions paired"
        );
        Ok(PairingOffer {
            host: host_id,
            description,
            candidates,
        })
    }

    /// Forwards `message` to the partner of `from`.
    ///
    /// # Errors
    /// - [`RendezvousError::NotPaired`]: `from` has no partner
    /// - [`RendezvousError::PartnerUnavailable`]: the partner's slot is
    ///   gone or its queue is closed
    /// - [`RendezvousError::SessionClosed`]: `from` has no slot
    pub async fn relay(
        &self,
        from: ConnectionId,
        message: SignalMessage,
    ) -> Result<(), RendezvousError> {
        let arena = self.inner.lock().await;

        let slot = arena
            .slots
            .get(&from)
            .ok_or(RendezvousError::SessionClosed(from))?;
        let partner = slot.partner.ok_or(RendezvousError::NotPaired(from))?;
        let target = arena
            .slots
            .get(&partner)
            .ok_or(RendezvousError::PartnerUnavailable(partner))?;

        target
            .events
            .send(PeerEvent::Relay(message))
            .map_err(|_| RendezvousError::PartnerUnavailable(partner))?;
        tracing::debug!(%from, to = %partner, "message relayed");
        Ok(())
    }

    /// Removes the session's slot and, if it was hosting, its token.
    ///
    /// The partner is not told; its link now resolves to
    /// `PartnerUnavailable`. Returns `None` if the slot was already gone.
    pub async fn close(&self, id: ConnectionId) -> Option<ClosedSession> {
        let mut guard = self.inner.lock().await;
        let arena = &mut *guard;

        let slot = arena.slots.remove(&id)?;
        if let Some(token) = &slot.token {
            arena.tokens.remove(token);
        }

        tracing::info!(
            %id,
            hosting = slot.token.is_some(),
            paired = slot.partner.is_some(),
            "session slot closed"
        );
        Some(ClosedSession {
            token: slot.token,
            partner: slot.partner,
        })
    }

    /// Returns the partner of `id`, if paired.
    pub async fn partner_of(&self, id: ConnectionId) -> Option<ConnectionId> {
        self.inner
            .lock()
            .await
            .slots
            .get(&id)
            .and_then(|slot| slot.partner)
    }

    /// Returns the number of open session slots.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.slots.len()
    }

    /// Returns `true` if no session slots are open.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.slots.is_empty()
    }

    /// Returns the number of registered host tokens.
    pub async fn offer_count(&self) -> usize {
        self.inner.lock().await.tokens.len()
    }
}

/// Generates a random 32-character hex token (128 bits of entropy).
fn generate_token() -> HostToken {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    HostToken::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    // -- Helpers ----------------------------------------------------------

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    /// Opens a slot and returns the receiving end of its event queue.
    async fn open(
        dir: &RendezvousDirectory,
        id: u64,
    ) -> mpsc::UnboundedReceiver<PeerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        dir.open(cid(id), tx).await;
        rx
    }

    // =====================================================================
    // register_offer() / lookup() / remove_offer()
    // =====================================================================

    #[tokio::test]
    async fn test_register_offer_token_resolves_to_host() {
        let dir = RendezvousDirectory::new();
        let _rx = open(&dir, 1).await;

        let token = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();

        assert_eq!(token.as_str().len(), 32);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(dir.lookup(&token).await, Some(cid(1)));
    }

    #[tokio::test]
    async fn test_register_offer_twice_is_rejected() {
        let dir = RendezvousDirectory::new();
        let _rx = open(&dir, 1).await;
        let first = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();

        let second = dir.register_offer(cid(1), "sdpB".into()).await;

        assert!(matches!(second, Err(RendezvousError::AlreadyHosting(id)) if id == cid(1)));
        // The original registration is untouched.
        assert_eq!(dir.lookup(&first).await, Some(cid(1)));
        assert_eq!(dir.offer_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_offer_unknown_session_is_closed() {
        let dir = RendezvousDirectory::new();
        let result = dir.register_offer(cid(9), "sdp".into()).await;
        assert!(matches!(result, Err(RendezvousError::SessionClosed(_))));
    }

    #[tokio::test]
    async fn test_register_offer_tokens_are_unique() {
        let dir = RendezvousDirectory::new();
        let _a = open(&dir, 1).await;
        let _b = open(&dir, 2).await;

        let t1 = dir.register_offer(cid(1), "a".into()).await.unwrap();
        let t2 = dir.register_offer(cid(2), "b".into()).await.unwrap();

        assert_ne!(t1, t2);
    }

    #[tokio::test]
    async fn test_remove_offer_is_idempotent() {
        let dir = RendezvousDirectory::new();
        let _rx = open(&dir, 1).await;
        let token = dir.register_offer(cid(1), "sdp".into()).await.unwrap();

        dir.remove_offer(&token).await;
        dir.remove_offer(&token).await;
        dir.remove_offer(&HostToken::new("never-issued")).await;

        assert_eq!(dir.lookup(&token).await, None);
        assert_eq!(dir.offer_count().await, 0);
    }

    // =====================================================================
    // pair()
    // =====================================================================

    #[tokio::test]
    async fn test_pair_links_both_sides_and_notifies_host() {
        let dir = RendezvousDirectory::new();
        let mut host_rx = open(&dir, 1).await;
        let _joiner_rx = open(&dir, 2).await;
        let token = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();

        let offer = dir.pair(&token, cid(2)).await.unwrap();

        assert_eq!(offer.host, cid(1));
        assert_eq!(offer.description, "sdpA");
        assert!(offer.candidates.is_empty());
        assert_eq!(dir.partner_of(cid(1)).await, Some(cid(2)));
        assert_eq!(dir.partner_of(cid(2)).await, Some(cid(1)));
        assert_eq!(
            host_rx.try_recv().unwrap(),
            PeerEvent::Paired { partner: cid(2) }
        );
    }

    #[tokio::test]
    async fn test_pair_unknown_token() {
        let dir = RendezvousDirectory::new();
        let _rx = open(&dir, 2).await;

        let result = dir.pair(&HostToken::new("nope"), cid(2)).await;

        assert!(matches!(result, Err(RendezvousError::UnknownToken(_))));
        assert_eq!(dir.partner_of(cid(2)).await, None);
    }

    #[tokio::test]
    async fn test_pair_second_joiner_gets_already_paired() {
        let dir = RendezvousDirectory::new();
        let _h = open(&dir, 1).await;
        let _j1 = open(&dir, 2).await;
        let _j2 = open(&dir, 3).await;
        let token = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();

        dir.pair(&token, cid(2)).await.unwrap();
        let result = dir.pair(&token, cid(3)).await;

        assert!(matches!(result, Err(RendezvousError::AlreadyPaired(_))));
        assert_eq!(dir.partner_of(cid(1)).await, Some(cid(2)));
        assert_eq!(dir.partner_of(cid(3)).await, None);
    }

    #[tokio::test]
    async fn test_pair_with_own_token_is_invalid() {
        let dir = RendezvousDirectory::new();
        let _h = open(&dir, 1).await;
        let token = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();

        let result = dir.pair(&token, cid(1)).await;

        assert!(matches!(result, Err(RendezvousError::InvalidState(_))));
        assert_eq!(dir.partner_of(cid(1)).await, None);
    }

    #[tokio::test]
    async fn test_pair_hosting_requester_is_invalid() {
        let dir = RendezvousDirectory::new();
        let _a = open(&dir, 1).await;
        let _b = open(&dir, 2).await;
        let token_a = dir.register_offer(cid(1), "a".into()).await.unwrap();
        dir.register_offer(cid(2), "b".into()).await.unwrap();

        let result = dir.pair(&token_a, cid(2)).await;

        assert!(matches!(result, Err(RendezvousError::InvalidState(_))));
        assert_eq!(dir.partner_of(cid(1)).await, None);
    }

    #[tokio::test]
    async fn test_pair_candidates_are_a_snapshot() {
        let dir = RendezvousDirectory::new();
        let _h = open(&dir, 1).await;
        let _j = open(&dir, 2).await;
        let token = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();
        dir.add_candidate(cid(1), "c1".into()).await.unwrap();
        dir.add_candidate(cid(1), "c1".into()).await.unwrap();

        let offer = dir.pair(&token, cid(2)).await.unwrap();
        dir.add_candidate(cid(1), "c2".into()).await.unwrap();

        // Duplicates are kept; the late candidate is not.
        assert_eq!(offer.candidates, vec!["c1".to_string(), "c1".to_string()]);
    }

    // =====================================================================
    // relay()
    // =====================================================================

    #[tokio::test]
    async fn test_relay_delivers_to_partner() {
        let dir = RendezvousDirectory::new();
        let mut host_rx = open(&dir, 1).await;
        let _j = open(&dir, 2).await;
        let token = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();
        dir.pair(&token, cid(2)).await.unwrap();
        let _paired = host_rx.try_recv().unwrap();

        let answer = SignalMessage::AnswerResponse {
            remote_description: "sdpB".into(),
        };
        dir.relay(cid(2), answer.clone()).await.unwrap();

        assert_eq!(host_rx.try_recv().unwrap(), PeerEvent::Relay(answer));
    }

    #[tokio::test]
    async fn test_relay_without_partner_is_not_paired() {
        let dir = RendezvousDirectory::new();
        let _rx = open(&dir, 1).await;

        let result = dir
            .relay(
                cid(1),
                SignalMessage::AnswerResponse {
                    remote_description: "x".into(),
                },
            )
            .await;

        assert!(matches!(result, Err(RendezvousError::NotPaired(_))));
    }

    #[tokio::test]
    async fn test_relay_after_partner_closed_is_partner_unavailable() {
        let dir = RendezvousDirectory::new();
        let _h = open(&dir, 1).await;
        let _j = open(&dir, 2).await;
        let token = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();
        dir.pair(&token, cid(2)).await.unwrap();

        dir.close(cid(1)).await;
        let result = dir
            .relay(
                cid(2),
                SignalMessage::AnswerResponse {
                    remote_description: "sdpB".into(),
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(RendezvousError::PartnerUnavailable(p)) if p == cid(1)
        ));
    }

    #[tokio::test]
    async fn test_relay_to_dropped_queue_is_partner_unavailable() {
        let dir = RendezvousDirectory::new();
        let host_rx = open(&dir, 1).await;
        let _j = open(&dir, 2).await;
        let token = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();
        dir.pair(&token, cid(2)).await.unwrap();
        drop(host_rx);

        let result = dir
            .relay(
                cid(2),
                SignalMessage::AnswerResponse {
                    remote_description: "sdpB".into(),
                },
            )
            .await;

        assert!(matches!(result, Err(RendezvousError::PartnerUnavailable(_))));
    }

    // =====================================================================
    // close()
    // =====================================================================

    #[tokio::test]
    async fn test_close_host_unregisters_token() {
        let dir = RendezvousDirectory::new();
        let _h = open(&dir, 1).await;
        let _j = open(&dir, 2).await;
        let token = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();

        let closed = dir.close(cid(1)).await.unwrap();

        assert_eq!(closed.token, Some(token.clone()));
        assert_eq!(dir.lookup(&token).await, None);
        assert!(matches!(
            dir.pair(&token, cid(2)).await,
            Err(RendezvousError::UnknownToken(_))
        ));
    }

    #[tokio::test]
    async fn test_close_leaves_partner_link_in_place() {
        let dir = RendezvousDirectory::new();
        let _h = open(&dir, 1).await;
        let _j = open(&dir, 2).await;
        let token = dir.register_offer(cid(1), "sdpA".into()).await.unwrap();
        dir.pair(&token, cid(2)).await.unwrap();

        let closed = dir.close(cid(2)).await.unwrap();

        assert_eq!(closed.partner, Some(cid(1)));
        assert_eq!(dir.partner_of(cid(1)).await, Some(cid(2)));
        assert_eq!(dir.len().await, 1);
    }

    #[tokio::test]
    async fn test_close_twice_returns_none() {
        let dir = RendezvousDirectory::new();
        let _rx = open(&dir, 1).await;

        assert!(dir.close(cid(1)).await.is_some());
        assert!(dir.close(cid(1)).await.is_none());
        assert!(dir.is_empty().await);
    }
}
