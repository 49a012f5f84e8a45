//! Integration tests for the signaling server, handler, and client flow.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use peershare::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port; returns its address and directory.
async fn start_server() -> (String, Arc<RendezvousDirectory>) {
    start_server_with(PeerShareServer::builder()).await
}

async fn start_server_with(
    builder: PeerShareServerBuilder,
) -> (String, Arc<RendezvousDirectory>) {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let directory = server.directory();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, directory)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, msg: &SignalMessage) {
    let text = serde_json::to_string(msg).expect("encode");
    ws.send(Message::text(text)).await.expect("send");
}

/// Receives the next message, which must be a JSON text frame.
async fn recv(ws: &mut ClientWs) -> SignalMessage {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("reply within 2s")
        .expect("stream open")
        .expect("recv");
    match msg {
        Message::Text(text) => serde_json::from_str(&text).expect("decode"),
        other => panic!("expected text frame, got {other:?}"),
    }
}

/// Asserts that nothing arrives within a short window.
async fn assert_silent(ws: &mut ClientWs) {
    let next = tokio::time::timeout(Duration::from_millis(150), ws.next()).await;
    assert!(next.is_err(), "expected no message, got {next:?}");
}

/// Asserts that the server closes the socket.
async fn assert_closed(ws: &mut ClientWs) {
    let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("server should close within 2s");
    assert!(
        matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))),
        "expected close, got {next:?}"
    );
}

/// Polls until `check` holds, for up to one second.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 1s");
}

async fn host(ws: &mut ClientWs, description: &str) -> HostToken {
    send(
        ws,
        &SignalMessage::OfferRequest {
            local_description: description.into(),
        },
    )
    .await;
    match recv(ws).await {
        SignalMessage::OfferResponse { connection_id } => connection_id,
        other => panic!("expected OfferResponse, got {other:?}"),
    }
}

async fn join(ws: &mut ClientWs, token: &HostToken) -> SignalMessage {
    send(
        ws,
        &SignalMessage::ConnectionRequest {
            connection_id: token.clone(),
        },
    )
    .await;
    recv(ws).await
}

fn rejected(request: SignalRequest, reason: RejectReason) -> SignalMessage {
    SignalMessage::Rejected { request, reason }
}

// =========================================================================
// Offer / join
// =========================================================================

#[tokio::test]
async fn test_join_gets_description_and_no_late_candidates() {
    let (addr, _dir) = start_server().await;
    let mut host_ws = connect(&addr).await;
    let mut joiner_ws = connect(&addr).await;

    let token = host(&mut host_ws, "sdpA").await;
    let reply = join(&mut joiner_ws, &token).await;
    assert_eq!(
        reply,
        SignalMessage::ConnectionResponse {
            remote_description: "sdpA".into(),
            ice_candidates: vec![],
        }
    );

    send(
        &mut host_ws,
        &SignalMessage::AddIceCandidate {
            ice_candidate: "late".into(),
        },
    )
    .await;
    assert_silent(&mut joiner_ws).await;
}

#[tokio::test]
async fn test_join_includes_candidates_gathered_before_pairing() {
    let (addr, _dir) = start_server().await;
    let mut host_ws = connect(&addr).await;
    let mut joiner_ws = connect(&addr).await;

    let token = host(&mut host_ws, "sdpA").await;
    for candidate in ["c1", "c2"] {
        send(
            &mut host_ws,
            &SignalMessage::AddIceCandidate {
                ice_candidate: candidate.into(),
            },
        )
        .await;
    }
    // Candidates get no reply. The host's messages are handled in order,
    // so a reply to a later request means both candidates are stored.
    send(
        &mut host_ws,
        &SignalMessage::OfferRequest {
            local_description: "again".into(),
        },
    )
    .await;
    assert_eq!(
        recv(&mut host_ws).await,
        rejected(SignalRequest::OfferRequest, RejectReason::AlreadyHosting)
    );

    let reply = join(&mut joiner_ws, &token).await;
    assert_eq!(
        reply,
        SignalMessage::ConnectionResponse {
            remote_description: "sdpA".into(),
            ice_candidates: vec!["c1".into(), "c2".into()],
        }
    );
}

#[tokio::test]
async fn test_second_offer_is_rejected() {
    let (addr, dir) = start_server().await;
    let mut ws = connect(&addr).await;

    let token = host(&mut ws, "sdpA").await;
    send(
        &mut ws,
        &SignalMessage::OfferRequest {
            local_description: "sdpB".into(),
        },
    )
    .await;

    assert_eq!(
        recv(&mut ws).await,
        rejected(SignalRequest::OfferRequest, RejectReason::AlreadyHosting)
    );
    assert!(dir.lookup(&token).await.is_some());
    assert_eq!(dir.offer_count().await, 1);
}

#[tokio::test]
async fn test_unknown_token_is_rejected_and_connection_stays_open() {
    let (addr, _dir) = start_server().await;
    let mut ws = connect(&addr).await;

    let reply = join(&mut ws, &HostToken::new("does-not-exist")).await;
    assert_eq!(
        reply,
        rejected(SignalRequest::ConnectionRequest, RejectReason::UnknownToken)
    );

    // Back in New: the same connection can still host.
    let token = host(&mut ws, "sdpA").await;
    assert_eq!(token.as_str().len(), 32);
}

#[tokio::test]
async fn test_second_joiner_gets_already_paired() {
    let (addr, _dir) = start_server().await;
    let mut host_ws = connect(&addr).await;
    let mut first = connect(&addr).await;
    let mut second = connect(&addr).await;

    let token = host(&mut host_ws, "sdpA").await;
    assert!(matches!(
        join(&mut first, &token).await,
        SignalMessage::ConnectionResponse { .. }
    ));

    assert_eq!(
        join(&mut second, &token).await,
        rejected(SignalRequest::ConnectionRequest, RejectReason::AlreadyPaired)
    );
}

#[tokio::test]
async fn test_concurrent_joiners_only_one_wins() {
    let (addr, _dir) = start_server().await;
    let mut host_ws = connect(&addr).await;
    let token = host(&mut host_ws, "sdpA").await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let addr = addr.clone();
        let token = token.clone();
        tasks.push(tokio::spawn(async move {
            let mut ws = connect(&addr).await;
            let reply = join(&mut ws, &token).await;
            (ws, reply)
        }));
    }

    let mut winners = 0;
    let mut sockets = Vec::new();
    for task in tasks {
        let (ws, reply) = task.await.unwrap();
        match reply {
            SignalMessage::ConnectionResponse { .. } => winners += 1,
            SignalMessage::Rejected {
                reason: RejectReason::AlreadyPaired,
                ..
            } => {}
            other => panic!("unexpected reply {other:?}"),
        }
        sockets.push(ws);
    }
    assert_eq!(winners, 1);
}

// =========================================================================
// Answer relay
// =========================================================================

#[tokio::test]
async fn test_answer_is_relayed_to_host() {
    let (addr, _dir) = start_server().await;
    let mut host_ws = connect(&addr).await;
    let mut joiner_ws = connect(&addr).await;
    let token = host(&mut host_ws, "sdpA").await;
    join(&mut joiner_ws, &token).await;

    send(
        &mut joiner_ws,
        &SignalMessage::AnswerRequest {
            local_description: "sdpB".into(),
        },
    )
    .await;

    assert_eq!(
        recv(&mut host_ws).await,
        SignalMessage::AnswerResponse {
            remote_description: "sdpB".into(),
        }
    );
    assert_silent(&mut joiner_ws).await;
}

#[tokio::test]
async fn test_answer_before_pairing_is_rejected() {
    let (addr, _dir) = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        &SignalMessage::AnswerRequest {
            local_description: "sdpB".into(),
        },
    )
    .await;

    assert_eq!(
        recv(&mut ws).await,
        rejected(SignalRequest::AnswerRequest, RejectReason::NotPaired)
    );
}

#[tokio::test]
async fn test_answer_after_host_left_is_partner_unavailable() {
    let (addr, dir) = start_server().await;
    let mut host_ws = connect(&addr).await;
    let mut joiner_ws = connect(&addr).await;
    let token = host(&mut host_ws, "sdpA").await;
    join(&mut joiner_ws, &token).await;

    host_ws.close(None).await.expect("close");
    drop(host_ws);
    eventually(|| {
        let dir = Arc::clone(&dir);
        let token = token.clone();
        async move { dir.lookup(&token).await.is_none() }
    })
    .await;

    send(
        &mut joiner_ws,
        &SignalMessage::AnswerRequest {
            local_description: "sdpB".into(),
        },
    )
    .await;
    assert_eq!(
        recv(&mut joiner_ws).await,
        rejected(
            SignalRequest::AnswerRequest,
            RejectReason::PartnerUnavailable
        )
    );
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test]
async fn test_host_disconnect_releases_token() {
    let (addr, dir) = start_server().await;
    let mut host_ws = connect(&addr).await;
    let token = host(&mut host_ws, "sdpA").await;
    assert!(dir.lookup(&token).await.is_some());

    drop(host_ws);
    eventually(|| {
        let dir = Arc::clone(&dir);
        let token = token.clone();
        async move { dir.lookup(&token).await.is_none() }
    })
    .await;

    let mut joiner_ws = connect(&addr).await;
    assert_eq!(
        join(&mut joiner_ws, &token).await,
        rejected(SignalRequest::ConnectionRequest, RejectReason::UnknownToken)
    );
}

#[tokio::test]
async fn test_malformed_message_closes_connection() {
    let (addr, dir) = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::text("{not json")).await.expect("send");

    assert_closed(&mut ws).await;
    eventually(|| {
        let dir = Arc::clone(&dir);
        async move { dir.is_empty().await }
    })
    .await;
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let (addr, dir) = start_server_with(
        PeerShareServer::builder().idle_timeout(Duration::from_millis(100)),
    )
    .await;
    let mut ws = connect(&addr).await;
    let token = host(&mut ws, "sdpA").await;

    assert_closed(&mut ws).await;
    eventually(|| {
        let dir = Arc::clone(&dir);
        let token = token.clone();
        async move { dir.lookup(&token).await.is_none() }
    })
    .await;
}

#[tokio::test]
async fn test_server_only_message_is_ignored() {
    let (addr, dir) = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        &SignalMessage::OfferResponse {
            connection_id: HostToken::new("forged"),
        },
    )
    .await;

    assert_silent(&mut ws).await;
    assert_eq!(dir.offer_count().await, 0);
    // Still usable.
    host(&mut ws, "sdpA").await;
}

// =========================================================================
// PeerClient
// =========================================================================

/// Records everything applied to it and produces canned descriptions.
#[derive(Default)]
struct FakeNegotiator {
    name: &'static str,
    remote_offer: Option<String>,
    remote_answer: Option<String>,
    remote_candidates: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("fake negotiator failure")]
struct FakeError;

impl Negotiator for FakeNegotiator {
    type Error = FakeError;

    async fn create_offer(&mut self) -> Result<String, FakeError> {
        Ok(format!("offer-from-{}", self.name))
    }

    async fn create_answer(&mut self, offer: &str) -> Result<String, FakeError> {
        self.remote_offer = Some(offer.to_owned());
        Ok(format!("answer-from-{}", self.name))
    }

    async fn accept_answer(&mut self, answer: &str) -> Result<(), FakeError> {
        self.remote_answer = Some(answer.to_owned());
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: &str) -> Result<(), FakeError> {
        self.remote_candidates.push(candidate.to_owned());
        Ok(())
    }
}

async fn peer(addr: &str, name: &'static str) -> PeerClient<FakeNegotiator> {
    let signaling = SignalingClient::connect(&format!("ws://{addr}"))
        .await
        .expect("should connect");
    PeerClient::new(
        signaling,
        FakeNegotiator {
            name,
            ..FakeNegotiator::default()
        },
    )
}

#[tokio::test]
async fn test_peer_clients_negotiate_through_server() {
    let (addr, _dir) = start_server().await;
    let mut alice = peer(&addr, "alice").await;
    let mut bob = peer(&addr, "bob").await;

    let token = alice.host().await.expect("host");
    alice
        .add_local_candidate("alice-c1".into())
        .await
        .expect("candidate");
    tokio::time::sleep(Duration::from_millis(50)).await;

    bob.connect(token).await.expect("connect");
    alice.await_answer().await.expect("answer");

    assert_eq!(bob.negotiator().remote_offer.as_deref(), Some("offer-from-alice"));
    assert_eq!(bob.negotiator().remote_candidates, vec!["alice-c1".to_string()]);
    assert_eq!(alice.negotiator().remote_answer.as_deref(), Some("answer-from-bob"));

    alice.close().await.expect("close");
    bob.close().await.expect("close");
}

#[tokio::test]
async fn test_peer_client_connect_unknown_token_is_rejected() {
    let (addr, _dir) = start_server().await;
    let mut bob = peer(&addr, "bob").await;

    let err = bob
        .connect(HostToken::new("nope"))
        .await
        .expect_err("should be rejected");

    assert!(matches!(
        err,
        PeerShareError::Rejected {
            request: SignalRequest::ConnectionRequest,
            reason: RejectReason::UnknownToken,
        }
    ));
}
