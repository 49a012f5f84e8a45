//! Signaling client: the browser side of the rendezvous protocol.
//!
//! [`SignalingClient`] speaks JSON over a WebSocket. [`PeerClient`] runs
//! the host and join flows on top of it, delegating description and
//! candidate handling to a [`Negotiator`].

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use peershare_protocol::{Codec, HostToken, JsonCodec, SignalMessage, SignalRequest};
use peershare_transport::TransportError;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::PeerShareError;

type ClientWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A WebSocket connection to a signaling server.
pub struct SignalingClient {
    sink: SplitSink<ClientWs, Message>,
    stream: SplitStream<ClientWs>,
    codec: JsonCodec,
}

impl SignalingClient {
    /// Connects to `url` (e.g. `ws://127.0.0.1:8080`).
    pub async fn connect(url: &str) -> Result<Self, PeerShareError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;
        tracing::debug!(url, "connected to signaling server");
        let (sink, stream) = ws.split();
        Ok(Self {
            sink,
            stream,
            codec: JsonCodec,
        })
    }

    /// Sends one message as a text frame.
    pub async fn send(&mut self, msg: &SignalMessage) -> Result<(), PeerShareError> {
        let bytes = self.codec.encode(msg)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| peershare_protocol::ProtocolError::InvalidUtf8)?;
        self.sink.send(Message::text(text)).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })?;
        Ok(())
    }

    /// Receives the next message. `Ok(None)` once the server closes.
    pub async fn recv(&mut self) -> Result<Option<SignalMessage>, PeerShareError> {
        loop {
            let data = match self.stream.next().await {
                Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                Some(Ok(Message::Binary(data))) => data.to_vec(),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    ))
                    .into());
                }
            };
            return Ok(Some(self.codec.decode(&data)?));
        }
    }

    /// Closes the connection.
    pub async fn close(&mut self) -> Result<(), PeerShareError> {
        self.sink.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })?;
        Ok(())
    }
}

/// The local half of a peer connection: produces and applies session
/// descriptions and candidates.
///
/// In a browser this is an `RTCPeerConnection`.
pub trait Negotiator {
    /// The error type for negotiation steps.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates an offer and applies it locally; returns its description.
    async fn create_offer(&mut self) -> Result<String, Self::Error>;

    /// Applies a remote offer, then creates and applies an answer;
    /// returns the answer's description.
    async fn create_answer(&mut self, offer: &str) -> Result<String, Self::Error>;

    /// Applies the remote answer to a previously created offer.
    async fn accept_answer(&mut self, answer: &str) -> Result<(), Self::Error>;

    /// Adds a candidate learned from the remote peer.
    async fn add_remote_candidate(&mut self, candidate: &str) -> Result<(), Self::Error>;
}

/// Drives one peer through the host or join flow.
pub struct PeerClient<N: Negotiator> {
    signaling: SignalingClient,
    negotiator: N,
}

impl<N: Negotiator> PeerClient<N> {
    pub fn new(signaling: SignalingClient, negotiator: N) -> Self {
        Self {
            signaling,
            negotiator,
        }
    }

    pub fn negotiator(&self) -> &N {
        &self.negotiator
    }

    /// Publishes a fresh offer and returns the token to share with the
    /// joiner.
    pub async fn host(&mut self) -> Result<HostToken, PeerShareError> {
        let offer = self.negotiator.create_offer().await.map_err(negotiation)?;
        self.signaling
            .send(&SignalMessage::OfferRequest {
                local_description: offer,
            })
            .await?;

        match self.next_reply(SignalRequest::OfferRequest).await? {
            SignalMessage::OfferResponse { connection_id } => {
                tracing::info!(token = %connection_id, "hosting");
                Ok(connection_id)
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Waits for the joiner's answer and applies it. Call after
    /// [`host`](Self::host).
    pub async fn await_answer(&mut self) -> Result<(), PeerShareError> {
        match self.next_reply(SignalRequest::AnswerRequest).await? {
            SignalMessage::AnswerResponse { remote_description } => {
                self.negotiator
                    .accept_answer(&remote_description)
                    .await
                    .map_err(negotiation)?;
                tracing::info!("answer applied");
                Ok(())
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Joins the host behind `token`: applies its offer and candidates,
    /// then sends back an answer.
    pub async fn connect(&mut self, token: HostToken) -> Result<(), PeerShareError> {
        self.signaling
            .send(&SignalMessage::ConnectionRequest {
                connection_id: token,
            })
            .await?;

        let (offer, candidates) = match self.next_reply(SignalRequest::ConnectionRequest).await? {
            SignalMessage::ConnectionResponse {
                remote_description,
                ice_candidates,
            } => (remote_description, ice_candidates),
            other => return Err(unexpected(&other)),
        };

        let answer = self
            .negotiator
            .create_answer(&offer)
            .await
            .map_err(negotiation)?;
        for candidate in &candidates {
            self.negotiator
                .add_remote_candidate(candidate)
                .await
                .map_err(negotiation)?;
        }
        self.signaling
            .send(&SignalMessage::AnswerRequest {
                local_description: answer,
            })
            .await?;
        tracing::info!(candidates = candidates.len(), "answer sent");
        Ok(())
    }

    /// Publishes a locally gathered candidate.
    pub async fn add_local_candidate(&mut self, candidate: String) -> Result<(), PeerShareError> {
        self.signaling
            .send(&SignalMessage::AddIceCandidate {
                ice_candidate: candidate,
            })
            .await
    }

    /// Closes the signaling connection.
    pub async fn close(mut self) -> Result<N, PeerShareError> {
        self.signaling.close().await?;
        Ok(self.negotiator)
    }

    /// Returns the next message, turning a rejection of `request` into
    /// an error.
    async fn next_reply(&mut self, request: SignalRequest) -> Result<SignalMessage, PeerShareError> {
        let msg = self.signaling.recv().await?.ok_or_else(|| {
            TransportError::ConnectionClosed(format!("server closed while awaiting {request} reply"))
        })?;
        match msg {
            SignalMessage::Rejected { request, reason } => {
                Err(PeerShareError::Rejected { request, reason })
            }
            msg => Ok(msg),
        }
    }
}

fn negotiation(e: impl std::error::Error) -> PeerShareError {
    PeerShareError::Negotiation(e.to_string())
}

fn unexpected(msg: &SignalMessage) -> PeerShareError {
    PeerShareError::Protocol(peershare_protocol::ProtocolError::UnexpectedMessage(msg.kind()))
}
