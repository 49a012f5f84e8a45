/// Errors that can occur while moving signaling bytes.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer went away before the operation finished.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing a frame to the socket failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading a frame from the socket failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Dialing a remote signaling server failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Binding the listener or upgrading an accepted stream failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}
