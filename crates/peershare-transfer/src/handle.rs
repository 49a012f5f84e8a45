//! Engine actor: a Tokio task that owns a [`TransferEngine`].
//!
//! Channel callbacks and user actions both arrive as commands on one
//! queue, so they are applied strictly in arrival order and never
//! overlap.

use tokio::sync::{mpsc, oneshot};

use crate::{
    ChannelEvent, DataChannel, DownloadedFile, OutgoingFile, TransferEngine,
    TransferError, TransferId, TransferSnapshot, TransferUpdate,
};

/// Commands sent to the engine actor.
///
/// Variants with a `reply` sender are requests; the caller waits for the
/// answer on that one-shot channel.
enum TransferCommand {
    /// Something happened on the data channel.
    Event(ChannelEvent),

    OfferFiles {
        files: Vec<OutgoingFile>,
        reply: oneshot::Sender<Result<Vec<TransferId>, TransferError>>,
    },

    AcceptFile {
        id: TransferId,
        reply: oneshot::Sender<Result<(), TransferError>>,
    },

    DownloadFile {
        id: TransferId,
        reply: oneshot::Sender<Option<DownloadedFile>>,
    },

    Transfers {
        reply: oneshot::Sender<Vec<TransferSnapshot>>,
    },

    Subscribe {
        reply: oneshot::Sender<mpsc::UnboundedReceiver<TransferUpdate>>,
    },

    /// Stop the actor.
    Shutdown,
}

/// Handle to a running engine actor.
///
/// Cheap to clone. The actor stops on [`shutdown`](Self::shutdown) or
/// once every handle is dropped.
#[derive(Clone)]
pub struct TransferHandle {
    sender: mpsc::Sender<TransferCommand>,
}

impl TransferHandle {
    /// Spawns `engine` on the current runtime.
    ///
    /// `capacity` bounds the command queue; callers wait when it is full.
    pub fn spawn<C: DataChannel>(engine: TransferEngine<C>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        tokio::spawn(run(engine, receiver));
        Self { sender }
    }

    /// Feeds a data channel event into the engine.
    pub async fn notify(&self, event: ChannelEvent) -> Result<(), TransferError> {
        self.sender
            .send(TransferCommand::Event(event))
            .await
            .map_err(|_| TransferError::Unavailable)
    }

    /// See [`TransferEngine::offer_files`].
    pub async fn offer_files(
        &self,
        files: Vec<OutgoingFile>,
    ) -> Result<Vec<TransferId>, TransferError> {
        let (reply, rx) = oneshot::channel();
        self.request(TransferCommand::OfferFiles { files, reply }, rx)
            .await?
    }

    /// See [`TransferEngine::accept_file`].
    pub async fn accept_file(&self, id: TransferId) -> Result<(), TransferError> {
        let (reply, rx) = oneshot::channel();
        self.request(TransferCommand::AcceptFile { id, reply }, rx)
            .await?
    }

    /// See [`TransferEngine::download_file`].
    pub async fn download_file(
        &self,
        id: TransferId,
    ) -> Result<Option<DownloadedFile>, TransferError> {
        let (reply, rx) = oneshot::channel();
        self.request(TransferCommand::DownloadFile { id, reply }, rx)
            .await
    }

    /// See [`TransferEngine::transfers`].
    pub async fn transfers(&self) -> Result<Vec<TransferSnapshot>, TransferError> {
        let (reply, rx) = oneshot::channel();
        self.request(TransferCommand::Transfers { reply }, rx).await
    }

    /// See [`TransferEngine::subscribe`].
    pub async fn subscribe(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<TransferUpdate>, TransferError> {
        let (reply, rx) = oneshot::channel();
        self.request(TransferCommand::Subscribe { reply }, rx).await
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), TransferError> {
        self.sender
            .send(TransferCommand::Shutdown)
            .await
            .map_err(|_| TransferError::Unavailable)
    }

    async fn request<T>(
        &self,
        command: TransferCommand,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, TransferError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| TransferError::Unavailable)?;
        rx.await.map_err(|_| TransferError::Unavailable)
    }
}

async fn run<C: DataChannel>(
    mut engine: TransferEngine<C>,
    mut receiver: mpsc::Receiver<TransferCommand>,
) {
    tracing::debug!("transfer engine started");

    while let Some(cmd) = receiver.recv().await {
        match cmd {
            TransferCommand::Event(event) => engine.handle_event(event).await,
            TransferCommand::OfferFiles { files, reply } => {
                let _ = reply.send(engine.offer_files(files));
            }
            TransferCommand::AcceptFile { id, reply } => {
                let _ = reply.send(engine.accept_file(&id));
            }
            TransferCommand::DownloadFile { id, reply } => {
                let _ = reply.send(engine.download_file(&id));
            }
            TransferCommand::Transfers { reply } => {
                let _ = reply.send(engine.transfers());
            }
            TransferCommand::Subscribe { reply } => {
                let _ = reply.send(engine.subscribe());
            }
            TransferCommand::Shutdown => break,
        }
    }

    tracing::debug!("transfer engine stopped");
}
