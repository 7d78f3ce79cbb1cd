//! Running a computation server as an independent task.
//!
//! Each server owns its state inside a tokio task and is reachable only via
//! its request channel. The coordinator never touches server state directly;
//! it sends a [`RoundRequest`] and awaits the [`Contribution`] on a oneshot.
//! A remote server can be bridged by taking the receiver from
//! [`ServerHandle::connect`] and forwarding messages over any transport.

use rand::rngs::OsRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use auction_types::protocol::{Contribution, RoundRequest};
use auction_types::ServerIndex;

use crate::server::ComputationServer;
use crate::types::ServerError;

/// Pending requests per server. Rounds are synchronous, so one is enough in
/// practice.
const REQUEST_BUFFER: usize = 4;

/// Reply to a round request.
pub type ServerReply = Result<Contribution, ServerError>;

/// A round request together with the channel for its reply.
#[derive(Debug)]
pub struct ServerMessage {
    pub request: RoundRequest,
    pub reply: oneshot::Sender<ServerReply>,
}

/// Coordinator-side handle to a running server.
///
/// Dropping the handle stops the server task, which drops (and wipes) the
/// server's state.
#[derive(Debug)]
pub struct ServerHandle {
    index: ServerIndex,
    requests: mpsc::Sender<ServerMessage>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Spawn `server` on the current tokio runtime.
    pub fn spawn(server: ComputationServer) -> Self {
        let index = server.index();
        let (mut handle, receiver) = Self::connect(index);
        handle.task = Some(tokio::spawn(serve(server, receiver)));
        handle
    }

    /// Create a handle whose requests are delivered to the returned receiver.
    pub fn connect(index: ServerIndex) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (requests, receiver) = mpsc::channel(REQUEST_BUFFER);
        (
            Self {
                index,
                requests,
                task: None,
            },
            receiver,
        )
    }

    pub fn index(&self) -> ServerIndex {
        self.index
    }

    /// Deliver a request; the returned receiver resolves with the server's reply.
    pub async fn send(
        &self,
        request: RoundRequest,
    ) -> Result<oneshot::Receiver<ServerReply>, ServerError> {
        let (reply, receiver) = oneshot::channel();
        self.requests
            .send(ServerMessage { request, reply })
            .await
            .map_err(|_| ServerError::Disconnected(self.index))?;
        Ok(receiver)
    }

    /// Stop the server task.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(server_index = self.index, "Server task stopped");
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Server loop: answer requests until every handle is gone.
async fn serve(mut server: ComputationServer, mut receiver: mpsc::Receiver<ServerMessage>) {
    let mut rng = OsRng;
    while let Some(message) = receiver.recv().await {
        let reply = server.handle(&message.request, &mut rng);
        if let Err(e) = &reply {
            warn!(
                server_index = server.index(),
                round = message.request.round,
                request = message.request.kind.label(),
                error = %e,
                "Rejected round request"
            );
        }
        // The coordinator may have given up on this round already.
        let _ = message.reply.send(reply);
    }
    debug!(server_index = server.index(), "Request channel closed");
}
