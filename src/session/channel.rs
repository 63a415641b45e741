//! Client-facing channel
//!
//! The session never writes to the socket directly. Envelopes go through
//! a bounded queue drained by the connection's writer task.

use tokio::sync::mpsc;

use crate::protocol::ServerMessage;

/// Sending half of a client's outbound queue
#[derive(Debug, Clone)]
pub struct ClientChannel {
    tx: mpsc::Sender<ServerMessage>,
}

impl ClientChannel {
    pub fn new(tx: mpsc::Sender<ServerMessage>) -> Self {
        Self { tx }
    }

    /// Create a channel together with its receiving half
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue an envelope, waiting for room
    ///
    /// Returns `false` once the client side is gone.
    pub async fn send(&self, message: ServerMessage) -> bool {
        self.tx.send(message).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
