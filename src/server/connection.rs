//! Per-client request handling
//!
//! A [`ClientConnection`] interprets the inbound envelopes of one socket
//! and owns at most one live session at a time.

use std::fmt::Display;
use std::sync::Arc;

use crate::protocol::{ClientRequest, ServerMessage};
use crate::registry::SessionRegistry;
use crate::session::{ClientChannel, StreamingSession};

/// Request dispatcher for one client socket
pub struct ClientConnection {
    registry: Arc<SessionRegistry>,
    channel: ClientChannel,
    session: Option<Arc<StreamingSession>>,
}

impl ClientConnection {
    pub fn new(registry: Arc<SessionRegistry>, channel: ClientChannel) -> Self {
        Self {
            registry,
            channel,
            session: None,
        }
    }

    /// ID of the live session, if any
    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.id())
    }

    /// Handle one inbound text frame
    pub async fn handle_text(&mut self, text: &str) {
        match ClientRequest::parse(text) {
            Ok(ClientRequest::Connect {
                camera_serial_number: Some(serial),
            }) => self.connect(&serial).await,
            Ok(ClientRequest::Connect {
                camera_serial_number: None,
            }) => {
                self.reply_error("cameraSerialNumber is required").await;
            }
            Ok(ClientRequest::Disconnect) => self.teardown().await,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected client request");
                self.reply_error(format!("Invalid request: {}", e)).await;
            }
        }
    }

    async fn connect(&mut self, serial: &str) {
        // A new connect replaces whatever this client was streaming
        self.teardown().await;

        let session = self.registry.open(self.channel.clone());
        let session_id = session.id();
        self.session = Some(session);

        // The session has already reported the failure to the client
        if self.registry.connect(session_id, serial).await.is_err() {
            self.session = None;
        }
    }

    /// The client went away cleanly
    pub async fn on_transport_closed(&mut self) {
        tracing::info!(session_id = ?self.session_id(), "Client disconnected");
        self.teardown().await;
    }

    /// The client transport failed; nothing is reported back
    pub async fn on_transport_error(&mut self, error: impl Display) {
        tracing::warn!(session_id = ?self.session_id(), error = %error, "Client transport error");
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.registry.disconnect(session.id()).await {
                tracing::warn!(session_id = session.id(), error = %e, "Session teardown failed");
            }
        }
    }

    async fn reply_error(&self, message: impl Into<String>) {
        if !self.channel.send(ServerMessage::error(message)).await {
            tracing::debug!("Client channel closed before error reply");
        }
    }
}
