//! Relay server listener
//!
//! Serves the client WebSocket endpoint and a health probe. Each upgraded
//! socket gets a writer task draining its outbound queue and a read loop
//! feeding a [`ClientConnection`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::broker::BrokerConnector;
use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::server::config::ServerConfig;
use crate::server::connection::ClientConnection;
use crate::session::ClientChannel;
use crate::upstream::CredentialProvider;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct AppState {
    registry: Arc<SessionRegistry>,
    client_buffer: usize,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
}

/// Skeleton relay server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
}

impl RelayServer {
    /// Create a new server with the given configuration and collaborators
    pub fn new(
        config: ServerConfig,
        provider: Arc<dyn CredentialProvider>,
        connector: Arc<dyn BrokerConnector>,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };
        let registry = Arc::new(SessionRegistry::new(
            provider,
            connector,
            config.session.clone(),
        ));

        Self {
            config,
            registry,
            connection_semaphore,
            shutdown: CancellationToken::new(),
        }
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        self.config.bind_addr
    }

    /// HTTP routes served by this relay
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            client_buffer: self.config.client_buffer,
            connection_semaphore: self.connection_semaphore.clone(),
            shutdown: self.shutdown.clone(),
        };

        Router::new()
            .route(&self.config.ws_path, get(ws_upgrade))
            .route("/health", get(health))
            .with_state(state)
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` resolves every client socket is closed and every live
    /// session torn down before this returns.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(
            addr = ?listener.local_addr().ok(),
            path = %self.config.ws_path,
            "Relay server listening"
        );

        let cleanup_handle = self.registry.spawn_cleanup_task(CLEANUP_INTERVAL);
        let token = self.shutdown.clone();

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                token.cancel();
            })
            .await;

        // Stop cleanup task on shutdown
        cleanup_handle.abort();
        self.shutdown.cancel();
        self.registry.shutdown().await;

        result.map_err(Into::into)
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "sessions": state.registry.len(),
    }))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Check connection limit
    let permit = match state.connection_semaphore {
        Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!("Connection rejected: limit reached");
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
        },
        None => None,
    };

    ws.on_upgrade(move |socket| async move {
        run_client(socket, state).await;
        drop(permit);
    })
}

async fn run_client(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (channel, mut outbound) = ClientChannel::bounded(state.client_buffer);
    let mut connection = ClientConnection::new(Arc::clone(&state.registry), channel);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize envelope");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let mut transport_error = None;
    loop {
        let frame = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            frame = ws_rx.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => connection.handle_text(text.as_str()).await,
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => connection.handle_text(text).await,
                Err(_) => tracing::debug!(len = data.len(), "Ignoring non-UTF8 binary frame"),
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                transport_error = Some(e);
                break;
            }
        }
    }

    match transport_error {
        Some(e) => connection.on_transport_error(e).await,
        None => connection.on_transport_closed().await,
    }
    drop(connection);
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::SessionConfig;
    use crate::testing::{FakeBroker, FakeProvider};

    fn server(config: ServerConfig) -> RelayServer {
        RelayServer::new(
            config,
            Arc::new(FakeProvider::new().camera("CAM1", 10, 7)),
            Arc::new(FakeBroker::new()),
        )
    }

    #[tokio::test]
    async fn test_health_reports_sessions() {
        let server = server(ServerConfig::default());
        let (channel, _rx) = ClientChannel::bounded(4);
        server.registry().open(channel);

        let state = AppState {
            registry: Arc::clone(server.registry()),
            client_buffer: 4,
            connection_semaphore: None,
            shutdown: CancellationToken::new(),
        };
        let Json(body) = health(State(state)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 1);
    }

    #[tokio::test]
    async fn test_registry_uses_session_config() {
        let config = ServerConfig::default()
            .session(SessionConfig::default().refresh_interval(Duration::from_secs(5)));
        let server = server(config);
        assert_eq!(
            server.registry().config().refresh_interval,
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let server = server(ServerConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (channel, _rx) = ClientChannel::bounded(4);
        server.registry().open(channel);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tx.send(()).unwrap();
        server
            .serve(listener, async move {
                let _ = rx.await;
            })
            .await
            .unwrap();

        assert!(server.registry().is_empty());
    }
}
