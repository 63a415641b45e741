//! Streaming session bridge
//!
//! A [`StreamingSession`] owns one client channel, one broker connection
//! and one refresh task. `connect` acquires them in order and releases
//! whatever was acquired if any step fails. `disconnect` releases them
//! exactly once no matter how many callers race to tear the session down.
//!
//! # Connect sequence
//!
//! ```text
//! resolve camera ─► broker credentials ─► stream token ─► topics
//!     ─► broker connect (bounded) ─► subscribe (bounded)
//!     ─► publish initial token ─► "connected" ─► Active
//!            (forwarder + refresh task start here)
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::channel::ClientChannel;
use super::context::StreamContext;
use super::refresh;
use super::state::{SessionPhase, SessionState};
use crate::broker::{BrokerConnector, BrokerLink, BrokerMessage};
use crate::codec::live;
use crate::error::{Error, Result};
use crate::protocol::ServerMessage;
use crate::server::config::{ForwardMode, SessionConfig};
use crate::stats::{SessionStats, StatsSnapshot};
use crate::upstream::CredentialProvider;

/// Message sent to the client when broker delivery ends unexpectedly
pub const BROKER_LOST: &str = "Broker connection lost";

/// Tasks running while a session is active
struct ActiveStream {
    forwarder: JoinHandle<()>,
    refresh: JoinHandle<()>,
}

/// One client's live pose stream
pub struct StreamingSession {
    id: u64,
    channel: ClientChannel,
    provider: Arc<dyn CredentialProvider>,
    connector: Arc<dyn BrokerConnector>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    // Held from broker connect until release; whoever takes it closes it.
    link: Mutex<Option<Arc<dyn BrokerLink>>>,
    active: Mutex<Option<ActiveStream>>,
    context: Mutex<Option<Arc<StreamContext>>>,
    cancel: CancellationToken,
    stats: Arc<SessionStats>,
}

impl StreamingSession {
    pub fn new(
        id: u64,
        channel: ClientChannel,
        provider: Arc<dyn CredentialProvider>,
        connector: Arc<dyn BrokerConnector>,
        config: SessionConfig,
    ) -> Self {
        Self {
            id,
            channel,
            provider,
            connector,
            config,
            state: Mutex::new(SessionState::new(id)),
            link: Mutex::new(None),
            active: Mutex::new(None),
            context: Mutex::new(None),
            cancel: CancellationToken::new(),
            stats: Arc::new(SessionStats::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase
    }

    pub fn camera_serial(&self) -> Option<String> {
        self.state.lock().camera_serial.clone()
    }

    /// Resolved stream identity, once connect got that far
    pub fn context(&self) -> Option<Arc<StreamContext>> {
        self.context.lock().clone()
    }

    /// Counters plus session age and time spent streaming
    pub fn stats(&self) -> StatsSnapshot {
        let state = self.state.lock();
        self.stats
            .snapshot()
            .with_lifetime(state.age(), state.active_duration())
    }

    /// Open the stream for `serial`
    ///
    /// Valid only from `Idle`. On failure the session is closed, partially
    /// acquired resources are released and the client receives one error
    /// envelope. A disconnect racing this call releases the broker link
    /// itself and no error envelope is sent.
    pub async fn connect(&self, serial: &str) -> Result<()> {
        self.state.lock().begin_connect(serial)?;
        tracing::info!(session_id = self.id, camera = %serial, "Session connecting");

        let result = self.establish(serial).await;

        if let Err(ref e) = result {
            // None means a concurrent disconnect already closed the session
            let closed_here = self.state.lock().close().is_some();
            if closed_here {
                self.cancel.cancel();
            }
            self.release_link().await;

            if closed_here {
                tracing::warn!(
                    session_id = self.id,
                    camera = %serial,
                    error = %e,
                    "Session connect failed"
                );
                self.channel.send(ServerMessage::error(e.to_string())).await;
            }
        }

        result
    }

    async fn establish(&self, serial: &str) -> Result<()> {
        let camera = self.until_closed(self.provider.resolve_camera(serial)).await?;
        let credentials = self.until_closed(self.provider.broker_credentials()).await?;
        let token = self
            .until_closed(self.provider.stream_token(camera.camera_id))
            .await?;

        let ctx = Arc::new(StreamContext::new(self.id, serial, camera, token));
        *self.context.lock() = Some(Arc::clone(&ctx));

        let link = self
            .until_closed(bounded(
                "broker connect",
                self.config.connect_timeout,
                self.connector.connect(&credentials, self.id),
            ))
            .await?;
        self.hold_link(Arc::clone(&link))?;

        self.start_streaming(&ctx, &link).await
    }

    /// Park the link where `disconnect` can find it
    ///
    /// Fails if the session closed while the broker connect was pending. The
    /// link stays parked either way so exactly one caller releases it.
    fn hold_link(&self, link: Arc<dyn BrokerLink>) -> Result<()> {
        let state = self.state.lock();
        *self.link.lock() = Some(link);
        if state.is_closed() {
            return Err(closed_during_connect());
        }
        Ok(())
    }

    async fn release_link(&self) {
        let link = self.link.lock().take();
        if let Some(link) = link {
            if let Err(e) = link.disconnect().await {
                tracing::warn!(session_id = self.id, error = %e, "Broker disconnect failed");
            }
        }
    }

    /// Run a connect step, giving up as soon as the session is closed
    async fn until_closed<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(closed_during_connect()),
            result = future => result,
        }
    }

    async fn start_streaming(
        &self,
        ctx: &Arc<StreamContext>,
        link: &Arc<dyn BrokerLink>,
    ) -> Result<()> {
        let rx = self
            .until_closed(bounded(
                "broker subscribe",
                self.config.subscribe_timeout,
                link.subscribe(&ctx.topics.subscribe, self.config.forward_capacity),
            ))
            .await?;

        tracing::info!(
            session_id = self.id,
            topic = %ctx.topics.subscribe,
            "Subscribed to skeleton topic"
        );

        self.until_closed(link.publish(&ctx.topics.publish, ctx.initial_token.payload()))
            .await?;

        let delivered = self
            .until_closed(async {
                Ok(self
                    .channel
                    .send(ServerMessage::connected(ctx.camera_serial.clone()))
                    .await)
            })
            .await?;
        if !delivered {
            return Err(Error::Transport("client channel closed".to_string()));
        }

        let mut state = self.state.lock();
        state.activate()?;

        let forwarder = tokio::spawn(forward(
            Arc::clone(ctx),
            rx,
            self.channel.clone(),
            self.config.forward_mode,
            Arc::clone(&self.stats),
            self.cancel.clone(),
        ));
        let refresh = refresh::spawn(
            Arc::clone(ctx),
            Arc::clone(&self.provider),
            Arc::clone(link),
            Arc::clone(&self.stats),
            self.config.refresh_interval,
            self.cancel.clone(),
        );
        *self.active.lock() = Some(ActiveStream { forwarder, refresh });
        drop(state);

        tracing::info!(session_id = self.id, camera = %ctx.camera_serial, "Session active");
        Ok(())
    }

    /// Tear the session down
    ///
    /// Idempotent. Only the first call releases resources; later and
    /// concurrent calls return immediately. Broker close errors are logged,
    /// never returned, so teardown always completes.
    pub async fn disconnect(&self) -> Result<()> {
        let Some(previous) = self.state.lock().close() else {
            return Ok(());
        };
        self.cancel.cancel();

        let active = self.active.lock().take();
        if let Some(ActiveStream { forwarder, refresh }) = active {
            if let Err(e) = refresh.await {
                tracing::warn!(session_id = self.id, error = %e, "Refresh task ended abnormally");
            }
            if let Err(e) = forwarder.await {
                tracing::warn!(session_id = self.id, error = %e, "Forwarder ended abnormally");
            }
        }
        self.release_link().await;

        let stats = self.stats();
        tracing::info!(
            session_id = self.id,
            previous = ?previous,
            forwarded = stats.messages_forwarded,
            dropped = stats.messages_dropped,
            active_secs = stats.active_duration.as_secs(),
            "Session closed"
        );
        Ok(())
    }
}

fn closed_during_connect() -> Error {
    Error::InvalidState {
        expected: SessionPhase::Connecting,
        actual: SessionPhase::Closed,
    }
}

async fn bounded<T, F>(operation: &'static str, after: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout { operation, after }),
    }
}

fn to_envelope(message: &BrokerMessage, mode: ForwardMode, session_id: u64) -> ServerMessage {
    match mode {
        ForwardMode::Raw => ServerMessage::SkeletonData {
            data: message.payload.clone(),
        },
        ForwardMode::Decoded(layout) => {
            let outcome = live::decode(&message.payload, layout);
            if let Some(ref e) = outcome.error {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    frames = outcome.frames.len(),
                    "Partial skeleton payload"
                );
            }
            ServerMessage::SkeletonFrames {
                frames: outcome.frames,
            }
        }
    }
}

/// Move broker messages to the client in arrival order
async fn forward(
    ctx: Arc<StreamContext>,
    mut rx: broadcast::Receiver<BrokerMessage>,
    channel: ClientChannel,
    mode: ForwardMode,
    stats: Arc<SessionStats>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = rx.recv() => received,
        };

        match received {
            Ok(message) => {
                let size = message.payload.len();
                let envelope = to_envelope(&message, mode, ctx.session_id);

                let delivered = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    delivered = channel.send(envelope) => delivered,
                };
                if !delivered {
                    tracing::debug!(session_id = ctx.session_id, "Client channel closed");
                    break;
                }
                stats.record_forwarded(size);
            }
            Err(RecvError::Lagged(skipped)) => {
                stats.record_dropped(skipped);
                tracing::warn!(
                    session_id = ctx.session_id,
                    skipped = skipped,
                    "Client lagging, dropped oldest messages"
                );
            }
            Err(RecvError::Closed) => {
                tracing::warn!(
                    session_id = ctx.session_id,
                    camera = %ctx.camera_serial,
                    "Broker delivery ended"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = channel.send(ServerMessage::error(BROKER_LOST)) => {}
                }
                break;
            }
        }
    }
}
