//! Stream token refresh
//!
//! Stream tokens expire long before a typical viewing session ends. While
//! a session is active a background task fetches a fresh token every
//! period and republishes it on the control topic, which keeps the
//! broker-side authorization of the subscription alive.
//!
//! The task is tied to the session's `CancellationToken`. Cancellation is
//! checked before every tick and raced against every refresh, so once
//! `disconnect` has cancelled the token and joined the task nothing more
//! is published.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::context::StreamContext;
use crate::broker::BrokerLink;
use crate::error::Result;
use crate::stats::SessionStats;
use crate::upstream::{CredentialProvider, StreamToken};

/// Fetch a new token and publish it on the control topic
pub(crate) async fn refresh_once(
    ctx: &StreamContext,
    provider: &dyn CredentialProvider,
    link: &dyn BrokerLink,
) -> Result<StreamToken> {
    let token = provider.stream_token(ctx.camera.camera_id).await?;
    link.publish(&ctx.topics.publish, token.payload()).await?;
    Ok(token)
}

/// Start the periodic refresh task
///
/// The first refresh happens one full `period` after the call. Failures
/// are logged and counted; the next tick tries again.
pub(crate) fn spawn(
    ctx: Arc<StreamContext>,
    provider: Arc<dyn CredentialProvider>,
    link: Arc<dyn BrokerLink>,
    stats: Arc<SessionStats>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = refresh_once(&ctx, provider.as_ref(), link.as_ref()) => result,
            };

            match result {
                Ok(token) => {
                    stats.record_refresh();
                    tracing::debug!(
                        session_id = ctx.session_id,
                        camera = %ctx.camera_serial,
                        expires_at = token.expires_at,
                        "Stream token refreshed"
                    );
                }
                Err(e) => {
                    stats.record_refresh_failure();
                    tracing::warn!(
                        session_id = ctx.session_id,
                        camera = %ctx.camera_serial,
                        error = %e,
                        "Stream token refresh failed"
                    );
                }
            }
        }

        tracing::debug!(session_id = ctx.session_id, "Token refresh stopped");
    })
}
