//! Upstream publish/subscribe broker
//!
//! A session talks to the broker through two seams: [`BrokerConnector`]
//! opens one authenticated connection per session and [`BrokerLink`] is
//! the handle to that connection. Inbound messages are delivered through
//! a bounded `tokio::sync::broadcast` queue, so the broker receive loop
//! never waits on a slow consumer; a consumer that falls behind observes
//! `RecvError::Lagged` and loses the oldest messages.
//!
//! ```text
//!   broker event loop ──send()──► broadcast (bounded) ──recv()──► forwarder ──► client
//!         ▲
//!         └──── publish(token) ◄── refresh task
//! ```

pub mod mqtt;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::upstream::BrokerCredentials;

pub use mqtt::{MqttConfig, MqttConnector};

/// Message delivered on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl BrokerMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Opens broker connections
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open and authenticate one connection for the given session
    ///
    /// Returns once the broker has accepted the connection. Rejected
    /// credentials map to [`Error::UpstreamAuth`](crate::Error::UpstreamAuth),
    /// everything else to [`Error::UpstreamConnect`](crate::Error::UpstreamConnect).
    async fn connect(
        &self,
        credentials: &BrokerCredentials,
        session_id: u64,
    ) -> Result<Arc<dyn BrokerLink>>;
}

/// One live broker connection
#[async_trait]
pub trait BrokerLink: Send + Sync {
    /// Subscribe to `topic`, returning a queue holding at most `capacity`
    /// undelivered messages
    ///
    /// Resolves after the broker acknowledged the subscription. The queue
    /// closes when the connection ends.
    async fn subscribe(
        &self,
        topic: &str,
        capacity: usize,
    ) -> Result<broadcast::Receiver<BrokerMessage>>;

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Close the connection
    ///
    /// Best effort: local resources are released even when the broker
    /// side of the close fails.
    async fn disconnect(&self) -> Result<()>;
}
