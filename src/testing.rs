//! In-process stand-ins for the upstream collaborators

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::broker::{BrokerConnector, BrokerLink, BrokerMessage};
use crate::error::{Error, Result};
use crate::upstream::{BrokerCredentials, CameraRef, CredentialProvider, StreamToken};

pub(crate) fn broker_credentials() -> BrokerCredentials {
    BrokerCredentials {
        host: "broker.test".into(),
        port: 8084,
        path: "/mqtt".into(),
        username: "user".into(),
        passcode: "pass".into(),
        expires_at: 0,
    }
}

/// Credential provider with call counters and failure switches
pub(crate) struct FakeProvider {
    cameras: HashMap<String, CameraRef>,
    next_token: AtomicU64,
    token_calls: AtomicUsize,
    fail_tokens: AtomicBool,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            cameras: HashMap::new(),
            next_token: AtomicU64::new(1000),
            token_calls: AtomicUsize::new(0),
            fail_tokens: AtomicBool::new(false),
        }
    }

    pub fn camera(mut self, serial: &str, camera_id: u64, group_id: u64) -> Self {
        self.cameras
            .insert(serial.to_string(), CameraRef { camera_id, group_id });
        self
    }

    pub fn fail_tokens(&self, fail: bool) {
        self.fail_tokens.store(fail, Ordering::SeqCst);
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for FakeProvider {
    async fn resolve_camera(&self, serial: &str) -> Result<CameraRef> {
        self.cameras
            .get(serial)
            .cloned()
            .ok_or_else(|| Error::NotFound(serial.to_string()))
    }

    async fn broker_credentials(&self) -> Result<BrokerCredentials> {
        Ok(broker_credentials())
    }

    async fn stream_token(&self, _camera_id: u64) -> Result<StreamToken> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_tokens.load(Ordering::SeqCst) {
            return Err(Error::UpstreamConnect("token service unavailable".into()));
        }
        Ok(StreamToken {
            token: self.next_token.fetch_add(1, Ordering::SeqCst),
            expires_at: 0,
        })
    }
}

/// How a [`FakeBroker`] misbehaves
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Faults {
    pub reject_auth: bool,
    pub hang_connect: bool,
    pub hang_subscribe: bool,
    pub fail_publish: bool,
    pub fail_disconnect: bool,
}

/// Connector handing out [`FakeLink`]s and remembering them
#[derive(Default)]
pub(crate) struct FakeBroker {
    faults: Faults,
    connects: AtomicUsize,
    links: Mutex<Vec<Arc<FakeLink>>>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn link(&self, index: usize) -> Arc<FakeLink> {
        Arc::clone(&self.links.lock()[index])
    }

    pub fn last_link(&self) -> Arc<FakeLink> {
        let links = self.links.lock();
        Arc::clone(&links[links.len() - 1])
    }
}

#[async_trait]
impl BrokerConnector for FakeBroker {
    async fn connect(
        &self,
        _credentials: &BrokerCredentials,
        _session_id: u64,
    ) -> Result<Arc<dyn BrokerLink>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.faults.hang_connect {
            std::future::pending::<()>().await;
        }
        if self.faults.reject_auth {
            return Err(Error::UpstreamAuth("bad passcode".into()));
        }
        let link = Arc::new(FakeLink::new(self.faults));
        self.links.lock().push(Arc::clone(&link));
        Ok(link)
    }
}

/// Broker connection that records traffic
pub(crate) struct FakeLink {
    faults: Faults,
    sink: Mutex<Option<broadcast::Sender<BrokerMessage>>>,
    subscriptions: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, Bytes)>>,
    disconnects: AtomicUsize,
}

impl FakeLink {
    pub fn new(faults: Faults) -> Self {
        Self {
            faults,
            sink: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Deliver a message as if it arrived from the broker
    pub fn inject(&self, payload: &'static [u8]) -> bool {
        let topic = self.subscriptions.lock().last().cloned().unwrap_or_default();
        match self.sink.lock().as_ref() {
            Some(tx) => tx
                .send(BrokerMessage::new(topic, Bytes::from_static(payload)))
                .is_ok(),
            None => false,
        }
    }

    /// End the delivery stream as a dropped connection would
    pub fn drop_stream(&self) {
        self.sink.lock().take();
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().clone()
    }

    pub fn published(&self) -> Vec<(String, Bytes)> {
        self.published.lock().clone()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().len()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerLink for FakeLink {
    async fn subscribe(
        &self,
        topic: &str,
        capacity: usize,
    ) -> Result<broadcast::Receiver<BrokerMessage>> {
        if self.faults.hang_subscribe {
            std::future::pending::<()>().await;
        }
        let (tx, rx) = broadcast::channel(capacity.max(1));
        *self.sink.lock() = Some(tx);
        self.subscriptions.lock().push(topic.to_string());
        Ok(rx)
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        if self.faults.fail_publish {
            return Err(Error::UpstreamConnect("publish rejected".into()));
        }
        self.published.lock().push((topic.to_string(), payload));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.sink.lock().take();
        if self.faults.fail_disconnect {
            return Err(Error::UpstreamConnect("socket already gone".into()));
        }
        Ok(())
    }
}
