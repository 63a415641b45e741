//! In-memory credential provider
//!
//! Serves a fixed camera table and broker account. Useful against a
//! self-hosted broker where stream tokens are not enforced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::{BrokerCredentials, CameraRef, CredentialProvider, StreamToken};

/// Credential provider backed by static data
pub struct StaticCredentials {
    cameras: HashMap<String, CameraRef>,
    broker: BrokerCredentials,
    token_lifetime: Duration,
    next_token: AtomicU64,
}

impl StaticCredentials {
    pub fn new(broker: BrokerCredentials) -> Self {
        Self {
            cameras: HashMap::new(),
            broker,
            token_lifetime: Duration::from_secs(60),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register a camera
    pub fn camera(mut self, serial: impl Into<String>, camera_id: u64, group_id: u64) -> Self {
        self.cameras.insert(serial.into(), CameraRef { camera_id, group_id });
        self
    }

    /// Set the lifetime reported for issued stream tokens
    pub fn token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn resolve_camera(&self, serial: &str) -> Result<CameraRef> {
        self.cameras
            .get(serial)
            .cloned()
            .ok_or_else(|| Error::NotFound(serial.to_string()))
    }

    async fn broker_credentials(&self) -> Result<BrokerCredentials> {
        Ok(self.broker.clone())
    }

    async fn stream_token(&self, camera_id: u64) -> Result<StreamToken> {
        if !self.cameras.values().any(|c| c.camera_id == camera_id) {
            return Err(Error::NotFound(format!("camera id {}", camera_id)));
        }
        Ok(StreamToken {
            token: self.next_token.fetch_add(1, Ordering::Relaxed),
            expires_at: unix_now() + self.token_lifetime.as_secs() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> StaticCredentials {
        StaticCredentials::new(BrokerCredentials {
            host: "localhost".into(),
            port: 8084,
            path: "/mqtt".into(),
            username: "user".into(),
            passcode: "pass".into(),
            expires_at: 0,
        })
        .camera("CAM1", 10, 7)
    }

    #[tokio::test]
    async fn test_resolve_known_and_unknown() {
        let p = provider();
        let cam = p.resolve_camera("CAM1").await.unwrap();
        assert_eq!(cam, CameraRef { camera_id: 10, group_id: 7 });

        let err = p.resolve_camera("CAM123").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(s) if s == "CAM123"));
    }

    #[tokio::test]
    async fn test_tokens_increase() {
        let p = provider();
        let a = p.stream_token(10).await.unwrap();
        let b = p.stream_token(10).await.unwrap();
        assert!(b.token > a.token);
        assert!(p.stream_token(11).await.is_err());
    }
}
