//! Upstream credential collaborator
//!
//! The vendor REST surface (OAuth, camera listing, token endpoints) lives
//! outside this crate. Sessions only consume it through
//! [`CredentialProvider`].

pub mod fixed;

use async_trait::async_trait;

use crate::error::Result;

pub use fixed::StaticCredentials;

/// Camera identity resolved from its serial number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraRef {
    pub camera_id: u64,
    pub group_id: u64,
}

/// Broker connection credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerCredentials {
    pub host: String,
    pub port: u16,
    /// WebSocket path, e.g. `/mqtt`
    pub path: String,
    pub username: String,
    pub passcode: String,
    /// Unix timestamp (seconds) after which the credentials are invalid
    pub expires_at: i64,
}

impl BrokerCredentials {
    /// Secure WebSocket URL of the broker
    pub fn url(&self) -> String {
        format!("wss://{}:{}{}", self.host, self.port, self.path)
    }
}

/// Short-lived token authorizing a skeleton subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamToken {
    pub token: u64,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
}

impl StreamToken {
    /// Payload published on the control topic
    pub fn payload(&self) -> bytes::Bytes {
        bytes::Bytes::from(self.token.to_string())
    }
}

/// Supplies everything a session needs from the vendor API
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Map a camera serial to its ids
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) for unknown serials.
    async fn resolve_camera(&self, serial: &str) -> Result<CameraRef>;

    async fn broker_credentials(&self) -> Result<BrokerCredentials>;

    async fn stream_token(&self, camera_id: u64) -> Result<StreamToken>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_url() {
        let creds = BrokerCredentials {
            host: "broker.example.com".into(),
            port: 8084,
            path: "/mqtt".into(),
            username: "u".into(),
            passcode: "p".into(),
            expires_at: 0,
        };
        assert_eq!(creds.url(), "wss://broker.example.com:8084/mqtt");
    }

    #[test]
    fn test_token_payload_is_decimal() {
        let token = StreamToken {
            token: 1234567890,
            expires_at: 0,
        };
        assert_eq!(&token.payload()[..], b"1234567890");
    }
}
