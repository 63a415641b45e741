//! Real-time pose telemetry relay
//!
//! Relays human-pose ("skeleton") telemetry from a camera's MQTT broker
//! topic to WebSocket clients, and decodes the binary pose formats into
//! per-frame keypoints.
//!
//! # Overview
//!
//! ```text
//!  client ──ws──► RelayServer ──► ClientConnection ──► SessionRegistry
//!                                                          │
//!                                                  StreamingSession
//!                                   ┌──────────────────────┼──────────────────┐
//!                         CredentialProvider         BrokerLink (MQTT)    refresh task
//! ```
//!
//! # Decoding payloads
//!
//! ```no_run
//! use skeleton_relay::codec::{self, PoseFormat};
//!
//! # fn payload() -> Vec<u8> { Vec::new() }
//! let outcome = codec::decode(PoseFormat::default(), &payload())?;
//! for frame in &outcome.frames {
//!     println!("frame {} has {} people", frame.frame_number, frame.people.len());
//! }
//! # Ok::<(), skeleton_relay::Error>(())
//! ```
//!
//! # Running a relay
//!
//! ```no_run
//! use std::sync::Arc;
//! use skeleton_relay::broker::MqttConnector;
//! use skeleton_relay::server::{RelayServer, ServerConfig};
//! use skeleton_relay::upstream::{BrokerCredentials, StaticCredentials};
//!
//! # async fn run() -> skeleton_relay::Result<()> {
//! let credentials = StaticCredentials::new(BrokerCredentials {
//!     host: "broker.example.com".into(),
//!     port: 8084,
//!     path: "/mqtt".into(),
//!     username: "relay".into(),
//!     passcode: "secret".into(),
//!     expires_at: 0,
//! })
//! .camera("CAM123", 1, 1);
//!
//! let server = RelayServer::new(
//!     ServerConfig::default(),
//!     Arc::new(credentials),
//!     Arc::new(MqttConnector::default()),
//! );
//! server.run().await
//! # }
//! ```

pub mod broker;
pub mod codec;
pub mod error;
pub mod pose;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, FormatError, Result};
