//! Client-facing message envelopes
//!
//! Inbound (client to relay):
//! ```text
//! {"action": "connect", "cameraSerialNumber": "CAM123"}
//! {"action": "disconnect"}
//! ```
//!
//! Outbound (relay to client):
//! ```text
//! {"type": "connected", "camera": "CAM123"}
//! {"type": "skeleton_data", "data": "<base64 payload>"}
//! {"type": "skeleton_frames", "frames": [...]}
//! {"type": "error", "message": "..."}
//! ```

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};

use crate::pose::PoseFrame;

/// Request sent by a streaming client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientRequest {
    Connect {
        #[serde(rename = "cameraSerialNumber")]
        camera_serial_number: Option<String>,
    },
    Disconnect,
}

impl ClientRequest {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Message delivered to a streaming client
///
/// Raw payloads stay as `Bytes` until serialization so the forwarding path
/// only clones a reference count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        camera: String,
    },
    SkeletonData {
        #[serde(serialize_with = "serialize_base64")]
        data: Bytes,
    },
    SkeletonFrames {
        frames: Vec<PoseFrame>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn connected(camera: impl Into<String>) -> Self {
        ServerMessage::Connected {
            camera: camera.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn serialize_base64<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect() {
        let req = ClientRequest::parse(r#"{"action":"connect","cameraSerialNumber":"CAM1"}"#)
            .unwrap();
        assert_eq!(
            req,
            ClientRequest::Connect {
                camera_serial_number: Some("CAM1".into())
            }
        );
    }

    #[test]
    fn test_parse_connect_without_serial() {
        let req = ClientRequest::parse(r#"{"action":"connect"}"#).unwrap();
        assert_eq!(
            req,
            ClientRequest::Connect {
                camera_serial_number: None
            }
        );
    }

    #[test]
    fn test_parse_disconnect_and_unknown() {
        assert_eq!(
            ClientRequest::parse(r#"{"action":"disconnect"}"#).unwrap(),
            ClientRequest::Disconnect
        );
        assert!(ClientRequest::parse(r#"{"action":"reboot"}"#).is_err());
        assert!(ClientRequest::parse("not json").is_err());
    }

    #[test]
    fn test_outbound_shapes() {
        let json = ServerMessage::connected("CAM1").to_json().unwrap();
        assert_eq!(json, r#"{"type":"connected","camera":"CAM1"}"#);

        let json = ServerMessage::error("boom").to_json().unwrap();
        assert_eq!(json, r#"{"type":"error","message":"boom"}"#);

        let msg = ServerMessage::SkeletonData {
            data: Bytes::from_static(&[1, 2, 3]),
        };
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"type":"skeleton_data","data":"AQID"}"#
        );
    }

    #[test]
    fn test_frames_envelope() {
        let msg = ServerMessage::SkeletonFrames {
            frames: vec![PoseFrame::new(3)],
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "skeleton_frames");
        assert_eq!(value["frames"][0]["frameNumber"], 3);
    }
}
