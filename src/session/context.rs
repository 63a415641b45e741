//! Stream context
//!
//! Everything resolved during connect that the background tasks of a
//! session need afterwards.

use crate::protocol::StreamTopics;
use crate::upstream::{CameraRef, StreamToken};

/// Resolved identity of one live stream
#[derive(Debug, Clone)]
pub struct StreamContext {
    /// Owning session ID
    pub session_id: u64,

    /// Camera serial from the connect request
    pub camera_serial: String,

    /// Upstream camera identity
    pub camera: CameraRef,

    /// Token the subscription was opened with
    pub initial_token: StreamToken,

    /// Control and telemetry topics
    pub topics: StreamTopics,
}

impl StreamContext {
    pub fn new(
        session_id: u64,
        camera_serial: impl Into<String>,
        camera: CameraRef,
        initial_token: StreamToken,
    ) -> Self {
        let camera_serial = camera_serial.into();
        let topics = StreamTopics::new(camera.group_id, &camera_serial, initial_token.token);
        Self {
            session_id,
            camera_serial,
            camera,
            initial_token,
            topics,
        }
    }
}
