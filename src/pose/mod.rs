//! Decoded pose data
//!
//! A [`PoseFrame`] is one snapshot of every person the camera detected.
//! People keep the order in which they appear in the payload; they are not
//! sorted by id.

pub mod keypoint;

use serde::Serialize;

pub use keypoint::{Keypoint, KeypointName, KEYPOINT_COUNT};

/// One detected person
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonPose {
    /// Person id (absent in formats that do not carry one)
    pub person_id: Option<i32>,
    /// Landmarks in [`KeypointName`] order
    pub keypoints: [Keypoint; KEYPOINT_COUNT],
}

impl PersonPose {
    /// Create a person with every keypoint unknown
    pub fn new(person_id: Option<i32>) -> Self {
        Self {
            person_id,
            keypoints: [Keypoint::UNKNOWN; KEYPOINT_COUNT],
        }
    }

    pub fn keypoint(&self, name: KeypointName) -> Keypoint {
        self.keypoints[name.index()]
    }

    /// Number of keypoints with a detected position
    pub fn known_count(&self) -> usize {
        self.keypoints.iter().filter(|k| k.is_known()).count()
    }
}

/// One frame of pose telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseFrame {
    pub frame_number: i32,
    /// Milliseconds since the previous frame (recording formats only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_time: Option<u16>,
    pub people: Vec<PersonPose>,
}

impl PoseFrame {
    pub fn new(frame_number: i32) -> Self {
        Self {
            frame_number,
            delta_time: None,
            people: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}
