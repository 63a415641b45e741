//! Keypoints and their anatomical naming
//!
//! Keypoint layout (18-point body model, index order):
//! ```text
//!  0 Nose       6 LElbow    12 LKnee
//!  1 Neck       7 LWrist    13 LAnkle
//!  2 RShoulder  8 RHip      14 REye
//!  3 RElbow     9 RKnee     15 LEye
//!  4 RWrist    10 RAnkle    16 REar
//!  5 LShoulder 11 LHip      17 LEar
//! ```

use serde::ser::{Serialize, SerializeTuple, Serializer};

/// Number of keypoint slots per person
pub const KEYPOINT_COUNT: usize = 18;

/// Normalized 2-D landmark position
///
/// `(0, 0)` marks a landmark that was not detected, not a point at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
}

impl Keypoint {
    /// Sentinel for an undetected landmark
    pub const UNKNOWN: Keypoint = Keypoint { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether this slot holds a detected position
    pub fn is_known(&self) -> bool {
        self.x != 0.0 || self.y != 0.0
    }
}

// Serialized as a compact `[x, y]` pair
impl Serialize for Keypoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.x)?;
        tup.serialize_element(&self.y)?;
        tup.end()
    }
}

/// Anatomical name of each keypoint slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypointName {
    Nose = 0,
    Neck = 1,
    RShoulder = 2,
    RElbow = 3,
    RWrist = 4,
    LShoulder = 5,
    LElbow = 6,
    LWrist = 7,
    RHip = 8,
    RKnee = 9,
    RAnkle = 10,
    LHip = 11,
    LKnee = 12,
    LAnkle = 13,
    REye = 14,
    LEye = 15,
    REar = 16,
    LEar = 17,
}

impl KeypointName {
    /// All names in slot order
    pub const ALL: [KeypointName; KEYPOINT_COUNT] = [
        KeypointName::Nose,
        KeypointName::Neck,
        KeypointName::RShoulder,
        KeypointName::RElbow,
        KeypointName::RWrist,
        KeypointName::LShoulder,
        KeypointName::LElbow,
        KeypointName::LWrist,
        KeypointName::RHip,
        KeypointName::RKnee,
        KeypointName::RAnkle,
        KeypointName::LHip,
        KeypointName::LKnee,
        KeypointName::LAnkle,
        KeypointName::REye,
        KeypointName::LEye,
        KeypointName::REar,
        KeypointName::LEar,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeypointName::Nose => "Nose",
            KeypointName::Neck => "Neck",
            KeypointName::RShoulder => "RShoulder",
            KeypointName::RElbow => "RElbow",
            KeypointName::RWrist => "RWrist",
            KeypointName::LShoulder => "LShoulder",
            KeypointName::LElbow => "LElbow",
            KeypointName::LWrist => "LWrist",
            KeypointName::RHip => "RHip",
            KeypointName::RKnee => "RKnee",
            KeypointName::RAnkle => "RAnkle",
            KeypointName::LHip => "LHip",
            KeypointName::LKnee => "LKnee",
            KeypointName::LAnkle => "LAnkle",
            KeypointName::REye => "REye",
            KeypointName::LEye => "LEye",
            KeypointName::REar => "REar",
            KeypointName::LEar => "LEar",
        }
    }
}

impl std::fmt::Display for KeypointName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_in_slot_order() {
        for (i, name) in KeypointName::ALL.iter().enumerate() {
            assert_eq!(name.index(), i);
            assert_eq!(KeypointName::from_index(i), Some(*name));
        }
        assert_eq!(KeypointName::from_index(18), None);
        assert_eq!(KeypointName::Neck.as_str(), "Neck");
        assert_eq!(KeypointName::LEar.to_string(), "LEar");
    }

    #[test]
    fn test_unknown_keypoint() {
        assert!(!Keypoint::UNKNOWN.is_known());
        assert!(!Keypoint::default().is_known());
        assert!(Keypoint::new(0.0, 0.4).is_known());
    }

    #[test]
    fn test_serialize_as_pair() {
        let json = serde_json::to_string(&Keypoint::new(0.25, 0.5)).unwrap();
        assert_eq!(json, "[0.25,0.5]");
    }
}
