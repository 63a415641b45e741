//! Pose payload codecs
//!
//! Each wire format is a tagged [`PoseFormat`] variant decoded by its own
//! sub-module behind one entry point:
//!
//! - [`live`]: fixed-block frames carried on the MQTT skeleton topic
//! - [`recording`]: version 3 playback recordings
//! - [`compact`]: experimental single-person playback layout
//!
//! The caller names the format; nothing here guesses by trying layouts.
//!
//! # Partial results
//!
//! Truncated or inconsistent data ends decoding at the last complete frame.
//! The frames decoded so far are returned in a [`DecodeOutcome`] together
//! with the [`FormatError`] that stopped the decoder. Only an unsupported
//! recording version fails the whole call.

pub mod compact;
pub mod live;
pub mod recording;

use base64::Engine;

use crate::error::{FormatError, Result};
use crate::pose::PoseFrame;

pub use live::LiveLayout;
pub use recording::RecordingHeader;

/// Wire format of a pose payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseFormat {
    /// Live stream frames
    Live(LiveLayout),
    /// Version 3 recording
    Recording,
    /// Experimental compact recording layout
    RecordingCompact,
}

impl Default for PoseFormat {
    fn default() -> Self {
        PoseFormat::Live(LiveLayout::default())
    }
}

/// Frames recovered from a payload
#[derive(Debug, Clone, Default)]
pub struct DecodeOutcome {
    /// Complete frames, in payload order
    pub frames: Vec<PoseFrame>,
    /// Recording header (recording formats only)
    pub header: Option<RecordingHeader>,
    /// Why decoding stopped early, if it did
    pub error: Option<FormatError>,
}

impl DecodeOutcome {
    pub(crate) fn failed(error: FormatError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    /// True if the whole payload decoded without problems
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Strict view: frames only if nothing was dropped
    pub fn into_result(self) -> Result<Vec<PoseFrame>> {
        match self.error {
            Some(e) => Err(e.into()),
            None => Ok(self.frames),
        }
    }
}

/// Decode a raw payload
pub fn decode(format: PoseFormat, data: &[u8]) -> Result<DecodeOutcome> {
    match format {
        PoseFormat::Live(layout) => Ok(live::decode(data, layout)),
        PoseFormat::Recording => recording::decode(data),
        PoseFormat::RecordingCompact => compact::decode(data),
    }
}

/// Decode a base64-encoded payload
///
/// Invalid base64 yields an empty outcome describing the problem.
pub fn decode_base64(format: PoseFormat, text: &str) -> Result<DecodeOutcome> {
    match base64::engine::general_purpose::STANDARD.decode(text.trim()) {
        Ok(data) => decode(format, &data),
        Err(e) => Ok(DecodeOutcome::failed(FormatError::InvalidBase64(
            e.to_string(),
        ))),
    }
}
