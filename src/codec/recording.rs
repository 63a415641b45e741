//! Recording format, version 3
//!
//! Variable-length frames used for historical playback (alert clips).
//!
//! ```text
//! Header (16 bytes):
//! +---------------+------------------------------------+
//! | version u32LE | recording metadata (12 bytes)      |
//! +---------------+------------------------------------+
//!
//! Frame:
//! +-----------------+-----------------+-----------------------+
//! | deltaTime u16LE | numPeople u16LE | numPeople x Person    |
//! +-----------------+-----------------+-----------------------+
//!
//! Person header (16 bytes):
//! +-------------+-----------+--------------+---------+----------+-------------------+
//! | personId i32| tracker u8| numKeypts u8 | event u8| action u8| probabilities i64 |
//! +-------------+-----------+--------------+---------+----------+-------------------+
//!
//! Keypoint entry (6 bytes):
//! +---------------+--------------+----------+----------+
//! | descriptor u8 | probability u8| x u16LE | y u16LE  |
//! +---------------+--------------+----------+----------+
//! ```
//!
//! The low 5 bits of the descriptor are the keypoint index. Coordinates are
//! fixed point, divided by 65536 to normalize.

use bytes::Buf;
use serde::Serialize;

use crate::error::{Error, FormatError, Result};
use crate::pose::{Keypoint, PersonPose, PoseFrame, KEYPOINT_COUNT};

use super::DecodeOutcome;

/// The only recording version this module understands
pub const RECORDING_VERSION: u32 = 3;

/// Version + metadata
pub const HEADER_SIZE: usize = 16;

/// Frame index cap
pub const MAX_FRAMES: usize = 1000;

/// Upper sanity bound on people per frame
pub const MAX_PEOPLE: usize = 20;

/// Upper sanity bound on keypoint entries per person
pub const MAX_KEYPOINTS: usize = 25;

const FRAME_HEADER_SIZE: usize = 4;
const PERSON_HEADER_SIZE: usize = 16;
const KEYPOINT_ENTRY_SIZE: usize = 6;
const INDEX_MASK: u8 = 0x1F;
pub(crate) const COORD_SCALE: f64 = 65536.0;

/// Global header of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingHeader {
    pub version: u32,
    /// Frame width in pixels (0 when the layout does not carry it)
    pub width: u16,
    /// Frame height in pixels (0 when the layout does not carry it)
    pub height: u16,
    /// Frame count declared by the header (0 when the layout does not carry it)
    pub declared_frame_count: u16,
}

/// Read and validate the version word
///
/// Returns `Ok(None)` when the buffer is too short to hold it.
pub(crate) fn read_version(data: &[u8]) -> Result<Option<u32>> {
    if data.len() < 4 {
        return Ok(None);
    }
    let version = (&data[..4]).get_u32_le();
    if version != RECORDING_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok(Some(version))
}

/// Read the recording header
pub fn read_header(data: &[u8]) -> Result<RecordingHeader> {
    let version = read_version(data)?.ok_or(FormatError::Truncated {
        offset: 0,
        needed: HEADER_SIZE,
        available: data.len(),
    })?;
    if data.len() < HEADER_SIZE {
        return Err(FormatError::Truncated {
            offset: 0,
            needed: HEADER_SIZE,
            available: data.len(),
        }
        .into());
    }

    Ok(RecordingHeader {
        version,
        ..Default::default()
    })
}

/// Decode a version 3 recording
///
/// Fails only when the version is not 3; any other problem ends decoding at
/// the last complete frame.
pub fn decode(data: &[u8]) -> Result<DecodeOutcome> {
    let header = match read_header(data) {
        Ok(header) => header,
        Err(Error::Format(e)) => return Ok(DecodeOutcome::failed(e)),
        Err(e) => return Err(e),
    };

    let mut outcome = DecodeOutcome {
        header: Some(header),
        ..Default::default()
    };

    let mut buf = &data[HEADER_SIZE..];
    while buf.has_remaining() && outcome.frames.len() < MAX_FRAMES {
        let index = outcome.frames.len() as i32;
        match decode_frame(&mut buf, data.len(), index) {
            Ok(frame) => outcome.frames.push(frame),
            Err(e) => {
                outcome.error = Some(e);
                break;
            }
        }
    }

    Ok(outcome)
}

fn ensure(buf: &[u8], total: usize, needed: usize) -> std::result::Result<(), FormatError> {
    if buf.remaining() < needed {
        return Err(FormatError::Truncated {
            offset: total - buf.remaining(),
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn decode_frame(
    buf: &mut &[u8],
    total: usize,
    index: i32,
) -> std::result::Result<PoseFrame, FormatError> {
    ensure(buf, total, FRAME_HEADER_SIZE)?;
    let delta_time = buf.get_u16_le();
    let num_people = buf.get_u16_le() as usize;
    if num_people > MAX_PEOPLE {
        return Err(FormatError::PeopleOutOfRange {
            offset: total - buf.remaining() - 2,
            count: num_people as i64,
            max: MAX_PEOPLE,
        });
    }

    let mut frame = PoseFrame::new(index);
    frame.delta_time = Some(delta_time);
    for _ in 0..num_people {
        frame.people.push(decode_person(buf, total)?);
    }

    Ok(frame)
}

fn decode_person(buf: &mut &[u8], total: usize) -> std::result::Result<PersonPose, FormatError> {
    ensure(buf, total, PERSON_HEADER_SIZE)?;
    let person_id = buf.get_i32_le();
    let _tracker_id = buf.get_u8();
    let num_keypoints = buf.get_u8() as usize;
    let _event = buf.get_u8();
    let _action_label = buf.get_u8();
    let _probabilities = buf.get_i64_le();

    if num_keypoints > MAX_KEYPOINTS {
        return Err(FormatError::KeypointsOutOfRange {
            offset: total - buf.remaining() - 11,
            count: num_keypoints,
            max: MAX_KEYPOINTS,
        });
    }
    ensure(buf, total, num_keypoints * KEYPOINT_ENTRY_SIZE)?;

    let mut person = PersonPose::new(Some(person_id));
    for _ in 0..num_keypoints {
        let index = (buf.get_u8() & INDEX_MASK) as usize;
        let _probability = buf.get_u8();
        let x = buf.get_u16_le() as f64 / COORD_SCALE;
        let y = buf.get_u16_le() as f64 / COORD_SCALE;
        store_keypoint(&mut person, index, x, y);
    }

    Ok(person)
}

/// Write a normalized keypoint if its slot exists and both coordinates lie in `(0, 1]`
pub(crate) fn store_keypoint(person: &mut PersonPose, index: usize, x: f64, y: f64) {
    let in_frame = |v: f64| v > 0.0 && v <= 1.0;
    if index < KEYPOINT_COUNT && in_frame(x) && in_frame(y) {
        person.keypoints[index] = Keypoint::new(x, y);
    }
}
