//! Compact recording layout (experimental)
//!
//! An alternative version 3 playback layout with a fixed frame header and a
//! single person per frame. It shares the version word with the standard
//! recording format, so it is never selected automatically: callers must ask
//! for [`PoseFormat::RecordingCompact`](super::PoseFormat::RecordingCompact).
//!
//! ```text
//! Header (28 bytes):
//!  +0   version u32LE (= 3)
//!  +16  width u16LE
//!  +18  height u16LE
//!  +26  frame count u16LE
//!
//! Frame:
//!  +0   epoch u16LE
//!  +3   numParts u8
//!  +20  numParts x { index u8, probability u8, x u16LE, y u16LE }
//! ```

use bytes::Buf;

use crate::error::{Error, FormatError, Result};
use crate::pose::{PersonPose, PoseFrame};

use super::recording::{read_version, store_keypoint, RecordingHeader, COORD_SCALE, MAX_FRAMES};
use super::DecodeOutcome;

pub const HEADER_SIZE: usize = 28;
pub const FRAME_HEADER_SIZE: usize = 20;
/// Bytes that must remain before another frame is read
pub const MIN_FRAME_REMAINING: usize = FRAME_HEADER_SIZE + 1;
pub const MAX_PARTS: usize = 25;

const WIDTH_OFFSET: usize = 16;
const FRAME_COUNT_OFFSET: usize = 26;
const PARTS_OFFSET: usize = 3;
const PART_SIZE: usize = 6;

pub fn read_header(data: &[u8]) -> Result<RecordingHeader> {
    let truncated = FormatError::Truncated {
        offset: 0,
        needed: HEADER_SIZE,
        available: data.len(),
    };
    let version = read_version(data)?.ok_or_else(|| truncated.clone())?;
    if data.len() < HEADER_SIZE {
        return Err(truncated.into());
    }

    let mut dims = &data[WIDTH_OFFSET..];
    let width = dims.get_u16_le();
    let height = dims.get_u16_le();
    let declared_frame_count = (&data[FRAME_COUNT_OFFSET..]).get_u16_le();

    Ok(RecordingHeader {
        version,
        width,
        height,
        declared_frame_count,
    })
}

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

    let frame_count = (header.declared_frame_count as usize).min(MAX_FRAMES);
    let mut offset = HEADER_SIZE;
    for index in 0..frame_count {
        match decode_frame(data, offset, index as i32) {
            Ok((frame, next)) => {
                outcome.frames.push(frame);
                offset = next;
            }
            Err(e) => {
                outcome.error = Some(e);
                break;
            }
        }
    }

    Ok(outcome)
}

fn decode_frame(
    data: &[u8],
    offset: usize,
    index: i32,
) -> std::result::Result<(PoseFrame, usize), FormatError> {
    let available = data.len().saturating_sub(offset);
    if available < MIN_FRAME_REMAINING {
        return Err(FormatError::Truncated {
            offset,
            needed: MIN_FRAME_REMAINING,
            available,
        });
    }

    let epoch = (&data[offset..]).get_u16_le();
    let num_parts = data[offset + PARTS_OFFSET] as usize;
    if num_parts > MAX_PARTS {
        return Err(FormatError::KeypointsOutOfRange {
            offset: offset + PARTS_OFFSET,
            count: num_parts,
            max: MAX_PARTS,
        });
    }

    let needed = FRAME_HEADER_SIZE + num_parts * PART_SIZE;
    if available < needed {
        return Err(FormatError::Truncated {
            offset,
            needed,
            available,
        });
    }

    let mut person = PersonPose::new(None);
    let mut parts = &data[offset + FRAME_HEADER_SIZE..offset + needed];
    while parts.has_remaining() {
        let slot = parts.get_u8() as usize;
        let _probability = parts.get_u8();
        let x = parts.get_u16_le() as f64 / COORD_SCALE;
        let y = parts.get_u16_le() as f64 / COORD_SCALE;
        store_keypoint(&mut person, slot, x, y);
    }

    let mut frame = PoseFrame::new(index);
    frame.delta_time = Some(epoch);
    frame.people.push(person);

    Ok((frame, offset + needed))
}
