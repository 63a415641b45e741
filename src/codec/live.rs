//! Live skeleton stream format (fixed-block, multi-frame)
//!
//! Every MQTT skeleton message carries one or more frames back to back:
//!
//! ```text
//! Frame:
//! +----------------+----------------+---------------------------+
//! | frameNum i32LE | numPeople i32LE| numPeople x PersonRecord  |
//! +----------------+----------------+---------------------------+
//!
//! PersonRecord (152 bytes), IdPadded layout:
//! +-------------+---------+---------------+---------------+
//! | personId(4) | pad(4)  | 18 x f32LE  X | 18 x f32LE  Y |
//! +-------------+---------+---------------+---------------+
//!  +0            +4        +8              +80
//!
//! PersonRecord (152 bytes), TrailingPad layout:
//! +-------------+---------------+---------------+---------+
//! | personId(4) | 18 x f32LE  X | 18 x f32LE  Y | pad(4)  |
//! +-------------+---------------+---------------+---------+
//!  +0            +4              +76             +148
//! ```
//!
//! Coordinates are already normalized to `0.0..=1.0`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FormatError;
use crate::pose::{Keypoint, PersonPose, PoseFrame, KEYPOINT_COUNT};

use super::DecodeOutcome;

/// Frame header: frame number + person count
pub const FRAME_HEADER_SIZE: usize = 8;

/// Fixed size of one person record
pub const PERSON_RECORD_SIZE: usize = 152;

/// Upper sanity bound on people per frame
pub const MAX_PEOPLE: usize = 20;

const COORD_BLOCK_SIZE: usize = KEYPOINT_COUNT * 4;

/// Byte placement of the coordinate blocks inside a person record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveLayout {
    /// Four pad bytes after the person id, x at +8, y at +80
    #[default]
    IdPadded,
    /// Coordinates directly after the person id, x at +4, y at +76
    TrailingPad,
}

impl LiveLayout {
    fn x_offset(self) -> usize {
        match self {
            LiveLayout::IdPadded => 8,
            LiveLayout::TrailingPad => 4,
        }
    }

    fn y_offset(self) -> usize {
        self.x_offset() + COORD_BLOCK_SIZE
    }
}

/// Size in bytes of a frame holding `num_people` records
pub fn frame_size(num_people: usize) -> usize {
    FRAME_HEADER_SIZE + num_people * PERSON_RECORD_SIZE
}

/// Decode every complete frame in `data`
///
/// Decoding stops at the first frame that is inconsistent or truncated;
/// frames before it are returned together with the reason.
pub fn decode(data: &[u8], layout: LiveLayout) -> DecodeOutcome {
    let mut outcome = DecodeOutcome::default();

    if data.len() < FRAME_HEADER_SIZE {
        outcome.error = Some(FormatError::Truncated {
            offset: 0,
            needed: FRAME_HEADER_SIZE,
            available: data.len(),
        });
        return outcome;
    }

    let mut offset = 0;
    while data.len() - offset >= FRAME_HEADER_SIZE {
        match decode_frame(&data[offset..], offset, layout) {
            Ok((frame, consumed)) => {
                outcome.frames.push(frame);
                offset += consumed;
            }
            Err(e) => {
                outcome.error = Some(e);
                break;
            }
        }
    }

    outcome
}

/// Decode one frame at the start of `buf`, returning it and its size
fn decode_frame(
    mut buf: &[u8],
    offset: usize,
    layout: LiveLayout,
) -> Result<(PoseFrame, usize), FormatError> {
    let available = buf.len();
    let frame_number = buf.get_i32_le();
    let num_people = buf.get_i32_le();

    if num_people < 0 || num_people as usize > MAX_PEOPLE {
        return Err(FormatError::PeopleOutOfRange {
            offset: offset + 4,
            count: num_people as i64,
            max: MAX_PEOPLE,
        });
    }

    let num_people = num_people as usize;
    let size = frame_size(num_people);
    if available < size {
        return Err(FormatError::Truncated {
            offset,
            needed: size,
            available,
        });
    }

    let mut frame = PoseFrame::new(frame_number);
    frame.people.reserve(num_people);
    for record in buf[..num_people * PERSON_RECORD_SIZE].chunks_exact(PERSON_RECORD_SIZE) {
        frame.people.push(decode_person(record, layout));
    }

    Ok((frame, size))
}

fn decode_person(record: &[u8], layout: LiveLayout) -> PersonPose {
    let person_id = (&record[..4]).get_i32_le();
    let mut person = PersonPose::new(Some(person_id));

    let mut xs = &record[layout.x_offset()..layout.x_offset() + COORD_BLOCK_SIZE];
    let mut ys = &record[layout.y_offset()..layout.y_offset() + COORD_BLOCK_SIZE];
    for slot in person.keypoints.iter_mut() {
        *slot = Keypoint::new(xs.get_f32_le() as f64, ys.get_f32_le() as f64);
    }

    person
}

/// Encode frames into the live wire format
///
/// Missing person ids are written as 0. Pad bytes are zero.
pub fn encode(frames: &[PoseFrame], layout: LiveLayout) -> Bytes {
    let total: usize = frames.iter().map(|f| frame_size(f.people.len())).sum();
    let mut buf = BytesMut::with_capacity(total);

    for frame in frames {
        buf.put_i32_le(frame.frame_number);
        buf.put_i32_le(frame.people.len() as i32);

        for person in &frame.people {
            let mut record = [0u8; PERSON_RECORD_SIZE];
            (&mut record[..4]).put_i32_le(person.person_id.unwrap_or(0));

            let mut xs = &mut record[layout.x_offset()..layout.x_offset() + COORD_BLOCK_SIZE];
            for kp in &person.keypoints {
                xs.put_f32_le(kp.x as f32);
            }
            let mut ys = &mut record[layout.y_offset()..layout.y_offset() + COORD_BLOCK_SIZE];
            for kp in &person.keypoints {
                ys.put_f32_le(kp.y as f32);
            }

            buf.put_slice(&record);
        }
    }

    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::KeypointName;
    use proptest::prelude::*;

    fn person(id: i32, seed: f64) -> PersonPose {
        let mut p = PersonPose::new(Some(id));
        for (i, kp) in p.keypoints.iter_mut().enumerate() {
            *kp = Keypoint::new(seed + i as f64 * 0.01, 1.0 - seed - i as f64 * 0.02);
        }
        p
    }

    fn assert_frames_close(decoded: &[PoseFrame], expected: &[PoseFrame]) {
        assert_eq!(decoded.len(), expected.len());
        for (d, e) in decoded.iter().zip(expected) {
            assert_eq!(d.frame_number, e.frame_number);
            assert_eq!(d.people.len(), e.people.len());
            for (dp, ep) in d.people.iter().zip(&e.people) {
                assert_eq!(dp.person_id, ep.person_id);
                for (dk, ek) in dp.keypoints.iter().zip(&ep.keypoints) {
                    assert!((dk.x - ek.x).abs() < 1e-6, "x {} vs {}", dk.x, ek.x);
                    assert!((dk.y - ek.y).abs() < 1e-6, "y {} vs {}", dk.y, ek.y);
                }
            }
        }
    }

    #[test]
    fn test_empty_frame() {
        let mut data = Vec::new();
        data.extend_from_slice(&42i32.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());

        let outcome = decode(&data, LiveLayout::default());
        assert!(outcome.is_complete());
        assert_eq!(outcome.frames.len(), 1);
        assert_eq!(outcome.frames[0].frame_number, 42);
        assert!(outcome.frames[0].people.is_empty());
    }

    #[test]
    fn test_round_trip_both_layouts() {
        let mut f1 = PoseFrame::new(100);
        f1.people.push(person(3, 0.1));
        f1.people.push(person(1, 0.2));
        let f2 = PoseFrame::new(101);
        let frames = vec![f1, f2];

        for layout in [LiveLayout::IdPadded, LiveLayout::TrailingPad] {
            let bytes = encode(&frames, layout);
            assert_eq!(bytes.len(), frame_size(2) + frame_size(0));

            let outcome = decode(&bytes, layout);
            assert!(outcome.is_complete());
            assert_frames_close(&outcome.frames, &frames);
        }
    }

    #[test]
    fn test_id_padded_offsets() {
        let mut data = vec![0u8; frame_size(1)];
        data[0..4].copy_from_slice(&9i32.to_le_bytes());
        data[4..8].copy_from_slice(&1i32.to_le_bytes());
        let rec = FRAME_HEADER_SIZE;
        data[rec..rec + 4].copy_from_slice(&77i32.to_le_bytes());
        // Nose x at +8, Nose y at +80
        data[rec + 8..rec + 12].copy_from_slice(&0.5f32.to_le_bytes());
        data[rec + 80..rec + 84].copy_from_slice(&0.25f32.to_le_bytes());

        let outcome = decode(&data, LiveLayout::IdPadded);
        let p = &outcome.frames[0].people[0];
        assert_eq!(p.person_id, Some(77));
        assert_eq!(p.keypoint(KeypointName::Nose), Keypoint::new(0.5, 0.25));
        assert!(!p.keypoint(KeypointName::Neck).is_known());
    }

    #[test]
    fn test_negative_people_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&(-1i32).to_le_bytes());

        let outcome = decode(&data, LiveLayout::default());
        assert!(outcome.frames.is_empty());
        assert!(matches!(
            outcome.error,
            Some(FormatError::PeopleOutOfRange { count: -1, .. })
        ));
    }

    #[test]
    fn test_too_many_people_stops_after_valid_frames() {
        let valid = encode(&[PoseFrame::new(1)], LiveLayout::default());
        let mut data = valid.to_vec();
        data.extend_from_slice(&2i32.to_le_bytes());
        data.extend_from_slice(&21i32.to_le_bytes());

        let outcome = decode(&data, LiveLayout::default());
        assert_eq!(outcome.frames.len(), 1);
        assert!(matches!(
            outcome.error,
            Some(FormatError::PeopleOutOfRange { offset: 12, count: 21, .. })
        ));
    }

    #[test]
    fn test_short_buffer_is_unparseable() {
        let outcome = decode(&[1, 2, 3], LiveLayout::default());
        assert!(outcome.frames.is_empty());
        assert_eq!(
            outcome.error,
            Some(FormatError::Truncated {
                offset: 0,
                needed: 8,
                available: 3
            })
        );
    }

    #[test]
    fn test_trailing_bytes_below_header_ignored() {
        let mut data = encode(&[PoseFrame::new(5)], LiveLayout::default()).to_vec();
        data.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let outcome = decode(&data, LiveLayout::default());
        assert!(outcome.is_complete());
        assert_eq!(outcome.frames.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_truncated_mid_record_keeps_complete_frames(
            complete in 0usize..4,
            people in 1usize..4,
            cut in 1usize..PERSON_RECORD_SIZE,
        ) {
            let mut frames: Vec<PoseFrame> = (0..complete)
                .map(|i| {
                    let mut f = PoseFrame::new(i as i32);
                    f.people.push(person(i as i32, 0.1));
                    f
                })
                .collect();
            let mut last = PoseFrame::new(99);
            for i in 0..people {
                last.people.push(person(i as i32, 0.3));
            }
            frames.push(last);

            let bytes = encode(&frames, LiveLayout::IdPadded);
            let truncated = &bytes[..bytes.len() - cut];
            let outcome = decode(truncated, LiveLayout::IdPadded);

            prop_assert_eq!(outcome.frames.len(), complete);
            let is_truncated = matches!(outcome.error, Some(FormatError::Truncated { .. }));
            prop_assert!(is_truncated);
        }

        #[test]
        fn prop_zero_people_frames_decode_empty(frame_number in any::<i32>()) {
            let mut data = Vec::new();
            data.extend_from_slice(&frame_number.to_le_bytes());
            data.extend_from_slice(&0i32.to_le_bytes());

            let outcome = decode(&data, LiveLayout::default());
            prop_assert!(outcome.is_complete());
            prop_assert_eq!(outcome.frames.len(), 1);
            prop_assert_eq!(outcome.frames[0].frame_number, frame_number);
            prop_assert!(outcome.frames[0].people.is_empty());
        }
    }
}
