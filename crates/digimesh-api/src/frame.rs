//! Frame wrapping and validation.
//!
//! Every API frame on the wire has the layout:
//!
//! ```text
//! +------+--------+--------+-----------------------+----------+
//! | 0x7E | len_hi | len_lo | frame data[0..len]    | checksum |
//! +------+--------+--------+-----------------------+----------+
//! ```
//!
//! The frame data starts with the frame type byte. The checksum is
//! `0xFF - (sum(frame data) & 0xFF)`.

use bytes::BufMut;

use crate::constants::*;
use crate::error::*;

/// Compute the 2's complement checksum of the frame data.
pub fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0xFF - sum
}

/// Wrap frame-specific data with the start delimiter, length and checksum.
///
/// Data of [`MAX_FRAME_DATA`] bytes or more is still framed, but the module
/// hardware will refuse it, so a warning is logged.
pub fn wrap_frame(data: &[u8]) -> Vec<u8> {
    if data.len() >= MAX_FRAME_DATA {
        log::warn!(
            "frame data is {} bytes; module hardware accepts less than {}",
            data.len(),
            MAX_FRAME_DATA
        );
    }

    let mut buf = Vec::with_capacity(FRAME_OVERHEAD + data.len());
    buf.push(START_DELIMITER);
    buf.put_u16(data.len() as u16);
    buf.extend_from_slice(data);
    buf.push(checksum(data));
    buf
}

/// Outcome of validating a candidate frame.
///
/// `declared_length` and `declared_checksum` are `None` when the buffer was too
/// short to carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCheck {
    /// Whether both length and checksum match the payload.
    pub valid: bool,
    /// Big-endian length field at offset 1-2.
    pub declared_length: Option<u16>,
    /// Trailing checksum byte.
    pub declared_checksum: Option<u8>,
}

impl FrameCheck {
    /// Result for a buffer that cannot be a frame at all.
    pub const TOO_SHORT: FrameCheck = FrameCheck {
        valid: false,
        declared_length: None,
        declared_checksum: None,
    };

    /// Convert into a `Result`, naming the first failing check.
    pub fn into_result(self, frame: &[u8]) -> FrameResult<()> {
        if self.valid {
            return Ok(());
        }
        let (Some(declared), Some(declared_sum)) = (self.declared_length, self.declared_checksum)
        else {
            return Err(FrameError::FrameTooShort {
                expected: FRAME_OVERHEAD,
                actual: frame.len(),
            });
        };
        let payload = &frame[FRAME_TYPE_OFFSET..frame.len() - 1];
        if declared as usize != payload.len() {
            return Err(FrameError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }
        Err(FrameError::ChecksumMismatch {
            declared: declared_sum,
            computed: checksum(payload),
        })
    }
}

/// Validate the length field and checksum of a complete, unescaped frame.
///
/// The buffer is assumed to start at the delimiter; the delimiter itself is
/// not inspected. Never panics.
pub fn validate(frame: &[u8]) -> FrameCheck {
    if frame.len() < FRAME_OVERHEAD {
        return FrameCheck::TOO_SHORT;
    }

    let declared_length = u16::from_be_bytes([frame[1], frame[2]]);
    let declared_checksum = frame[frame.len() - 1];
    let payload = &frame[FRAME_TYPE_OFFSET..frame.len() - 1];

    FrameCheck {
        valid: declared_length as usize == payload.len() && declared_checksum == checksum(payload),
        declared_length: Some(declared_length),
        declared_checksum: Some(declared_checksum),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_local_at_query() {
        let frame = wrap_frame(&[0x08, 0x52, 0x49, 0x44]);
        assert_eq!(frame, vec![0x7E, 0x00, 0x04, 0x08, 0x52, 0x49, 0x44, 0x62]);
    }

    #[test]
    fn test_wrapped_frames_validate() {
        let payloads: [&[u8]; 4] = [
            &[0x08],
            &[0x08, 0x52, 0x49, 0x44],
            &[0xFF; 40],
            &[0x10, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFE, 0x00, 0x00, 0x7E],
        ];
        for payload in payloads {
            let frame = wrap_frame(payload);
            let check = validate(&frame);
            assert!(check.valid);
            assert_eq!(check.declared_length, Some(payload.len() as u16));
            assert_eq!(check.declared_checksum, Some(checksum(payload)));
        }
    }

    #[test]
    fn test_large_frame_still_wrapped() {
        let data = vec![0xAB; MAX_FRAME_DATA + 5];
        let frame = wrap_frame(&data);
        assert_eq!(frame.len(), data.len() + FRAME_OVERHEAD);
        assert_eq!(&frame[1..3], &[0x00, 0x69]);
        assert!(validate(&frame).valid);
    }

    #[test]
    fn test_short_buffers_are_invalid() {
        for len in 0..FRAME_OVERHEAD {
            let buf = vec![0x7E; len];
            assert_eq!(validate(&buf), FrameCheck::TOO_SHORT);
        }
    }

    #[test]
    fn test_length_mismatch_rejected_even_with_good_checksum() {
        // Checksum is right for the payload, length says 5.
        let frame = [0x7E, 0x00, 0x05, 0x08, 0x52, 0x49, 0x44, 0x62];
        let check = validate(&frame);
        assert!(!check.valid);
        assert_eq!(check.declared_length, Some(5));
        assert_eq!(
            check.into_result(&frame),
            Err(FrameError::LengthMismatch {
                declared: 5,
                actual: 4
            })
        );
    }

    #[test]
    fn test_checksum_mismatch() {
        let frame = [0x7E, 0x00, 0x04, 0x08, 0x52, 0x49, 0x44, 0x63];
        let check = validate(&frame);
        assert!(!check.valid);
        assert_eq!(
            check.into_result(&frame),
            Err(FrameError::ChecksumMismatch {
                declared: 0x63,
                computed: 0x62
            })
        );
    }

    #[test]
    fn test_minimal_empty_payload() {
        // No payload: checksum of nothing is 0xFF.
        let frame = [0x7E, 0x00, 0x00, 0xFF];
        assert!(validate(&frame).valid);
    }
}
