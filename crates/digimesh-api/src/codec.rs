//! Incremental receive buffer.
//!
//! Serial reads rarely line up with frame boundaries. [`FrameReassembler`]
//! accumulates raw bytes, splits them on the start delimiter and decodes every
//! fragment that validates. A trailing fragment that does not validate yet is
//! kept for the next pass, since the rest of it is probably still in flight.

use bytes::BytesMut;

use crate::constants::*;
use crate::dispatch::{dispatch, lookup};
use crate::error::*;
use crate::escape::unescape;
use crate::frame::validate;
use crate::registers::ModuleRegisters;
use crate::responses::Response;
use crate::types::ApiMode;

/// Frames decoded from one reassembly pass.
#[derive(Debug, Clone, Default)]
pub struct FrameBatch {
    /// Decoded frames in arrival order.
    pub frames: Vec<Response>,
    /// Fragments discarded as malformed.
    pub dropped: usize,
    /// Type bytes of well-formed frames with no decoder.
    pub unrecognized: Vec<u8>,
}

impl FrameBatch {
    /// Whether nothing at all came out of the pass.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.dropped == 0 && self.unrecognized.is_empty()
    }

    /// Frames whose dispatch entry asks for them to be surfaced.
    pub fn surfaced(&self) -> impl Iterator<Item = &Response> {
        self.frames
            .iter()
            .filter(|frame| lookup(frame.frame_type()).is_some_and(|entry| entry.surface))
    }
}

/// Result of one reassembly pass.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    /// Transparent mode: the raw bytes, unframed.
    Transparent(Vec<u8>),
    /// API mode: the decoded frames.
    Frames(FrameBatch),
}

impl ReadOutcome {
    /// Whether the pass produced nothing worth reporting.
    pub fn is_empty(&self) -> bool {
        match self {
            ReadOutcome::Transparent(bytes) => bytes.is_empty(),
            ReadOutcome::Frames(batch) => batch.is_empty(),
        }
    }
}

/// Stateful splitter that turns a raw byte stream into frames.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: BytesMut,
}

impl FrameReassembler {
    /// Create an empty reassembler.
    pub fn new() -> Self {
        FrameReassembler {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Append raw bytes from the serial line.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Append `data` and run one pass.
    pub fn feed(
        &mut self,
        data: &[u8],
        mode: ApiMode,
        registers: &mut ModuleRegisters,
    ) -> ReadOutcome {
        self.push(data);
        self.process(mode, registers)
    }

    /// Run one reassembly pass over everything buffered.
    ///
    /// Local AT responses update `registers` as they are decoded.
    pub fn process(&mut self, mode: ApiMode, registers: &mut ModuleRegisters) -> ReadOutcome {
        if !mode.is_api() {
            return ReadOutcome::Transparent(self.buffer.split().to_vec());
        }

        let raw = self.buffer.split();
        let mut batch = FrameBatch::default();
        let mut retained: Option<&[u8]> = None;

        let fragments: Vec<&[u8]> = raw[..].split(|b| *b == START_DELIMITER).collect();
        let last = fragments.len().saturating_sub(1);

        for (i, fragment) in fragments.into_iter().enumerate() {
            if fragment.is_empty() {
                continue;
            }

            let mut candidate = Vec::with_capacity(fragment.len() + 1);
            candidate.push(START_DELIMITER);
            candidate.extend_from_slice(fragment);
            let frame = unescape(&candidate);

            let result = validate(&frame)
                .into_result(&frame)
                .and_then(|()| dispatch(frame[FRAME_TYPE_OFFSET], &frame, registers));

            match result {
                Ok(response) => batch.frames.push(response),
                Err(FrameError::UnrecognizedFrameType(frame_type)) => {
                    log::warn!("skipping frame with unrecognized type 0x{:02X}", frame_type);
                    batch.unrecognized.push(frame_type);
                }
                Err(e) if i == last => {
                    log::trace!("keeping {} byte tail: {}", fragment.len(), e);
                    retained = Some(fragment);
                }
                Err(e) => {
                    log::debug!("dropping {} byte fragment: {}", fragment.len(), e);
                    batch.dropped += 1;
                }
            }
        }

        if let Some(tail) = retained {
            self.buffer.extend_from_slice(tail);
        }
        ReadOutcome::Frames(batch)
    }

    /// Number of bytes waiting for the next pass.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::escape;
    use crate::frame::wrap_frame;

    fn frames(outcome: ReadOutcome) -> FrameBatch {
        match outcome {
            ReadOutcome::Frames(batch) => batch,
            ReadOutcome::Transparent(_) => panic!("expected frames"),
        }
    }

    fn id_response(value: &[u8]) -> Vec<u8> {
        let mut data = vec![0x88, 0x52, b'I', b'D', 0x00];
        data.extend_from_slice(value);
        escape(&wrap_frame(&data))
    }

    #[test]
    fn test_frame_split_across_reads() {
        let mut reassembler = FrameReassembler::new();
        let mut regs = ModuleRegisters::new();
        let frame = id_response(&[0x12, 0x34]);

        let batch = frames(reassembler.feed(&frame[..1], ApiMode::ApiEscaped, &mut regs));
        assert!(batch.frames.is_empty());

        let batch = frames(reassembler.feed(&frame[1..], ApiMode::ApiEscaped, &mut regs));
        assert_eq!(batch.frames.len(), 1);
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn test_frame_split_mid_payload() {
        let mut reassembler = FrameReassembler::new();
        let mut regs = ModuleRegisters::new();
        let frame = id_response(&[0x12, 0x34]);

        let batch = frames(reassembler.feed(&frame[..5], ApiMode::ApiEscaped, &mut regs));
        assert!(batch.is_empty());
        assert_eq!(reassembler.buffered_len(), 4);

        let batch = frames(reassembler.feed(&frame[5..], ApiMode::ApiEscaped, &mut regs));
        assert_eq!(batch.frames.len(), 1);
        assert_eq!(regs.get("ID"), Some("1234"));
    }

    #[test]
    fn test_two_frames_in_one_read() {
        let mut reassembler = FrameReassembler::new();
        let mut regs = ModuleRegisters::new();
        let mut data = id_response(&[0x00, 0x01]);
        data.extend(escape(&wrap_frame(&[0x8B, 0x01, 0xFF, 0xFE, 0x00, 0x00, 0x00])));

        let batch = frames(reassembler.feed(&data, ApiMode::ApiEscaped, &mut regs));
        assert_eq!(batch.frames.len(), 2);
        assert_eq!(batch.frames[0].frame_type(), 0x88);
        assert_eq!(batch.frames[1].frame_type(), 0x8B);
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn test_escaped_value_decoded() {
        let mut reassembler = FrameReassembler::new();
        let mut regs = ModuleRegisters::new();
        let data = id_response(&[0x7E, 0x11]);
        assert!(data.len() > 11);

        let batch = frames(reassembler.feed(&data, ApiMode::ApiEscaped, &mut regs));
        assert_eq!(batch.frames.len(), 1);
        assert_eq!(regs.get("ID"), Some("7e11"));
    }

    #[test]
    fn test_corrupt_frame_dropped_but_next_kept() {
        let mut reassembler = FrameReassembler::new();
        let mut regs = ModuleRegisters::new();
        let mut data = id_response(&[0x12, 0x34]);
        let checksum = data.len() - 1;
        data[checksum] ^= 0xFF;
        data.extend(id_response(&[0x56, 0x78]));

        let batch = frames(reassembler.feed(&data, ApiMode::ApiEscaped, &mut regs));
        assert_eq!(batch.frames.len(), 1);
        assert_eq!(batch.dropped, 1);
        assert_eq!(regs.get("ID"), Some("5678"));
    }

    #[test]
    fn test_unrecognized_type_consumed() {
        let mut reassembler = FrameReassembler::new();
        let mut regs = ModuleRegisters::new();
        let mut data = escape(&wrap_frame(&[0x95, 0x00, 0x01]));
        data.extend(id_response(&[0x00, 0x02]));
        data.extend(escape(&wrap_frame(&[0x95, 0x00, 0x02])));

        let batch = frames(reassembler.feed(&data, ApiMode::ApiEscaped, &mut regs));
        assert_eq!(batch.frames.len(), 1);
        assert_eq!(batch.unrecognized, vec![0x95, 0x95]);
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn test_valid_but_too_short_tail_retained() {
        let mut reassembler = FrameReassembler::new();
        let mut regs = ModuleRegisters::new();
        let data = wrap_frame(&[0x8B, 0x01]);

        let batch = frames(reassembler.feed(&data, ApiMode::Api, &mut regs));
        assert!(batch.frames.is_empty());
        assert_eq!(reassembler.buffered_len(), data.len() - 1);
    }

    #[test]
    fn test_garbage_before_frame_dropped() {
        let mut reassembler = FrameReassembler::new();
        let mut regs = ModuleRegisters::new();
        let mut data = vec![0x01, 0x02, 0x03];
        data.extend(id_response(&[0x00, 0x03]));

        let batch = frames(reassembler.feed(&data, ApiMode::ApiEscaped, &mut regs));
        assert_eq!(batch.frames.len(), 1);
        assert_eq!(batch.dropped, 1);
    }

    #[test]
    fn test_transparent_mode_passes_bytes() {
        let mut reassembler = FrameReassembler::new();
        let mut regs = ModuleRegisters::new();
        let data = b"hello\x7Eworld".to_vec();

        match reassembler.feed(&data, ApiMode::Transparent, &mut regs) {
            ReadOutcome::Transparent(bytes) => assert_eq!(bytes, data),
            ReadOutcome::Frames(_) => panic!("expected transparent bytes"),
        }
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn test_surfaced_filter() {
        let mut reassembler = FrameReassembler::new();
        let mut regs = ModuleRegisters::new();
        let mut data = id_response(&[0x00, 0x01]);
        data.extend(escape(&wrap_frame(&[0x8B, 0x01, 0xFF, 0xFE, 0x00, 0x00, 0x00])));

        let batch = frames(reassembler.feed(&data, ApiMode::ApiEscaped, &mut regs));
        let surfaced: Vec<u8> = batch.surfaced().map(Response::frame_type).collect();
        assert_eq!(surfaced, vec![0x88]);
    }
}
