//! Frame type dispatch table.

use crate::constants::*;
use crate::error::*;
use crate::registers::ModuleRegisters;
use crate::responses::*;

/// Decoder signature shared by every table entry.
pub type DecodeFn = fn(&[u8], &mut ModuleRegisters) -> FrameResult<Response>;

/// One row of the dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct DispatchEntry {
    /// Frame type byte.
    pub frame_type: u8,
    /// Human readable name.
    pub name: &'static str,
    /// Whether decoded frames should be surfaced to the log/print sink.
    pub surface: bool,
    /// Decoder for the frame.
    pub decode: DecodeFn,
}

/// Every inbound frame type this driver understands.
pub const DISPATCH_TABLE: &[DispatchEntry] = &[
    DispatchEntry {
        frame_type: FRAME_LOCAL_AT_RESPONSE,
        name: "AT Command Response",
        surface: true,
        decode: |frame, registers| LocalAtResponse::decode(frame, registers).map(Response::LocalAt),
    },
    DispatchEntry {
        frame_type: FRAME_TRANSMIT_STATUS,
        name: "Transmit Status",
        surface: false,
        decode: |frame, _| TransmitStatus::decode(frame).map(Response::TransmitStatus),
    },
    DispatchEntry {
        frame_type: FRAME_ROUTE_INFORMATION,
        name: "Route Information Packet",
        surface: true,
        decode: |frame, _| RouteInformation::decode(frame).map(Response::RouteInformation),
    },
    DispatchEntry {
        frame_type: FRAME_RECEIVE_PACKET,
        name: "Receive Packet (AO=0)",
        surface: false,
        decode: |frame, _| ReceivePacket::decode(frame).map(Response::Receive),
    },
    DispatchEntry {
        frame_type: FRAME_EXPLICIT_RECEIVE,
        name: "Explicit Rx Indicator (AO=1)",
        surface: true,
        decode: |frame, registers| {
            ExplicitReceivePacket::decode(frame, registers).map(Response::ExplicitReceive)
        },
    },
    DispatchEntry {
        frame_type: FRAME_REMOTE_AT_RESPONSE,
        name: "Remote Command Response",
        surface: true,
        decode: |frame, _| RemoteAtResponse::decode(frame).map(Response::RemoteAt),
    },
];

/// Find the table entry for a frame type.
pub fn lookup(frame_type: u8) -> Option<&'static DispatchEntry> {
    DISPATCH_TABLE.iter().find(|entry| entry.frame_type == frame_type)
}

/// Decode a validated, unescaped frame by its type byte.
pub fn dispatch(
    frame_type: u8,
    frame: &[u8],
    registers: &mut ModuleRegisters,
) -> FrameResult<Response> {
    let entry = lookup(frame_type).ok_or(FrameError::UnrecognizedFrameType(frame_type))?;
    log::trace!("dispatching {} (0x{:02X})", entry.name, frame_type);
    (entry.decode)(frame, registers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::wrap_frame;

    #[test]
    fn test_table_has_unique_types() {
        for (i, a) in DISPATCH_TABLE.iter().enumerate() {
            for b in &DISPATCH_TABLE[i + 1..] {
                assert_ne!(a.frame_type, b.frame_type);
            }
        }
        assert_eq!(DISPATCH_TABLE.len(), 6);
    }

    #[test]
    fn test_surface_flags() {
        assert!(lookup(0x88).unwrap().surface);
        assert!(!lookup(0x8B).unwrap().surface);
        assert!(!lookup(0x90).unwrap().surface);
        assert!(lookup(0x97).unwrap().surface);
    }

    #[test]
    fn test_dispatch_local_at() {
        let mut regs = ModuleRegisters::new();
        let frame = wrap_frame(&[0x88, 0x52, b'D', b'B', 0x00, 0x30]);
        let response = dispatch(0x88, &frame, &mut regs).unwrap();
        assert_eq!(response.frame_type(), 0x88);
        assert_eq!(response.frame_id(), Some(0x52));
        assert_eq!(regs.get("DB"), Some("30"));
    }

    #[test]
    fn test_dispatch_unknown_type() {
        let mut regs = ModuleRegisters::new();
        let frame = wrap_frame(&[0x95, 0x00]);
        assert_eq!(
            dispatch(0x95, &frame, &mut regs).unwrap_err(),
            FrameError::UnrecognizedFrameType(0x95)
        );
    }
}
