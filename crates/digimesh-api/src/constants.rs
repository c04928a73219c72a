//! Protocol constants
//!
//! Frame type codes, reserved bytes and default field values used by the
//! DigiMesh API frame protocol.

// ============================================================================
// Framing
// ============================================================================

/// Start delimiter opening every API frame.
pub const START_DELIMITER: u8 = 0x7E;
/// Escape marker used in API mode 2.
pub const ESCAPE: u8 = 0x7D;
/// Software flow control XON.
pub const XON: u8 = 0x11;
/// Software flow control XOFF.
pub const XOFF: u8 = 0x13;
/// Value XORed into an escaped byte.
pub const ESCAPE_XOR: u8 = 0x20;
/// Bytes that must be escaped in API mode 2.
pub const RESERVED_BYTES: [u8; 4] = [START_DELIMITER, ESCAPE, XON, XOFF];

/// Delimiter (1) + length (2) + checksum (1).
pub const FRAME_OVERHEAD: usize = 4;
/// Offset of the frame type byte in a complete frame.
pub const FRAME_TYPE_OFFSET: usize = 3;
/// Frame-specific data size the module hardware accepts.
pub const MAX_FRAME_DATA: usize = 100;

// ============================================================================
// Frame Types (host → module)
// ============================================================================

/// Local AT command request.
pub const FRAME_LOCAL_AT_COMMAND: u8 = 0x08;
/// Transmit request.
pub const FRAME_TRANSMIT_REQUEST: u8 = 0x10;
/// Explicit addressing transmit request.
pub const FRAME_EXPLICIT_TRANSMIT: u8 = 0x11;
/// Remote AT command request.
pub const FRAME_REMOTE_AT_COMMAND: u8 = 0x17;

// ============================================================================
// Frame Types (module → host)
// ============================================================================

/// Local AT command response.
pub const FRAME_LOCAL_AT_RESPONSE: u8 = 0x88;
/// Transmit status.
pub const FRAME_TRANSMIT_STATUS: u8 = 0x8B;
/// Route information packet.
pub const FRAME_ROUTE_INFORMATION: u8 = 0x8D;
/// Receive packet (AO=0).
pub const FRAME_RECEIVE_PACKET: u8 = 0x90;
/// Explicit receive indicator (AO=1).
pub const FRAME_EXPLICIT_RECEIVE: u8 = 0x91;
/// Remote AT command response.
pub const FRAME_REMOTE_AT_RESPONSE: u8 = 0x97;

// ============================================================================
// Defaults
// ============================================================================

/// Default frame id for local AT commands.
pub const DEFAULT_LOCAL_FRAME_ID: u8 = 0x52;
/// Default frame id for remote AT commands and transmissions.
pub const DEFAULT_FRAME_ID: u8 = 0x01;
/// 16-bit network address meaning "unknown".
pub const UNKNOWN_NETWORK_ADDRESS: [u8; 2] = [0xFF, 0xFE];
/// Reserved field used by trace routing.
pub const TRACE_ROUTE_RESERVED: [u8; 2] = [0xFF, 0xFF];
/// Remote AT option: apply changes immediately.
pub const REMOTE_APPLY_CHANGES: u8 = 0x02;
/// Transmit option: trace route.
pub const TRANSMIT_OPTION_TRACE_ROUTE: u8 = 0x08;
/// Mask applied to the receive option byte; other bits are reserved.
pub const RECEIVE_OPTION_MASK: u8 = 0x02;
/// Receive option bit set when the packet was broadcast.
pub const RECEIVE_OPTION_BROADCAST: u8 = 0x02;

/// Default profile id for explicit transmissions (Digi).
pub const DEFAULT_PROFILE_ID: u16 = 0xC105;
/// Endpoint used by the link test.
pub const LINK_TEST_ENDPOINT: u8 = 0xE6;
/// Cluster id used by the link test.
pub const LINK_TEST_CLUSTER_ID: u16 = 0x0014;

// ============================================================================
// AT Command Status Codes
// ============================================================================

/// AT command succeeded.
pub const AT_STATUS_OK: u8 = 0;
/// AT command failed.
pub const AT_STATUS_ERROR: u8 = 1;
/// Unknown AT command.
pub const AT_STATUS_INVALID_COMMAND: u8 = 2;
/// Invalid AT parameter.
pub const AT_STATUS_INVALID_PARAMETER: u8 = 3;
/// Remote command could not be routed.
pub const AT_STATUS_ROUTE_NOT_FOUND: u8 = 4;

// ============================================================================
// Transmit Status Codes
// ============================================================================

/// Delivered.
pub const DELIVERY_SUCCESS: u8 = 0x00;
/// MAC ACK failure.
pub const DELIVERY_MAC_ACK_FAILED: u8 = 0x01;
/// Invalid destination endpoint.
pub const DELIVERY_INVALID_DESTINATION: u8 = 0x15;
/// Network ACK failure.
pub const DELIVERY_NETWORK_ACK_FAILED: u8 = 0x21;
/// Route not found.
pub const DELIVERY_ROUTE_NOT_FOUND: u8 = 0x25;

/// No discovery overhead.
pub const DISCOVERY_NO_OVERHEAD: u8 = 0x00;
/// Route discovery was required.
pub const DISCOVERY_ROUTE: u8 = 0x02;
