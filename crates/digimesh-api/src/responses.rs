//! Frames received from the module.
//!
//! Every decoder takes a complete, unescaped frame starting at the delimiter
//! that has already passed [`validate`](crate::frame::validate). Offsets below
//! are counted from the delimiter.

use std::fmt;

use crate::constants::*;
use crate::error::*;
use crate::registers::ModuleRegisters;
use crate::types::*;

/// Reject a frame too short for the fixed fields of its type.
fn require(frame: &[u8], expected: usize) -> FrameResult<()> {
    if frame.len() < expected {
        return Err(FrameError::FrameTooShort {
            expected,
            actual: frame.len(),
        });
    }
    Ok(())
}

/// Variable-length tail between `start` and the checksum byte.
fn tail(frame: &[u8], start: usize) -> Vec<u8> {
    frame[start..frame.len() - 1].to_vec()
}

fn address(frame: &[u8], start: usize) -> Address64 {
    Address64::from_slice(&frame[start..start + 8]).unwrap_or_default()
}

fn command(frame: &[u8], start: usize) -> String {
    String::from_utf8_lossy(&frame[start..start + 2]).into_owned()
}

fn describe_option(option: u8) -> String {
    match option {
        0x00 | 0x01 => "toMe".to_string(),
        RECEIVE_OPTION_BROADCAST => "broadcast".to_string(),
        other => format!("status: {}", other),
    }
}

// ============================================================================
// Local AT Command Response (0x88)
// ============================================================================

/// Reply to a local AT command.
#[derive(Debug, Clone)]
pub struct LocalAtResponse {
    /// Shared frame state.
    pub meta: FrameMeta,
    /// Frame id of the command being answered.
    pub frame_id: u8,
    /// Two-letter command.
    pub command: String,
    /// Command status.
    pub status: AtStatus,
    /// Register value, present for queries.
    pub value: Option<Vec<u8>>,
}

impl LocalAtResponse {
    /// Minimum frame length: delimiter, length, type, id, command, status, checksum.
    pub const MIN_LEN: usize = 9;

    /// Decode the frame. A returned value is stored into `registers` under the
    /// command name as lowercase hex.
    pub fn decode(frame: &[u8], registers: &mut ModuleRegisters) -> FrameResult<Self> {
        require(frame, Self::MIN_LEN)?;
        let response = LocalAtResponse {
            meta: FrameMeta::now(),
            frame_id: frame[4],
            command: command(frame, 5),
            status: AtStatus::from(frame[7]),
            value: (frame.len() > Self::MIN_LEN).then(|| tail(frame, 8)),
        };
        if let Some(ref value) = response.value {
            log::trace!("register {} = {}", response.command, hex::encode(value));
            registers.set_bytes(response.command.clone(), value);
        }
        Ok(response)
    }

    /// Register value as uppercase hex.
    pub fn value_hex(&self) -> Option<String> {
        self.value.as_ref().map(hex::encode_upper)
    }
}

impl fmt::Display for LocalAtResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value_hex() {
            Some(value) => write!(
                f,
                "{}  IN (addr:  local  ) Registry '{}' = '{}'; [{}]",
                self.meta.stamp(),
                self.command,
                value,
                self.status
            ),
            None => write!(
                f,
                "{}  IN (addr:  local  ) Registry '{}' has been set; [{}]",
                self.meta.stamp(),
                self.command,
                self.status
            ),
        }
    }
}

// ============================================================================
// Remote AT Command Response (0x97)
// ============================================================================

/// Reply to a remote AT command.
#[derive(Debug, Clone)]
pub struct RemoteAtResponse {
    /// Shared frame state.
    pub meta: FrameMeta,
    /// Frame id of the command being answered.
    pub frame_id: u8,
    /// Address of the responding node.
    pub source: Address64,
    /// Two-letter command.
    pub command: String,
    /// Command status.
    pub status: AtStatus,
    /// Register value, present for queries.
    pub value: Option<Vec<u8>>,
}

impl RemoteAtResponse {
    /// Minimum frame length.
    pub const MIN_LEN: usize = 19;

    /// Decode the frame. Remote values describe another node and leave the
    /// local register map untouched.
    pub fn decode(frame: &[u8]) -> FrameResult<Self> {
        require(frame, Self::MIN_LEN)?;
        Ok(RemoteAtResponse {
            meta: FrameMeta::now(),
            frame_id: frame[4],
            source: address(frame, 5),
            command: command(frame, 15),
            status: AtStatus::from(frame[17]),
            value: (frame.len() > Self::MIN_LEN).then(|| tail(frame, 18)),
        })
    }

    /// Register value as uppercase hex.
    pub fn value_hex(&self) -> Option<String> {
        self.value.as_ref().map(hex::encode_upper)
    }
}

impl fmt::Display for RemoteAtResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value_hex() {
            Some(value) => write!(
                f,
                "{}  IN (addr: {}) Registry '{}' = '{}'; [{}]",
                self.meta.stamp(),
                self.source.low,
                self.command,
                value,
                self.status
            ),
            None => write!(
                f,
                "{}  IN (addr: {}) Registry '{}' has been set; [{}]",
                self.meta.stamp(),
                self.source.low,
                self.command,
                self.status
            ),
        }
    }
}

// ============================================================================
// Receive Packet (0x90)
// ============================================================================

/// RF data received from another node.
#[derive(Debug, Clone)]
pub struct ReceivePacket {
    /// Shared frame state.
    pub meta: FrameMeta,
    /// Byte at offset 4, reported as the frame id.
    pub frame_id: u8,
    /// Low three bytes of the sender's high address word.
    pub source_high: [u8; 3],
    /// Sender's low address word.
    pub source_low: AddressWord,
    /// Option byte masked to the broadcast bit.
    pub option: u8,
    /// Payload.
    pub data: Vec<u8>,
}

impl ReceivePacket {
    /// Minimum frame length (empty payload).
    pub const MIN_LEN: usize = 16;

    /// Decode the frame.
    pub fn decode(frame: &[u8]) -> FrameResult<Self> {
        require(frame, Self::MIN_LEN)?;
        Ok(ReceivePacket {
            meta: FrameMeta::now(),
            frame_id: frame[4],
            source_high: [frame[5], frame[6], frame[7]],
            source_low: AddressWord([frame[8], frame[9], frame[10], frame[11]]),
            option: frame[14] & RECEIVE_OPTION_MASK,
            data: tail(frame, 15),
        })
    }

    /// Whether the packet was sent as a broadcast.
    pub fn is_broadcast(&self) -> bool {
        self.option == RECEIVE_OPTION_BROADCAST
    }
}

impl fmt::Display for ReceivePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  IN (addr: {}) data: hex'{}'; [{}]",
            self.meta.stamp(),
            self.source_low,
            hex::encode_upper(&self.data),
            describe_option(self.option)
        )
    }
}

// ============================================================================
// Explicit Receive Indicator (0x91)
// ============================================================================

/// RF data received with explicit addressing fields.
#[derive(Debug, Clone)]
pub struct ExplicitReceivePacket {
    /// Shared frame state.
    pub meta: FrameMeta,
    /// Sender address.
    pub source: Address64,
    /// Source endpoint.
    pub source_endpoint: u8,
    /// Destination endpoint.
    pub destination_endpoint: u8,
    /// Cluster id.
    pub cluster_id: u16,
    /// Profile id.
    pub profile_id: u16,
    /// Option byte masked to the broadcast bit.
    pub option: u8,
    /// Payload.
    pub data: Vec<u8>,
    to_local: bool,
}

impl ExplicitReceivePacket {
    /// Minimum frame length (empty payload).
    pub const MIN_LEN: usize = 22;

    /// Decode the frame. `registers` is only read, to tell whether the sender
    /// is this module.
    pub fn decode(frame: &[u8], registers: &ModuleRegisters) -> FrameResult<Self> {
        require(frame, Self::MIN_LEN)?;
        let source = address(frame, 4);
        Ok(ExplicitReceivePacket {
            meta: FrameMeta::now(),
            source,
            source_endpoint: frame[14],
            destination_endpoint: frame[15],
            cluster_id: u16::from_be_bytes([frame[16], frame[17]]),
            profile_id: u16::from_be_bytes([frame[18], frame[19]]),
            option: frame[20] & RECEIVE_OPTION_MASK,
            data: tail(frame, 21),
            to_local: registers
                .local_address()
                .is_some_and(|local| local.low == source.low),
        })
    }

    /// Whether this is a link quality test report.
    pub fn is_link_test(&self) -> bool {
        self.cluster_id == LINK_TEST_CLUSTER_ID
            && self.source_endpoint == LINK_TEST_ENDPOINT
            && self.destination_endpoint == LINK_TEST_ENDPOINT
    }
}

impl fmt::Display for ExplicitReceivePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = if self.to_local {
            " local  ".to_string()
        } else {
            self.source.low.to_hex()
        };
        write!(
            f,
            "{}  IN (addr: {}) explicit transmit data: hex'{}'; [{}]",
            self.meta.stamp(),
            addr,
            hex::encode_upper(&self.data),
            describe_option(self.option)
        )
    }
}

// ============================================================================
// Transmit Status (0x8B)
// ============================================================================

/// Delivery report for a transmit request.
#[derive(Debug, Clone)]
pub struct TransmitStatus {
    /// Shared frame state.
    pub meta: FrameMeta,
    /// Frame id of the transmit request.
    pub frame_id: u8,
    /// Number of transmission attempts.
    pub retries: u8,
    /// Delivery outcome.
    pub delivery: DeliveryStatus,
    /// Route discovery outcome.
    pub discovery: DiscoveryStatus,
}

impl TransmitStatus {
    /// Minimum frame length.
    pub const MIN_LEN: usize = 11;

    /// Decode the frame.
    pub fn decode(frame: &[u8]) -> FrameResult<Self> {
        require(frame, Self::MIN_LEN)?;
        Ok(TransmitStatus {
            meta: FrameMeta::now(),
            frame_id: frame[4],
            retries: frame[7],
            delivery: DeliveryStatus::from(frame[8]),
            discovery: DiscoveryStatus::from(frame[9]),
        })
    }
}

impl fmt::Display for TransmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  IN (addr: network ) ACK #tries: {}; [{}]; [{}]",
            self.meta.stamp(),
            self.retries,
            self.discovery,
            self.delivery
        )
    }
}

// ============================================================================
// Route Information (0x8D)
// ============================================================================

/// One hop of a trace-routed transmission.
#[derive(Debug, Clone)]
pub struct RouteInformation {
    /// Source event (0x11 NACK, 0x12 trace route).
    pub source_event: u8,
    /// Shared frame state.
    pub meta: FrameMeta,
    /// Module timestamp in microseconds.
    pub time: u32,
    /// Final destination of the traced packet.
    pub destination: Address64,
    /// Originator of the traced packet.
    pub source: Address64,
    /// Node reporting this hop.
    pub responder: Address64,
    /// Next hop the responder forwarded to.
    pub receiver: Address64,
}

impl RouteInformation {
    /// Minimum frame length.
    pub const MIN_LEN: usize = 46;

    /// Decode the frame.
    pub fn decode(frame: &[u8]) -> FrameResult<Self> {
        require(frame, Self::MIN_LEN)?;
        Ok(RouteInformation {
            source_event: frame[4],
            meta: FrameMeta::now(),
            time: u32::from_be_bytes([frame[6], frame[7], frame[8], frame[9]]),
            destination: address(frame, 13),
            source: address(frame, 21),
            responder: address(frame, 29),
            receiver: address(frame, 37),
        })
    }
}

impl fmt::Display for RouteInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  IN (addr: {}) Route Info '{}' to '{}'; receiver: {}",
            self.meta.stamp(),
            self.responder.low,
            self.source.low,
            self.destination.low,
            self.receiver.low
        )
    }
}

// ============================================================================
// Response
// ============================================================================

/// Any frame the module can send.
#[derive(Debug, Clone)]
pub enum Response {
    /// Local AT command response (0x88).
    LocalAt(LocalAtResponse),
    /// Remote AT command response (0x97).
    RemoteAt(RemoteAtResponse),
    /// Receive packet (0x90).
    Receive(ReceivePacket),
    /// Explicit receive indicator (0x91).
    ExplicitReceive(ExplicitReceivePacket),
    /// Transmit status (0x8B).
    TransmitStatus(TransmitStatus),
    /// Route information (0x8D).
    RouteInformation(RouteInformation),
}

impl Response {
    /// Frame type byte.
    pub fn frame_type(&self) -> u8 {
        match self {
            Response::LocalAt(_) => FRAME_LOCAL_AT_RESPONSE,
            Response::RemoteAt(_) => FRAME_REMOTE_AT_RESPONSE,
            Response::Receive(_) => FRAME_RECEIVE_PACKET,
            Response::ExplicitReceive(_) => FRAME_EXPLICIT_RECEIVE,
            Response::TransmitStatus(_) => FRAME_TRANSMIT_STATUS,
            Response::RouteInformation(_) => FRAME_ROUTE_INFORMATION,
        }
    }

    /// Frame id, for types that carry one.
    pub fn frame_id(&self) -> Option<u8> {
        match self {
            Response::LocalAt(r) => Some(r.frame_id),
            Response::RemoteAt(r) => Some(r.frame_id),
            Response::Receive(r) => Some(r.frame_id),
            Response::TransmitStatus(r) => Some(r.frame_id),
            Response::ExplicitReceive(_) | Response::RouteInformation(_) => None,
        }
    }

    /// Shared frame state.
    pub fn meta(&self) -> &FrameMeta {
        match self {
            Response::LocalAt(r) => &r.meta,
            Response::RemoteAt(r) => &r.meta,
            Response::Receive(r) => &r.meta,
            Response::ExplicitReceive(r) => &r.meta,
            Response::TransmitStatus(r) => &r.meta,
            Response::RouteInformation(r) => &r.meta,
        }
    }

    /// Whether the frame passed validation.
    pub fn is_valid(&self) -> bool {
        self.meta().valid
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::LocalAt(r) => r.fmt(f),
            Response::RemoteAt(r) => r.fmt(f),
            Response::Receive(r) => r.fmt(f),
            Response::ExplicitReceive(r) => r.fmt(f),
            Response::TransmitStatus(r) => r.fmt(f),
            Response::RouteInformation(r) => r.fmt(f),
        }
    }
}
