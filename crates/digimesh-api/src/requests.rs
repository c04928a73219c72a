//! Frames sent from the host to the module.
//!
//! Constructors never fail: a bad argument marks the frame invalid and records
//! the reason in its [`FrameMeta`]. Invalid frames refuse to encode, so callers
//! check [`Request::is_valid`] (or handle the `Err` from [`Request::to_bytes`])
//! before writing to the serial line.

use std::fmt;

use crate::constants::*;
use crate::error::*;
use crate::escape::escape;
use crate::frame::wrap_frame;
use crate::registers::ModuleRegisters;
use crate::types::*;

/// Check that an AT command name is two ASCII characters.
fn check_command(command: &str) -> FrameResult<[u8; 2]> {
    match command.as_bytes() {
        [a, b] if a.is_ascii() && b.is_ascii() => Ok([*a, *b]),
        _ => Err(FrameError::invalid(
            "AT command",
            format!("'{}' should be a 2 character ASCII string", command),
        )),
    }
}

/// Frame id, radius and option byte shared by transmit requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitOptions {
    /// Frame id echoed in the transmit status (0 disables the status frame).
    pub frame_id: u8,
    /// Broadcast radius (0 = maximum hops).
    pub radius: u8,
    /// Option bits (0x01 disable ACK, 0x02 disable route discovery, 0x08 trace route).
    pub option: u8,
}

impl Default for TransmitOptions {
    fn default() -> Self {
        TransmitOptions {
            frame_id: DEFAULT_FRAME_ID,
            radius: 0x00,
            option: 0x00,
        }
    }
}

/// Endpoint, cluster and profile fields of an explicit transmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitAddressing {
    /// Source endpoint.
    pub source_endpoint: u8,
    /// Destination endpoint.
    pub destination_endpoint: u8,
    /// Cluster id.
    pub cluster_id: Word16,
    /// Profile id.
    pub profile_id: Word16,
}

impl ExplicitAddressing {
    /// Addressing with the default Digi profile.
    pub fn new(source_endpoint: u8, destination_endpoint: u8, cluster_id: impl Into<Word16>) -> Self {
        ExplicitAddressing {
            source_endpoint,
            destination_endpoint,
            cluster_id: cluster_id.into(),
            profile_id: Word16::Integer(DEFAULT_PROFILE_ID as u32),
        }
    }
}

// ============================================================================
// Local AT Command (0x08)
// ============================================================================

/// Query or set a register on the local module.
#[derive(Debug, Clone)]
pub struct LocalAtCommand {
    /// Shared frame state.
    pub meta: FrameMeta,
    /// Frame id.
    pub frame_id: u8,
    /// Two-letter command.
    pub command: String,
    /// Value to set; `None` queries the register.
    pub value: Option<Vec<u8>>,
    mode: ApiMode,
}

impl LocalAtCommand {
    /// Build a local AT command.
    pub fn new(
        registers: &ModuleRegisters,
        command: &str,
        value: Option<RegisterValue>,
        frame_id: u8,
    ) -> Self {
        let mut frame = LocalAtCommand {
            meta: FrameMeta::now(),
            frame_id,
            command: command.to_string(),
            value: value.as_ref().map(RegisterValue::to_bytes),
            mode: registers.api_mode(),
        };
        if let Err(e) = check_command(command) {
            frame.meta.invalidate(e);
        }
        frame
    }

    /// Frame-specific data: type, id, command, optional value.
    pub fn frame_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + self.value.as_ref().map_or(0, Vec::len));
        data.push(FRAME_LOCAL_AT_COMMAND);
        data.push(self.frame_id);
        data.extend_from_slice(self.command.as_bytes());
        if let Some(ref value) = self.value {
            data.extend_from_slice(value);
        }
        data
    }
}

impl fmt::Display for LocalAtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(ref value) => write!(
                f,
                "{} OUT (addr:  local  ) Set registry '{}' to '{}'",
                self.meta.stamp(),
                self.command,
                hex::encode_upper(value)
            ),
            None => write!(
                f,
                "{} OUT (addr:  local  ) Get '{}' registry",
                self.meta.stamp(),
                self.command
            ),
        }
    }
}

// ============================================================================
// Remote AT Command (0x17)
// ============================================================================

/// Query or set a register on a remote module addressed by DH/DL.
#[derive(Debug, Clone)]
pub struct RemoteAtCommand {
    /// Shared frame state.
    pub meta: FrameMeta,
    /// Frame id.
    pub frame_id: u8,
    /// Destination taken from DH/DL.
    pub destination: Address64,
    /// Option byte (0x02 applies changes immediately).
    pub options: u8,
    /// Two-letter command.
    pub command: String,
    /// Value to set; `None` queries the register.
    pub value: Option<Vec<u8>>,
    mode: ApiMode,
}

impl RemoteAtCommand {
    /// Build a remote AT command for the destination currently in DH/DL.
    pub fn new(
        registers: &ModuleRegisters,
        command: &str,
        value: Option<RegisterValue>,
        frame_id: u8,
        apply_changes: bool,
    ) -> Self {
        let mut frame = RemoteAtCommand {
            meta: FrameMeta::now(),
            frame_id,
            destination: Address64::default(),
            options: if apply_changes { REMOTE_APPLY_CHANGES } else { 0x00 },
            command: command.to_string(),
            value: value.as_ref().map(RegisterValue::to_bytes),
            mode: registers.api_mode(),
        };
        match registers.destination() {
            Ok(destination) => frame.destination = destination,
            Err(e) => {
                frame.meta.invalidate(e);
                return frame;
            }
        }
        if let Err(e) = check_command(command) {
            frame.meta.invalidate(e);
        }
        frame
    }

    /// Frame-specific data.
    pub fn frame_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(15 + self.value.as_ref().map_or(0, Vec::len));
        data.push(FRAME_REMOTE_AT_COMMAND);
        data.push(self.frame_id);
        data.extend_from_slice(&self.destination.to_bytes());
        data.extend_from_slice(&UNKNOWN_NETWORK_ADDRESS);
        data.push(self.options);
        data.extend_from_slice(self.command.as_bytes());
        if let Some(ref value) = self.value {
            data.extend_from_slice(value);
        }
        data
    }
}

impl fmt::Display for RemoteAtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(ref value) => write!(
                f,
                "{} OUT (addr: {}) Set registry '{}' to '{}'",
                self.meta.stamp(),
                self.destination.low,
                self.command,
                hex::encode_upper(value)
            ),
            None => write!(
                f,
                "{} OUT (addr: {}) Get '{}' registry",
                self.meta.stamp(),
                self.destination.low,
                self.command
            ),
        }
    }
}

// ============================================================================
// Transmit Request (0x10)
// ============================================================================

/// Send RF data to the destination in DH/DL.
#[derive(Debug, Clone)]
pub struct TransmitRequest {
    /// Shared frame state.
    pub meta: FrameMeta,
    /// Destination taken from DH/DL.
    pub destination: Address64,
    /// Reserved / 16-bit network address field (FFFE, or FFFF for trace routing).
    pub reserved: [u8; 2],
    /// Frame id, radius, option.
    pub options: TransmitOptions,
    /// Payload.
    pub data: Vec<u8>,
    mode: ApiMode,
}

impl TransmitRequest {
    /// Build a transmit request for the destination currently in DH/DL.
    pub fn new(
        registers: &ModuleRegisters,
        data: Vec<u8>,
        options: TransmitOptions,
        reserved: Word16,
    ) -> Self {
        let mut frame = TransmitRequest {
            meta: FrameMeta::now(),
            destination: Address64::default(),
            reserved: UNKNOWN_NETWORK_ADDRESS,
            options,
            data,
            mode: registers.api_mode(),
        };
        let fields = registers
            .destination()
            .and_then(|dest| Ok((dest, reserved.resolve("reserved")?)));
        match fields {
            Ok((destination, reserved)) => {
                frame.destination = destination;
                frame.reserved = reserved;
            }
            Err(e) => frame.meta.invalidate(e),
        }
        frame
    }

    /// Frame-specific data.
    pub fn frame_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(14 + self.data.len());
        data.push(FRAME_TRANSMIT_REQUEST);
        data.push(self.options.frame_id);
        data.extend_from_slice(&self.destination.to_bytes());
        data.extend_from_slice(&self.reserved);
        data.push(self.options.radius);
        data.push(self.options.option);
        data.extend_from_slice(&self.data);
        data
    }
}

impl fmt::Display for TransmitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = if self.destination.is_broadcast() {
            " GLOBAL ".to_string()
        } else {
            self.destination.low.to_hex()
        };
        write!(
            f,
            "{} OUT (addr: {}) data: hex'{}'",
            self.meta.stamp(),
            addr,
            hex::encode_upper(&self.data)
        )
    }
}

// ============================================================================
// Explicit Transmit Request (0x11)
// ============================================================================

/// Send RF data with explicit endpoint, cluster and profile fields.
#[derive(Debug, Clone)]
pub struct ExplicitTransmitRequest {
    /// Shared frame state.
    pub meta: FrameMeta,
    /// Destination taken from DH/DL.
    pub destination: Address64,
    /// Source endpoint.
    pub source_endpoint: u8,
    /// Destination endpoint.
    pub destination_endpoint: u8,
    /// Cluster id.
    pub cluster_id: [u8; 2],
    /// Profile id.
    pub profile_id: [u8; 2],
    /// Frame id, radius, option.
    pub options: TransmitOptions,
    /// Payload.
    pub data: Vec<u8>,
    to_local: bool,
    mode: ApiMode,
}

impl ExplicitTransmitRequest {
    /// Build an explicit transmit for the destination currently in DH/DL.
    pub fn new(
        registers: &ModuleRegisters,
        data: Vec<u8>,
        addressing: &ExplicitAddressing,
        options: TransmitOptions,
    ) -> Self {
        let mut frame = ExplicitTransmitRequest {
            meta: FrameMeta::now(),
            destination: Address64::default(),
            source_endpoint: addressing.source_endpoint,
            destination_endpoint: addressing.destination_endpoint,
            cluster_id: [0; 2],
            profile_id: [0; 2],
            options,
            data,
            to_local: false,
            mode: registers.api_mode(),
        };

        match registers.destination() {
            Ok(destination) => frame.destination = destination,
            Err(e) => {
                frame.meta.invalidate(e);
                return frame;
            }
        }
        match addressing.cluster_id.resolve("cluster id") {
            Ok(cluster_id) => frame.cluster_id = cluster_id,
            Err(e) => {
                frame.meta.invalidate(e);
                return frame;
            }
        }
        match addressing.profile_id.resolve("profile id") {
            Ok(profile_id) => frame.profile_id = profile_id,
            Err(e) => {
                frame.meta.invalidate(e);
                return frame;
            }
        }
        frame.to_local = registers
            .local_address()
            .is_some_and(|local| local.low == frame.destination.low);
        frame
    }

    /// Frame-specific data.
    pub fn frame_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(20 + self.data.len());
        data.push(FRAME_EXPLICIT_TRANSMIT);
        data.push(self.options.frame_id);
        data.extend_from_slice(&self.destination.to_bytes());
        data.extend_from_slice(&UNKNOWN_NETWORK_ADDRESS);
        data.push(self.source_endpoint);
        data.push(self.destination_endpoint);
        data.extend_from_slice(&self.cluster_id);
        data.extend_from_slice(&self.profile_id);
        data.push(self.options.radius);
        data.push(self.options.option);
        data.extend_from_slice(&self.data);
        data
    }
}

impl fmt::Display for ExplicitTransmitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = if self.to_local {
            " local  ".to_string()
        } else if self.destination.is_broadcast() {
            " GLOBAL ".to_string()
        } else {
            self.destination.low.to_hex()
        };
        write!(
            f,
            "{} OUT (addr: {}) explicit transmit; data: hex'{}'",
            self.meta.stamp(),
            addr,
            hex::encode_upper(&self.data)
        )
    }
}

// ============================================================================
// Request
// ============================================================================

/// Any frame the host can send.
#[derive(Debug, Clone)]
pub enum Request {
    /// Local AT command (0x08).
    LocalAt(LocalAtCommand),
    /// Remote AT command (0x17).
    RemoteAt(RemoteAtCommand),
    /// Transmit request (0x10).
    Transmit(TransmitRequest),
    /// Explicit transmit request (0x11).
    ExplicitTransmit(ExplicitTransmitRequest),
}

impl Request {
    /// Frame type byte.
    pub fn frame_type(&self) -> u8 {
        match self {
            Request::LocalAt(_) => FRAME_LOCAL_AT_COMMAND,
            Request::RemoteAt(_) => FRAME_REMOTE_AT_COMMAND,
            Request::Transmit(_) => FRAME_TRANSMIT_REQUEST,
            Request::ExplicitTransmit(_) => FRAME_EXPLICIT_TRANSMIT,
        }
    }

    /// Frame id.
    pub fn frame_id(&self) -> u8 {
        match self {
            Request::LocalAt(f) => f.frame_id,
            Request::RemoteAt(f) => f.frame_id,
            Request::Transmit(f) => f.options.frame_id,
            Request::ExplicitTransmit(f) => f.options.frame_id,
        }
    }

    /// Shared frame state.
    pub fn meta(&self) -> &FrameMeta {
        match self {
            Request::LocalAt(f) => &f.meta,
            Request::RemoteAt(f) => &f.meta,
            Request::Transmit(f) => &f.meta,
            Request::ExplicitTransmit(f) => &f.meta,
        }
    }

    /// Whether construction succeeded.
    pub fn is_valid(&self) -> bool {
        self.meta().valid
    }

    fn mode(&self) -> ApiMode {
        match self {
            Request::LocalAt(f) => f.mode,
            Request::RemoteAt(f) => f.mode,
            Request::Transmit(f) => f.mode,
            Request::ExplicitTransmit(f) => f.mode,
        }
    }

    /// Frame-specific data (the payload covered by length and checksum).
    pub fn frame_data(&self) -> Vec<u8> {
        match self {
            Request::LocalAt(f) => f.frame_data(),
            Request::RemoteAt(f) => f.frame_data(),
            Request::Transmit(f) => f.frame_data(),
            Request::ExplicitTransmit(f) => f.frame_data(),
        }
    }

    /// Complete wire bytes, escaped when the API mode at construction was 2.
    pub fn to_bytes(&self) -> FrameResult<Vec<u8>> {
        if let Some(ref e) = self.meta().error {
            return Err(e.clone());
        }
        let frame = wrap_frame(&self.frame_data());
        if self.mode().escapes() {
            Ok(escape(&frame))
        } else {
            Ok(frame)
        }
    }

    /// Unescaped frame as uppercase hex, for logging.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(wrap_frame(&self.frame_data()))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref e) = self.meta().error {
            return write!(f, "{} OUT invalid frame 0x{:02X}: {}", self.meta().stamp(), self.frame_type(), e);
        }
        match self {
            Request::LocalAt(r) => r.fmt(f),
            Request::RemoteAt(r) => r.fmt(f),
            Request::Transmit(r) => r.fmt(f),
            Request::ExplicitTransmit(r) => r.fmt(f),
        }
    }
}

impl From<LocalAtCommand> for Request {
    fn from(frame: LocalAtCommand) -> Self {
        Request::LocalAt(frame)
    }
}

impl From<RemoteAtCommand> for Request {
    fn from(frame: RemoteAtCommand) -> Self {
        Request::RemoteAt(frame)
    }
}

impl From<TransmitRequest> for Request {
    fn from(frame: TransmitRequest) -> Self {
        Request::Transmit(frame)
    }
}

impl From<ExplicitTransmitRequest> for Request {
    fn from(frame: ExplicitTransmitRequest) -> Self {
        Request::ExplicitTransmit(frame)
    }
}
