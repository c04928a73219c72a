//! Common types used in the protocol.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};

use crate::constants::*;
use crate::error::*;

// ============================================================================
// Addressing
// ============================================================================

/// One 32-bit half of a 64-bit module address (as in the DH/DL and SH/SL registers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AddressWord(pub [u8; 4]);

impl AddressWord {
    /// Create from bytes.
    pub fn new(bytes: [u8; 4]) -> Self {
        AddressWord(bytes)
    }

    /// Parse a register value of up to 8 hex digits, left-padding with zeros.
    pub fn from_register(value: &str) -> FrameResult<Self> {
        let value = value.trim();
        if value.is_empty() || value.len() > 8 {
            return Err(FrameError::invalid(
                "address",
                format!("register value '{}' is not 1-8 hex digits", value),
            ));
        }
        format!("{:0>8}", value).parse()
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Lowercase hex string, always 8 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for AddressWord {
    type Err = FrameError;

    /// Parse exactly 8 hex characters.
    fn from_str(s: &str) -> FrameResult<Self> {
        if s.len() != 8 {
            return Err(FrameError::invalid(
                "address",
                format!("'{}' must be exactly 8 hex characters", s),
            ));
        }
        let mut bytes = [0u8; 4];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| FrameError::invalid("address", format!("'{}': {}", s, e)))?;
        Ok(AddressWord(bytes))
    }
}

impl fmt::Display for AddressWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A 64-bit module address split into high and low words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address64 {
    /// High 32 bits.
    pub high: AddressWord,
    /// Low 32 bits.
    pub low: AddressWord,
}

impl Address64 {
    /// Broadcast address (00000000 0000FFFF).
    pub const BROADCAST: Address64 = Address64 {
        high: AddressWord([0x00, 0x00, 0x00, 0x00]),
        low: AddressWord([0x00, 0x00, 0xFF, 0xFF]),
    };

    /// Create from two words.
    pub fn new(high: AddressWord, low: AddressWord) -> Self {
        Address64 { high, low }
    }

    /// Parse from two 8-character hex strings.
    pub fn parse(high: &str, low: &str) -> FrameResult<Self> {
        Ok(Address64 {
            high: high.parse()?,
            low: low.parse()?,
        })
    }

    /// Create from 8 big-endian bytes. Returns None if slice is wrong length.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != 8 {
            return None;
        }
        let mut high = [0u8; 4];
        let mut low = [0u8; 4];
        high.copy_from_slice(&slice[..4]);
        low.copy_from_slice(&slice[4..]);
        Some(Address64::new(AddressWord(high), AddressWord(low)))
    }

    /// The 8 wire bytes, high word first.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.high.0);
        bytes[4..].copy_from_slice(&self.low.0);
        bytes
    }

    /// Whether this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Address64::BROADCAST
    }

    /// Lowercase 16-character hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Display for Address64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.high, self.low)
    }
}

// ============================================================================
// Constructor Values
// ============================================================================

/// A register value supplied to an AT command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterValue {
    /// Raw bytes, sent as is.
    Bytes(Vec<u8>),
    /// Text, sent as its ASCII bytes (e.g. the NI node identifier).
    Text(String),
    /// Integer, sent big-endian in 1, 2 or 4 bytes depending on magnitude.
    Integer(u32),
}

impl RegisterValue {
    /// Resolve to the bytes carried in the frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            RegisterValue::Bytes(bytes) => bytes.clone(),
            RegisterValue::Text(text) => text.as_bytes().to_vec(),
            RegisterValue::Integer(value) => {
                if *value <= 0xFF {
                    vec![*value as u8]
                } else if *value <= 0xFFFF {
                    (*value as u16).to_be_bytes().to_vec()
                } else {
                    value.to_be_bytes().to_vec()
                }
            }
        }
    }
}

impl From<Vec<u8>> for RegisterValue {
    fn from(bytes: Vec<u8>) -> Self {
        RegisterValue::Bytes(bytes)
    }
}

impl From<&str> for RegisterValue {
    fn from(text: &str) -> Self {
        RegisterValue::Text(text.to_string())
    }
}

impl From<u32> for RegisterValue {
    fn from(value: u32) -> Self {
        RegisterValue::Integer(value)
    }
}

/// A two-byte field (cluster id, profile id, reserved) supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Word16 {
    /// Exactly two bytes.
    Bytes(Vec<u8>),
    /// Exactly four hex characters.
    Hex(String),
    /// An integer no larger than 0xFFFF.
    Integer(u32),
}

impl Word16 {
    /// Resolve to two big-endian bytes, checking size and range.
    pub fn resolve(&self, field: &'static str) -> FrameResult<[u8; 2]> {
        match self {
            Word16::Bytes(bytes) => {
                if bytes.len() != 2 {
                    return Err(FrameError::invalid(
                        field,
                        format!("{} bytes given, expected 2", bytes.len()),
                    ));
                }
                Ok([bytes[0], bytes[1]])
            }
            Word16::Hex(text) => {
                if text.len() != 4 {
                    return Err(FrameError::invalid(
                        field,
                        format!("'{}' should be 4 hex characters", text),
                    ));
                }
                let mut bytes = [0u8; 2];
                hex::decode_to_slice(text, &mut bytes)
                    .map_err(|e| FrameError::invalid(field, format!("'{}': {}", text, e)))?;
                Ok(bytes)
            }
            Word16::Integer(value) => {
                let value = u16::try_from(*value).map_err(|_| {
                    FrameError::invalid(field, format!("{} exceeds 16 bits", value))
                })?;
                Ok(value.to_be_bytes())
            }
        }
    }
}

impl From<u16> for Word16 {
    fn from(value: u16) -> Self {
        Word16::Integer(value as u32)
    }
}

impl From<&str> for Word16 {
    fn from(text: &str) -> Self {
        Word16::Hex(text.to_string())
    }
}

impl From<[u8; 2]> for Word16 {
    fn from(bytes: [u8; 2]) -> Self {
        Word16::Bytes(bytes.to_vec())
    }
}

// ============================================================================
// Operating Mode
// ============================================================================

/// Module operating mode (AP register).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiMode {
    /// AP=0: no framing, bytes pass through.
    Transparent,
    /// AP=1: API frames without escaping.
    Api,
    /// AP=2: API frames with escaping.
    #[default]
    ApiEscaped,
}

impl ApiMode {
    /// Parse the AP register code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ApiMode::Transparent),
            1 => Some(ApiMode::Api),
            2 => Some(ApiMode::ApiEscaped),
            _ => None,
        }
    }

    /// The AP register code.
    pub fn code(&self) -> u8 {
        match self {
            ApiMode::Transparent => 0,
            ApiMode::Api => 1,
            ApiMode::ApiEscaped => 2,
        }
    }

    /// Whether inbound data is framed.
    pub fn is_api(&self) -> bool {
        !matches!(self, ApiMode::Transparent)
    }

    /// Whether outbound frames are escaped.
    pub fn escapes(&self) -> bool {
        matches!(self, ApiMode::ApiEscaped)
    }
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiMode::Transparent => write!(f, "Transparent Mode"),
            ApiMode::Api => write!(f, "API mode (without escaping chars)"),
            ApiMode::ApiEscaped => write!(f, "API mode (with escaping chars)"),
        }
    }
}

// ============================================================================
// Status Codes
// ============================================================================

/// Status of an AT command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtStatus {
    /// Command succeeded.
    Ok,
    /// Command failed.
    Error,
    /// Unknown command.
    InvalidCommand,
    /// Invalid parameter.
    InvalidParameter,
    /// Remote command could not be delivered.
    RouteNotFound,
    /// Unknown status code.
    Unknown(u8),
}

impl From<u8> for AtStatus {
    fn from(code: u8) -> Self {
        match code {
            AT_STATUS_OK => AtStatus::Ok,
            AT_STATUS_ERROR => AtStatus::Error,
            AT_STATUS_INVALID_COMMAND => AtStatus::InvalidCommand,
            AT_STATUS_INVALID_PARAMETER => AtStatus::InvalidParameter,
            AT_STATUS_ROUTE_NOT_FOUND => AtStatus::RouteNotFound,
            _ => AtStatus::Unknown(code),
        }
    }
}

impl fmt::Display for AtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtStatus::Ok => write!(f, "OK"),
            AtStatus::Error => write!(f, "ERROR"),
            AtStatus::InvalidCommand => write!(f, "invalid command"),
            AtStatus::InvalidParameter => write!(f, "invalid parameter"),
            AtStatus::RouteNotFound => write!(f, "Route not found"),
            AtStatus::Unknown(code) => write!(f, "status: {}", code),
        }
    }
}

/// Delivery status reported by a transmit status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Delivered.
    Success,
    /// MAC ACK failure.
    MacAckFailed,
    /// Invalid destination endpoint.
    InvalidDestination,
    /// Network ACK failure.
    NetworkAckFailed,
    /// Route not found.
    RouteNotFound,
    /// Unknown status code.
    Unknown(u8),
}

impl From<u8> for DeliveryStatus {
    fn from(code: u8) -> Self {
        match code {
            DELIVERY_SUCCESS => DeliveryStatus::Success,
            DELIVERY_MAC_ACK_FAILED => DeliveryStatus::MacAckFailed,
            DELIVERY_INVALID_DESTINATION => DeliveryStatus::InvalidDestination,
            DELIVERY_NETWORK_ACK_FAILED => DeliveryStatus::NetworkAckFailed,
            DELIVERY_ROUTE_NOT_FOUND => DeliveryStatus::RouteNotFound,
            _ => DeliveryStatus::Unknown(code),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Success => write!(f, "OK"),
            DeliveryStatus::MacAckFailed => write!(f, "MAC ACK failed"),
            DeliveryStatus::InvalidDestination => write!(f, "Invalid dest"),
            DeliveryStatus::NetworkAckFailed => write!(f, "Network ACK failed"),
            DeliveryStatus::RouteNotFound => write!(f, "Route not found"),
            DeliveryStatus::Unknown(code) => write!(f, "status: {}", code),
        }
    }
}

/// Discovery status reported by a transmit status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStatus {
    /// No discovery overhead.
    NoOverhead,
    /// Route discovery was needed.
    RouteDiscovery,
    /// Unknown status code.
    Unknown(u8),
}

impl From<u8> for DiscoveryStatus {
    fn from(code: u8) -> Self {
        match code {
            DISCOVERY_NO_OVERHEAD => DiscoveryStatus::NoOverhead,
            DISCOVERY_ROUTE => DiscoveryStatus::RouteDiscovery,
            _ => DiscoveryStatus::Unknown(code),
        }
    }
}

impl fmt::Display for DiscoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryStatus::NoOverhead => write!(f, "No overhead"),
            DiscoveryStatus::RouteDiscovery => write!(f, "route discovery"),
            DiscoveryStatus::Unknown(code) => write!(f, "discovery status: {}", code),
        }
    }
}

// ============================================================================
// Shared Frame State
// ============================================================================

/// State shared by every frame variant.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMeta {
    /// Local wall-clock time the frame was built or received.
    pub timestamp: DateTime<Local>,
    /// Whether the frame passed construction or wire validation.
    pub valid: bool,
    /// Why the frame is invalid, if it is.
    pub error: Option<FrameError>,
}

impl FrameMeta {
    /// Metadata for a frame that is valid so far, stamped now.
    pub fn now() -> Self {
        FrameMeta {
            timestamp: Local::now(),
            valid: true,
            error: None,
        }
    }

    /// Mark the frame invalid.
    pub fn invalidate(&mut self, error: FrameError) {
        log::warn!("{}", error);
        self.valid = false;
        self.error = Some(error);
    }

    /// Timestamp rendered with millisecond precision.
    pub fn stamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_word_parse() {
        let word: AddressWord = "0013A200".parse().unwrap();
        assert_eq!(word.0, [0x00, 0x13, 0xA2, 0x00]);
        assert_eq!(word.to_hex(), "0013a200");

        assert!("13A200".parse::<AddressWord>().is_err());
        assert!("0013A2ZZ".parse::<AddressWord>().is_err());
    }

    #[test]
    fn test_address_word_from_register_pads() {
        let word = AddressWord::from_register("FFFF").unwrap();
        assert_eq!(word.0, [0x00, 0x00, 0xFF, 0xFF]);
        let word = AddressWord::from_register("0").unwrap();
        assert_eq!(word.0, [0; 4]);
        assert!(AddressWord::from_register("").is_err());
        assert!(AddressWord::from_register("123456789").is_err());
    }

    #[test]
    fn test_address64_broadcast() {
        let addr = Address64::parse("00000000", "0000ffff").unwrap();
        assert!(addr.is_broadcast());
        assert_eq!(addr.to_bytes(), [0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
        assert_eq!(addr.to_hex(), "000000000000ffff");
    }

    #[test]
    fn test_register_value_integer_widths() {
        assert_eq!(RegisterValue::Integer(0x07).to_bytes(), vec![0x07]);
        assert_eq!(RegisterValue::Integer(0xFF).to_bytes(), vec![0xFF]);
        assert_eq!(RegisterValue::Integer(0x100).to_bytes(), vec![0x01, 0x00]);
        assert_eq!(RegisterValue::Integer(0x7FFF).to_bytes(), vec![0x7F, 0xFF]);
        assert_eq!(
            RegisterValue::Integer(0x1_0000).to_bytes(),
            vec![0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(RegisterValue::from("node-1").to_bytes(), b"node-1".to_vec());
    }

    #[test]
    fn test_word16_resolve() {
        assert_eq!(Word16::from(0x0014u16).resolve("cluster id"), Ok([0x00, 0x14]));
        assert_eq!(Word16::from("C105").resolve("profile id"), Ok([0xC1, 0x05]));
        assert_eq!(Word16::from([0xFF, 0xFE]).resolve("reserved"), Ok([0xFF, 0xFE]));

        assert!(Word16::Integer(0x1_0000).resolve("cluster id").is_err());
        assert!(Word16::Hex("C10".into()).resolve("profile id").is_err());
        assert!(Word16::Bytes(vec![1, 2, 3]).resolve("reserved").is_err());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AtStatus::from(0), AtStatus::Ok);
        assert_eq!(AtStatus::from(9), AtStatus::Unknown(9));
        assert_eq!(DeliveryStatus::from(0x25), DeliveryStatus::RouteNotFound);
        assert_eq!(DeliveryStatus::from(0x25).to_string(), "Route not found");
        assert_eq!(DiscoveryStatus::from(0x02), DiscoveryStatus::RouteDiscovery);
    }

    #[test]
    fn test_api_mode_codes() {
        for code in 0..3 {
            assert_eq!(ApiMode::from_code(code).map(|m| m.code()), Some(code));
        }
        assert_eq!(ApiMode::from_code(3), None);
        assert!(ApiMode::ApiEscaped.escapes());
        assert!(!ApiMode::Api.escapes());
        assert!(!ApiMode::Transparent.is_api());
    }
}
