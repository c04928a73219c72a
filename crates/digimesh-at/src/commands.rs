//! Text commands understood by the module in command mode.

use std::fmt;

/// Sequence that switches the module into command mode. Not followed by `\r`.
pub const ENTER_SEQUENCE: &[u8] = b"+++";

/// Baud rates in the order they are tried when the module does not answer.
/// Rates below 9600 are unlikely, so they come last.
pub const BAUD_CANDIDATES: [u32; 8] = [9600, 57600, 115200, 38400, 19200, 4800, 2400, 1200];

/// BD register code for a baud rate.
pub fn baud_code(baud: u32) -> Option<u8> {
    match baud {
        1200 => Some(0),
        2400 => Some(1),
        4800 => Some(2),
        9600 => Some(3),
        19200 => Some(4),
        38400 => Some(5),
        57600 => Some(6),
        115200 => Some(7),
        _ => None,
    }
}

/// Probe order: the configured rate first, then the remaining candidates.
pub fn probe_order(configured: u32) -> Vec<u32> {
    let mut order = vec![configured];
    order.extend(BAUD_CANDIDATES.iter().copied().filter(|b| *b != configured));
    order
}

/// A command sent while in command mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    /// `+++`
    Enter,
    /// `AT<register><value>\r`
    Set {
        /// Two-letter register name.
        register: String,
        /// Value as the module expects it (usually hex).
        value: String,
    },
    /// `AT<register>\r`
    Query {
        /// Two-letter register name.
        register: String,
    },
    /// `ATAC\r` - apply pending changes.
    Apply,
    /// `ATWR\r` - write settings to flash.
    Write,
    /// `ATCN\r` - leave command mode.
    Exit,
    /// `ATGT<value>\r` - guard time in hex milliseconds.
    GuardTime(String),
    /// `ATBD<code>\r` - serial baud rate code.
    BaudRate(u8),
}

impl AtCommand {
    /// Set a register.
    pub fn set(register: impl Into<String>, value: impl Into<String>) -> Self {
        AtCommand::Set {
            register: register.into(),
            value: value.into(),
        }
    }

    /// Query a register.
    pub fn query(register: impl Into<String>) -> Self {
        AtCommand::Query {
            register: register.into(),
        }
    }

    /// Bytes written to the serial line.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AtCommand::Enter => ENTER_SEQUENCE.to_vec(),
            other => format!("{}\r", other).into_bytes(),
        }
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtCommand::Enter => write!(f, "+++"),
            AtCommand::Set { register, value } => write!(f, "AT{}{}", register, value),
            AtCommand::Query { register } => write!(f, "AT{}", register),
            AtCommand::Apply => write!(f, "ATAC"),
            AtCommand::Write => write!(f, "ATWR"),
            AtCommand::Exit => write!(f, "ATCN"),
            AtCommand::GuardTime(value) => write!(f, "ATGT{}", value),
            AtCommand::BaudRate(code) => write!(f, "ATBD{}", code),
        }
    }
}
