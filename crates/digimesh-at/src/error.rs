//! Error types for command mode.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the module in command mode.
#[derive(Debug, Error)]
pub enum CommandModeError {
    /// `OK\r` did not arrive after `+++` within the deadline.
    #[error("no OK acknowledgment within {waited:?}")]
    HandshakeTimeout {
        /// How long we waited.
        waited: Duration,
    },

    /// Baud probing tried every candidate without an acknowledgment.
    #[error("module did not answer at any baud rate (tried {tried:?})")]
    UnreachableDevice {
        /// Baud rates tried, in order.
        tried: Vec<u32>,
    },

    /// The serial channel failed.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for command mode operations.
pub type CommandModeResult<T> = Result<T, CommandModeError>;
