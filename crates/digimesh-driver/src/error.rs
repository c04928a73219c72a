//! Driver error types.

use digimesh_api::FrameError;
use digimesh_at::CommandModeError;
use thiserror::Error;

/// Errors that can occur while driving a module.
#[derive(Debug, Error)]
pub enum DriverError {
    /// A frame could not be built or was invalid.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Command mode failed.
    #[error("command mode error: {0}")]
    CommandMode(#[from] CommandModeError),

    /// The serial port could not be opened or configured.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O on the serial port or the raw log failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// No serial port was given and none could be found.
    #[error("no serial port found")]
    NoPortFound,

    /// The operation is not allowed for this destination.
    #[error("{operation} not allowed: {reason}")]
    NotAllowed {
        /// Operation that was refused.
        operation: &'static str,
        /// Why.
        reason: &'static str,
    },
}

impl DriverError {
    /// Whether the module could not be reached at any baud rate.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            DriverError::CommandMode(CommandModeError::UnreachableDevice { .. })
        )
    }
}

/// Result type alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
