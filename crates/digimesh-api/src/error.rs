//! Frame error types.

use thiserror::Error;

/// Errors that can occur when building, validating or decoding API frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer is too short to hold the fields of its frame type.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Declared length does not match the payload.
    #[error("length mismatch: declared {declared}, payload has {actual} bytes")]
    LengthMismatch {
        /// Length field of the frame.
        declared: u16,
        /// Actual payload byte count.
        actual: usize,
    },

    /// Checksum trailer does not match the payload.
    #[error("checksum mismatch: declared 0x{declared:02X}, computed 0x{computed:02X}")]
    ChecksumMismatch {
        /// Checksum byte of the frame.
        declared: u8,
        /// Checksum computed over the payload.
        computed: u8,
    },

    /// Frame type not present in the dispatch table.
    #[error("frame type 0x{0:02X} not recognized")]
    UnrecognizedFrameType(u8),

    /// A constructor argument had the wrong size or range.
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl FrameError {
    /// Create an invalid argument error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        FrameError::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// Whether this error describes a corrupt or incomplete frame on the wire.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FrameError::FrameTooShort { .. }
                | FrameError::LengthMismatch { .. }
                | FrameError::ChecksumMismatch { .. }
        )
    }
}

/// Result type alias for frame operations.
pub type FrameResult<T> = Result<T, FrameError>;
