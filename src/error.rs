//! Error types
//!
//! A single crate-level [`Error`] covers the codec, the upstream
//! collaborators and the session lifecycle. Payload problems are described
//! by [`FormatError`], which the codec also returns alongside partial
//! results.

use std::time::Duration;

use crate::session::SessionPhase;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug)]
pub enum Error {
    /// Malformed or truncated binary payload
    Format(FormatError),
    /// Recording header declares a version this crate cannot decode
    UnsupportedVersion(u32),
    /// Camera serial number is unknown upstream
    NotFound(String),
    /// Broker or token credentials were rejected
    UpstreamAuth(String),
    /// Broker could not be reached or dropped the request
    UpstreamConnect(String),
    /// A bounded upstream operation did not finish in time
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    /// Client-facing channel failed
    Transport(String),
    /// Lifecycle operation called in the wrong phase
    InvalidState {
        expected: SessionPhase,
        actual: SessionPhase,
    },
    /// Socket level failure (listener bind/accept)
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Format(e) => write!(f, "Malformed pose data: {}", e),
            Error::UnsupportedVersion(v) => write!(f, "Unsupported recording version: {}", v),
            Error::NotFound(serial) => write!(f, "Camera not found: {}", serial),
            Error::UpstreamAuth(msg) => write!(f, "Upstream authorization failed: {}", msg),
            Error::UpstreamConnect(msg) => write!(f, "Upstream connection failed: {}", msg),
            Error::Timeout { operation, after } => {
                write!(f, "{} timed out after {}ms", operation, after.as_millis())
            }
            Error::Transport(msg) => write!(f, "Client transport error: {}", msg),
            Error::InvalidState { expected, actual } => {
                write!(f, "Invalid session state: expected {:?}, was {:?}", expected, actual)
            }
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Format(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Error::Format(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Why a pose payload stopped decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Fewer bytes remain than the structure at `offset` needs
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// Person count outside `0..=max`
    PeopleOutOfRange { offset: usize, count: i64, max: usize },
    /// Keypoint count above the per-person limit
    KeypointsOutOfRange { offset: usize, count: usize, max: usize },
    /// Transport encoding was not valid base64
    InvalidBase64(String),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "truncated at offset {}: need {} bytes, {} available",
                offset, needed, available
            ),
            FormatError::PeopleOutOfRange { offset, count, max } => write!(
                f,
                "person count {} at offset {} outside 0..={}",
                count, offset, max
            ),
            FormatError::KeypointsOutOfRange { offset, count, max } => write!(
                f,
                "keypoint count {} at offset {} exceeds {}",
                count, offset, max
            ),
            FormatError::InvalidBase64(msg) => write!(f, "invalid base64: {}", msg),
        }
    }
}

impl std::error::Error for FormatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_not_found() {
        let err = Error::NotFound("CAM123".into());
        assert_eq!(err.to_string(), "Camera not found: CAM123");
    }

    #[test]
    fn test_display_timeout() {
        let err = Error::Timeout {
            operation: "broker connect",
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "broker connect timed out after 1500ms");
    }

    #[test]
    fn test_format_error_source() {
        let err: Error = FormatError::Truncated {
            offset: 8,
            needed: 152,
            available: 20,
        }
        .into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("offset 8"));
    }
}
