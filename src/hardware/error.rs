//! Link error types

use std::fmt;

/// Transport-level failures
#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Opening the port failed
    OpenFailed { port: String, details: String },
    /// Operation attempted on a closed link
    NotOpen,
    /// Write to the device failed
    SendFailed { details: String },
    /// Read from the device failed or the reader terminated
    ReceiveFailed { details: String },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::OpenFailed { port, details } => {
                write!(f, "failed to open '{}': {}", port, details)
            }
            LinkError::NotOpen => write!(f, "link is not open"),
            LinkError::SendFailed { details } => write!(f, "send failed: {}", details),
            LinkError::ReceiveFailed { details } => write!(f, "receive failed: {}", details),
        }
    }
}

impl std::error::Error for LinkError {}

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;
