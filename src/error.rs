//! Error taxonomy for capture sessions.

use std::io;
use std::time::Duration;

/// Broad class of a [`CameraError`], for callers that pick a recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never completed: device gone, permission, bad handle.
    Transport,
    /// The device answered but rejected the argument or the current state.
    Protocol,
    /// The readiness wait ran out.
    Timeout,
    /// A dequeued buffer could not be handed back to the driver.
    RingConsistency,
}

/// Error type for camera operations.
#[derive(Debug)]
pub enum CameraError {
    /// Control channel could not complete the request.
    Transport {
        /// Request that failed.
        op: &'static str,
        /// Underlying OS error.
        source: io::Error,
    },
    /// Device rejected the request.
    Protocol {
        /// Request that failed.
        op: &'static str,
        /// Underlying OS error.
        source: io::Error,
    },
    /// Device did not become ready within the bound.
    Timeout(Duration),
    /// Slot `index` is stuck application-owned; the session is degraded.
    RingConsistency {
        /// Ring slot that could not be re-enqueued.
        index: u32,
        /// Underlying OS error.
        source: io::Error,
    },
    /// Operation is not legal in the current streaming state.
    InvalidState(&'static str),
    /// Requested mode is outside what a session supports.
    Unsupported(String),
    /// The device handle was already closed.
    Closed,
}

impl CameraError {
    /// Classify an OS error returned for request `op`.
    pub fn from_os(op: &'static str, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(
                libc::EINVAL | libc::EBUSY | libc::ENOTTY | libc::ERANGE | libc::ENOSPC
                | libc::EPIPE | libc::EPROTO,
            ) => Self::Protocol { op, source: err },
            _ => Self::Transport { op, source: err },
        }
    }

    /// Broad class of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::Closed => ErrorKind::Transport,
            Self::Protocol { .. } | Self::InvalidState(_) | Self::Unsupported(_) => {
                ErrorKind::Protocol
            }
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::RingConsistency { .. } => ErrorKind::RingConsistency,
        }
    }

    /// Raw errno carried by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Transport { source, .. }
            | Self::Protocol { source, .. }
            | Self::RingConsistency { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

impl std::fmt::Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport { op, source } => write!(f, "{op} failed: {source}"),
            Self::Protocol { op, source } => write!(f, "{op} rejected by device: {source}"),
            Self::Timeout(after) => write!(f, "Device not ready after {after:?}"),
            Self::RingConsistency { index, source } => {
                write!(f, "Buffer {index} could not be returned to the driver: {source}")
            }
            Self::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
            Self::Unsupported(msg) => write!(f, "Unsupported: {msg}"),
            Self::Closed => write!(f, "Device handle is closed"),
        }
    }
}

impl std::error::Error for CameraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport { source, .. }
            | Self::Protocol { source, .. }
            | Self::RingConsistency { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;
