//! Error types for tunnel session operations.

use std::fmt;
use std::io;

use crate::state::{LifecycleState, Operation};

/// Result type for tunnel session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing a tunnel device.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation is not permitted in the current lifecycle state.
    #[error("{operation} not permitted in state {state}")]
    InvalidState {
        /// The rejected operation.
        operation: Operation,
        /// The state the session was in.
        state: LifecycleState,
    },

    /// Configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The TUN device node could not be opened.
    #[error("cannot open {path}: {source}")]
    NoDevice {
        /// The device node path.
        path: &'static str,
        /// The underlying error.
        source: io::Error,
    },

    /// A system call failed.
    #[error("{operation} failed: {source}")]
    Sys {
        /// The system call or ioctl that failed.
        operation: String,
        /// The underlying error.
        source: io::Error,
    },

    /// Kernel rejected a netlink request.
    #[error("{operation}: {message} (errno {errno})")]
    Kernel {
        /// The request that failed.
        operation: String,
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Netlink reply was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Netlink reply was malformed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Packet I/O attempted while the device is not running.
    #[error("device is not running (state {state})")]
    NotRunning {
        /// The state the session was in.
        state: LifecycleState,
    },

    /// Malformed call parameters.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Non-blocking I/O has nothing to transfer right now.
    #[error("operation would block")]
    WouldBlock,

    /// Other I/O failure on the device descriptor.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Closed classification of [`Error`] values, stable for callers that
/// only need to branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidState,
    InvalidConfig,
    NoDevice,
    Sys,
    NotRunning,
    InvalidArgument,
    WouldBlock,
    Io,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::InvalidConfig => "invalid config",
            ErrorKind::NoDevice => "no device",
            ErrorKind::Sys => "system error",
            ErrorKind::NotRunning => "not running",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::WouldBlock => "would block",
            ErrorKind::Io => "I/O error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Create a system call error from the last OS error.
    pub fn last_os_error(operation: impl Into<String>) -> Self {
        Self::Sys {
            operation: operation.into(),
            source: io::Error::last_os_error(),
        }
    }

    /// Create a kernel error from a (negative) netlink errno value.
    pub fn from_errno_with_context(errno: i32, operation: impl Into<String>) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            operation: operation.into(),
            errno: -errno,
            message,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::NoDevice { .. } => ErrorKind::NoDevice,
            Self::Sys { .. }
            | Self::Kernel { .. }
            | Self::Truncated { .. }
            | Self::InvalidMessage(_) => ErrorKind::Sys,
            Self::NotRunning { .. } => ErrorKind::NotRunning,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::WouldBlock => ErrorKind::WouldBlock,
            Self::Io(_) => ErrorKind::Io,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get the errno value if the error carries one.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            Self::NoDevice { source, .. } | Self::Sys { source, .. } | Self::Io(source) => {
                source.raw_os_error()
            }
            _ => None,
        }
    }

    /// Check if this is the non-blocking flow-control signal.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM | libc::EACCES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_errno_with_context() {
        let err = Error::from_errno_with_context(-libc::ENODEV, "setting mtu on tun0");
        assert_eq!(err.kind(), ErrorKind::Sys);
        assert_eq!(err.errno(), Some(libc::ENODEV));
        let msg = err.to_string();
        assert!(msg.contains("setting mtu on tun0"));
        assert!(msg.contains("No such device"));
    }

    #[test]
    fn test_is_permission_denied() {
        let err = Error::NoDevice {
            path: "/dev/net/tun",
            source: io::Error::from_raw_os_error(libc::EACCES),
        };
        assert!(err.is_permission_denied());
        assert_eq!(err.kind(), ErrorKind::NoDevice);

        assert!(Error::from_errno_with_context(-libc::EPERM, "x").is_permission_denied());
        assert!(!Error::WouldBlock.is_permission_denied());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::InvalidState {
            operation: Operation::Stop,
            state: LifecycleState::Initialized,
        };
        assert_eq!(err.to_string(), "stop not permitted in state initialized");

        let err = Error::NotRunning {
            state: LifecycleState::Stopped,
        };
        assert_eq!(err.to_string(), "device is not running (state stopped)");
        assert_eq!(err.kind(), ErrorKind::NotRunning);
    }

    #[test]
    fn test_would_block() {
        assert!(Error::WouldBlock.is_would_block());
        assert_eq!(Error::WouldBlock.kind().to_string(), "would block");
        assert!(!Error::Internal("x".into()).is_would_block());
    }
}
