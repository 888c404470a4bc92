//! Error taxonomy shared by the transport boundary and the scale session.

use serde::Serialize;
use thiserror::Error;

/// Failure category reported to callers alongside a human readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotAvailable,
    UserCancelled,
    ConnectionFailed,
    NotConnected,
    AlreadyConnecting,
    AlreadyConnected,
    WriteFailed,
}

/// Errors raised by a [`Transport`](crate::ble::Transport) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("bluetooth not available: {0}")]
    NotAvailable(String),

    #[error("device selection cancelled")]
    UserCancelled,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::NotAvailable(_) => ErrorKind::NotAvailable,
            TransportError::UserCancelled => ErrorKind::UserCancelled,
            TransportError::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            TransportError::WriteFailed(_) => ErrorKind::WriteFailed,
        }
    }
}

/// Errors returned by [`ScaleSession`](crate::session::ScaleSession).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScaleError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("not connected to scale")]
    NotConnected,

    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    #[error("already connected to scale")]
    AlreadyConnected,
}

impl ScaleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScaleError::Transport(e) => e.kind(),
            ScaleError::NotConnected => ErrorKind::NotConnected,
            ScaleError::AlreadyConnecting => ErrorKind::AlreadyConnecting,
            ScaleError::AlreadyConnected => ErrorKind::AlreadyConnected,
        }
    }
}

impl From<ErrorKind> for ScaleError {
    /// Maps a state-guard rejection onto its error. Transport kinds have no
    /// message here and are reported as a generic connection failure.
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotConnected => ScaleError::NotConnected,
            ErrorKind::AlreadyConnecting => ScaleError::AlreadyConnecting,
            ErrorKind::AlreadyConnected => ScaleError::AlreadyConnected,
            ErrorKind::NotAvailable => {
                ScaleError::Transport(TransportError::NotAvailable(String::new()))
            }
            ErrorKind::UserCancelled => ScaleError::Transport(TransportError::UserCancelled),
            ErrorKind::ConnectionFailed => {
                ScaleError::Transport(TransportError::ConnectionFailed(String::new()))
            }
            ErrorKind::WriteFailed => {
                ScaleError::Transport(TransportError::WriteFailed(String::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScaleError::from(TransportError::ConnectionFailed("gatt refused".to_string()));
        assert_eq!(
            err.to_string(),
            "transport error: connection failed: gatt refused"
        );
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);

        assert_eq!(ScaleError::NotConnected.to_string(), "not connected to scale");
        assert_eq!(
            TransportError::UserCancelled.to_string(),
            "device selection cancelled"
        );
    }

    #[test]
    fn test_guard_kinds_round_trip() {
        for kind in [
            ErrorKind::NotConnected,
            ErrorKind::AlreadyConnecting,
            ErrorKind::AlreadyConnected,
        ] {
            assert_eq!(ScaleError::from(kind).kind(), kind);
        }
    }
}
