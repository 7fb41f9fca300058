use std::fmt;
use thiserror::Error;

/// Invalid reconnection configuration.
///
/// Returned when building options, so a misconfigured manager can never be
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max_retries` must be a positive integer.
    #[error("max_retries must be greater than zero (got {value})")]
    InvalidMaxRetries {
        /// The rejected value.
        value: i64,
    },

    /// `retry_interval_milliseconds` must not be negative.
    #[error("retry_interval_milliseconds must not be negative (got {value})")]
    NegativeRetryInterval {
        /// The rejected value.
        value: i64,
    },

    /// The reconnection dialog needs a stable, non-empty identifier.
    #[error("dialog_id must not be empty")]
    EmptyDialogId,
}

/// The broad category of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Establishing or starting the channel failed.
    Connect,
    /// The channel closed.
    Closed,
    /// The channel was up but the exchange with the circuit host failed.
    Protocol,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect failed"),
            Self::Closed => write!(f, "connection closed"),
            Self::Protocol => write!(f, "protocol error"),
        }
    }
}

/// A single transport attempt failed.
///
/// Transport errors are always recoverable from the manager's point of view:
/// they feed the retry decision and are handed to the reconnection handler,
/// nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Creates a transport error of the given kind.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Establishing the channel failed.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// The channel closed.
    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Closed, message)
    }

    /// The exchange with the circuit host failed.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let kind = match err.kind() {
            ErrorKind::ConnectionRefused | ErrorKind::TimedOut | ErrorKind::AddrNotAvailable => {
                TransportErrorKind::Connect
            }
            ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof => TransportErrorKind::Closed,
            _ => TransportErrorKind::Protocol,
        };
        Self::new(kind, err.to_string())
    }
}

/// Errors from the process-wide manager slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlobalError {
    /// A manager is already installed; dispose it first.
    #[error("a circuit manager is already installed")]
    AlreadyInitialized,
}
