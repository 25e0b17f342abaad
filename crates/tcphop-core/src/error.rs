//! Error types for the `tcphop` relay.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using the relay [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while starting the listener or establishing a session.
///
/// Pump terminations are not represented here: a pump that stops is part of
/// normal session teardown and is described by the pump outcome instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listen address could not be bound. Fatal at startup.
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The listener failed to accept a connection. Ends the accept loop.
    #[error("Accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The destination refused or could not be reached.
    #[error("Couldn't connect to {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The destination did not complete the handshake in time.
    #[error("Timed out connecting to {addr} after {timeout:?}")]
    DialTimeout { addr: String, timeout: Duration },

    /// The logging subscriber could not be installed.
    #[error("Failed to initialise logging: {0}")]
    Tracing(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error stopped the relay before any connection was served.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Bind { .. } | Self::Tracing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_is_fatal() {
        let err = Error::Bind {
            addr: "0.0.0.0:80".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("Failed to listen on 0.0.0.0:80"));
    }

    #[test]
    fn dial_errors_are_not_fatal() {
        let refused = Error::Dial {
            addr: "127.0.0.1:9091".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let timeout = Error::DialTimeout {
            addr: "10.0.0.1:9091".into(),
            timeout: Duration::from_secs(3),
        };
        assert!(!refused.is_fatal());
        assert!(!timeout.is_fatal());
        assert_eq!(
            timeout.to_string(),
            "Timed out connecting to 10.0.0.1:9091 after 3s"
        );
    }

    #[test]
    fn accept_error_is_not_fatal() {
        let err = Error::Accept(io::Error::other("too many open files"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn startup_errors_are_fatal() {
        assert!(Error::Config("bad port".into()).is_fatal());
        assert!(Error::Tracing("already set".into()).is_fatal());
    }
}
