//! Relay configuration.
//!
//! Configuration only comes from command line flags; there is no config file.
//! Values are validated once at startup so the listener and sessions can rely
//! on them without re-checking.

use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DESTINATION_ADDR: &str = "127.0.0.1:8081";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024; // 16KB
pub const MINIMAL_BUFFER_SIZE: usize = 4 * 1024; // 4KB

/// Settings shared by the listener and every relay session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// `host:port` to accept inbound connections on.
    pub listen_addr: String,
    /// `host:port` every accepted connection is forwarded to.
    pub destination_addr: String,
    /// Upper bound for the dial phase. `None` leaves it to the OS.
    pub connect_timeout: Option<Duration>,
    /// Maximum number of concurrently relayed sessions. `None` is unbounded.
    pub max_sessions: Option<usize>,
    /// Size of the copy buffer owned by each pump.
    pub buffer_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            destination_addr: DEFAULT_DESTINATION_ADDR.to_string(),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            max_sessions: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl RelayConfig {
    pub fn new(listen_addr: impl Into<String>, destination_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            destination_addr: destination_addr.into(),
            ..Self::default()
        }
    }

    /// Check addresses and limits, clamping the buffer size to its minimum.
    pub fn validate(mut self) -> Result<Self> {
        validate_host_port("listen", &self.listen_addr)?;
        validate_host_port("destination", &self.destination_addr)?;
        if self.max_sessions == Some(0) {
            return Err(Error::Config(
                "max sessions must be greater than zero".to_string(),
            ));
        }
        self.buffer_size = self.buffer_size.max(MINIMAL_BUFFER_SIZE);
        Ok(self)
    }
}

/// Accepts `host:port`, including bracketed IPv6 hosts like `[::1]:8080`.
fn validate_host_port(what: &str, addr: &str) -> Result<()> {
    let Some((host, port)) = addr.rsplit_once(':') else {
        return Err(Error::Config(format!(
            "{what} address '{addr}' must be in host:port form"
        )));
    };
    if host.is_empty() || host == "[]" {
        return Err(Error::Config(format!(
            "{what} address '{addr}' is missing a host"
        )));
    }
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(Error::Config(format!(
            "{what} address '{addr}': IPv6 hosts must be bracketed"
        )));
    }
    port.parse::<u16>().map_err(|_| {
        Error::Config(format!("{what} address '{addr}' has an invalid port"))
    })?;
    Ok(())
}
