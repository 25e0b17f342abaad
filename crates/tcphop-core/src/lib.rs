//! `tcphop` Core Library
//!
//! Shared functionality for the relay binary:
//! - Relay configuration and address validation
//! - Common error types
//! - Tracing subscriber initialisation

pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::RelayConfig;
pub use error::{Error, Result};
