//! tcphop Relay Library
//!
//! Transparent TCP forwarding to a fixed destination:
//! - Listener that dispatches one relay session per accepted connection
//! - Relay sessions with two directional pumps
//! - One-shot close coordination between the pumps
//! - Command line argument model

pub mod cli;
pub mod closer;
pub mod listener;
pub mod pump;
pub mod session;

pub use closer::CloseCoordinator;
pub use listener::Listener;
pub use pump::{Direction, PumpEnd, PumpOutcome};
pub use session::{
    RelayReport, RelaySession, SessionId, SessionOutcome, SessionReport, SessionState,
};
