//! Console logging for the relay.
//!
//! Sessions log concurrently, so lines from different sessions interleave.
//! Every session line carries its `session` span (id and peer) instead, which
//! the JSON format flattens into each event.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "tcphop=info,tcphop_core=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines on stdout.
    #[default]
    Text,
    /// One JSON object per line, for log aggregation.
    Json,
}

impl LogFormat {
    pub const fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

/// Build the filter from `RUST_LOG`-style directives, falling back to
/// [`DEFAULT_FILTER`] when they are missing or invalid.
pub fn relay_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let directives = std::env::var("RUST_LOG").ok();
    let filter = relay_filter(directives.as_deref());

    let (text, json) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer().with_target(false)), None),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .map_err(|e| Error::Tracing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_selects_format() {
        assert_eq!(LogFormat::from_json_flag(true), LogFormat::Json);
        assert_eq!(LogFormat::from_json_flag(false), LogFormat::Text);
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn filter_uses_given_directives() {
        let filter = relay_filter(Some("tcphop=debug"));
        assert!(filter.to_string().contains("tcphop=debug"));
    }

    #[test]
    fn filter_falls_back_to_default() {
        assert_eq!(relay_filter(None).to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
        let invalid = relay_filter(Some("tcphop=notalevel"));
        assert_eq!(invalid.to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
    }
}
