//! Command line arguments.

use std::ffi::OsString;
use std::time::Duration;

use clap::Parser;

use tcphop_core::config::{
    DEFAULT_BUFFER_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_DESTINATION_ADDR, DEFAULT_LISTEN_ADDR,
};
use tcphop_core::RelayConfig;

#[derive(Parser, Debug)]
#[command(name = "tcphop")]
#[command(version, about = "Transparent TCP relay to a fixed destination")]
pub struct Args {
    /// TCP listen address.
    #[arg(long, value_name = "HOST:PORT", default_value = DEFAULT_LISTEN_ADDR)]
    pub src: String,

    /// TCP forward-to address.
    #[arg(long, value_name = "HOST:PORT", default_value = DEFAULT_DESTINATION_ADDR)]
    pub dst: String,

    /// Destination connect timeout in seconds (0 leaves it to the OS).
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout: u64,

    /// Maximum number of concurrently relayed connections. Unlimited if unset.
    #[arg(long)]
    pub max_sessions: Option<usize>,

    /// Copy buffer size per direction, in bytes.
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    pub fn into_config(self) -> RelayConfig {
        RelayConfig {
            listen_addr: self.src,
            destination_addr: self.dst,
            connect_timeout: (self.connect_timeout > 0)
                .then(|| Duration::from_secs(self.connect_timeout)),
            max_sessions: self.max_sessions,
            buffer_size: self.buffer_size,
        }
    }
}

/// Rewrite single-dash `-src`/`-dst` flags (with or without `=value`) into
/// their `--` form so existing invocations keep working.
pub fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }
            let legacy = ["src", "dst"].into_iter().find_map(|flag| {
                let rest = text.strip_prefix('-')?.strip_prefix(flag)?;
                (rest.is_empty() || rest.starts_with('=')).then(|| format!("--{flag}{rest}"))
            });
            legacy.map_or(arg, OsString::from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(normalize_legacy_flags(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let config = parse(&["tcphop"]).into_config();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn legacy_single_dash_flags() {
        let args = parse(&["tcphop", "-src", "127.0.0.1:9090", "-dst=127.0.0.1:9091"]);
        assert_eq!(args.src, "127.0.0.1:9090");
        assert_eq!(args.dst, "127.0.0.1:9091");
    }

    #[test]
    fn double_dash_flags() {
        let args = parse(&[
            "tcphop",
            "--src",
            "[::]:9090",
            "--dst",
            "backend:443",
            "--max-sessions",
            "64",
            "--connect-timeout",
            "0",
            "--log-json",
        ]);
        assert!(args.log_json);
        let config = args.into_config();
        assert_eq!(config.listen_addr, "[::]:9090");
        assert_eq!(config.destination_addr, "backend:443");
        assert_eq!(config.max_sessions, Some(64));
        assert!(config.connect_timeout.is_none());
    }

    #[test]
    fn normalization_leaves_other_args_alone() {
        let input = ["tcphop", "-srcx", "--src", "--", "-dst"];
        let expected: Vec<OsString> = input.iter().map(OsString::from).collect();
        assert_eq!(normalize_legacy_flags(input), expected);
    }
}
