//! tcphop
//!
//! Accepts TCP connections on a listen address and relays every byte, in
//! both directions, to a fixed destination address.

use clap::Parser;
use tracing::{error, info, warn};

use tcphop::Listener;
use tcphop::cli::{Args, normalize_legacy_flags};
use tcphop_core::RelayConfig;
use tcphop_core::tracing_init::{LogFormat, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse_from(normalize_legacy_flags(std::env::args_os()));
    init_tracing(LogFormat::from_json_flag(args.log_json))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting tcphop");

    if let Err(e) = run(args.into_config()).await {
        if e.is_fatal() {
            error!(error = %e, "Failed to start relay");
        } else {
            info!("Relay stopped after listener failure");
        }
        return Err(e.into());
    }

    info!("Relay stopped");
    Ok(())
}

async fn run(config: RelayConfig) -> tcphop_core::Result<()> {
    let listener = Listener::bind(config.validate()?).await?;
    listener.serve(shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
