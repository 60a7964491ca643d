use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cdu_bridge::app;
use cdu_bridge::bridge::DeviceOutcome;
use cdu_bridge::cli::Cli;
use cdu_bridge::config::Config;
use cdu_bridge::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.logging.to_config()).context("failed to initialise logging")?;
    let config = Config::from_env();

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let report = app::run(cli.command, config, shutdown)
        .await
        .context("failed to start the bridge")?;
    for (position, outcome) in report {
        match outcome {
            DeviceOutcome::Stopped => info!(target: "cdu_bridge::app", device = %position, "device stopped"),
            DeviceOutcome::Unavailable => {
                warn!(target: "cdu_bridge::app", device = %position, "device was unavailable")
            }
            DeviceOutcome::Failed => warn!(target: "cdu_bridge::app", device = %position, "device failed"),
        }
    }
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!(target: "cdu_bridge::app", "shutdown requested");
            shutdown.cancel();
        }
        Err(err) => warn!(target: "cdu_bridge::app", error = %err, "unable to listen for ctrl-c"),
    }
}
