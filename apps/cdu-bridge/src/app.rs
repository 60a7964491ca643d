use std::sync::Arc;
use std::time::Duration;

use display_link::{FrameTransport, LinkConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bridge::{AnnunciatorBridge, DeviceOutcome, DevicePosition, DeviceSet, MirrorBridge};
use crate::cli::{AnnunciatorArgs, Command, MirrorArgs};
use crate::config::{load_layout, Config, ConfigError};
use crate::feed::{BufferFeed, FileFeed};
use crate::registry::VariableRegistry;

pub type DeviceReport = Vec<(DevicePosition, DeviceOutcome)>;

/// Runs the selected bridge until `shutdown` is cancelled or every device
/// has finished on its own.
pub async fn run(
    command: Command,
    config: Config,
    shutdown: CancellationToken,
) -> Result<DeviceReport, ConfigError> {
    match command {
        Command::Annunciator(args) => run_annunciator(args, config, shutdown).await,
        Command::Mirror(args) => run_mirror(args, config, shutdown).await,
    }
}

async fn run_annunciator(
    args: AnnunciatorArgs,
    config: Config,
    shutdown: CancellationToken,
) -> Result<DeviceReport, ConfigError> {
    let layout = Arc::new(load_layout(args.layout.as_deref())?);
    let tick = args
        .tick_ms
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
        .unwrap_or(config.tick);

    let feed = Arc::new(FileFeed::new(args.values, config.feed_interval));
    let registry = Arc::new(VariableRegistry::with_first_read_wait(
        feed.clone(),
        config.first_read_wait,
    ));
    // Start from a clean subscription table on the simulator side.
    let _ = registry.clear_all();
    let feed_cancel = shutdown.child_token();
    let feed_task = tokio::spawn(feed.run(Arc::clone(&registry), feed_cancel.clone()));

    let mut displays = vec![(
        DevicePosition::Captain,
        args.captain_url.unwrap_or(config.captain_url),
    )];
    if let Some(url) = args.first_officer_url {
        displays.push((DevicePosition::FirstOfficer, url));
    }

    let mut devices = DeviceSet::new(shutdown);
    for (position, url) in displays {
        let transport =
            FrameTransport::spawn(LinkConfig::annunciator(url).with_label(position.as_str()));
        let bridge = AnnunciatorBridge::new(
            position,
            Arc::clone(&layout),
            Arc::clone(&registry),
            transport,
            tick,
        );
        devices.spawn(position, bridge.run(devices.device_token()));
    }

    let report = devices.join().await;
    feed_cancel.cancel();
    if let Err(err) = feed_task.await {
        debug!(target: "cdu_bridge::app", error = %err, "feed task ended abnormally");
    }
    Ok(report)
}

async fn run_mirror(
    args: MirrorArgs,
    config: Config,
    shutdown: CancellationToken,
) -> Result<DeviceReport, ConfigError> {
    let max_retries = args.max_retries.unwrap_or(config.max_retries);
    let sources = [
        (
            DevicePosition::Captain,
            args.captain_buffer,
            args.captain_url.unwrap_or(config.captain_url),
        ),
        (
            DevicePosition::FirstOfficer,
            args.first_officer_buffer,
            args.first_officer_url.unwrap_or(config.first_officer_url),
        ),
    ];

    let mut devices = DeviceSet::new(shutdown);
    for (position, buffer, url) in sources {
        let Some(buffer) = buffer else {
            info!(target: "cdu_bridge::app", device = %position, "no display buffer; skipping device");
            continue;
        };
        let link = LinkConfig::mirror(url).with_label(position.as_str());
        let retry_delay = link.retry_delay;
        let link = link.with_retry(retry_delay, Some(max_retries));
        let bridge = MirrorBridge::new(position, FrameTransport::spawn(link), args.cell_order.into());
        let source = BufferFeed::new(buffer, config.feed_interval);
        devices.spawn(position, bridge.run(source, devices.device_token()));
    }
    if devices.is_empty() {
        return Err(ConfigError::NoDevices);
    }
    Ok(devices.join().await)
}
