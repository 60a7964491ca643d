use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cdu_grid::{initial_screen, normalize, render_panel, Frame, Grid, PanelLayout, RawValue, TriState};
use display_link::FrameTransport;
use futures_util::future::join_all;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{DeviceOutcome, DevicePosition};
use crate::registry::VariableRegistry;

/// Renders an annunciator panel from named telemetry variables on a fixed tick.
pub struct AnnunciatorBridge {
    position: DevicePosition,
    layout: Arc<PanelLayout>,
    registry: Arc<VariableRegistry>,
    transport: FrameTransport,
    tick: Duration,
}

impl AnnunciatorBridge {
    pub fn new(
        position: DevicePosition,
        layout: Arc<PanelLayout>,
        registry: Arc<VariableRegistry>,
        transport: FrameTransport,
        tick: Duration,
    ) -> Self {
        Self {
            position,
            layout,
            registry,
            transport,
            tick,
        }
    }

    pub fn transport(&self) -> &FrameTransport {
        &self.transport
    }

    /// Reads every signal the layout uses. New variables are requested
    /// together, so the first tick waits at most one first-read window.
    pub async fn read_signals(&self) -> HashMap<String, TriState> {
        let names = self.layout.signals();
        let values = join_all(names.iter().map(|name| self.registry.get(name))).await;
        names
            .into_iter()
            .zip(values)
            .map(|(name, value)| (name.to_owned(), normalize(&RawValue::from(value))))
            .collect()
    }

    pub async fn render_tick(&self) -> Grid {
        let signals = self.read_signals().await;
        render_panel(&self.layout, &signals)
    }

    /// Sends the initial screen, then one rendered frame per tick until
    /// cancelled. The transport is closed on every exit path.
    pub async fn run(self, cancel: CancellationToken) -> DeviceOutcome {
        info!(
            target: "cdu_bridge::annunciator",
            device = %self.position,
            tick_ms = self.tick.as_millis() as u64,
            signals = self.layout.signals().len(),
            "annunciator bridge running"
        );
        self.transport
            .enqueue(Frame::from_grid(initial_screen(&self.layout)));

        let mut ticker = time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let grid = tokio::select! {
                _ = cancel.cancelled() => break,
                grid = self.render_tick() => grid,
            };
            trace!(target: "cdu_bridge::annunciator", device = %self.position, "frame rendered");
            self.transport.enqueue(Frame::from_grid(grid));
        }

        debug!(target: "cdu_bridge::annunciator", device = %self.position, "annunciator bridge stopping");
        self.transport.close().await;
        DeviceOutcome::Stopped
    }
}
