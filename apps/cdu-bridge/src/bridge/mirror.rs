use cdu_grid::{CellOrder, MirrorDecoder};
use display_link::{ConnectionState, FrameTransport, Readiness};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DeviceOutcome, DevicePosition};
use crate::feed::BufferFeed;

/// Mirrors a cockpit display's raw memory onto a physical display.
pub struct MirrorBridge {
    position: DevicePosition,
    transport: FrameTransport,
    decoder: Mutex<MirrorDecoder>,
}

impl MirrorBridge {
    pub fn new(position: DevicePosition, transport: FrameTransport, order: CellOrder) -> Self {
        Self {
            position,
            transport,
            decoder: Mutex::new(MirrorDecoder::new(order)),
        }
    }

    pub fn transport(&self) -> &FrameTransport {
        &self.transport
    }

    /// Entry point for the telemetry context. Returns whether a frame was
    /// handed to the transport; unchanged buffers produce nothing.
    pub fn on_buffer(&self, raw: &[u8]) -> bool {
        let frame = self.decoder.lock().decode_if_changed(raw);
        match frame {
            Some(frame) => {
                self.transport.enqueue(frame);
                true
            }
            None => false,
        }
    }

    /// Waits for the display, then mirrors `source` until cancelled or until
    /// the link gives up. A display that never answers is reported as
    /// unavailable without touching any other device.
    pub async fn run(self, source: BufferFeed, cancel: CancellationToken) -> DeviceOutcome {
        let readiness = tokio::select! {
            _ = cancel.cancelled() => Readiness::Closed,
            readiness = self.transport.wait_ready() => readiness,
        };
        match readiness {
            Readiness::Connected => {}
            Readiness::GaveUp => {
                warn!(
                    target: "cdu_bridge::mirror",
                    device = %self.position,
                    url = %self.transport.config().url,
                    "display not reachable; continuing without it"
                );
                self.transport.close().await;
                return DeviceOutcome::Unavailable;
            }
            Readiness::Closed => {
                self.transport.close().await;
                return DeviceOutcome::Stopped;
            }
        }

        info!(
            target: "cdu_bridge::mirror",
            device = %self.position,
            source = %source.path().display(),
            "mirroring display memory"
        );
        let mut states = self.transport.subscribe();
        let gave_up = async move {
            loop {
                if *states.borrow_and_update() == ConnectionState::GivenUp {
                    return;
                }
                if states.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::select! {
            _ = source.run(cancel.clone(), |raw| {
                self.on_buffer(raw);
            }) => {}
            _ = gave_up => {}
        }

        let outcome = if self.transport.state() == ConnectionState::GivenUp {
            DeviceOutcome::Unavailable
        } else {
            DeviceOutcome::Stopped
        };
        debug!(target: "cdu_bridge::mirror", device = %self.position, ?outcome, "mirror bridge stopping");
        self.transport.close().await;
        outcome
    }
}
