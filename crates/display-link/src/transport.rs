use std::sync::Arc;

use cdu_grid::Frame;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::LinkConfig;
use crate::mailbox::Mailbox;
use crate::session::{self, SessionEnd};
use crate::state::{ConnectionState, Counters, LinkStats, Readiness};

pub(crate) struct Shared {
    pub(crate) config: LinkConfig,
    pub(crate) mailbox: Mailbox<Frame>,
    pub(crate) stats: Counters,
}

/// Handle to one display link. The connection itself lives in a background
/// task that is cancelled when the handle is closed or dropped.
pub struct FrameTransport {
    shared: Arc<Shared>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FrameTransport {
    /// Starts connecting immediately. Must be called within a Tokio runtime.
    pub fn spawn(config: LinkConfig) -> Self {
        let shared = Arc::new(Shared {
            config,
            mailbox: Mailbox::new(),
            stats: Counters::default(),
        });
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_link(Arc::clone(&shared), state_tx, cancel.clone()));
        Self {
            shared,
            state: state_rx,
            cancel,
            task: Some(task),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.shared.config
    }

    /// Hands a frame to the link. Never blocks; an unsent older frame is
    /// replaced.
    pub fn enqueue(&self, frame: Frame) {
        if self.shared.mailbox.post(frame).is_some() {
            self.shared.stats.coalesced();
            trace!(
                target: "display_link::transport",
                device = %self.shared.config.label,
                "replaced unsent frame"
            );
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Resolves once the link is connected, has given up, or has shut down.
    pub async fn wait_ready(&self) -> Readiness {
        let mut state = self.state.clone();
        loop {
            match *state.borrow_and_update() {
                ConnectionState::Connected => return Readiness::Connected,
                ConnectionState::GivenUp => return Readiness::GaveUp,
                _ => {}
            }
            if state.changed().await.is_err() {
                return match *state.borrow() {
                    ConnectionState::Connected => Readiness::Connected,
                    ConnectionState::GivenUp => Readiness::GaveUp,
                    _ => Readiness::Closed,
                };
            }
        }
    }

    pub fn stats(&self) -> LinkStats {
        self.shared.stats.snapshot()
    }

    /// Closes the socket and waits for the background task to finish.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(
                    target: "display_link::transport",
                    device = %self.shared.config.label,
                    error = %err,
                    "link task ended abnormally"
                );
            }
        }
    }
}

impl Drop for FrameTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_link(
    shared: Arc<Shared>,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
) {
    let config = &shared.config;
    let mut failures: u32 = 0;
    let mut last_sent: Option<Frame> = None;

    loop {
        state.send_replace(ConnectionState::Connecting);
        let attempt = shared.stats.attempt();
        debug!(
            target: "display_link::transport",
            device = %config.label,
            url = %config.url,
            attempt,
            "connecting to display"
        );

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = session::connect(config) => result,
        };

        match connected {
            Ok(socket) => {
                info!(
                    target: "display_link::transport",
                    device = %config.label,
                    url = %config.url,
                    "display connected"
                );
                failures = 0;
                match session::run(socket, &shared, &cancel, &state, &mut last_sent).await {
                    Ok(SessionEnd::Cancelled) => break,
                    Err(err) => {
                        failures += 1;
                        warn!(
                            target: "display_link::transport",
                            device = %config.label,
                            error = %err,
                            "display connection lost"
                        );
                    }
                }
            }
            Err(err) => {
                failures += 1;
                debug!(
                    target: "display_link::transport",
                    device = %config.label,
                    error = %err,
                    failures,
                    "connect failed"
                );
            }
        }

        state.send_replace(ConnectionState::Backoff);
        if let Some(limit) = config.max_retries {
            if failures >= limit {
                warn!(
                    target: "display_link::transport",
                    device = %config.label,
                    url = %config.url,
                    failures,
                    "giving up on display"
                );
                state.send_replace(ConnectionState::GivenUp);
                return;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = time::sleep(config.retry_delay) => {}
        }
    }

    state.send_replace(ConnectionState::Disconnected);
    debug!(target: "display_link::transport", device = %config.label, "link closed");
}
