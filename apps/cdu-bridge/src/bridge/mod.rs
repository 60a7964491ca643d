//! One orchestrator per physical display. Each device runs in its own task so
//! a missing or failing display never affects its siblings.

mod annunciator;
mod mirror;

pub use annunciator::AnnunciatorBridge;
pub use mirror::MirrorBridge;

use std::fmt;
use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Crew position a display is mounted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DevicePosition {
    Captain,
    FirstOfficer,
}

impl DevicePosition {
    pub fn as_str(self) -> &'static str {
        match self {
            DevicePosition::Captain => "captain",
            DevicePosition::FirstOfficer => "first_officer",
        }
    }
}

impl fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a device bridge finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOutcome {
    /// Cancelled after running normally.
    Stopped,
    /// The display never became reachable and the link gave up.
    Unavailable,
    /// The bridge task panicked or was aborted.
    Failed,
}

/// Device bridges sharing one cancellation scope.
#[derive(Debug)]
pub struct DeviceSet {
    cancel: CancellationToken,
    tasks: Vec<(DevicePosition, JoinHandle<DeviceOutcome>)>,
}

impl DeviceSet {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            tasks: Vec::new(),
        }
    }

    /// Token for a new device; cancelled together with the set.
    pub fn device_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub fn spawn<F>(&mut self, position: DevicePosition, bridge: F)
    where
        F: Future<Output = DeviceOutcome> + Send + 'static,
    {
        info!(target: "cdu_bridge::devices", device = %position, "starting device bridge");
        self.tasks.push((position, tokio::spawn(bridge)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Waits for every device and reports how each one ended.
    pub async fn join(self) -> Vec<(DevicePosition, DeviceOutcome)> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for (position, task) in self.tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(
                        target: "cdu_bridge::devices",
                        device = %position,
                        error = %err,
                        "device bridge failed"
                    );
                    DeviceOutcome::Failed
                }
            };
            if outcome == DeviceOutcome::Unavailable {
                warn!(target: "cdu_bridge::devices", device = %position, "device unavailable");
            }
            outcomes.push((position, outcome));
        }
        outcomes
    }
}
