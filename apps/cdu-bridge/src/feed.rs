//! File-backed telemetry source for running the bridge without a simulator.
//!
//! `FileFeed` polls a JSON object of named values and pushes every subscribed
//! variable into the registry. `BufferFeed` polls a raw display-memory dump for
//! the pixel-mirror path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cdu_grid::{normalize, RawValue};
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::registry::{SimLink, SimLinkError, VariableId, VariableRegistry};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path:?} must contain a JSON object of named values")]
    NotAnObject { path: PathBuf },
}

/// Converts a JSON value into the registry's numeric form. Booleans become
/// 0/1; text that is not a number goes through the normalizer.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .or_else(|| Some(f64::from(normalize(&RawValue::from(text.as_str())).as_u8()))),
        _ => None,
    }
}

/// Polls a JSON values file and plays the simulator side of the registry.
#[derive(Debug)]
pub struct FileFeed {
    path: PathBuf,
    interval: Duration,
    subscriptions: DashMap<VariableId, String>,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            subscriptions: DashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Reads the values file once and delivers every subscribed variable it
    /// contains. Returns how many values were delivered.
    pub async fn poll_once(&self, registry: &VariableRegistry) -> Result<usize, FeedError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FeedError::Read {
                path: self.path.clone(),
                source,
            })?;
        let document: Value = serde_json::from_str(&text).map_err(|source| FeedError::Parse {
            path: self.path.clone(),
            source,
        })?;
        let Value::Object(values) = document else {
            return Err(FeedError::NotAnObject {
                path: self.path.clone(),
            });
        };

        // Snapshot the subscriptions so registry callbacks run without holding shard locks.
        let subscribed: Vec<(VariableId, String)> = self
            .subscriptions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        let mut delivered = 0;
        for (id, name) in subscribed {
            if let Some(value) = values.get(&name).and_then(numeric) {
                registry.on_value(id, value);
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Polls until cancelled. Read errors are logged and retried on the next
    /// interval.
    pub async fn run(self: Arc<Self>, registry: Arc<VariableRegistry>, cancel: CancellationToken) {
        info!(
            target: "cdu_bridge::feed",
            path = %self.path.display(),
            interval_ms = self.interval.as_millis() as u64,
            "telemetry feed started"
        );
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut failing = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.poll_once(&registry).await {
                Ok(delivered) => {
                    if failing {
                        info!(target: "cdu_bridge::feed", path = %self.path.display(), "telemetry feed recovered");
                        failing = false;
                    }
                    trace!(target: "cdu_bridge::feed", delivered, "values delivered");
                }
                Err(err) if !failing => {
                    warn!(target: "cdu_bridge::feed", error = %err, "telemetry feed unavailable");
                    failing = true;
                }
                Err(err) => {
                    trace!(target: "cdu_bridge::feed", error = %err, "telemetry feed still unavailable");
                }
            }
        }
        debug!(target: "cdu_bridge::feed", "telemetry feed stopped");
    }
}

impl SimLink for FileFeed {
    fn subscribe(&self, id: VariableId, name: &str) -> Result<(), SimLinkError> {
        self.subscriptions.insert(id, name.to_owned());
        Ok(())
    }

    fn send_command(&self, command: &str) -> Result<(), SimLinkError> {
        if command == "MF.SimVars.Clear" {
            self.subscriptions.clear();
            debug!(target: "cdu_bridge::feed", "subscriptions cleared");
        } else {
            debug!(target: "cdu_bridge::feed", command, "command ignored by file feed");
        }
        Ok(())
    }
}

/// Polls a raw display-memory dump and hands each snapshot to a callback.
#[derive(Debug, Clone)]
pub struct BufferFeed {
    path: PathBuf,
    interval: Duration,
}

impl BufferFeed {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn run<F>(self, cancel: CancellationToken, mut on_buffer: F)
    where
        F: FnMut(&[u8]) + Send,
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut failing = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match tokio::fs::read(&self.path).await {
                Ok(raw) => {
                    failing = false;
                    on_buffer(&raw);
                }
                Err(err) if !failing => {
                    warn!(
                        target: "cdu_bridge::feed",
                        path = %self.path.display(),
                        error = %err,
                        "display buffer unavailable"
                    );
                    failing = true;
                }
                Err(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let path = std::env::temp_dir().join(format!(
            "cdu-bridge-feed-{}-{}-{name}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&path, contents).expect("write scratch file");
        path
    }

    #[test]
    fn json_values_become_numbers() {
        assert_eq!(numeric(&serde_json::json!(1.5)), Some(1.5));
        assert_eq!(numeric(&serde_json::json!(true)), Some(1.0));
        assert_eq!(numeric(&serde_json::json!("0.7")), Some(0.7));
        assert_eq!(numeric(&serde_json::json!("on")), Some(1.0));
        assert_eq!(numeric(&serde_json::json!("two")), Some(2.0));
        assert_eq!(numeric(&serde_json::json!(null)), None);
    }

    #[tokio::test]
    async fn delivers_only_subscribed_values() {
        let path = scratch_file(
            "values.json",
            r#"{"(L:brkCDS1)": 1, "(L:landLight)": false, "(L:unused)": 7}"#,
        );
        let feed = Arc::new(FileFeed::new(&path, Duration::from_millis(10)));
        let registry = VariableRegistry::with_first_read_wait(feed.clone(), Duration::ZERO);

        registry.get("(L:brkCDS1)").await;
        registry.get("(L:landLight)").await;
        registry.get("(L:missing)").await;
        assert_eq!(feed.subscription_count(), 3);

        assert_eq!(feed.poll_once(&registry).await.expect("poll"), 2);
        assert_eq!(registry.peek("(L:brkCDS1)"), Some(1.0));
        assert_eq!(registry.peek("(L:landLight)"), Some(0.0));
        assert_eq!(registry.peek("(L:missing)"), None);

        registry.clear_all().expect("clear");
        assert_eq!(feed.subscription_count(), 0);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn malformed_files_are_reported() {
        let path = scratch_file("bad.json", "[1, 2, 3]");
        let feed = Arc::new(FileFeed::new(&path, Duration::from_millis(10)));
        let registry = VariableRegistry::new(feed.clone());
        assert!(matches!(
            feed.poll_once(&registry).await,
            Err(FeedError::NotAnObject { .. })
        ));

        let missing = FileFeed::new(path.with_extension("gone"), Duration::from_millis(10));
        assert!(matches!(
            missing.poll_once(&registry).await,
            Err(FeedError::Read { .. })
        ));
        let _ = std::fs::remove_file(path);
    }
}
