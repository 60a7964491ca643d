//! Named telemetry variables backed by an external simulator link.
//!
//! Values arrive asynchronously from the link's own context and are stored in
//! per-variable atomic slots, so the render tick reads them without locking.
//! Only the first read of a new variable waits, and only for a bounded time.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// Longest command the simulator side accepts, in bytes.
pub const COMMAND_LEN: usize = 256;
pub const DEFAULT_FIRST_READ_WAIT: Duration = Duration::from_millis(500);

const COMMAND_PREFIX_ADD: &str = "MF.SimVars.Add.";
const COMMAND_PREFIX_SET: &str = "MF.SimVars.Set.";
const COMMAND_CLEAR: &str = "MF.SimVars.Clear";

/// Handle assigned by the registry to a variable on first request. 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub u32);

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
#[error("telemetry link error: {0}")]
pub struct SimLinkError(pub String);

/// The simulator side of the bridge. Implementations deliver values back
/// through [`VariableRegistry::on_value`] or [`VariableRegistry::on_raw`].
pub trait SimLink: Send + Sync + 'static {
    /// Starts delivering values for `name` under `id`.
    fn subscribe(&self, id: VariableId, name: &str) -> Result<(), SimLinkError>;

    /// Sends an already validated command string.
    fn send_command(&self, command: &str) -> Result<(), SimLinkError>;
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command is {len} bytes; the limit is {COMMAND_LEN}")]
    TooLong { len: usize },
    #[error("command contains non-ASCII characters")]
    NonAscii,
    #[error(transparent)]
    Link(#[from] SimLinkError),
}

#[derive(Debug)]
struct Slot {
    id: VariableId,
    name: String,
    bits: AtomicU64,
    initialized: AtomicBool,
    arrived: Notify,
}

impl Slot {
    fn new(id: VariableId, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            bits: AtomicU64::new(f64::NAN.to_bits()),
            initialized: AtomicBool::new(false),
            arrived: Notify::new(),
        }
    }

    fn value(&self) -> Option<f64> {
        let value = f64::from_bits(self.bits.load(Ordering::Acquire));
        (!value.is_nan()).then_some(value)
    }

    fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
        if !self.initialized.swap(true, Ordering::AcqRel) {
            self.arrived.notify_waiters();
        }
    }

    async fn wait_initialized(&self) {
        let arrived = self.arrived.notified();
        tokio::pin!(arrived);
        arrived.as_mut().enable();
        if self.initialized.load(Ordering::Acquire) {
            return;
        }
        arrived.await;
    }
}

/// Explicit owner of every requested variable. Callers refer to variables by
/// name; ids only travel between the registry and its link.
pub struct VariableRegistry {
    link: Arc<dyn SimLink>,
    by_name: DashMap<String, Arc<Slot>>,
    by_id: DashMap<VariableId, Arc<Slot>>,
    next_id: AtomicU32,
    // Serializes id assignment against clear_all.
    lifecycle: Mutex<()>,
    first_read_wait: Duration,
}

impl VariableRegistry {
    pub fn new(link: Arc<dyn SimLink>) -> Self {
        Self::with_first_read_wait(link, DEFAULT_FIRST_READ_WAIT)
    }

    pub fn with_first_read_wait(link: Arc<dyn SimLink>, first_read_wait: Duration) -> Self {
        Self {
            link,
            by_name: DashMap::new(),
            by_id: DashMap::new(),
            next_id: AtomicU32::new(1),
            lifecycle: Mutex::new(()),
            first_read_wait,
        }
    }

    /// Latest value of `name`. The first request registers the variable with
    /// the link and waits up to the first-read window for a value; later
    /// requests return immediately.
    pub async fn get(&self, name: &str) -> Option<f64> {
        let (slot, created) = self.slot_for(name);
        if created {
            self.register(&slot);
            if tokio::time::timeout(self.first_read_wait, slot.wait_initialized())
                .await
                .is_err()
            {
                debug!(
                    target: "cdu_bridge::registry",
                    variable = %slot.name,
                    id = %slot.id,
                    "no value within first-read window"
                );
            }
        }
        slot.value()
    }

    /// Latest value without registering or waiting.
    pub fn peek(&self, name: &str) -> Option<f64> {
        self.by_name.get(name).and_then(|slot| slot.value().value())
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.by_name
            .get(name)
            .map(|slot| slot.initialized.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Fire-and-forget write, e.g. `"1 (>L:landLight)"`.
    pub fn set(&self, expression: &str) -> Result<(), CommandError> {
        let command = format!("{COMMAND_PREFIX_SET}{expression}");
        self.send(&command)
    }

    /// Forgets every variable and tells the link to drop its subscriptions.
    /// Ids restart at 1 afterwards.
    pub fn clear_all(&self) -> Result<(), CommandError> {
        {
            let _guard = self.lifecycle.lock();
            self.by_name.clear();
            self.by_id.clear();
            self.next_id.store(1, Ordering::Release);
        }
        self.send(COMMAND_CLEAR)
    }

    /// Called from the link's context when a decoded value arrives.
    pub fn on_value(&self, id: VariableId, value: f64) {
        match self.by_id.get(&id) {
            Some(slot) => {
                trace!(target: "cdu_bridge::registry", id = %id, value, "value update");
                slot.store(value);
            }
            None => {
                trace!(target: "cdu_bridge::registry", id = %id, "update for unknown variable");
            }
        }
    }

    /// Called from the link's context with a raw 32-bit word carrying an
    /// `f32`. Values are rounded to 5 decimal places.
    pub fn on_raw(&self, id: VariableId, word: u32) {
        let value = f64::from(f32::from_bits(word));
        self.on_value(id, (value * 1e5).round() / 1e5);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn id_of(&self, name: &str) -> Option<VariableId> {
        self.by_name.get(name).map(|slot| slot.id)
    }

    fn slot_for(&self, name: &str) -> (Arc<Slot>, bool) {
        if let Some(slot) = self.by_name.get(name) {
            return (Arc::clone(&slot), false);
        }
        let _guard = self.lifecycle.lock();
        let mut created = false;
        let slot = self
            .by_name
            .entry(name.to_owned())
            .or_insert_with(|| {
                created = true;
                let id = VariableId(self.next_id.fetch_add(1, Ordering::AcqRel));
                Arc::new(Slot::new(id, name))
            })
            .clone();
        if created {
            self.by_id.insert(slot.id, Arc::clone(&slot));
        }
        (slot, created)
    }

    fn register(&self, slot: &Slot) {
        debug!(
            target: "cdu_bridge::registry",
            variable = %slot.name,
            id = %slot.id,
            "registering variable"
        );
        if let Err(err) = self.link.subscribe(slot.id, &slot.name) {
            warn!(
                target: "cdu_bridge::registry",
                variable = %slot.name,
                error = %err,
                "subscribe failed"
            );
            return;
        }
        let command = format!("{COMMAND_PREFIX_ADD}{}", slot.name);
        if let Err(err) = self.send(&command) {
            warn!(
                target: "cdu_bridge::registry",
                variable = %slot.name,
                error = %err,
                "add command failed"
            );
        }
    }

    fn send(&self, command: &str) -> Result<(), CommandError> {
        let result = validate_command(command).and_then(|()| Ok(self.link.send_command(command)?));
        if let Err(err) = &result {
            warn!(target: "cdu_bridge::registry", command, error = %err, "command not sent");
        }
        result
    }
}

impl fmt::Debug for VariableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableRegistry")
            .field("variables", &self.by_name.len())
            .field("first_read_wait", &self.first_read_wait)
            .finish()
    }
}

fn validate_command(command: &str) -> Result<(), CommandError> {
    if !command.is_ascii() {
        return Err(CommandError::NonAscii);
    }
    if command.len() > COMMAND_LEN {
        return Err(CommandError::TooLong { len: command.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingLink {
        subscriptions: Mutex<Vec<(VariableId, String)>>,
        commands: Mutex<Vec<String>>,
    }

    impl SimLink for RecordingLink {
        fn subscribe(&self, id: VariableId, name: &str) -> Result<(), SimLinkError> {
            self.subscriptions.lock().push((id, name.to_owned()));
            Ok(())
        }

        fn send_command(&self, command: &str) -> Result<(), SimLinkError> {
            self.commands.lock().push(command.to_owned());
            Ok(())
        }
    }

    fn registry(wait: Duration) -> (Arc<RecordingLink>, Arc<VariableRegistry>) {
        let link = Arc::new(RecordingLink::default());
        let registry = Arc::new(VariableRegistry::with_first_read_wait(link.clone(), wait));
        (link, registry)
    }

    #[tokio::test(start_paused = true)]
    async fn first_read_is_bounded_and_defaults_to_none() {
        let (link, registry) = registry(Duration::from_millis(500));
        let started = tokio::time::Instant::now();
        assert_eq!(registry.get("(L:brkCDS1)").await, None);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(
            link.subscriptions.lock().as_slice(),
            &[(VariableId(1), "(L:brkCDS1)".to_owned())]
        );
        assert_eq!(link.commands.lock().as_slice(), &["MF.SimVars.Add.(L:brkCDS1)"]);

        // second read does not wait again
        let started = tokio::time::Instant::now();
        assert_eq!(registry.get("(L:brkCDS1)").await, None);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn first_read_returns_as_soon_as_value_arrives() {
        let (_link, registry) = registry(Duration::from_secs(30));
        let producer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                while registry.id_of("(L:landLight)").is_none() {
                    tokio::task::yield_now().await;
                }
                registry.on_value(VariableId(1), 1.0);
            })
        };
        let value = tokio::time::timeout(Duration::from_secs(5), registry.get("(L:landLight)"))
            .await
            .expect("first read should not use the full window");
        assert_eq!(value, Some(1.0));
        producer.await.expect("producer");
    }

    #[tokio::test]
    async fn ids_are_one_based_and_restart_after_clear() {
        let (link, registry) = registry(Duration::ZERO);
        registry.get("a").await;
        registry.get("b").await;
        assert_eq!(registry.id_of("b"), Some(VariableId(2)));
        assert_eq!(registry.len(), 2);

        registry.clear_all().expect("clear");
        assert!(registry.is_empty());
        assert_eq!(link.commands.lock().last().map(String::as_str), Some("MF.SimVars.Clear"));

        registry.get("c").await;
        assert_eq!(registry.id_of("c"), Some(VariableId(1)));
    }

    #[tokio::test]
    async fn raw_words_are_rounded_f32() {
        let (_link, registry) = registry(Duration::ZERO);
        registry.get("x").await;
        registry.on_raw(VariableId(1), 0.1f32.to_bits());
        assert_eq!(registry.peek("x"), Some(0.1));
        assert!(registry.is_initialized("x"));
        // updates for ids nobody asked for are ignored
        registry.on_value(VariableId(42), 3.0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn commands_are_limited_to_ascii_and_length() {
        let (link, registry) = registry(Duration::ZERO);
        registry.set("1 (>L:landLight)").expect("set");
        assert_eq!(link.commands.lock().as_slice(), &["MF.SimVars.Set.1 (>L:landLight)"]);

        let long = "9".repeat(COMMAND_LEN);
        assert!(matches!(registry.set(&long), Err(CommandError::TooLong { .. })));
        assert!(matches!(registry.set("1 (>L:café)"), Err(CommandError::NonAscii)));
        assert_eq!(link.commands.lock().len(), 1);
    }
}
