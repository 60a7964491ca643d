use parking_lot::Mutex;
use tokio::sync::Notify;

/// Single-slot handoff between one producer and one consumer. Posting over an
/// unsent item replaces it, so the consumer only ever sees the latest.
#[derive(Debug, Default)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Stores `item`, returning whatever unsent item it displaced.
    pub fn post(&self, item: T) -> Option<T> {
        let displaced = self.slot.lock().replace(item);
        self.notify.notify_one();
        displaced
    }

    /// Puts back an item that could not be delivered, unless something newer
    /// arrived in the meantime.
    pub fn restore(&self, item: T) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(item);
        drop(slot);
        self.notify.notify_one();
        true
    }

    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Waits for the next item. Cancel-safe: an item is only removed from the
    /// slot when this future completes.
    pub async fn recv(&self) -> T {
        loop {
            if let Some(item) = self.take() {
                return item;
            }
            self.notify.notified().await;
        }
    }
}
