use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Observable lifecycle of one display link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Backoff,
    GivenUp,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Backoff => "backoff",
            ConnectionState::GivenUp => "given_up",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of waiting for a link to become usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Connected,
    GaveUp,
    Closed,
}

/// Point-in-time copy of a link's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub connect_attempts: u64,
    pub connections: u64,
    pub frames_sent: u64,
    pub frames_coalesced: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    connect_attempts: AtomicU64,
    connections: AtomicU64,
    frames_sent: AtomicU64,
    frames_coalesced: AtomicU64,
}

impl Counters {
    pub(crate) fn attempt(&self) -> u64 {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn connected(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn coalesced(&self) {
        self.frames_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LinkStats {
        LinkStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_coalesced: self.frames_coalesced.load(Ordering::Relaxed),
        }
    }
}
