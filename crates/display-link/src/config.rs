use std::time::Duration;

use cdu_grid::DEFAULT_FONT;

/// Connection policy for one display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub url: String,
    /// Name used in log lines, e.g. the crew position.
    pub label: String,
    /// Font codename sent once after every connect.
    pub font: String,
    pub connect_timeout: Duration,
    pub retry_delay: Duration,
    /// `None` retries forever; `Some(n)` gives up after `n` consecutive failures.
    pub max_retries: Option<u32>,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    /// Pause after the font directive before the display accepts content.
    pub font_settle: Duration,
    /// Re-send the last delivered frame after a reconnect when nothing newer
    /// is waiting.
    pub replay_last_frame: bool,
}

impl LinkConfig {
    /// Annunciator displays may be unplugged and replugged during a long
    /// session, so this profile never gives up.
    pub fn annunciator(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: "display".into(),
            font: DEFAULT_FONT.into(),
            connect_timeout: Duration::from_secs(2),
            retry_delay: Duration::from_millis(500),
            max_retries: None,
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(10),
            font_settle: Duration::ZERO,
            replay_last_frame: false,
        }
    }

    /// Mirrored displays only emit frames on change, so the last frame is
    /// replayed after a reconnect. A missing device is given up on quickly.
    pub fn mirror(url: impl Into<String>) -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            max_retries: Some(3),
            font_settle: Duration::from_secs(1),
            replay_last_frame: true,
            ..Self::annunciator(url)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = font.into();
        self
    }

    pub fn with_retry(mut self, delay: Duration, max_retries: Option<u32>) -> Self {
        self.retry_delay = delay;
        self.max_retries = max_retries;
        self
    }

    pub fn with_keepalive(mut self, ping_interval: Duration, pong_timeout: Duration) -> Self {
        self.ping_interval = ping_interval;
        self.pong_timeout = pong_timeout;
        self
    }

    pub fn with_font_settle(mut self, settle: Duration) -> Self {
        self.font_settle = settle;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
