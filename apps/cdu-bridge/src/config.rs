use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cdu_grid::panel::LayoutError;
use cdu_grid::PanelLayout;
use thiserror::Error;

/// Layout used when no `--layout` file is given.
pub const DEFAULT_LAYOUT: &str = include_str!("../layouts/ec135_misc.toml");

pub const DEFAULT_CAPTAIN_URL: &str = "ws://127.0.0.1:8320/winwing/cdu-captain";
pub const DEFAULT_FIRST_OFFICER_URL: &str = "ws://127.0.0.1:8320/winwing/cdu-co-pilot";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read layout {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse layout {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("layout {origin} is invalid: {source}")]
    Layout {
        origin: String,
        #[source]
        source: LayoutError,
    },
    #[error("no display buffers given; pass --captain-buffer and/or --fo-buffer")]
    NoDevices,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub captain_url: String,
    pub first_officer_url: String,
    pub tick: Duration,
    pub max_retries: u32,
    pub first_read_wait: Duration,
    pub feed_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            captain_url: env::var("CDU_CAPTAIN_URL")
                .unwrap_or_else(|_| DEFAULT_CAPTAIN_URL.to_string()),
            first_officer_url: env::var("CDU_FO_URL")
                .unwrap_or_else(|_| DEFAULT_FIRST_OFFICER_URL.to_string()),
            tick: env_millis("CDU_TICK_MS").unwrap_or(Duration::from_millis(100)),
            max_retries: env::var("CDU_MAX_RETRIES")
                .ok()
                .and_then(|val| val.parse().ok())
                .unwrap_or(3),
            first_read_wait: env_millis("CDU_FIRST_READ_WAIT_MS")
                .unwrap_or(Duration::from_millis(500)),
            feed_interval: env_millis("CDU_FEED_INTERVAL_MS").unwrap_or(Duration::from_millis(50)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            captain_url: DEFAULT_CAPTAIN_URL.to_string(),
            first_officer_url: DEFAULT_FIRST_OFFICER_URL.to_string(),
            tick: Duration::from_millis(100),
            max_retries: 3,
            first_read_wait: Duration::from_millis(500),
            feed_interval: Duration::from_millis(50),
        }
    }
}

fn env_millis(var: &str) -> Option<Duration> {
    env::var(var)
        .ok()
        .and_then(|val| val.trim().parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
}

/// Parses and validates a layout document. `origin` names it in errors.
pub fn parse_layout(text: &str, origin: &str) -> Result<PanelLayout, ConfigError> {
    let layout: PanelLayout = toml::from_str(text).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    layout.validate().map_err(|source| ConfigError::Layout {
        origin: origin.to_string(),
        source,
    })?;
    Ok(layout)
}

/// Loads the layout at `path`, or the built-in one.
pub fn load_layout(path: Option<&Path>) -> Result<PanelLayout, ConfigError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            parse_layout(&text, &path.display().to_string())
        }
        None => parse_layout(DEFAULT_LAYOUT, "<built-in>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdu_grid::{render_panel, Color, TriState};
    use std::collections::HashMap;

    fn states(pairs: &[(&str, TriState)]) -> HashMap<String, TriState> {
        pairs
            .iter()
            .map(|(name, state)| (name.to_string(), *state))
            .collect()
    }

    #[test]
    fn built_in_layout_is_valid() {
        let layout = load_layout(None).expect("built-in layout");
        assert_eq!(layout.left.len(), 20);
        assert_eq!(layout.right.len(), 20);
        assert_eq!(layout.aux.len(), 8);
        assert_eq!(layout.title.color, Color::White);
        assert_eq!(layout.gate, "(L:brkCDS1)");
        assert!(layout.signals().contains(&"(L:cdsSelfTestAcknoledge)"));
    }

    #[test]
    fn built_in_status_table_follows_cockpit_logic() {
        let layout = load_layout(None).expect("built-in layout");
        let on = TriState::On;
        let rows = |signals: &HashMap<String, TriState>| {
            let grid = render_panel(&layout, signals);
            (11..=13)
                .map(|row| grid.row_text(row).trim_matches('.').trim().to_string())
                .collect::<Vec<_>>()
        };

        let base = [("(L:brkCDS1)", on)];
        assert_eq!(rows(&states(&base)), ["CDS PASSED", "INP PASSED", ""]);

        let acked = [("(L:brkCDS1)", on), ("(L:cdsSelfTestAcknoledge)", on)];
        assert_eq!(rows(&states(&acked)), ["LDG L RET", "", ""]);

        let mut all = acked.to_vec();
        all.extend([("(L:landLightExtr)", on), ("(L:landLight)", on), ("(L:airCond)", on)]);
        assert_eq!(rows(&states(&all)), ["LDG L EXT", "LDG LIGHT", "AIR COND"]);

        let mut air_only = acked.to_vec();
        air_only.push(("(L:airCond)", on));
        assert_eq!(rows(&states(&air_only)), ["LDG L RET", "AIR COND", ""]);
    }

    #[test]
    fn bad_layouts_are_rejected() {
        assert!(matches!(
            parse_layout("gate = ", "inline"),
            Err(ConfigError::Parse { .. })
        ));
        let zero_page = "gate = \"g\"\npage_size = 0\n[title]\ntext = \"T\"\nrow = 0\n";
        assert!(matches!(
            parse_layout(zero_page, "inline"),
            Err(ConfigError::Layout { .. })
        ));
        assert!(matches!(
            load_layout(Some(Path::new("/nonexistent/layout.toml"))),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn defaults_match_the_cockpit_setup() {
        let config = Config::default();
        assert_eq!(config.tick, Duration::from_millis(100));
        assert_eq!(config.max_retries, 3);
        assert!(config.first_officer_url.ends_with("cdu-co-pilot"));
    }
}
