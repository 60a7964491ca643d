//! Annunciator panel: a layout description plus the renderer that turns a set
//! of signal states into one grid.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::{Color, Size};
use crate::grid::{Grid, COLUMNS, ROWS};
use crate::list::{compact, paginate, paint_column, ColumnRegion, PAGE_SIZE};
use crate::state::TriState;

/// Lookup of the current tri-state of a named signal.
pub trait SignalStates {
    fn state(&self, signal: &str) -> TriState;
}

impl SignalStates for HashMap<String, TriState> {
    fn state(&self, signal: &str) -> TriState {
        self.get(signal).copied().unwrap_or_default()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("page size must be greater than zero")]
    ZeroPageSize,
    #[error("region {name} does not fit the 24x14 grid")]
    RegionOutOfBounds { name: &'static str },
    #[error("row {row} of {name} is outside the grid")]
    RowOutOfBounds { name: &'static str, row: usize },
    #[error("status rule {index} has {lines} lines but only {rows} status rows")]
    TooManyStatusLines {
        index: usize,
        lines: usize,
        rows: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleLine {
    pub text: String,
    pub row: usize,
    #[serde(default)]
    pub color: Color,
}

/// A signal paired with the label shown while it is on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lamp {
    pub signal: String,
    pub label: String,
}

/// Text pinned to a fixed position, painted only while its signal is on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub signal: String,
    pub text: String,
    pub row: usize,
    pub col: usize,
    #[serde(default = "default_indicator_color")]
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regions {
    pub left: ColumnRegion,
    pub right: ColumnRegion,
    pub aux_left: ColumnRegion,
    pub aux_right: ColumnRegion,
}

impl Default for Regions {
    fn default() -> Self {
        Self {
            left: ColumnRegion::new(0, 5, 0, 12),
            right: ColumnRegion::new(0, 5, 13, 11),
            aux_left: ColumnRegion::new(7, 9, 0, 11),
            aux_right: ColumnRegion::new(7, 9, 13, 11),
        }
    }
}

/// First matching rule wins. A rule matches when every listed signal is in
/// exactly the listed state; an empty `when` always matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRule {
    #[serde(default)]
    pub when: BTreeMap<String, TriState>,
    /// One entry per status row; an empty string leaves that row untouched.
    #[serde(default)]
    pub lines: Vec<String>,
}

impl StatusRule {
    fn matches(&self, signals: &impl SignalStates) -> bool {
        self.when
            .iter()
            .all(|(signal, expected)| signals.state(signal) == *expected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTable {
    pub rows: Vec<usize>,
    #[serde(default = "default_indicator_color")]
    pub color: Color,
    pub rules: Vec<StatusRule>,
}

impl StatusTable {
    /// Lines selected for the current signal states, paired with their rows.
    pub fn select<'a>(&'a self, signals: &impl SignalStates) -> Vec<(usize, &'a str)> {
        let Some(rule) = self.rules.iter().find(|rule| rule.matches(signals)) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .zip(&rule.lines)
            .filter(|(_, line)| !line.is_empty())
            .map(|(row, line)| (*row, line.as_str()))
            .collect()
    }
}

/// Everything needed to paint one annunciator screen. Loaded from
/// configuration; the renderer holds no cockpit knowledge of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelLayout {
    pub title: TitleLine,
    /// Content is painted only while this signal is on.
    pub gate: String,
    /// Signal whose state (0, 1, 2) selects the visible page.
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_label_color")]
    pub label_color: Color,
    #[serde(default)]
    pub regions: Regions,
    #[serde(default)]
    pub left: Vec<Lamp>,
    #[serde(default)]
    pub right: Vec<Lamp>,
    #[serde(default)]
    pub aux: Vec<Lamp>,
    #[serde(default)]
    pub indicators: Vec<Indicator>,
    #[serde(default)]
    pub status: Option<StatusTable>,
}

fn default_page_size() -> usize {
    PAGE_SIZE
}

fn default_label_color() -> Color {
    Color::Amber
}

fn default_indicator_color() -> Color {
    Color::Green
}

impl PanelLayout {
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.page_size == 0 {
            return Err(LayoutError::ZeroPageSize);
        }
        check_row("title", self.title.row)?;
        for (name, region) in [
            ("left", &self.regions.left),
            ("right", &self.regions.right),
            ("aux_left", &self.regions.aux_left),
            ("aux_right", &self.regions.aux_right),
        ] {
            if region.first_row > region.last_row
                || region.last_row >= ROWS
                || region.col + region.width > COLUMNS
            {
                return Err(LayoutError::RegionOutOfBounds { name });
            }
        }
        for indicator in &self.indicators {
            check_row("indicator", indicator.row)?;
        }
        if let Some(status) = &self.status {
            for row in &status.rows {
                check_row("status", *row)?;
            }
            for (index, rule) in status.rules.iter().enumerate() {
                if rule.lines.len() > status.rows.len() {
                    return Err(LayoutError::TooManyStatusLines {
                        index,
                        lines: rule.lines.len(),
                        rows: status.rows.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Every signal the layout reads, deduplicated, in first-use order.
    pub fn signals(&self) -> Vec<&str> {
        let status_signals = self
            .status
            .iter()
            .flat_map(|table| table.rules.iter())
            .flat_map(|rule| rule.when.keys());
        let names = std::iter::once(&self.gate)
            .chain(self.page.iter())
            .chain(self.left.iter().map(|lamp| &lamp.signal))
            .chain(self.right.iter().map(|lamp| &lamp.signal))
            .chain(self.aux.iter().map(|lamp| &lamp.signal))
            .chain(self.indicators.iter().map(|indicator| &indicator.signal))
            .chain(status_signals);
        let mut seen: Vec<&str> = Vec::new();
        for name in names {
            if !seen.contains(&name.as_str()) {
                seen.push(name.as_str());
            }
        }
        seen
    }

    fn page_index(&self, signals: &impl SignalStates) -> usize {
        self.page
            .as_deref()
            .map(|signal| usize::from(signals.state(signal).as_u8()))
            .unwrap_or(0)
    }
}

fn check_row(name: &'static str, row: usize) -> Result<(), LayoutError> {
    if row >= ROWS {
        return Err(LayoutError::RowOutOfBounds { name, row });
    }
    Ok(())
}

fn lamp_states<'a>(lamps: &'a [Lamp], signals: &impl SignalStates) -> Vec<(TriState, &'a str)> {
    lamps
        .iter()
        .map(|lamp| (signals.state(&lamp.signal), lamp.label.as_str()))
        .collect()
}

fn paint_title(grid: &mut Grid, title: &TitleLine) {
    grid.put_text_centered(&title.text, title.row, title.color, Size::Large);
}

/// Screen shown before the first telemetry tick: blank spaces and the title.
pub fn initial_screen(layout: &PanelLayout) -> Grid {
    let mut grid = Grid::new();
    grid.fill_blank(0..=ROWS - 1, 0..COLUMNS, Color::White, Size::Large);
    paint_title(&mut grid, &layout.title);
    grid
}

/// Renders one frame. The title is always present; everything else depends
/// on the gate signal being on.
pub fn render_panel(layout: &PanelLayout, signals: &impl SignalStates) -> Grid {
    let mut grid = Grid::new();
    paint_title(&mut grid, &layout.title);
    if signals.state(&layout.gate) != TriState::On {
        return grid;
    }

    let page = layout.page_index(signals);
    let regions = &layout.regions;
    let color = layout.label_color;

    let main_first = regions.left.first_row.min(regions.right.first_row);
    let main_last = regions.left.last_row.max(regions.right.last_row);
    grid.fill_blank(main_first..=main_last, 0..COLUMNS, Color::White, Size::Large);

    let left_states = lamp_states(&layout.left, signals);
    let left = compact(&left_states);
    paint_column(
        &mut grid,
        &regions.left,
        paginate(&left, page, layout.page_size),
        color,
        Size::Large,
    );

    let right_states = lamp_states(&layout.right, signals);
    let right = compact(&right_states);
    paint_column(
        &mut grid,
        &regions.right,
        paginate(&right, page, layout.page_size),
        color,
        Size::Large,
    );

    let aux_states = lamp_states(&layout.aux, signals);
    let aux = compact(&aux_states);
    let visible = paginate(&aux, page, layout.page_size);
    let split = regions.aux_left.capacity().min(visible.len());
    let (aux_left, aux_right) = visible.split_at(split);
    paint_column(&mut grid, &regions.aux_left, aux_left, color, Size::Large);
    paint_column(&mut grid, &regions.aux_right, aux_right, color, Size::Large);

    for indicator in &layout.indicators {
        if signals.state(&indicator.signal).is_on() {
            grid.put_text(
                &indicator.text,
                indicator.row,
                indicator.col,
                indicator.color,
                Size::Large,
            );
        }
    }

    if let Some(status) = &layout.status {
        for (row, line) in status.select(signals) {
            grid.put_text_centered(line, row, status.color, Size::Large);
        }
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lamp(signal: &str, label: &str) -> Lamp {
        Lamp {
            signal: signal.into(),
            label: label.into(),
        }
    }

    fn rule(when: &[(&str, TriState)], lines: &[&str]) -> StatusRule {
        StatusRule {
            when: when
                .iter()
                .map(|(signal, state)| (signal.to_string(), *state))
                .collect(),
            lines: lines.iter().map(|line| line.to_string()).collect(),
        }
    }

    fn layout() -> PanelLayout {
        PanelLayout {
            title: TitleLine {
                text: "MISC".into(),
                row: 6,
                color: Color::White,
            },
            gate: "power".into(),
            page: Some("page".into()),
            page_size: PAGE_SIZE,
            label_color: Color::Amber,
            regions: Regions::default(),
            left: (0..8).map(|i| lamp(&format!("l{i}"), &format!("LEFT {i}"))).collect(),
            right: vec![lamp("r0", "A VERY LONG RIGHT LABEL")],
            aux: (0..5).map(|i| lamp(&format!("x{i}"), &format!("AUX {i}"))).collect(),
            indicators: vec![Indicator {
                signal: "heat".into(),
                text: "P/S-HTR-P".into(),
                row: 10,
                col: 0,
                color: Color::Green,
            }],
            status: Some(StatusTable {
                rows: vec![11, 12, 13],
                color: Color::Green,
                rules: vec![
                    rule(&[("ack", TriState::Off)], &["CDS PASSED", "INP PASSED"]),
                    rule(&[("light", TriState::On)], &["LDG L RET", "LDG LIGHT"]),
                    rule(&[], &["LDG L RET"]),
                ],
            }),
        }
    }

    fn states(on: &[&str]) -> HashMap<String, TriState> {
        on.iter().map(|name| (name.to_string(), TriState::On)).collect()
    }

    #[test]
    fn gate_off_leaves_only_the_title() {
        let layout = layout();
        let grid = render_panel(&layout, &states(&["l0", "r0", "x0", "heat", "ack"]));
        let mut expected = Grid::new();
        expected.put_text_centered("MISC", 6, Color::White, Size::Large);
        assert_eq!(grid, expected);
    }

    #[test]
    fn columns_are_compacted_and_fitted() {
        let layout = layout();
        let grid = render_panel(&layout, &states(&["power", "l1", "l3", "r0", "ack"]));
        assert_eq!(&grid.row_text(0)[..12], "LEFT 1      ");
        assert_eq!(&grid.row_text(1)[..12], "LEFT 3      ");
        assert_eq!(&grid.row_text(0)[13..], "A VERY LONG");
        // cleared region: column 12 is a blank space, not unset
        assert_eq!(grid.get(0, 12).map(|c| c.symbol), Some(' '));
        assert_eq!(grid.row_text(5), " ".repeat(24));
        assert_eq!(grid.get(0, 0).map(|c| c.color), Some(Color::Amber));
    }

    #[test]
    fn page_signal_selects_window() {
        let layout = layout();
        let mut signals = states(&["power", "l0", "l1", "l2", "l3", "l4", "l5", "l6", "l7", "ack"]);
        signals.insert("page".into(), TriState::On);
        let grid = render_panel(&layout, &signals);
        assert_eq!(&grid.row_text(0)[..12], "LEFT 6      ");
        assert_eq!(&grid.row_text(1)[..12], "LEFT 7      ");
        assert_eq!(&grid.row_text(2)[..12], " ".repeat(12));
    }

    #[test]
    fn aux_block_splits_into_two_sub_columns() {
        let layout = layout();
        let grid = render_panel(
            &layout,
            &states(&["power", "x0", "x1", "x2", "x3", "x4", "ack"]),
        );
        assert_eq!(&grid.row_text(7)[..11], "AUX 0      ");
        assert_eq!(&grid.row_text(9)[..11], "AUX 2      ");
        assert_eq!(&grid.row_text(7)[13..], "AUX 3      ");
        assert_eq!(&grid.row_text(8)[13..], "AUX 4      ");
        assert!(grid.get(9, 13).is_none());
    }

    #[test]
    fn indicators_and_status_lines() {
        let layout = layout();
        let grid = render_panel(&layout, &states(&["power", "heat"]));
        assert_eq!(&grid.row_text(10)[..9], "P/S-HTR-P");
        // ack is off: acknowledgement lines, row 13 untouched
        assert_eq!(grid.row_text(11).trim_matches('.'), "CDS PASSED");
        assert_eq!(grid.row_text(12).trim_matches('.'), "INP PASSED");
        assert_eq!(grid.row_text(13), ".".repeat(24));

        let grid = render_panel(&layout, &states(&["power", "ack", "light"]));
        assert_eq!(grid.row_text(11).trim_matches('.'), "LDG L RET");
        assert_eq!(grid.row_text(12).trim_matches('.'), "LDG LIGHT");

        let grid = render_panel(&layout, &states(&["power", "ack"]));
        assert_eq!(grid.row_text(11).trim_matches('.'), "LDG L RET");
        assert_eq!(grid.row_text(12), ".".repeat(24));
    }

    #[test]
    fn extended_gate_does_not_render_content() {
        let layout = layout();
        let mut signals = states(&["l0"]);
        signals.insert("power".into(), TriState::Extended);
        assert_eq!(render_panel(&layout, &signals).row_text(0), ".".repeat(24));
    }

    #[test]
    fn initial_screen_is_all_spaces_and_title() {
        let grid = initial_screen(&layout());
        assert!(grid.cells().iter().all(Option::is_some));
        assert_eq!(grid.row_text(6).trim(), "MISC");
    }

    #[test]
    fn signals_are_deduplicated() {
        let layout = layout();
        let signals = layout.signals();
        assert_eq!(signals[0], "power");
        assert_eq!(signals[1], "page");
        assert!(signals.contains(&"ack"));
        assert!(signals.contains(&"heat"));
        assert_eq!(signals.iter().filter(|s| **s == "ack").count(), 1);
    }

    #[test]
    fn validation_rejects_bad_geometry() {
        let mut bad = layout();
        bad.page_size = 0;
        assert_eq!(bad.validate(), Err(LayoutError::ZeroPageSize));

        let mut bad = layout();
        bad.regions.right = ColumnRegion::new(0, 5, 20, 11);
        assert_eq!(
            bad.validate(),
            Err(LayoutError::RegionOutOfBounds { name: "right" })
        );

        assert_eq!(layout().validate(), Ok(()));
    }
}
