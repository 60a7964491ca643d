//! CDU grid: everything between a telemetry value and a display frame.
//!
//! Responsibilities:
//! - normalizing raw signal values into tri-state lamps
//! - the fixed 24×14 character grid and its text placement helpers
//! - compacted/paginated annunciator lists painted from a panel layout
//! - decoding raw pixel-mirror buffers cell-for-cell
//! - the JSON wire shape understood by the display host

pub mod cell;
pub mod decoder;
pub mod frame;
pub mod grid;
pub mod list;
pub mod panel;
pub mod state;

pub use cell::{Cell, Color, Size};
pub use decoder::{decode, CellOrder, MirrorDecoder};
pub use frame::{Frame, FrameError, DEFAULT_FONT};
pub use grid::{Grid, COLUMNS, ROWS};
pub use panel::{initial_screen, render_panel, PanelLayout, SignalStates};
pub use state::{normalize, RawValue, TriState};
