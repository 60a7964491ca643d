use serde::ser::{SerializeSeq, SerializeStruct, Serializer};
use serde::Serialize;
use thiserror::Error;

use crate::cell::Cell;
use crate::grid::Grid;

/// Font codename selected on the display right after every connect.
pub const DEFAULT_FONT: &str = "AirbusThales";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One message for the display host, addressed either to the font selector or
/// to the character display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Font(String),
    Display(Grid),
}

impl Frame {
    pub fn font(name: impl Into<String>) -> Self {
        Frame::Font(name.into())
    }

    pub fn from_grid(grid: Grid) -> Self {
        Frame::Display(grid)
    }

    pub fn target(&self) -> &'static str {
        match self {
            Frame::Font(_) => "Font",
            Frame::Display(_) => "Display",
        }
    }

    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<Grid> for Frame {
    fn from(grid: Grid) -> Self {
        Frame::Display(grid)
    }
}

impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Frame", 2)?;
        state.serialize_field("Target", self.target())?;
        match self {
            Frame::Font(name) => state.serialize_field("Data", name)?,
            Frame::Display(grid) => state.serialize_field("Data", &WireCells(grid.cells()))?,
        }
        state.end()
    }
}

struct WireCells<'a>(&'a [Option<Cell>]);

impl Serialize for WireCells<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(WireCell))
    }
}

/// `[]` for an unset cell, `[symbol, color, size]` otherwise.
struct WireCell<'a>(&'a Option<Cell>);

impl Serialize for WireCell<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            None => serializer.serialize_seq(Some(0))?.end(),
            Some(cell) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                let mut buf = [0u8; 4];
                let symbol: &str = cell.symbol.encode_utf8(&mut buf);
                seq.serialize_element(symbol)?;
                seq.serialize_element(cell.color.code())?;
                seq.serialize_element(&cell.size.flag())?;
                seq.end()
            }
        }
    }
}
