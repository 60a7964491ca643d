use serde::{Deserialize, Serialize};

/// The display's eight-entry palette, in device index order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    #[default]
    #[serde(alias = "w")]
    White,
    #[serde(alias = "c")]
    Cyan,
    #[serde(alias = "a")]
    Amber,
    #[serde(alias = "g")]
    Green,
    #[serde(alias = "e")]
    Grey,
    #[serde(alias = "r")]
    Red,
    #[serde(alias = "y")]
    Yellow,
    #[serde(alias = "m")]
    Magenta,
}

impl Color {
    pub const PALETTE: [Color; 8] = [
        Color::White,
        Color::Cyan,
        Color::Amber,
        Color::Green,
        Color::Grey,
        Color::Red,
        Color::Yellow,
        Color::Magenta,
    ];

    /// Palette lookup; unknown indices fall back to white.
    pub fn from_index(index: u8) -> Self {
        Self::PALETTE
            .get(usize::from(index))
            .copied()
            .unwrap_or(Color::White)
    }

    /// Single-letter code used on the wire.
    pub fn code(self) -> &'static str {
        match self {
            Color::White => "w",
            Color::Cyan => "c",
            Color::Amber => "a",
            Color::Green => "g",
            Color::Grey => "e",
            Color::Red => "r",
            Color::Yellow => "y",
            Color::Magenta => "m",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Size {
    #[default]
    Large,
    Small,
}

impl Size {
    pub fn flag(self) -> u8 {
        match self {
            Size::Large => 0,
            Size::Small => 1,
        }
    }
}

/// One painted character position. An unset position is `None` at the grid
/// level, which the display treats differently from a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub symbol: char,
    pub color: Color,
    pub size: Size,
}

impl Cell {
    pub fn new(symbol: char, color: Color, size: Size) -> Self {
        Self {
            symbol,
            color,
            size,
        }
    }

    pub fn blank(color: Color, size: Size) -> Self {
        Self::new(' ', color, size)
    }
}
