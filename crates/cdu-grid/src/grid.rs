use std::ops::{Range, RangeInclusive};

use crate::cell::{Cell, Color, Size};

pub const COLUMNS: usize = 24;
pub const ROWS: usize = 14;
pub const CELLS: usize = COLUMNS * ROWS;

/// Fixed 24×14 character matrix, row-major. Built fresh for every frame.
///
/// # Examples
///
/// ```
/// # use cdu_grid::{Color, Grid, Size};
/// let mut grid = Grid::new();
/// grid.put_text_centered("MISC", 6, Color::White, Size::Large);
/// assert_eq!(grid.get(6, 10).map(|cell| cell.symbol), Some('M'));
/// assert!(grid.get(6, 9).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: Vec<Option<Cell>>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: vec![None; CELLS],
        }
    }

    /// Wraps an already row-major cell list. Returns `None` unless it holds
    /// exactly [`CELLS`] entries.
    pub fn from_cells(cells: Vec<Option<Cell>>) -> Option<Self> {
        (cells.len() == CELLS).then_some(Self { cells })
    }

    #[inline]
    fn index(row: usize, col: usize) -> Option<usize> {
        (row < ROWS && col < COLUMNS).then(|| row * COLUMNS + col)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        Self::index(row, col).and_then(|idx| self.cells[idx].as_ref())
    }

    /// Writes one cell; coordinates outside the grid are ignored.
    pub fn set(&mut self, row: usize, col: usize, cell: Option<Cell>) {
        if let Some(idx) = Self::index(row, col) {
            self.cells[idx] = cell;
        }
    }

    /// Paints `text` starting at (`row`, `col`). Characters that fall past the
    /// right edge are clipped and an out-of-range row paints nothing.
    pub fn put_text(&mut self, text: &str, row: usize, col: usize, color: Color, size: Size) {
        if row >= ROWS {
            return;
        }
        for (offset, ch) in text.chars().enumerate() {
            let Some(idx) = Self::index(row, col + offset) else {
                break;
            };
            self.cells[idx] = Some(Cell::new(substitute(ch), color, size));
        }
    }

    /// Centers a single line; text wider than the grid is truncated first.
    pub fn put_text_centered(&mut self, text: &str, row: usize, color: Color, size: Size) {
        let truncated: String = text.chars().take(COLUMNS).collect();
        let col = (COLUMNS - truncated.chars().count()) / 2;
        self.put_text(&truncated, row, col, color, size);
    }

    /// Fills a rectangle with blank-space cells so stale text cannot survive.
    pub fn fill_blank(
        &mut self,
        rows: RangeInclusive<usize>,
        cols: Range<usize>,
        color: Color,
        size: Size,
    ) {
        for row in rows {
            for col in cols.clone() {
                self.set(row, col, Some(Cell::blank(color, size)));
            }
        }
    }

    pub fn cells(&self) -> &[Option<Cell>] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Option<Cell>> {
        self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<Cell>]> {
        self.cells.chunks(COLUMNS)
    }

    /// Row contents as a plain string, unset cells rendered as `.`.
    pub fn row_text(&self, row: usize) -> String {
        self.rows()
            .nth(row)
            .map(|cells| {
                cells
                    .iter()
                    .map(|cell| cell.map(|c| c.symbol).unwrap_or('.'))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Characters the display font draws under a different code point.
fn substitute(ch: char) -> char {
    match ch {
        '_' => '\u{2610}',
        '&' => '\u{0394}',
        '{' => '\u{2190}',
        '}' => '\u{2192}',
        '|' => '/',
        '\u{a0}' => ' ',
        other => other,
    }
}
