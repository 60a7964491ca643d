//! Compacted, paginated label columns.

use serde::{Deserialize, Serialize};

use crate::cell::{Color, Size};
use crate::grid::Grid;
use crate::state::TriState;

pub const PAGE_SIZE: usize = 6;

/// Keeps the labels whose state is exactly `On`, in priority order.
/// `Extended` is not a lamp state for compaction purposes and is dropped.
pub fn compact<'a, L: AsRef<str>>(pairs: &'a [(TriState, L)]) -> Vec<&'a str> {
    pairs
        .iter()
        .filter(|(state, _)| *state == TriState::On)
        .map(|(_, label)| label.as_ref())
        .collect()
}

/// Window `page` (zero-based) of `page_size` labels. Past the end is empty.
pub fn paginate<T>(labels: &[T], page: usize, page_size: usize) -> &[T] {
    let start = page.saturating_mul(page_size);
    if start >= labels.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(labels.len());
    &labels[start..end]
}

/// A vertical strip of fixed-width labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRegion {
    pub first_row: usize,
    pub last_row: usize,
    pub col: usize,
    pub width: usize,
}

impl ColumnRegion {
    pub const fn new(first_row: usize, last_row: usize, col: usize, width: usize) -> Self {
        Self {
            first_row,
            last_row,
            col,
            width,
        }
    }

    pub fn capacity(&self) -> usize {
        (self.last_row + 1).saturating_sub(self.first_row)
    }
}

/// Paints one label per row top-down; labels past `last_row` are dropped.
pub fn paint_column<L: AsRef<str>>(
    grid: &mut Grid,
    region: &ColumnRegion,
    labels: &[L],
    color: Color,
    size: Size,
) {
    for (row, label) in (region.first_row..=region.last_row).zip(labels) {
        grid.put_text(&fit(label.as_ref(), region.width), row, region.col, color, size);
    }
}

/// Truncates or right-pads with spaces to exactly `width` characters.
pub fn fit(label: &str, width: usize) -> String {
    let mut out: String = label.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}
