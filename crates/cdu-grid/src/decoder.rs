//! Pixel-mirror path: raw cockpit display memory straight into a grid.
//!
//! The source exposes the display as `CELLS` records of three bytes:
//! symbol code, palette index, flag bits.

use thiserror::Error;
use tracing::warn;

use crate::cell::{Cell, Color, Size};
use crate::frame::Frame;
use crate::grid::{Grid, CELLS, COLUMNS, ROWS};

pub const CELL_BYTES: usize = 3;
pub const BUFFER_LEN: usize = CELLS * CELL_BYTES;

const SMALL_FONT_FLAG: u8 = 0x01;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CellDecodeError {
    #[error("symbol byte {0:#04x} is not ASCII")]
    NonAscii(u8),
    #[error("symbol byte {0:#04x} is a control code")]
    Control(u8),
}

/// How the source lays out its cell records relative to the row-major grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CellOrder {
    #[default]
    RowMajor,
    ColumnMajor,
}

impl CellOrder {
    /// Record index in the source buffer holding grid position `index`.
    pub fn source_index(self, index: usize) -> usize {
        match self {
            CellOrder::RowMajor => index,
            CellOrder::ColumnMajor => {
                let row = index / COLUMNS;
                let col = index % COLUMNS;
                col * ROWS + row
            }
        }
    }
}

/// Symbol codes the cockpit uses for glyphs outside plain ASCII.
fn glyph(code: u8) -> char {
    match code {
        b'a' => '\u{2190}',
        b'b' => '\u{2192}',
        b'e' => '\u{2191}',
        b'f' => '\u{2193}',
        b'o' => '\u{2610}',
        b'd' => '\u{00b0}',
        b'c' => '\u{0394}',
        b'p' => '\u{25a0}',
        other => char::from(other),
    }
}

/// Decodes one record. `Ok(None)` is a blank cell.
pub fn decode_cell(record: [u8; CELL_BYTES]) -> Result<Option<Cell>, CellDecodeError> {
    let [symbol, color, flags] = record;
    match symbol {
        0 | b' ' => return Ok(None),
        0x80..=0xff => return Err(CellDecodeError::NonAscii(symbol)),
        0x01..=0x1f | 0x7f => return Err(CellDecodeError::Control(symbol)),
        _ => {}
    }
    let size = if flags & SMALL_FONT_FLAG != 0 {
        Size::Small
    } else {
        Size::Large
    };
    Ok(Some(Cell::new(glyph(symbol), Color::from_index(color), size)))
}

/// Decodes a whole buffer. Records missing from a short buffer and records
/// that fail to decode are left unset; one bad record never drops the frame.
pub fn decode(raw: &[u8], order: CellOrder) -> Grid {
    let mut cells = vec![None; CELLS];
    for (index, slot) in cells.iter_mut().enumerate() {
        let offset = order.source_index(index) * CELL_BYTES;
        let Some(bytes) = raw.get(offset..offset + CELL_BYTES) else {
            continue;
        };
        let record = [bytes[0], bytes[1], bytes[2]];
        match decode_cell(record) {
            Ok(cell) => *slot = cell,
            Err(err) => {
                warn!(
                    target: "cdu_grid::decoder",
                    index,
                    error = %err,
                    "skipping undecodable cell"
                );
            }
        }
    }
    Grid::from_cells(cells).unwrap_or_default()
}

/// Packs 32-bit little-endian telemetry words into the raw byte buffer.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

/// Holds the last raw buffer so unchanged snapshots produce no frame.
#[derive(Debug, Default)]
pub struct MirrorDecoder {
    order: CellOrder,
    previous: Option<Vec<u8>>,
}

impl MirrorDecoder {
    pub fn new(order: CellOrder) -> Self {
        Self {
            order,
            previous: None,
        }
    }

    /// `None` when `raw` is byte-identical to the previous call.
    pub fn decode_if_changed(&mut self, raw: &[u8]) -> Option<Frame> {
        if self.previous.as_deref() == Some(raw) {
            return None;
        }
        self.previous = Some(raw.to_vec());
        Some(Frame::from_grid(decode(raw, self.order)))
    }

    /// Forgets the previous buffer so the next one is always emitted.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(records: &[(usize, [u8; 3])]) -> Vec<u8> {
        let mut raw = vec![0u8; BUFFER_LEN];
        for (index, record) in records {
            raw[index * CELL_BYTES..(index + 1) * CELL_BYTES].copy_from_slice(record);
        }
        raw
    }

    #[test]
    fn blank_buffer_decodes_to_nothing() {
        let grid = decode(&vec![0u8; BUFFER_LEN], CellOrder::RowMajor);
        assert!(grid.cells().iter().all(Option::is_none));

        let spaces: Vec<u8> = (0..CELLS).flat_map(|_| [b' ', 2, 0]).collect();
        let grid = decode(&spaces, CellOrder::RowMajor);
        assert!(grid.cells().iter().all(Option::is_none));
    }

    #[test]
    fn known_record_lands_at_its_cell() {
        let raw = buffer_with(&[(30, [b'Q', 3, 0x01])]);
        let grid = decode(&raw, CellOrder::RowMajor);
        assert_eq!(
            grid.get(1, 6),
            Some(&Cell::new('Q', Color::Green, Size::Small))
        );
        assert_eq!(grid.cells().iter().filter(|c| c.is_some()).count(), 1);
    }

    #[test]
    fn column_major_sources_are_transposed() {
        // record 15 in a column-major source is column 1, row 1
        let raw = buffer_with(&[(15, [b'Z', 0, 0])]);
        let grid = decode(&raw, CellOrder::ColumnMajor);
        assert_eq!(grid.get(1, 1).map(|c| c.symbol), Some('Z'));
        assert_eq!(CellOrder::ColumnMajor.source_index(COLUMNS + 1), 15);
    }

    #[test]
    fn glyph_codes_and_palette_fallback() {
        let raw = buffer_with(&[(0, [b'd', 9, 0]), (1, [b'p', 5, 0]), (2, [b'A', 7, 0x02])]);
        let grid = decode(&raw, CellOrder::RowMajor);
        assert_eq!(grid.get(0, 0), Some(&Cell::new('°', Color::White, Size::Large)));
        assert_eq!(grid.get(0, 1), Some(&Cell::new('■', Color::Red, Size::Large)));
        assert_eq!(grid.get(0, 2), Some(&Cell::new('A', Color::Magenta, Size::Large)));
    }

    #[test]
    fn bad_record_is_isolated() {
        let raw = buffer_with(&[(0, [0xC8, 0, 0]), (1, [0x07, 0, 0]), (2, [b'K', 1, 0])]);
        let grid = decode(&raw, CellOrder::RowMajor);
        assert!(grid.get(0, 0).is_none());
        assert!(grid.get(0, 1).is_none());
        assert_eq!(grid.get(0, 2).map(|c| c.symbol), Some('K'));
    }

    #[test]
    fn short_buffer_leaves_tail_empty() {
        let mut raw = buffer_with(&[(0, [b'A', 0, 0]), (CELLS - 1, [b'B', 0, 0])]);
        raw.truncate(BUFFER_LEN - 1);
        let grid = decode(&raw, CellOrder::RowMajor);
        assert_eq!(grid.get(0, 0).map(|c| c.symbol), Some('A'));
        assert!(grid.get(ROWS - 1, COLUMNS - 1).is_none());
    }

    #[test]
    fn identical_buffers_are_suppressed() {
        let mut decoder = MirrorDecoder::default();
        let raw = buffer_with(&[(5, [b'X', 0, 0])]);
        assert!(decoder.decode_if_changed(&raw).is_some());
        assert!(decoder.decode_if_changed(&raw).is_none());

        let changed = buffer_with(&[(5, [b'Y', 0, 0])]);
        assert!(decoder.decode_if_changed(&changed).is_some());

        decoder.reset();
        assert!(decoder.decode_if_changed(&changed).is_some());
    }

    #[test]
    fn words_pack_little_endian() {
        assert_eq!(words_to_bytes(&[0x0300_0041]), vec![0x41, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn decode_records_directly() {
        assert_eq!(decode_cell([b' ', 1, 1]), Ok(None));
        assert_eq!(decode_cell([0x90, 0, 0]), Err(CellDecodeError::NonAscii(0x90)));
        assert_eq!(decode_cell([0x7f, 0, 0]), Err(CellDecodeError::Control(0x7f)));
    }
}
