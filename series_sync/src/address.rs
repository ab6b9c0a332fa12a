//! Typed spreadsheet coordinates.
//!
//! Rows and columns are 1-based, matching spreadsheet conventions. Only the
//! store adapters turn these into A1 strings (`"C8"`, `"C8:C10"`); the sync
//! and analytics code passes the typed values around.

use std::fmt;

/// One cell, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// Row number (1 = first row).
    pub row: u32,
    /// Column number (1 = column `A`).
    pub col: u32,
}

impl CellAddress {
    /// Build an address from 1-based coordinates.
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

/// Rectangular block between two corners, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeAddress {
    /// Top-left corner.
    pub start: CellAddress,
    /// Bottom-right corner.
    pub end: CellAddress,
}

impl RangeAddress {
    /// Build a range from two corners, swapping coordinates as needed so that
    /// `start` is always top-left.
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellAddress::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// `len` consecutive cells of one column starting at `first_row`.
    ///
    /// `len` of zero is treated as one so the range is never inverted.
    pub fn column_span(col: u32, first_row: u32, len: u32) -> Self {
        let last_row = first_row + len.max(1) - 1;
        Self::new(
            CellAddress::new(first_row, col),
            CellAddress::new(last_row, col),
        )
    }

    /// Number of rows covered.
    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Number of columns covered.
    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Spreadsheet column letters for a 1-based index (`1 -> A`, `27 -> AA`).
///
/// Index 0 has no letters and renders as an empty string.
pub fn column_letters(mut col: u32) -> String {
    let mut out = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        out.push(b'A' + rem);
        col = (col - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
