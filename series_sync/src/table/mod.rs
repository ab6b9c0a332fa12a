//! Tabular store abstraction.
//!
//! A [`TabularStore`] is a grid of string cells addressed by 1-based
//! [`CellAddress`]/[`RangeAddress`]. The sync and analytics layers only talk
//! to this trait; [`sheets::SheetsStore`] backs it with Google Sheets and
//! [`memory::MemoryTable`] with a local grid.
//!
//! Values are strings on both sides: empty string and "absent" mean the same
//! thing, and parsing prices or timestamps is the caller's job.

pub mod memory;
pub mod sheets;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::address::{CellAddress, RangeAddress};

/// Failure talking to a tabular store. All variants are considered transient
/// by the callers that retry.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("store client setup failed: {0}")]
    Setup(String),

    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("range {range} is outside the sheet ({capacity} rows)")]
    OutOfRange { range: String, capacity: u32 },

    #[error("unexpected store payload: {0}")]
    Decode(String),
}

/// Cell-level access to a spreadsheet-like grid.
#[async_trait]
pub trait TabularStore {
    /// One cell; `None` when empty or beyond the populated area.
    async fn read_cell(&self, cell: CellAddress) -> Result<Option<String>, TableError>;

    /// Values of column `col` from `from_row` down to the last populated row.
    ///
    /// Trailing empty cells are not returned; interior empty cells are kept as
    /// empty strings so indexes map back to rows.
    async fn read_column(&self, col: u32, from_row: u32) -> Result<Vec<String>, TableError>;

    /// Rectangular block, row-major. Short rows are not padded.
    async fn read_range(&self, range: RangeAddress) -> Result<Vec<Vec<String>>, TableError>;

    /// Every populated row of the sheet starting at row 1, row-major.
    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, TableError>;

    /// Overwrite a block, row-major. `values` must fit `range`.
    async fn write_range(
        &self,
        range: RangeAddress,
        values: Vec<Vec<String>>,
    ) -> Result<(), TableError>;

    /// Current number of rows the sheet can hold.
    async fn row_capacity(&self) -> Result<u32, TableError>;

    /// Append `additional` empty rows at the bottom of the sheet.
    async fn grow_rows(&self, additional: u32) -> Result<(), TableError>;
}

/// Shared handle used by every component.
pub type SharedTable = Arc<dyn TabularStore + Send + Sync>;

/// Single column as the row-major shape `write_range` expects.
pub fn column_values<I, S>(values: I) -> Vec<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(|v| vec![v.into()]).collect()
}
