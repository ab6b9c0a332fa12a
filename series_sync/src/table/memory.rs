//! In-process [`TabularStore`] over a row-major grid.
//!
//! Behaves like a sheet with a fixed row capacity: writes past the capacity
//! fail with [`TableError::OutOfRange`] until [`TabularStore::grow_rows`] is
//! called. Used for dry runs and as the backing store in tests.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{TableError, TabularStore};
use crate::address::{CellAddress, RangeAddress};

#[derive(Debug)]
struct Grid {
    rows: Vec<Vec<String>>,
    capacity: u32,
}

impl Grid {
    fn get(&self, row: u32, col: u32) -> Option<&str> {
        if row == 0 || col == 0 {
            return None;
        }
        self.rows
            .get(row as usize - 1)?
            .get(col as usize - 1)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn set(&mut self, row: u32, col: u32, value: String) {
        if row == 0 || col == 0 {
            return;
        }
        let (r, c) = (row as usize - 1, col as usize - 1);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let line = &mut self.rows[r];
        if line.len() <= c {
            line.resize(c + 1, String::new());
        }
        line[c] = value;
    }
}

/// Grid held in memory behind a mutex.
#[derive(Debug)]
pub struct MemoryTable {
    grid: Mutex<Grid>,
}

impl MemoryTable {
    /// Empty table that can hold `capacity` rows.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            grid: Mutex::new(Grid {
                rows: Vec::new(),
                capacity,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Grid> {
        self.grid.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set one cell, ignoring capacity. Handy for seeding headers and history.
    pub fn set(&self, cell: CellAddress, value: impl Into<String>) {
        self.lock().set(cell.row, cell.col, value.into());
    }

    /// Current value of one cell.
    pub fn get(&self, cell: CellAddress) -> Option<String> {
        self.lock().get(cell.row, cell.col).map(str::to_string)
    }

    /// Non-empty values of column `col` from `from_row` on, in row order.
    pub fn column(&self, col: u32, from_row: u32) -> Vec<String> {
        let grid = self.lock();
        (from_row.max(1)..=grid.rows.len() as u32)
            .filter_map(|row| grid.get(row, col).map(str::to_string))
            .collect()
    }

    pub fn capacity(&self) -> u32 {
        self.lock().capacity
    }
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self::with_capacity(1000)
    }
}

#[async_trait]
impl TabularStore for MemoryTable {
    async fn read_cell(&self, cell: CellAddress) -> Result<Option<String>, TableError> {
        Ok(self.get(cell))
    }

    async fn read_column(&self, col: u32, from_row: u32) -> Result<Vec<String>, TableError> {
        let grid = self.lock();
        let mut out: Vec<String> = (from_row.max(1)..=grid.rows.len() as u32)
            .map(|row| grid.get(row, col).unwrap_or_default().to_string())
            .collect();
        while out.last().is_some_and(String::is_empty) {
            out.pop();
        }
        Ok(out)
    }

    async fn read_range(&self, range: RangeAddress) -> Result<Vec<Vec<String>>, TableError> {
        let grid = self.lock();
        let mut out = Vec::new();
        for row in range.start.row..=range.end.row {
            let mut line: Vec<String> = (range.start.col..=range.end.col)
                .map(|col| grid.get(row, col).unwrap_or_default().to_string())
                .collect();
            while line.last().is_some_and(String::is_empty) {
                line.pop();
            }
            out.push(line);
        }
        while out.last().is_some_and(Vec::is_empty) {
            out.pop();
        }
        Ok(out)
    }

    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, TableError> {
        Ok(self.lock().rows.clone())
    }

    async fn write_range(
        &self,
        range: RangeAddress,
        values: Vec<Vec<String>>,
    ) -> Result<(), TableError> {
        let mut grid = self.lock();
        if range.end.row > grid.capacity {
            return Err(TableError::OutOfRange {
                range: range.to_string(),
                capacity: grid.capacity,
            });
        }
        if values.len() > range.height() as usize
            || values.iter().any(|line| line.len() > range.width() as usize)
        {
            return Err(TableError::Decode(format!(
                "values do not fit range {range}"
            )));
        }
        for (dr, line) in values.into_iter().enumerate() {
            for (dc, value) in line.into_iter().enumerate() {
                grid.set(range.start.row + dr as u32, range.start.col + dc as u32, value);
            }
        }
        Ok(())
    }

    async fn row_capacity(&self) -> Result<u32, TableError> {
        Ok(self.capacity())
    }

    async fn grow_rows(&self, additional: u32) -> Result<(), TableError> {
        let mut grid = self.lock();
        grid.capacity = grid.capacity.saturating_add(additional);
        Ok(())
    }
}
