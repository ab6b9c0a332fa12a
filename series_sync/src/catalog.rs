//! Instrument discovery from the sheet header.
//!
//! Each instrument occupies one slot: a date column and the price column
//! right after it. The header holds the display symbol and the upstream id of
//! every slot at fixed rows. The catalog is re-read at the start of every run,
//! so adding a column pair in the sheet is all it takes to track a new
//! instrument.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    address::CellAddress,
    config::LayoutConfig,
    error::SyncError,
    retry::RetryPolicy,
    table::{SharedTable, TableError},
};

/// One tracked instrument and the columns holding its series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instrument {
    /// Display symbol from the header (e.g. `SBER`).
    pub symbol: String,
    /// Identifier the market data gateway understands (FIGI or UID).
    pub upstream_id: String,
    /// Column holding timestamps.
    pub date_column: u32,
    /// Column holding prices, next to `date_column`.
    pub price_column: u32,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<String>,
        upstream_id: impl Into<String>,
        date_column: u32,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            upstream_id: upstream_id.into(),
            date_column,
            price_column: date_column + 1,
        }
    }
}

/// Reads instrument slots out of the header rows.
pub struct InstrumentCatalog {
    table: SharedTable,
    layout: LayoutConfig,
    retry: RetryPolicy,
}

impl InstrumentCatalog {
    pub fn new(table: SharedTable, layout: LayoutConfig, retry: RetryPolicy) -> Self {
        Self {
            table,
            layout,
            retry,
        }
    }

    /// All populated slots, left to right.
    ///
    /// A slot is skipped when its symbol or upstream id is blank. A cell that
    /// still fails after the retry budget counts as blank. The first slot wins
    /// when a symbol repeats.
    pub async fn resolve(&self) -> Result<Vec<Instrument>, SyncError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for col in self.layout.slot_columns() {
            let symbol = self.cell(self.layout.symbol_row, col).await;
            let upstream_id = self.cell(self.layout.upstream_id_row, col).await;
            let (Some(symbol), Some(upstream_id)) = (symbol, upstream_id) else {
                continue;
            };
            if !seen.insert(symbol.clone()) {
                warn!(%symbol, col, "duplicate symbol in header; keeping the first slot");
                continue;
            }
            debug!(%symbol, %upstream_id, col, "resolved instrument");
            out.push(Instrument::new(symbol, upstream_id, col));
        }

        if out.is_empty() {
            return Err(SyncError::Configuration(format!(
                "no instruments found in header rows {} and {}",
                self.layout.symbol_row, self.layout.upstream_id_row
            )));
        }
        info!(count = out.len(), "instrument catalog resolved");
        Ok(out)
    }

    /// Finds a slot by symbol, ignoring case and surrounding whitespace.
    ///
    /// Only the symbol row is consulted; `upstream_id` is left empty because
    /// callers use the result to read stored series, not to fetch.
    pub async fn locate(&self, symbol: &str) -> Result<Option<Instrument>, SyncError> {
        let wanted = symbol.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }
        for col in self.layout.slot_columns() {
            let cell = CellAddress::new(self.layout.symbol_row, col);
            let Some(found) = self.read_cell(cell).await? else {
                continue;
            };
            let found = found.trim();
            if found.to_lowercase() == wanted {
                return Ok(Some(Instrument::new(found, String::new(), col)));
            }
        }
        Ok(None)
    }

    async fn read_cell(&self, address: CellAddress) -> Result<Option<String>, TableError> {
        let what = format!("read header cell {address}");
        self.retry
            .retry(&what, move |_| self.table.read_cell(address))
            .await
    }

    async fn cell(&self, row: u32, col: u32) -> Option<String> {
        let address = CellAddress::new(row, col);
        match self.read_cell(address).await {
            Ok(value) => value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            Err(err) => {
                warn!(cell = %address, error = %err, "header cell unreadable; treating as blank");
                None
            }
        }
    }
}
