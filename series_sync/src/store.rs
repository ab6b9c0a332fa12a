//! Per-instrument series persisted below the sheet header.
//!
//! A series is two parallel columns: timestamp strings in [`STAMP_FORMAT`]
//! and price strings. Rows are only ever appended. Reads tolerate anything a
//! human may have typed into the sheet: unparseable cells become missing
//! points instead of errors.
//!
//! [`STAMP_FORMAT`]: crate::tz::STAMP_FORMAT

use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    address::RangeAddress,
    catalog::Instrument,
    config::LayoutConfig,
    error::SyncError,
    retry::RetryPolicy,
    table::{SharedTable, TableError, column_values},
    tz::parse_stamp,
};

/// One row ready to be written: both cells already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub stamp: String,
    pub price: String,
}

/// One observation read back from the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    /// Raw timestamp cell, `None` when blank.
    pub stamp: Option<String>,
    /// Parsed price, `None` when blank or unparseable.
    pub price: Option<f64>,
}

/// Trailing window of one instrument's series, oldest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceSeries {
    pub points: Vec<SeriesPoint>,
}

impl PriceSeries {
    /// Prices in row order, gaps kept.
    pub fn prices(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.price).collect()
    }
}

/// Where an append landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendSummary {
    pub first_row: u32,
    pub rows: u32,
}

/// Price cell to number. Accepts a decimal comma and digit-group spaces.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read/append access to instrument series.
pub struct SeriesStore {
    table: SharedTable,
    layout: LayoutConfig,
    tz: Tz,
    read_retry: RetryPolicy,
    write_retry: RetryPolicy,
}

impl SeriesStore {
    pub fn new(
        table: SharedTable,
        layout: LayoutConfig,
        tz: Tz,
        read_retry: RetryPolicy,
        write_retry: RetryPolicy,
    ) -> Self {
        Self {
            table,
            layout,
            tz,
            read_retry,
            write_retry,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    async fn column(&self, col: u32) -> Result<Vec<String>, TableError> {
        let from = self.layout.first_data_row();
        self.read_retry
            .retry(&format!("read column {col}"), move |_| {
                self.table.read_column(col, from)
            })
            .await
    }

    async fn dates(&self, instrument: &Instrument) -> Result<Vec<String>, TableError> {
        self.column(instrument.date_column).await
    }

    /// Latest parseable timestamp in the date column, if any.
    pub async fn last_timestamp(
        &self,
        instrument: &Instrument,
    ) -> Result<Option<DateTime<Utc>>, TableError> {
        let dates = self.dates(instrument).await?;
        Ok(dates.iter().filter_map(|d| parse_stamp(d, self.tz)).max())
    }

    /// The last `max_rows` non-blank timestamp cells, verbatim. `None` reads
    /// the whole column.
    pub async fn existing_timestamp_window(
        &self,
        instrument: &Instrument,
        max_rows: Option<usize>,
    ) -> Result<HashSet<String>, TableError> {
        let dates = self.dates(instrument).await?;
        let filled: Vec<String> = dates.into_iter().filter(|d| !d.trim().is_empty()).collect();
        let skip = match max_rows {
            Some(n) => filled.len().saturating_sub(n),
            None => 0,
        };
        Ok(filled.into_iter().skip(skip).collect())
    }

    /// Appends rows right after the last populated date cell.
    ///
    /// The sheet is grown first when the block would run past its capacity.
    /// Capacity check, price write and date write form one attempt; the whole
    /// attempt is retried under the write policy. Prices go first: the next
    /// free row is counted on the date column, so a block whose dates never
    /// landed is simply overwritten by the next append. When the budget runs
    /// out after prices were written, both blocks are blanked again.
    pub async fn append(
        &self,
        instrument: &Instrument,
        rows: &[StoredRow],
    ) -> Result<AppendSummary, SyncError> {
        if rows.is_empty() {
            return Ok(AppendSummary {
                first_row: 0,
                rows: 0,
            });
        }
        let occupied = self.dates(instrument).await?.len() as u32;
        let first_row = self.layout.first_data_row() + occupied;
        let count = rows.len() as u32;

        let dates = column_values(rows.iter().map(|r| r.stamp.clone()));
        let prices = column_values(rows.iter().map(|r| r.price.clone()));
        let prices_written = AtomicBool::new(false);
        let (dates, prices, written) = (&dates, &prices, &prices_written);
        let what = format!("append {} rows for {}", count, instrument.symbol);

        let result = self
            .write_retry
            .retry(&what, move |_| {
                self.write_block(instrument, first_row, dates, prices, written)
            })
            .await;
        if let Err(source) = result {
            if prices_written.load(Ordering::SeqCst) {
                self.blank_block(instrument, first_row, count).await;
            }
            return Err(SyncError::AppendExhausted {
                symbol: instrument.symbol.clone(),
                attempts: self.write_retry.attempts(),
                source,
            });
        }

        info!(
            symbol = %instrument.symbol,
            first_row,
            rows = count,
            "appended rows"
        );
        Ok(AppendSummary {
            first_row,
            rows: count,
        })
    }

    async fn write_block(
        &self,
        instrument: &Instrument,
        first_row: u32,
        dates: &[Vec<String>],
        prices: &[Vec<String>],
        prices_written: &AtomicBool,
    ) -> Result<(), TableError> {
        let count = dates.len() as u32;
        let last_row = first_row + count - 1;
        let capacity = self.table.row_capacity().await?;
        if last_row > capacity {
            debug!(capacity, last_row, "growing sheet");
            self.table.grow_rows(last_row - capacity).await?;
        }
        self.table
            .write_range(
                RangeAddress::column_span(instrument.price_column, first_row, count),
                prices.to_vec(),
            )
            .await?;
        prices_written.store(true, Ordering::SeqCst);
        self.table
            .write_range(
                RangeAddress::column_span(instrument.date_column, first_row, count),
                dates.to_vec(),
            )
            .await
    }

    // One attempt per column; a leftover here is logged, not retried.
    async fn blank_block(&self, instrument: &Instrument, first_row: u32, count: u32) {
        let blanks = column_values(std::iter::repeat_n(String::new(), count as usize));
        for col in [instrument.price_column, instrument.date_column] {
            let range = RangeAddress::column_span(col, first_row, count);
            if let Err(err) = self.table.write_range(range, blanks.clone()).await {
                warn!(
                    symbol = %instrument.symbol,
                    %range,
                    error = %err,
                    "could not blank a partial append"
                );
            }
        }
    }

    /// Trailing `window_rows` rows of one series by row index, gaps kept.
    pub async fn read_series(
        &self,
        instrument: &Instrument,
        window_rows: usize,
    ) -> Result<PriceSeries, TableError> {
        let dates = self.column(instrument.date_column).await?;
        let prices = self.column(instrument.price_column).await?;
        let len = dates.len().max(prices.len());
        let start = len.saturating_sub(window_rows);

        let points = (start..len)
            .map(|i| SeriesPoint {
                stamp: dates
                    .get(i)
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                price: prices.get(i).and_then(|p| parse_price(p)),
            })
            .collect();
        Ok(PriceSeries { points })
    }

    /// Complete rows (timestamp and price both present) of several
    /// instruments from one full-sheet read, keeping the last `limit` per
    /// instrument.
    pub async fn read_records(
        &self,
        instruments: &[Instrument],
        limit: usize,
    ) -> Result<IndexMap<String, PriceSeries>, TableError> {
        let rows = self
            .read_retry
            .retry("read all rows", move |_| self.table.read_all_rows())
            .await?;
        let body = rows.get(self.layout.header_rows as usize..).unwrap_or_default();

        let mut out = IndexMap::new();
        for inst in instruments {
            let cell = |row: &Vec<String>, col: u32| -> Option<String> {
                row.get(col as usize - 1)
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            let complete: Vec<SeriesPoint> = body
                .iter()
                .filter_map(|row| {
                    let stamp = cell(row, inst.date_column)?;
                    let price = parse_price(&cell(row, inst.price_column)?)?;
                    Some(SeriesPoint {
                        stamp: Some(stamp),
                        price: Some(price),
                    })
                })
                .collect();
            let skip = complete.len().saturating_sub(limit);
            out.insert(
                inst.symbol.clone(),
                PriceSeries {
                    points: complete.into_iter().skip(skip).collect(),
                },
            );
        }
        Ok(out)
    }
}
