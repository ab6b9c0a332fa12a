#![allow(dead_code)]

use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use market_data_ingestor::{
    models::{candle::Candle, request_params::CandlesRequest},
    providers::{DataProvider, ProviderError, ValidationSnafu},
};
use rust_decimal::Decimal;
use series_sync::{
    SyncConfig,
    address::{CellAddress, RangeAddress},
    config::{ResultsConfig, RetryConfig},
    retry::RetryPolicy,
    table::{TableError, TabularStore, memory::MemoryTable},
};

/// Config with the production layout but no waiting anywhere.
pub fn fast_config(results_dir: &Path) -> SyncConfig {
    let mut cfg = SyncConfig::default();
    cfg.sync.call_delay_ms = 0;
    cfg.retry = RetryConfig {
        cell_read: RetryPolicy::fixed(2, std::time::Duration::ZERO),
        write: RetryPolicy::fixed(3, std::time::Duration::ZERO),
    };
    cfg.results = ResultsConfig {
        correlations_path: results_dir.join("correlations.json"),
        growth_path: results_dir.join("growth.json"),
    };
    cfg
}

/// Writes a slot header: symbol on row 4, upstream id on row 5.
pub fn header(table: &MemoryTable, col: u32, symbol: &str, upstream_id: &str) {
    table.set(CellAddress::new(4, col), symbol);
    table.set(CellAddress::new(5, col), upstream_id);
}

/// Fills a slot's series starting at row 8.
pub fn seed_series(table: &MemoryTable, date_col: u32, rows: &[(&str, &str)]) {
    for (i, (stamp, price)) in rows.iter().enumerate() {
        let row = 8 + i as u32;
        table.set(CellAddress::new(row, date_col), *stamp);
        table.set(CellAddress::new(row, date_col + 1), *price);
    }
}

/// Instant from Moscow wall-clock time on a March 2025 day.
pub fn msk(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    chrono_tz::Europe::Moscow
        .with_ymd_and_hms(2025, 3, day, hour, minute, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn candle(at: DateTime<Utc>, close: &str) -> Candle {
    Candle::flat(at, close.parse::<Decimal>().unwrap())
}

/// Serves fixture candles per instrument id.
///
/// By default only candles inside the requested `[from, to)` window are
/// returned, in fixture order. With `ignore_window` every call returns all
/// fixture candles of the instrument, like a gateway that over-delivers.
#[derive(Default)]
pub struct ScriptedProvider {
    candles: Mutex<Vec<(String, Candle)>>,
    failing_day: Mutex<Option<chrono::NaiveDate>>,
    pub ignore_window: bool,
    pub requests: Mutex<Vec<CandlesRequest>>,
}

impl ScriptedProvider {
    pub fn over_delivering() -> Self {
        Self {
            ignore_window: true,
            ..Self::default()
        }
    }

    pub fn push(&self, instrument_id: &str, candle: Candle) {
        self.candles
            .lock()
            .unwrap()
            .push((instrument_id.to_string(), candle));
    }

    /// Every request whose window starts on this UTC date fails.
    pub fn fail_on(&self, day: chrono::NaiveDate) {
        *self.failing_day.lock().unwrap() = Some(day);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    async fn fetch_candles(&self, request: CandlesRequest) -> Result<Vec<Candle>, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        if *self.failing_day.lock().unwrap() == Some(request.from.date_naive()) {
            return Err(ValidationSnafu {
                message: "scripted outage",
            }
            .build());
        }
        Ok(self
            .candles
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == request.instrument_id)
            .filter(|(_, c)| {
                self.ignore_window || (request.from <= c.timestamp && c.timestamp < request.to)
            })
            .map(|(_, c)| c.clone())
            .collect())
    }
}

/// Memory table with scripted store outages.
///
/// The first `failing_writes` range writes fail, as do the first
/// `failing_cell_reads` cell reads and `failing_column_reads` column reads.
/// Writes whose range starts in `rejected_column` always fail.
pub struct FlakyTable {
    pub inner: MemoryTable,
    failing_writes: AtomicU32,
    failing_cell_reads: AtomicU32,
    failing_column_reads: AtomicU32,
    rejected_column: Option<u32>,
    pub write_calls: AtomicU32,
}

impl FlakyTable {
    pub fn new(inner: MemoryTable, failing_writes: u32) -> Self {
        Self {
            inner,
            failing_writes: AtomicU32::new(failing_writes),
            failing_cell_reads: AtomicU32::new(0),
            failing_column_reads: AtomicU32::new(0),
            rejected_column: None,
            write_calls: AtomicU32::new(0),
        }
    }

    pub fn failing_cell_reads(self, n: u32) -> Self {
        self.failing_cell_reads.store(n, Ordering::SeqCst);
        self
    }

    pub fn failing_column_reads(self, n: u32) -> Self {
        self.failing_column_reads.store(n, Ordering::SeqCst);
        self
    }

    pub fn rejecting_column(self, col: u32) -> Self {
        Self {
            rejected_column: Some(col),
            ..self
        }
    }
}

/// Consumes one scripted failure, if any are left.
fn take_failure(left: &AtomicU32) -> bool {
    left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn quota_error() -> TableError {
    TableError::Api {
        status: 429,
        message: "quota".into(),
    }
}

#[async_trait]
impl TabularStore for FlakyTable {
    async fn read_cell(&self, cell: CellAddress) -> Result<Option<String>, TableError> {
        if take_failure(&self.failing_cell_reads) {
            return Err(quota_error());
        }
        self.inner.read_cell(cell).await
    }

    async fn read_column(&self, col: u32, from_row: u32) -> Result<Vec<String>, TableError> {
        if take_failure(&self.failing_column_reads) {
            return Err(quota_error());
        }
        self.inner.read_column(col, from_row).await
    }

    async fn read_range(&self, range: RangeAddress) -> Result<Vec<Vec<String>>, TableError> {
        self.inner.read_range(range).await
    }

    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, TableError> {
        self.inner.read_all_rows().await
    }

    async fn write_range(
        &self,
        range: RangeAddress,
        values: Vec<Vec<String>>,
    ) -> Result<(), TableError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_writes) || self.rejected_column == Some(range.start.col) {
            return Err(TableError::Api {
                status: 503,
                message: "scripted write failure".into(),
            });
        }
        self.inner.write_range(range, values).await
    }

    async fn row_capacity(&self) -> Result<u32, TableError> {
        self.inner.row_capacity().await
    }

    async fn grow_rows(&self, additional: u32) -> Result<(), TableError> {
        self.inner.grow_rows(additional).await
    }
}

pub fn shared<T>(table: T) -> Arc<T> {
    Arc::new(table)
}
