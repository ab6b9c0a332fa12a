//! Run configuration: parsing, defaults, and validation.
//!
//! One [`SyncConfig`] is built at the edge (the binary or a test) and handed
//! to every component. Every field has a default matching the production
//! spreadsheet layout, so an empty TOML document is a valid configuration:
//!
//! ```toml
//! timezone = "Europe/Moscow"
//!
//! [layout]
//! header_rows = 7
//! symbol_row = 4
//! upstream_id_row = 5
//! first_column = 3
//! column_stride = 2
//! max_instruments = 41
//!
//! [session]
//! open = "10:00:00"
//! close = "18:45:00"
//!
//! [sync]
//! interval = "5m"
//! lookback_days = 20
//! dedupe_window_rows = 2000
//! call_delay_ms = 150
//!
//! [retry.write]
//! max_attempts = 5
//! delay_ms = 10000
//! ```
//!
//! Entrypoints:
//! - Parse + validate from a TOML string: [`load_config_str`]
//! - Parse + validate from a file path: [`load_config_path`]

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, bail, ensure};
use chrono::NaiveTime;
use chrono_tz::Tz;
use market_data_ingestor::{
    models::interval::CandleInterval, providers::tinvest_rest::DEFAULT_BASE_URL,
};
use serde::{Deserialize, Serialize};

use crate::{analytics::Alignment, retry::RetryPolicy, table::sheets::SHEETS_BASE_URL};

/// Everything one run needs besides credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SyncConfig {
    /// Exchange time zone; stored timestamps and session windows use it.
    pub timezone: Tz,
    pub layout: LayoutConfig,
    pub session: SessionConfig,
    pub sync: FetchConfig,
    pub retry: RetryConfig,
    pub analytics: AnalyticsConfig,
    pub results: ResultsConfig,
    pub sheets: SheetsConfig,
    pub upstream: UpstreamConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Moscow,
            layout: LayoutConfig::default(),
            session: SessionConfig::default(),
            sync: FetchConfig::default(),
            retry: RetryConfig::default(),
            analytics: AnalyticsConfig::default(),
            results: ResultsConfig::default(),
            sheets: SheetsConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

/// Where instruments and their series live in the sheet. All 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct LayoutConfig {
    /// Rows reserved for headers; series data starts right below.
    pub header_rows: u32,
    /// Row holding the display symbol of each slot.
    pub symbol_row: u32,
    /// Row holding the upstream instrument id of each slot.
    pub upstream_id_row: u32,
    /// Date column of the first slot.
    pub first_column: u32,
    /// Columns between consecutive slots (date + price = 2).
    pub column_stride: u32,
    /// Upper bound on slots scanned.
    pub max_instruments: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            header_rows: 7,
            symbol_row: 4,
            upstream_id_row: 5,
            first_column: 3,
            column_stride: 2,
            max_instruments: 41,
        }
    }
}

impl LayoutConfig {
    /// Date columns of every slot, left to right.
    pub fn slot_columns(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.max_instruments).map(|i| self.first_column + i * self.column_stride)
    }

    /// First row below the header region.
    pub fn first_data_row(&self) -> u32 {
        self.header_rows + 1
    }
}

/// Daily trading session in exchange local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionConfig {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

const SESSION_OPEN: NaiveTime = match NaiveTime::from_hms_opt(10, 0, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

const SESSION_CLOSE: NaiveTime = match NaiveTime::from_hms_opt(18, 45, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open: SESSION_OPEN,
            close: SESSION_CLOSE,
        }
    }
}

/// Fetch and dedupe tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct FetchConfig {
    /// Candle width requested from upstream.
    pub interval: CandleInterval,
    /// History fetched for an instrument with an empty series.
    pub lookback_days: u32,
    /// Trailing rows consulted for dedupe; absent means the whole column.
    pub dedupe_window_rows: Option<usize>,
    /// Pause after every upstream call.
    pub call_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            interval: CandleInterval::FiveMinutes,
            lookback_days: 20,
            dedupe_window_rows: Some(2000),
            call_delay_ms: 150,
        }
    }
}

impl FetchConfig {
    pub fn call_delay(&self) -> Duration {
        Duration::from_millis(self.call_delay_ms)
    }
}

/// Retry policies per operation class.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryConfig {
    /// Store reads: header cells and series columns.
    pub cell_read: RetryPolicy,
    /// Date + price range writes during append.
    pub write: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            cell_read: RetryPolicy::fixed(5, Duration::from_secs(5)),
            write: RetryPolicy::fixed(5, Duration::from_secs(10)),
        }
    }
}

/// Correlation and growth tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AnalyticsConfig {
    /// Trailing rows per instrument fed into a scheduled analysis.
    pub window_rows: usize,
    /// Observations spanned by the growth figure.
    pub growth_periods: usize,
    /// How two series are paired before computing Pearson.
    pub alignment: Alignment,
    /// Trailing complete rows per instrument for an on-demand correlation.
    pub on_demand_rows: usize,
    /// Strongest correlations shown in a report.
    pub top_correlations: usize,
    /// Growth leaders shown per direction in a report.
    pub leaders: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_rows: 2000,
            growth_periods: 104,
            alignment: Alignment::Position,
            on_demand_rows: 1000,
            top_correlations: 10,
            leaders: 5,
        }
    }
}

/// Result file locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ResultsConfig {
    pub correlations_path: PathBuf,
    pub growth_path: PathBuf,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            correlations_path: PathBuf::from("correlations.json"),
            growth_path: PathBuf::from("growth.json"),
        }
    }
}

/// Google Sheets target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// Tab title used in A1 ranges.
    pub sheet_title: String,
    /// Numeric tab id used by structural updates (row growth).
    pub sheet_id: i64,
    pub base_url: String,
    pub requests_per_minute: u32,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_title: "Sheet1".to_string(),
            sheet_id: 0,
            base_url: SHEETS_BASE_URL.to_string(),
            requests_per_minute: 60,
        }
    }
}

/// Market data gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct UpstreamConfig {
    pub base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl SyncConfig {
    /// Rejects layouts and windows the components cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let l = &self.layout;
        ensure!(l.first_column >= 1, "layout.first_column must be at least 1");
        ensure!(
            l.column_stride >= 2,
            "layout.column_stride must leave room for date and price columns"
        );
        ensure!(l.max_instruments > 0, "layout.max_instruments must be positive");
        for (name, row) in [("symbol_row", l.symbol_row), ("upstream_id_row", l.upstream_id_row)] {
            if row == 0 || row > l.header_rows {
                bail!("layout.{name} = {row} must lie inside the {} header rows", l.header_rows);
            }
        }
        ensure!(
            self.session.open < self.session.close,
            "session.open {} must be before session.close {}",
            self.session.open,
            self.session.close
        );
        ensure!(self.sync.lookback_days > 0, "sync.lookback_days must be positive");
        ensure!(self.analytics.window_rows > 0, "analytics.window_rows must be positive");
        ensure!(self.analytics.growth_periods > 0, "analytics.growth_periods must be positive");
        ensure!(self.analytics.on_demand_rows > 0, "analytics.on_demand_rows must be positive");
        ensure!(
            self.sheets.requests_per_minute > 0,
            "sheets.requests_per_minute must be positive"
        );
        Ok(())
    }
}

/// Parse and validate a configuration from a TOML string.
pub fn load_config_str(s: &str) -> anyhow::Result<SyncConfig> {
    let cfg: SyncConfig = toml::from_str(s).context("parse sync config TOML")?;
    cfg.validate()?;
    Ok(cfg)
}

/// Read, parse and validate a configuration file.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<SyncConfig> {
    let p = path.as_ref();
    let s = std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    load_config_str(&s).with_context(|| format!("load config {}", p.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = load_config_str("").unwrap();
        assert_eq!(cfg.timezone, chrono_tz::Europe::Moscow);
        assert_eq!(cfg.layout, LayoutConfig::default());
        assert_eq!(cfg.session.open, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(cfg.session.close, NaiveTime::from_hms_opt(18, 45, 0).unwrap());
        assert_eq!(cfg.sync.interval, CandleInterval::FiveMinutes);
        assert_eq!(cfg.sync.dedupe_window_rows, Some(2000));
        assert_eq!(cfg.retry.write.max_attempts, 5);
        assert_eq!(cfg.retry.write.delay_ms, 10_000);
        assert_eq!(cfg.analytics.growth_periods, 104);
    }

    #[test]
    fn slot_columns_step_by_stride() {
        let layout = LayoutConfig {
            max_instruments: 3,
            ..LayoutConfig::default()
        };
        assert_eq!(layout.slot_columns().collect::<Vec<_>>(), vec![3, 5, 7]);
        assert_eq!(layout.first_data_row(), 8);
    }

    #[test]
    fn overrides_parse() {
        let cfg = load_config_str(
            r#"
            timezone = "Europe/London"

            [session]
            open = "08:00:00"
            close = "16:30:00"

            [sync]
            interval = "1m"
            lookback_days = 3

            [retry.cell_read]
            max_attempts = 2
            delay_ms = 100
            backoff = "exponential"
            max_delay_ms = 400

            [analytics]
            alignment = "timestamp"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.timezone, chrono_tz::Europe::London);
        assert_eq!(cfg.sync.interval, CandleInterval::OneMinute);
        assert_eq!(cfg.sync.lookback_days, 3);
        assert_eq!(cfg.retry.cell_read.backoff, Backoff::Exponential);
        assert_eq!(cfg.analytics.alignment, Alignment::Timestamp);
        // untouched sections keep defaults
        assert_eq!(cfg.retry.write, RetryConfig::default().write);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = load_config_str("[layout]\nheader_row = 7\n").unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"));
    }

    #[test]
    fn rejects_inverted_session() {
        let err = load_config_str("[session]\nopen = \"19:00:00\"\nclose = \"10:00:00\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("must be before"));
    }

    #[test]
    fn rejects_symbol_row_below_header() {
        let err = load_config_str("[layout]\nsymbol_row = 9\n").unwrap_err();
        assert!(err.to_string().contains("header rows"));
    }
}
