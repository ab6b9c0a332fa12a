//! One incremental sync pass over every instrument.
//!
//! Per instrument the engine walks
//! `watermark -> fetch -> dedupe -> sort -> append`:
//! 1. The watermark is the stored last timestamp plus one interval, or the
//!    session open `lookback_days` ago for an empty series.
//! 2. `[watermark, now)` is fetched day by day.
//! 3. Candles whose rendered timestamp already sits in the recent tail of the
//!    date column, or repeats within the batch, are dropped.
//! 4. The rest is sorted by timestamp string and appended in one block.
//!
//! An instrument that fails is recorded and the pass moves on; only an
//! unusable catalog stops the whole pass.

use std::{collections::HashSet, fmt};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{info, info_span, warn, Instrument as _};

use crate::{
    catalog::{Instrument, InstrumentCatalog},
    config::{FetchConfig, SessionConfig, SyncConfig},
    fetcher::{CandleFetcher, DayFailure, SharedProvider},
    store::{SeriesStore, StoredRow},
    table::SharedTable,
    tz::{format_stamp, local_day, local_instant},
};

/// How one instrument's pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentOutcome {
    Appended { first_row: u32, rows: u32 },
    NoNewData,
    Failed { reason: String },
}

/// Transcript entry for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentReport {
    pub symbol: String,
    /// Candles returned by upstream before dedupe.
    pub fetched: usize,
    /// Windows that failed and were skipped.
    pub fetch_failures: Vec<DayFailure>,
    pub outcome: InstrumentOutcome,
}

/// Everything a pass did, in order. `Display` renders the human transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    /// Set when the pass could not start at all.
    pub fatal: Option<String>,
    pub instruments: Vec<InstrumentReport>,
}

impl SyncReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            fatal: None,
            instruments: Vec::new(),
        }
    }

    /// Rows written across all instruments.
    pub fn appended_rows(&self) -> u32 {
        self.instruments
            .iter()
            .map(|r| match r.outcome {
                InstrumentOutcome::Appended { rows, .. } => rows,
                _ => 0,
            })
            .sum()
    }

    /// Instruments whose append did not go through.
    pub fn failed(&self) -> impl Iterator<Item = &InstrumentReport> {
        self.instruments
            .iter()
            .filter(|r| matches!(r.outcome, InstrumentOutcome::Failed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.fatal.is_none() && self.failed().next().is_none()
    }

    pub fn outcome_of(&self, symbol: &str) -> Option<&InstrumentOutcome> {
        self.instruments
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| &r.outcome)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sync started {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        if let Some(reason) = &self.fatal {
            return writeln!(f, "sync aborted: {reason}");
        }
        for r in &self.instruments {
            for failure in &r.fetch_failures {
                writeln!(f, "{}: fetch error on {}: {}", r.symbol, failure.day, failure.message)?;
            }
            match &r.outcome {
                InstrumentOutcome::Appended { first_row, rows } => writeln!(
                    f,
                    "{}: appended {rows} rows starting at row {first_row}",
                    r.symbol
                )?,
                InstrumentOutcome::NoNewData => writeln!(f, "{}: no new data", r.symbol)?,
                InstrumentOutcome::Failed { reason } => {
                    writeln!(f, "{}: failed: {reason}", r.symbol)?
                }
            }
        }
        write!(f, "total appended: {}", self.appended_rows())
    }
}

pub struct SyncEngine {
    catalog: InstrumentCatalog,
    store: SeriesStore,
    fetcher: CandleFetcher,
    settings: FetchConfig,
    session: SessionConfig,
    tz: Tz,
}

impl SyncEngine {
    pub fn new(table: SharedTable, provider: SharedProvider, cfg: &SyncConfig) -> Self {
        Self {
            catalog: InstrumentCatalog::new(
                table.clone(),
                cfg.layout.clone(),
                cfg.retry.cell_read.clone(),
            ),
            store: SeriesStore::new(
                table,
                cfg.layout.clone(),
                cfg.timezone,
                cfg.retry.cell_read.clone(),
                cfg.retry.write.clone(),
            ),
            fetcher: CandleFetcher::new(
                provider,
                cfg.sync.interval,
                cfg.session,
                cfg.timezone,
                cfg.sync.call_delay(),
            ),
            settings: cfg.sync.clone(),
            session: cfg.session,
            tz: cfg.timezone,
        }
    }

    /// One pass up to the current instant.
    pub async fn run(&self) -> SyncReport {
        self.run_at(Utc::now()).await
    }

    /// One pass treating `now` as the end of the fetch range.
    pub async fn run_at(&self, now: DateTime<Utc>) -> SyncReport {
        let mut report = SyncReport::new(now);
        let instruments = match self.catalog.resolve().await {
            Ok(list) => list,
            Err(err) => {
                warn!(error = %err, "sync aborted");
                report.fatal = Some(err.to_string());
                return report;
            }
        };

        for inst in &instruments {
            let span = info_span!("instrument", symbol = %inst.symbol);
            let entry = self.sync_instrument(inst, now).instrument(span).await;
            report.instruments.push(entry);
        }
        info!(
            instruments = instruments.len(),
            appended = report.appended_rows(),
            "sync pass complete"
        );
        report
    }

    async fn sync_instrument(&self, inst: &Instrument, now: DateTime<Utc>) -> InstrumentReport {
        let mut entry = InstrumentReport {
            symbol: inst.symbol.clone(),
            fetched: 0,
            fetch_failures: Vec::new(),
            outcome: InstrumentOutcome::NoNewData,
        };
        let failed = |reason: String| {
            warn!(%reason, "instrument failed");
            InstrumentOutcome::Failed { reason }
        };

        let since = match self.watermark(inst, now).await {
            Ok(t) => t,
            Err(err) => {
                entry.outcome = failed(format!("watermark: {err:#}"));
                return entry;
            }
        };
        if since >= now {
            return entry;
        }

        let fetched = self.fetcher.fetch(inst, since, now).await;
        entry.fetched = fetched.candles.len();
        entry.fetch_failures = fetched.failures;
        if fetched.candles.is_empty() {
            return entry;
        }

        let existing = match self
            .store
            .existing_timestamp_window(inst, self.settings.dedupe_window_rows)
            .await
        {
            Ok(set) => set,
            Err(err) => {
                entry.outcome = failed(format!("reading existing rows: {err}"));
                return entry;
            }
        };

        let mut batch = HashSet::new();
        let mut rows: Vec<StoredRow> = fetched
            .candles
            .into_iter()
            // Upstream may over-deliver; nothing older than the watermark may
            // reach the append, or the column would stop being ordered.
            .filter(|c| since <= c.timestamp && c.timestamp < now)
            .filter_map(|c| {
                let stamp = format_stamp(c.timestamp, self.tz);
                if existing.contains(&stamp) || !batch.insert(stamp.clone()) {
                    return None;
                }
                Some(StoredRow {
                    stamp,
                    price: c.close.normalize().to_string(),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.stamp.cmp(&b.stamp));

        if rows.is_empty() {
            info!(fetched = entry.fetched, "everything fetched is already stored");
            return entry;
        }
        entry.outcome = match self.store.append(inst, &rows).await {
            Ok(summary) => InstrumentOutcome::Appended {
                first_row: summary.first_row,
                rows: summary.rows,
            },
            Err(err) => failed(err.to_string()),
        };
        entry
    }

    async fn watermark(
        &self,
        inst: &Instrument,
        now: DateTime<Utc>,
    ) -> anyhow::Result<DateTime<Utc>> {
        if let Some(last) = self.store.last_timestamp(inst).await? {
            return Ok(last + self.settings.interval.duration());
        }
        let lookback = Duration::days(i64::from(self.settings.lookback_days));
        let start_day = local_day(now - lookback, self.tz);
        local_instant(start_day, self.session.open, self.tz)
    }
}
