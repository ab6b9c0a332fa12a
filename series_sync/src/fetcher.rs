//! Day-bounded candle retrieval.
//!
//! The upstream gateway is queried one trading session at a time. A request
//! range is cut into calendar days in the exchange time zone; each day's
//! window is the session clamped to the range, and windows wider than the
//! interval's request limit are paged further. Calls run one after another
//! with a fixed pause in between.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use futures::{Stream, StreamExt, stream};
use market_data_ingestor::{
    models::{candle::Candle, interval::CandleInterval, request_params::CandlesRequest},
    providers::{DataProvider, ProviderError},
};
use tracing::{debug, warn};

use crate::{
    catalog::Instrument,
    config::SessionConfig,
    tz::{local_day, local_instant},
};

pub type SharedProvider = Arc<dyn DataProvider + Send + Sync>;

/// One upstream call: a day and the part of its session being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub day: NaiveDate,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Result of one window.
#[derive(Debug)]
pub struct DayBatch {
    pub window: FetchWindow,
    pub result: Result<Vec<Candle>, ProviderError>,
}

/// A window the gateway refused or that failed in transit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayFailure {
    pub day: NaiveDate,
    pub message: String,
}

/// Everything collected for one instrument and range.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Candles of every successful window, in window order.
    pub candles: Vec<Candle>,
    pub failures: Vec<DayFailure>,
}

pub struct CandleFetcher {
    provider: SharedProvider,
    interval: CandleInterval,
    session: SessionConfig,
    tz: Tz,
    call_delay: Duration,
}

impl CandleFetcher {
    pub fn new(
        provider: SharedProvider,
        interval: CandleInterval,
        session: SessionConfig,
        tz: Tz,
        call_delay: Duration,
    ) -> Self {
        Self {
            provider,
            interval,
            session,
            tz,
            call_delay,
        }
    }

    pub fn interval(&self) -> CandleInterval {
        self.interval
    }

    /// Request windows covering `[since, until)`, one or more per day.
    ///
    /// The first day starts at the later of `since` and the session open, the
    /// last day ends at the earlier of `until` and the session close. Days
    /// whose clamped window is empty produce nothing.
    pub fn day_windows(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<FetchWindow> {
        let mut out = Vec::new();
        if since >= until {
            return out;
        }
        let max_width = self.interval.max_request_window();
        let last_day = local_day(until, self.tz);
        let mut day = local_day(since, self.tz);

        while day <= last_day {
            let bounds = local_instant(day, self.session.open, self.tz)
                .and_then(|open| Ok((open, local_instant(day, self.session.close, self.tz)?)));
            match bounds {
                Ok((open, close)) => {
                    let mut from = open.max(since);
                    let to = close.min(until);
                    while from < to {
                        let page_end = (from + max_width).min(to);
                        out.push(FetchWindow {
                            day,
                            from,
                            to: page_end,
                        });
                        from = page_end;
                    }
                }
                Err(err) => warn!(%day, error = %err, "cannot place session; skipping day"),
            }
            let Some(next) = day.succ_opt() else { break };
            day = next;
        }
        out
    }

    /// Lazily fetches each window in turn. Failed windows are yielded, not
    /// retried.
    pub fn stream<'a>(
        &'a self,
        instrument: &'a Instrument,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Stream<Item = DayBatch> + 'a {
        stream::iter(self.day_windows(since, until)).then(move |window| async move {
            let request = CandlesRequest {
                instrument_id: instrument.upstream_id.clone(),
                interval: self.interval,
                from: window.from,
                to: window.to,
            };
            let result = self.provider.fetch_candles(request).await;
            if !self.call_delay.is_zero() {
                tokio::time::sleep(self.call_delay).await;
            }
            DayBatch { window, result }
        })
    }

    /// Fetches `[since, until)` and gathers the candles. A failing window is
    /// logged and recorded, and the remaining windows still run.
    pub async fn fetch(
        &self,
        instrument: &Instrument,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> FetchOutcome {
        let batches: Vec<DayBatch> = self.stream(instrument, since, until).collect().await;
        let mut outcome = FetchOutcome::default();
        for batch in batches {
            match batch.result {
                Ok(candles) => {
                    debug!(
                        symbol = %instrument.symbol,
                        day = %batch.window.day,
                        count = candles.len(),
                        "window fetched"
                    );
                    outcome.candles.extend(candles);
                }
                Err(err) => {
                    warn!(
                        symbol = %instrument.symbol,
                        day = %batch.window.day,
                        error = %err,
                        "window failed; skipping"
                    );
                    outcome.failures.push(DayFailure {
                        day: batch.window.day,
                        message: err.to_string(),
                    });
                }
            }
        }
        outcome
    }
}
