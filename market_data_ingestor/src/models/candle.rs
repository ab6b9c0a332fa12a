//! Canonical in-memory representation of a price candle.
//!
//! This struct is the standard output of every [`DataProvider`](crate::providers::DataProvider)
//! implementation, whatever the vendor wire format looks like.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A single aggregated price observation over one sampling interval.
///
/// Prices are kept as [`Decimal`] so that vendor fixed-point quotes survive
/// without binary rounding until they are rendered into storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candle {
    /// Start of the interval this candle covers (UTC).
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: Decimal,

    /// Highest price during the interval.
    pub high: Decimal,

    /// Lowest price during the interval.
    pub low: Decimal,

    /// Closing price.
    pub close: Decimal,

    /// Volume in lots.
    pub volume: i64,

    /// `false` while the interval is still open on the vendor side.
    pub is_complete: bool,
}

impl Candle {
    /// A flat candle where every price equals `close`. Handy for feeds that only
    /// publish a last price, and for fixtures.
    pub fn flat(timestamp: DateTime<Utc>, close: Decimal) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
            is_complete: true,
        }
    }
}
