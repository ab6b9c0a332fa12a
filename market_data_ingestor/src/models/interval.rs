//! Candle interval granularity.
//!
//! A [`CandleInterval`] is the sampling width of one candle. It knows its wire
//! name for the upstream API, its duration (used to advance sync watermarks)
//! and the widest request window the upstream accepts for it.
//!
//! ```
//! use market_data_ingestor::models::interval::CandleInterval;
//!
//! let iv: CandleInterval = "5m".parse().unwrap();
//! assert_eq!(iv, CandleInterval::FiveMinutes);
//! assert_eq!(iv.to_string(), "5m");
//! assert_eq!(iv.duration(), chrono::Duration::minutes(5));
//! ```

use std::{fmt, str::FromStr};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Invalid candle interval: {input} (expected e.g. 5s, 1m, 5m, 1h, 1D)")]
    InvalidInput { input: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CandleInterval {
    FiveSeconds,
    TenSeconds,
    ThirtySeconds,
    OneMinute,
    TwoMinutes,
    ThreeMinutes,
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    OneDay,
}

impl CandleInterval {
    /// Width of one candle.
    pub fn duration(self) -> Duration {
        match self {
            Self::FiveSeconds => Duration::seconds(5),
            Self::TenSeconds => Duration::seconds(10),
            Self::ThirtySeconds => Duration::seconds(30),
            Self::OneMinute => Duration::minutes(1),
            Self::TwoMinutes => Duration::minutes(2),
            Self::ThreeMinutes => Duration::minutes(3),
            Self::FiveMinutes => Duration::minutes(5),
            Self::TenMinutes => Duration::minutes(10),
            Self::FifteenMinutes => Duration::minutes(15),
            Self::ThirtyMinutes => Duration::minutes(30),
            Self::OneHour => Duration::hours(1),
            Self::OneDay => Duration::days(1),
        }
    }

    /// Enum name used by the T-Invest API.
    pub fn api_name(self) -> &'static str {
        match self {
            Self::FiveSeconds => "CANDLE_INTERVAL_5_SEC",
            Self::TenSeconds => "CANDLE_INTERVAL_10_SEC",
            Self::ThirtySeconds => "CANDLE_INTERVAL_30_SEC",
            Self::OneMinute => "CANDLE_INTERVAL_1_MIN",
            Self::TwoMinutes => "CANDLE_INTERVAL_2_MIN",
            Self::ThreeMinutes => "CANDLE_INTERVAL_3_MIN",
            Self::FiveMinutes => "CANDLE_INTERVAL_5_MIN",
            Self::TenMinutes => "CANDLE_INTERVAL_10_MIN",
            Self::FifteenMinutes => "CANDLE_INTERVAL_15_MIN",
            Self::ThirtyMinutes => "CANDLE_INTERVAL_30_MIN",
            Self::OneHour => "CANDLE_INTERVAL_HOUR",
            Self::OneDay => "CANDLE_INTERVAL_DAY",
        }
    }

    /// Widest `[from, to)` span a single request may cover at this interval.
    ///
    /// Sub-minute intervals are capped well below one trading session, so
    /// callers page a session into several requests for them.
    pub fn max_request_window(self) -> Duration {
        match self {
            Self::FiveSeconds | Self::TenSeconds => Duration::minutes(200),
            Self::ThirtySeconds => Duration::hours(20),
            Self::OneMinute | Self::TwoMinutes | Self::ThreeMinutes => Duration::days(1),
            Self::FiveMinutes | Self::TenMinutes => Duration::weeks(1),
            Self::FifteenMinutes | Self::ThirtyMinutes => Duration::weeks(3),
            Self::OneHour => Duration::days(90),
            Self::OneDay => Duration::days(6 * 365),
        }
    }
}

/// Display/parse for config ergonomics (`"5s"`, `"5m"`, `"1h"`, `"1D"`)
impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FiveSeconds => "5s",
            Self::TenSeconds => "10s",
            Self::ThirtySeconds => "30s",
            Self::OneMinute => "1m",
            Self::TwoMinutes => "2m",
            Self::ThreeMinutes => "3m",
            Self::FiveMinutes => "5m",
            Self::TenMinutes => "10m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::OneDay => "1D",
        };
        f.write_str(s)
    }
}

impl FromStr for CandleInterval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let iv = match s.trim() {
            "5s" => Self::FiveSeconds,
            "10s" => Self::TenSeconds,
            "30s" => Self::ThirtySeconds,
            "1m" => Self::OneMinute,
            "2m" => Self::TwoMinutes,
            "3m" => Self::ThreeMinutes,
            "5m" => Self::FiveMinutes,
            "10m" => Self::TenMinutes,
            "15m" => Self::FifteenMinutes,
            "30m" => Self::ThirtyMinutes,
            "1h" => Self::OneHour,
            "1D" | "1d" => Self::OneDay,
            other => {
                return Err(IntervalError::InvalidInput {
                    input: other.to_string(),
                });
            }
        };
        Ok(iv)
    }
}

impl TryFrom<String> for CandleInterval {
    type Error = IntervalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CandleInterval> for String {
    fn from(value: CandleInterval) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [CandleInterval; 12] = [
        CandleInterval::FiveSeconds,
        CandleInterval::TenSeconds,
        CandleInterval::ThirtySeconds,
        CandleInterval::OneMinute,
        CandleInterval::TwoMinutes,
        CandleInterval::ThreeMinutes,
        CandleInterval::FiveMinutes,
        CandleInterval::TenMinutes,
        CandleInterval::FifteenMinutes,
        CandleInterval::ThirtyMinutes,
        CandleInterval::OneHour,
        CandleInterval::OneDay,
    ];

    #[test]
    fn display_parses_back() {
        for iv in ALL {
            assert_eq!(iv.to_string().parse::<CandleInterval>().unwrap(), iv);
        }
    }

    #[test]
    fn request_window_always_covers_at_least_one_candle() {
        for iv in ALL {
            assert!(iv.max_request_window() >= iv.duration(), "{iv}");
        }
    }

    #[test]
    fn five_minutes_maps_to_api_enum() {
        assert_eq!(CandleInterval::FiveMinutes.api_name(), "CANDLE_INTERVAL_5_MIN");
    }

    #[test]
    fn rejects_unknown_unit() {
        let err = "7x".parse::<CandleInterval>().unwrap_err();
        assert_eq!(
            err,
            IntervalError::InvalidInput {
                input: "7x".to_string()
            }
        );
    }

    #[test]
    fn deserializes_from_config_string() {
        #[derive(Deserialize)]
        struct Holder {
            interval: CandleInterval,
        }
        let h: Holder = serde_json::from_str(r#"{"interval":"15m"}"#).unwrap();
        assert_eq!(h.interval, CandleInterval::FifteenMinutes);
    }
}
