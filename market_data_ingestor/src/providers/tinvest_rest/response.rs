use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::models::candle::Candle;

/// Fixed-point price as the gateway encodes it: whole `units` plus `nano`
/// billionths, both carrying the sign of the value.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quotation {
    #[serde(default, deserialize_with = "de_int64")]
    pub units: i64,
    #[serde(default)]
    pub nano: i32,
}

impl From<Quotation> for Decimal {
    fn from(q: Quotation) -> Self {
        (Decimal::from(q.units) + Decimal::new(i64::from(q.nano), 9)).normalize()
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HistoricCandle {
    #[serde(default)]
    pub open: Quotation,
    #[serde(default)]
    pub high: Quotation,
    #[serde(default)]
    pub low: Quotation,
    pub close: Quotation,
    #[serde(default, deserialize_with = "de_int64")]
    pub volume: i64,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub is_complete: bool,
}

impl From<HistoricCandle> for Candle {
    fn from(hc: HistoricCandle) -> Self {
        Candle {
            timestamp: hc.time,
            open: hc.open.into(),
            high: hc.high.into(),
            low: hc.low.into(),
            close: hc.close.into(),
            volume: hc.volume,
            is_complete: hc.is_complete,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct GetCandlesResponse {
    #[serde(default)]
    pub candles: Vec<HistoricCandle>,
}

/// Error payload of a non-2xx gateway answer.
#[derive(Deserialize, Debug)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)?;
        if let Some(d) = self.description.as_deref().filter(|d| !d.is_empty()) {
            write!(f, " ({d})")?;
        }
        Ok(())
    }
}

// int64 fields arrive as JSON strings from the gateway; accept plain numbers too.
fn de_int64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64Repr {
        Number(i64),
        Text(String),
    }

    match Int64Repr::deserialize(deserializer)? {
        Int64Repr::Number(n) => Ok(n),
        Int64Repr::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn quotation_to_decimal() {
        let q = Quotation {
            units: 114,
            nano: 250_000_000,
        };
        assert_eq!(Decimal::from(q), Decimal::new(11425, 2));

        let negative = Quotation {
            units: -1,
            nano: -500_000_000,
        };
        assert_eq!(Decimal::from(negative), Decimal::new(-15, 1));
    }

    #[test]
    fn parses_gateway_payload() {
        let body = r#"{
            "candles": [
                {
                    "open": {"units": "280", "nano": 100000000},
                    "high": {"units": "281", "nano": 0},
                    "low": {"units": "279", "nano": 900000000},
                    "close": {"units": "280", "nano": 550000000},
                    "volume": "1532",
                    "time": "2025-03-12T07:00:00Z",
                    "isComplete": true
                },
                {
                    "close": {"units": 281},
                    "time": "2025-03-12T07:05:00Z"
                }
            ]
        }"#;

        let parsed: GetCandlesResponse = serde_json::from_str(body).unwrap();
        let candles: Vec<Candle> = parsed.candles.into_iter().map(Candle::from).collect();

        assert_eq!(candles.len(), 2);
        assert_eq!(
            candles[0].timestamp,
            Utc.with_ymd_and_hms(2025, 3, 12, 7, 0, 0).unwrap()
        );
        assert_eq!(candles[0].close, Decimal::new(28055, 2));
        assert_eq!(candles[0].volume, 1532);
        assert!(candles[0].is_complete);
        assert_eq!(candles[1].close, Decimal::from(281));
        assert!(!candles[1].is_complete);
    }

    #[test]
    fn empty_payload_has_no_candles() {
        let parsed: GetCandlesResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candles.is_empty());
    }

    #[test]
    fn error_body_display() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"code": 3, "message": "30014", "description": "the maximum request period for the given candle interval has been exceeded"}"#,
        )
        .unwrap();
        assert_eq!(
            body.to_string(),
            "code 3: 30014 (the maximum request period for the given candle interval has been exceeded)"
        );
    }
}
