//! Time zone helpers for the series store.
//!
//! The store keeps timestamps as local wall-clock strings in a fixed format
//! ([`STAMP_FORMAT`], e.g. `"2025-03-12 10:05:00"`) in the configured exchange
//! time zone. Everything else works in UTC:
//! - [`format_stamp`] renders a UTC instant into the stored string.
//! - [`parse_stamp`] reads a stored cell back, tolerating a few legacy shapes.
//! - [`local_instant`] places a local wall time (session open, session close)
//!   on a calendar day.
//!
//! Moscow has kept UTC+3 all year since 2014, but older history and other
//! configured zones still have clock changes. A wall time repeated by a
//! fall-back resolves to its earlier instant; one skipped by a spring-forward
//! moves to the first valid minute after the gap.

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, offset::LocalResult};
use chrono_tz::Tz;

/// Layout of every timestamp cell written by the sync.
pub const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shorter layout produced when a spreadsheet reformats a cell.
const STAMP_FORMAT_MINUTES: &str = "%Y-%m-%d %H:%M";

/// Longest clock jump searched when a wall time falls into a gap.
const MAX_GAP_MINUTES: i64 = 120;

fn resolve_local(naive: NaiveDateTime, tz: Tz) -> anyhow::Result<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
        LocalResult::None => (1..=MAX_GAP_MINUTES)
            .find_map(|m| {
                match tz.from_local_datetime(&(naive + chrono::Duration::minutes(m))) {
                    LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt),
                    LocalResult::None => None,
                }
            })
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| anyhow!("nonexistent local time {naive} in {tz}")),
    }
}

/// UTC instant of `time` on local calendar day `day`.
pub fn local_instant(day: NaiveDate, time: NaiveTime, tz: Tz) -> anyhow::Result<DateTime<Utc>> {
    resolve_local(day.and_time(time), tz)
        .with_context(|| format!("cannot place {time} on {day} in {tz}"))
}

/// Local calendar day of a UTC instant.
pub fn local_day(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Render a UTC instant as the stored local timestamp string.
pub fn format_stamp(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format(STAMP_FORMAT).to_string()
}

/// Parse a stored timestamp cell back into UTC.
///
/// Accepts [`STAMP_FORMAT`], the same without seconds, and RFC 3339 with an
/// explicit offset. Anything else is `None`; callers treat it as missing.
pub fn parse_stamp(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, STAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, STAMP_FORMAT_MINUTES))
        .ok()?;
    resolve_local(naive, tz).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_in_exchange_time() {
        // 07:05Z is 10:05 in Moscow (UTC+3, no DST).
        let t = Utc.with_ymd_and_hms(2025, 3, 12, 7, 5, 0).unwrap();
        assert_eq!(format_stamp(t, chrono_tz::Europe::Moscow), "2025-03-12 10:05:00");
    }

    #[test]
    fn parse_accepts_stored_and_legacy_shapes() {
        let tz = chrono_tz::Europe::Moscow;
        let want = Utc.with_ymd_and_hms(2025, 3, 12, 7, 5, 0).unwrap();
        assert_eq!(parse_stamp("2025-03-12 10:05:00", tz), Some(want));
        assert_eq!(parse_stamp(" 2025-03-12 10:05 ", tz), Some(want));
        assert_eq!(parse_stamp("2025-03-12T10:05:00+03:00", tz), Some(want));
        assert_eq!(parse_stamp("", tz), None);
        assert_eq!(parse_stamp("12.03.2025", tz), None);
    }

    #[test]
    fn format_then_parse_is_stable() {
        let tz = chrono_tz::Europe::Moscow;
        let t = Utc.with_ymd_and_hms(2024, 12, 31, 15, 40, 0).unwrap();
        assert_eq!(parse_stamp(&format_stamp(t, tz), tz), Some(t));
    }

    #[test]
    fn skipped_wall_time_moves_past_the_gap() {
        // Moscow jumped from 02:00 MSK to 03:00 MSD on 2010-03-28.
        let tz = chrono_tz::Europe::Moscow;
        let want = Utc.with_ymd_and_hms(2010, 3, 27, 23, 0, 0).unwrap();
        assert_eq!(parse_stamp("2010-03-28 02:30:00", tz), Some(want));
        let day = NaiveDate::from_ymd_opt(2010, 3, 28).unwrap();
        let gap = NaiveTime::from_hms_opt(2, 15, 0).unwrap();
        assert_eq!(local_instant(day, gap, tz).unwrap(), want);
    }

    #[test]
    fn repeated_wall_time_takes_the_earlier_instant() {
        // 02:30 happened twice on 2010-10-31: at UTC+4, then at UTC+3.
        let tz = chrono_tz::Europe::Moscow;
        assert_eq!(
            parse_stamp("2010-10-31 02:30:00", tz),
            Some(Utc.with_ymd_and_hms(2010, 10, 30, 22, 30, 0).unwrap())
        );
    }

    #[test]
    fn session_bounds_stay_on_utc_plus_three() {
        let tz = chrono_tz::Europe::Moscow;
        let open = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let close = NaiveTime::from_hms_opt(18, 45, 0).unwrap();
        // Old clock-change weekends no longer shift the session.
        for (m, d) in [(3, 30), (10, 26)] {
            let day = NaiveDate::from_ymd_opt(2025, m, d).unwrap();
            let from = local_instant(day, open, tz).unwrap();
            let to = local_instant(day, close, tz).unwrap();
            assert_eq!(from, Utc.with_ymd_and_hms(2025, m, d, 7, 0, 0).unwrap());
            assert_eq!(to - from, chrono::Duration::minutes(525));
        }
    }

    #[test]
    fn session_open_in_moscow() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let open = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let got = local_instant(day, open, chrono_tz::Europe::Moscow).unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2025, 3, 12, 7, 0, 0).unwrap());
        assert_eq!(local_day(got, chrono_tz::Europe::Moscow), day);
    }
}
