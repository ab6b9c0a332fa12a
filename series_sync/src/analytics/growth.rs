//! Trailing growth per instrument.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::store::PriceSeries;

/// Percent change of one instrument over the trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRecord {
    #[serde(rename = "ticker")]
    pub symbol: String,
    pub growth_percent: Option<f64>,
}

/// Percent change between the value `periods` observations ago and the
/// latest one, ignoring missing points.
///
/// `None` when fewer than `periods + 1` observations exist or the base price
/// is zero.
pub fn growth_percent(prices: &[Option<f64>], periods: usize) -> Option<f64> {
    let values: Vec<f64> = prices.iter().flatten().copied().collect();
    let needed = periods.checked_add(1)?;
    if values.len() < needed {
        return None;
    }
    let first = values[values.len() - needed];
    let last = values[values.len() - 1];
    if first == 0.0 {
        return None;
    }
    Some((last - first) / first * 100.0)
}

pub fn compute_growth(series: &IndexMap<String, PriceSeries>, periods: usize) -> Vec<GrowthRecord> {
    series
        .iter()
        .map(|(symbol, s)| GrowthRecord {
            symbol: symbol.clone(),
            growth_percent: growth_percent(&s.prices(), periods),
        })
        .collect()
}

/// Top `n` risers (largest first) and top `n` fallers (steepest first).
/// Flat and undefined records are in neither list.
pub fn growth_leaders(
    records: &[GrowthRecord],
    n: usize,
) -> (Vec<GrowthRecord>, Vec<GrowthRecord>) {
    let value = |r: &GrowthRecord| r.growth_percent.unwrap_or_default();

    let mut up: Vec<GrowthRecord> = records
        .iter()
        .filter(|r| r.growth_percent.is_some_and(|g| g > 0.0))
        .cloned()
        .collect();
    up.sort_by(|a, b| value(b).total_cmp(&value(a)));
    up.truncate(n);

    let mut down: Vec<GrowthRecord> = records
        .iter()
        .filter(|r| r.growth_percent.is_some_and(|g| g < 0.0))
        .cloned()
        .collect();
    down.sort_by(|a, b| value(a).total_cmp(&value(b)));
    down.truncate(n);

    (up, down)
}
