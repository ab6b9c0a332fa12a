//! Pairwise Pearson correlation between stored price series.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::store::PriceSeries;

/// How two series are paired before correlating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Pair rows by their offset from the end of each trailing window.
    #[default]
    Position,
    /// Pair rows whose timestamp cells are identical.
    Timestamp,
}

/// One unordered pair and its coefficient. `None` when the pair shares no
/// usable observations or the coefficient is undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    #[serde(rename = "ticker1")]
    pub symbol_a: String,
    #[serde(rename = "ticker2")]
    pub symbol_b: String,
    pub correlation: Option<f64>,
}

/// Pairs that would only correlate a share class with itself: equal
/// symbols, or one symbol a prefix of the other (`SBER` / `SBERP`).
pub fn too_similar(a: &str, b: &str) -> bool {
    a == b || a.starts_with(b) || b.starts_with(a)
}

/// Index pairs `(i, j)`, `i < j`, of symbols worth correlating, in catalog order.
pub fn correlation_pairs<S: AsRef<str>>(symbols: &[S]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for i in 0..symbols.len() {
        for j in i + 1..symbols.len() {
            if !too_similar(symbols[i].as_ref(), symbols[j].as_ref()) {
                out.push((i, j));
            }
        }
    }
    out
}

/// Pearson correlation coefficient of two equally long samples.
///
/// `None` for fewer than two points, mismatched lengths, or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 2 || n != ys.len() {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

/// Pairs rows by offset from the newest row and drops pairs with a gap.
pub fn align_by_position(a: &PriceSeries, b: &PriceSeries) -> (Vec<f64>, Vec<f64>) {
    let n = a.points.len().min(b.points.len());
    let a_tail = &a.points[a.points.len() - n..];
    let b_tail = &b.points[b.points.len() - n..];
    a_tail
        .iter()
        .zip(b_tail)
        .filter_map(|(pa, pb)| Some((pa.price?, pb.price?)))
        .unzip()
}

/// Pairs rows with identical timestamp cells, in `a`'s order. When `b`
/// repeats a timestamp its first row is used.
pub fn align_by_timestamp(a: &PriceSeries, b: &PriceSeries) -> (Vec<f64>, Vec<f64>) {
    let mut by_stamp: HashMap<&str, Option<f64>> = HashMap::new();
    for p in &b.points {
        if let Some(stamp) = p.stamp.as_deref() {
            by_stamp.entry(stamp).or_insert(p.price);
        }
    }
    a.points
        .iter()
        .filter_map(|pa| {
            let stamp = pa.stamp.as_deref()?;
            let pb = (*by_stamp.get(stamp)?)?;
            Some((pa.price?, pb))
        })
        .unzip()
}

/// Coefficient of two series under `alignment`, plus the number of paired
/// observations it was computed from.
pub fn correlate(a: &PriceSeries, b: &PriceSeries, alignment: Alignment) -> (Option<f64>, usize) {
    let (xs, ys) = match alignment {
        Alignment::Position => align_by_position(a, b),
        Alignment::Timestamp => align_by_timestamp(a, b),
    };
    (pearson(&xs, &ys), xs.len())
}

/// One record per retained pair of `series`, in catalog order.
pub fn compute_correlations(
    series: &IndexMap<String, PriceSeries>,
    alignment: Alignment,
) -> Vec<CorrelationRecord> {
    let symbols: Vec<&String> = series.keys().collect();
    correlation_pairs(&symbols)
        .into_iter()
        .map(|(i, j)| {
            let (correlation, _) = correlate(&series[i], &series[j], alignment);
            CorrelationRecord {
                symbol_a: symbols[i].clone(),
                symbol_b: symbols[j].clone(),
                correlation,
            }
        })
        .collect()
}

/// The `n` defined records with the largest `|r|`, strongest first.
pub fn top_correlations(records: &[CorrelationRecord], n: usize) -> Vec<CorrelationRecord> {
    let mut defined: Vec<&CorrelationRecord> = records
        .iter()
        .filter(|r| r.correlation.is_some_and(f64::is_finite))
        .collect();
    defined.sort_by(|a, b| {
        let ka = a.correlation.unwrap_or_default().abs();
        let kb = b.correlation.unwrap_or_default().abs();
        kb.total_cmp(&ka)
    });
    defined.into_iter().take(n).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SeriesPoint;

    fn series(points: &[(&str, Option<f64>)]) -> PriceSeries {
        PriceSeries {
            points: points
                .iter()
                .map(|(s, p)| SeriesPoint {
                    stamp: Some(s.to_string()),
                    price: *p,
                })
                .collect(),
        }
    }

    #[test]
    fn prefix_pairs_are_excluded() {
        assert!(too_similar("SBER", "SBERP"));
        assert!(too_similar("SBERP", "SBER"));
        assert!(too_similar("GAZP", "GAZP"));
        assert!(!too_similar("SBER", "GAZP"));
        assert_eq!(correlation_pairs(&["SBER", "SBERP", "GAZP"]), vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn pearson_known_values() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn position_alignment_pairs_newest_rows_and_drops_gaps() {
        let a = series(&[("t0", Some(9.0)), ("t1", Some(1.0)), ("t2", None), ("t3", Some(3.0))]);
        let b = series(&[("x1", Some(10.0)), ("x2", Some(20.0)), ("x3", Some(30.0))]);
        let (xs, ys) = align_by_position(&a, &b);
        assert_eq!(xs, vec![1.0, 3.0]);
        assert_eq!(ys, vec![10.0, 30.0]);
    }

    #[test]
    fn position_alignment_without_overlap_is_undefined() {
        let a = series(&[("t1", Some(1.0)), ("t2", None)]);
        let b = series(&[("t1", None), ("t2", Some(2.0))]);
        assert_eq!(align_by_position(&a, &b), (vec![], vec![]));
        assert_eq!(correlate(&a, &b, Alignment::Position), (None, 0));
        assert_eq!(correlate(&a, &b, Alignment::Timestamp), (None, 0));
    }

    #[test]
    fn timestamp_alignment_joins_on_stamp() {
        let a = series(&[("t1", Some(1.0)), ("t2", Some(2.0)), ("t3", Some(3.0))]);
        let b = series(&[("t3", Some(30.0)), ("t1", Some(10.0)), ("t9", Some(90.0))]);
        let (xs, ys) = align_by_timestamp(&a, &b);
        assert_eq!(xs, vec![1.0, 3.0]);
        assert_eq!(ys, vec![10.0, 30.0]);
    }

    #[test]
    fn top_correlations_rank_by_magnitude() {
        let rec = |a: &str, r: Option<f64>| CorrelationRecord {
            symbol_a: a.into(),
            symbol_b: "Z".into(),
            correlation: r,
        };
        let records = vec![
            rec("A", Some(0.2)),
            rec("B", Some(-0.9)),
            rec("C", None),
            rec("D", Some(0.5)),
        ];
        let top: Vec<String> = top_correlations(&records, 2)
            .into_iter()
            .map(|r| r.symbol_a)
            .collect();
        assert_eq!(top, vec!["B", "D"]);
    }
}
