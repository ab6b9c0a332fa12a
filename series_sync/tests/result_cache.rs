use series_sync::{
    analytics::{CorrelationRecord, GrowthRecord},
    results::ResultCache,
};

fn corr(a: &str, b: &str, r: Option<f64>) -> CorrelationRecord {
    CorrelationRecord {
        symbol_a: a.into(),
        symbol_b: b.into(),
        correlation: r,
    }
}

fn growth(symbol: &str, g: Option<f64>) -> GrowthRecord {
    GrowthRecord {
        symbol: symbol.into(),
        growth_percent: g,
    }
}

#[test]
fn stored_correlations_keep_their_wire_names() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path().join("corr.json"), dir.path().join("growth.json"));
    cache
        .store_correlations(&[corr("SBER", "GAZP", Some(0.75)), corr("SBER", "LKOH", None)])
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("corr.json")).unwrap()).unwrap();
    assert_eq!(raw[0]["ticker1"], "SBER");
    assert_eq!(raw[0]["ticker2"], "GAZP");
    assert!(raw[1]["correlation"].is_null());

    insta::assert_json_snapshot!(cache.load_correlations().unwrap(), @r###"
    [
      {
        "ticker1": "SBER",
        "ticker2": "GAZP",
        "correlation": 0.75
      },
      {
        "ticker1": "SBER",
        "ticker2": "LKOH",
        "correlation": null
      }
    ]
    "###);
}

#[test]
fn stored_growth_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path().join("corr.json"), dir.path().join("growth.json"));
    cache
        .store_growth(&[growth("SBER", Some(2.5)), growth("NEW", None), growth("LKOH", Some(-1.25))])
        .unwrap();

    insta::assert_json_snapshot!(cache.load_growth().unwrap(), @r###"
    [
      {
        "ticker": "SBER",
        "growth_percent": 2.5
      },
      {
        "ticker": "NEW",
        "growth_percent": null
      },
      {
        "ticker": "LKOH",
        "growth_percent": -1.25
      }
    ]
    "###);
}

#[test]
fn report_views_read_back_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let paths = (dir.path().join("corr.json"), dir.path().join("growth.json"));
    ResultCache::new(&paths.0, &paths.1)
        .store_correlations(&[
            corr("A", "B", Some(0.1)),
            corr("A", "C", Some(-0.8)),
            corr("B", "C", None),
            corr("B", "D", Some(0.45)),
        ])
        .unwrap();

    // A fresh handle sees what another process stored.
    let cache = ResultCache::new(&paths.0, &paths.1);
    let top: Vec<(String, String)> = cache
        .top_correlations(2)
        .unwrap()
        .into_iter()
        .map(|r| (r.symbol_a, r.symbol_b))
        .collect();
    assert_eq!(
        top,
        vec![("A".to_string(), "C".to_string()), ("B".to_string(), "D".to_string())]
    );

    let (up, down) = cache.growth_leaders(3).unwrap();
    assert!(up.is_empty() && down.is_empty());
}
