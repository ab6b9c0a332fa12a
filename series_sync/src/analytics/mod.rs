//! Correlation and growth analytics over the stored series.
//!
//! [`Analyzer::analyze`] is the scheduled pass: it reads a trailing window of
//! every instrument, computes all retained pairwise correlations and each
//! instrument's growth, and replaces the result files. [`Analyzer::correlate`]
//! answers a single ad-hoc pair straight from the sheet.

pub mod correlation;
pub mod growth;

use std::fmt;

use anyhow::{Context, anyhow};
use indexmap::IndexMap;
use tracing::info;

pub use correlation::{
    Alignment, CorrelationRecord, compute_correlations, correlate, correlation_pairs, pearson,
    too_similar, top_correlations,
};
pub use growth::{GrowthRecord, compute_growth, growth_leaders, growth_percent};

use crate::{
    catalog::InstrumentCatalog,
    config::{AnalyticsConfig, SyncConfig},
    results::ResultCache,
    store::SeriesStore,
    table::SharedTable,
};

/// What one analytics pass produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSummary {
    pub instruments: usize,
    pub correlations: Vec<CorrelationRecord>,
    pub growth: Vec<GrowthRecord>,
}

/// Result of an ad-hoc pair correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct PairCorrelation {
    pub symbol_a: String,
    pub symbol_b: String,
    pub correlation: Option<f64>,
    /// Paired observations the coefficient was computed from.
    pub observations: usize,
}

impl fmt::Display for PairCorrelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.correlation {
            Some(r) => write!(
                f,
                "{} / {}: {:.4} over {} observations",
                self.symbol_a, self.symbol_b, r, self.observations
            ),
            None => write!(
                f,
                "{} / {}: undefined ({} shared observations)",
                self.symbol_a, self.symbol_b, self.observations
            ),
        }
    }
}

pub struct Analyzer {
    catalog: InstrumentCatalog,
    store: SeriesStore,
    settings: AnalyticsConfig,
    cache: ResultCache,
}

impl Analyzer {
    pub fn new(table: SharedTable, cfg: &SyncConfig) -> Self {
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
            settings: cfg.analytics.clone(),
            cache: ResultCache::from_config(&cfg.results),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Recomputes correlations and growth for every instrument and replaces
    /// the stored results.
    pub async fn analyze(&self) -> anyhow::Result<AnalysisSummary> {
        let instruments = self.catalog.resolve().await?;
        let mut series = IndexMap::new();
        for inst in &instruments {
            let s = self
                .store
                .read_series(inst, self.settings.window_rows)
                .await
                .with_context(|| format!("read series of {}", inst.symbol))?;
            series.insert(inst.symbol.clone(), s);
        }

        let correlations = compute_correlations(&series, self.settings.alignment);
        let growth = compute_growth(&series, self.settings.growth_periods);
        self.cache.store_correlations(&correlations)?;
        self.cache.store_growth(&growth)?;

        info!(
            instruments = instruments.len(),
            pairs = correlations.len(),
            "analytics pass complete"
        );
        Ok(AnalysisSummary {
            instruments: instruments.len(),
            correlations,
            growth,
        })
    }

    /// Correlation of two symbols over their most recent complete rows.
    /// Symbols are matched case-insensitively against the header.
    pub async fn correlate(
        &self,
        symbol_a: &str,
        symbol_b: &str,
    ) -> anyhow::Result<PairCorrelation> {
        let a = self
            .catalog
            .locate(symbol_a)
            .await?
            .ok_or_else(|| anyhow!("symbol {symbol_a:?} not found in the sheet header"))?;
        let b = self
            .catalog
            .locate(symbol_b)
            .await?
            .ok_or_else(|| anyhow!("symbol {symbol_b:?} not found in the sheet header"))?;

        let records = self
            .store
            .read_records(&[a.clone(), b.clone()], self.settings.on_demand_rows)
            .await
            .context("read series for on-demand correlation")?;
        let empty = Default::default();
        let sa = records.get(&a.symbol).unwrap_or(&empty);
        let sb = records.get(&b.symbol).unwrap_or(&empty);
        let (correlation, observations) = correlate(sa, sb, Alignment::Position);

        Ok(PairCorrelation {
            symbol_a: a.symbol,
            symbol_b: b.symbol,
            correlation,
            observations,
        })
    }
}
