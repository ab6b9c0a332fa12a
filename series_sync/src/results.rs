//! JSON result files for the latest analytics pass.
//!
//! Each file is a complete snapshot; a pass replaces it by writing a temp file
//! next to it and renaming over the old one, so readers never see a partial
//! document.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{info, warn};

use crate::{
    analytics::{CorrelationRecord, GrowthRecord, growth_leaders, top_correlations},
    config::ResultsConfig,
};

pub struct ResultCache {
    correlations_path: PathBuf,
    growth_path: PathBuf,
}

impl ResultCache {
    pub fn new(correlations_path: impl Into<PathBuf>, growth_path: impl Into<PathBuf>) -> Self {
        Self {
            correlations_path: correlations_path.into(),
            growth_path: growth_path.into(),
        }
    }

    pub fn from_config(cfg: &ResultsConfig) -> Self {
        Self::new(&cfg.correlations_path, &cfg.growth_path)
    }

    pub fn store_correlations(&self, records: &[CorrelationRecord]) -> anyhow::Result<()> {
        write_atomic(&self.correlations_path, records)
    }

    pub fn store_growth(&self, records: &[GrowthRecord]) -> anyhow::Result<()> {
        write_atomic(&self.growth_path, records)
    }

    /// Last stored correlations; empty when no pass has run yet.
    pub fn load_correlations(&self) -> anyhow::Result<Vec<CorrelationRecord>> {
        read_or_empty(&self.correlations_path)
    }

    /// Last stored growth figures; empty when no pass has run yet.
    pub fn load_growth(&self) -> anyhow::Result<Vec<GrowthRecord>> {
        read_or_empty(&self.growth_path)
    }

    /// Strongest stored correlations by magnitude.
    pub fn top_correlations(&self, n: usize) -> anyhow::Result<Vec<CorrelationRecord>> {
        Ok(top_correlations(&self.load_correlations()?, n))
    }

    /// Stored growth leaders: `(risers, fallers)`.
    pub fn growth_leaders(
        &self,
        n: usize,
    ) -> anyhow::Result<(Vec<GrowthRecord>, Vec<GrowthRecord>)> {
        Ok(growth_leaders(&self.load_growth()?, n))
    }
}

fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let body = serde_json::to_vec_pretty(value).context("serialize results")?;

    // Atomic write: write to temp, then rename.
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &body).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace {} with {}", path.display(), tmp_path.display()))?;
    info!(path = %path.display(), bytes = body.len(), "stored results");
    Ok(())
}

fn read_or_empty<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let body = match fs::read(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "no stored results yet");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    serde_json::from_slice(&body).with_context(|| format!("parse {}", path.display()))
}
