//! Incremental candle sync into a spreadsheet-backed series store, plus
//! correlation and growth analytics over the stored series.
//!
//! Layers, leaves first:
//! - [`table`]: cell-level store trait with Google Sheets and in-memory backends.
//! - [`catalog`]: instruments discovered from the sheet header.
//! - [`store`]: per-instrument series read/append.
//! - [`fetcher`]: day-bounded candle retrieval from the market data gateway.
//! - [`engine`]: the sync pass and its transcript.
//! - [`analytics`] and [`results`]: correlation/growth and their JSON snapshots.

pub mod address;
pub mod analytics;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod results;
pub mod retry;
pub mod store;
pub mod table;
pub mod tz;

pub use config::{SyncConfig, load_config_path, load_config_str};
pub use engine::{SyncEngine, SyncReport};
pub use error::SyncError;
