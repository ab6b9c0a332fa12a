use thiserror::Error;

use crate::table::TableError;

/// Failures of a sync or analytics pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A store call failed after whatever retries apply to it.
    #[error(transparent)]
    Table(#[from] TableError),

    /// The run cannot start: bad layout, empty catalog, unreadable metadata.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Writes for one instrument kept failing; other instruments are unaffected.
    #[error("append for {symbol} failed after {attempts} attempts: {source}")]
    AppendExhausted {
        symbol: String,
        attempts: u32,
        #[source]
        source: TableError,
    },
}
