use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::interval::CandleInterval;

/// Universal parameters for requesting candles for one instrument.
///
/// This is the standard input of every [`DataProvider`](crate::providers::DataProvider)
/// implementation. **Validation of the window width is performed by each
/// provider, according to its own API rules.**
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandlesRequest {
    /// Upstream instrument identifier (e.g. a FIGI such as `"BBG004730N88"`).
    pub instrument_id: String,

    /// Width of each requested candle.
    pub interval: CandleInterval,

    /// Start of the requested time range (inclusive, UTC).
    pub from: DateTime<Utc>,

    /// End of the requested time range (exclusive, UTC).
    pub to: DateTime<Utc>,
}
