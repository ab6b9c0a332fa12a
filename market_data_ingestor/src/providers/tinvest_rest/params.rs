use chrono::{DateTime, Utc};
use serde::Serialize;
use snafu::ensure;

use crate::{
    models::request_params::CandlesRequest,
    providers::{ProviderError, ValidationSnafu},
};

/// JSON body of a `GetCandles` call.
#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetCandlesBody<'a> {
    pub instrument_id: &'a str,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub interval: &'static str,
}

impl<'a> From<&'a CandlesRequest> for GetCandlesBody<'a> {
    fn from(request: &'a CandlesRequest) -> Self {
        Self {
            instrument_id: &request.instrument_id,
            from: request.from,
            to: request.to,
            interval: request.interval.api_name(),
        }
    }
}

/// Rejects requests the gateway would refuse anyway: blank ids, inverted
/// windows, or windows wider than the interval allows.
pub fn validate_request(request: &CandlesRequest) -> Result<(), ProviderError> {
    ensure!(
        !request.instrument_id.trim().is_empty(),
        ValidationSnafu {
            message: "instrument id is empty"
        }
    );
    ensure!(
        request.from < request.to,
        ValidationSnafu {
            message: format!("empty window {} .. {}", request.from, request.to)
        }
    );
    let max = request.interval.max_request_window();
    ensure!(
        request.to - request.from <= max,
        ValidationSnafu {
            message: format!(
                "window of {} minutes exceeds the {} limit of {} minutes",
                (request.to - request.from).num_minutes(),
                request.interval,
                max.num_minutes()
            )
        }
    );
    Ok(())
}
