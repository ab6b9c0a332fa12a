use async_trait::async_trait;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{candle::Candle, request_params::CandlesRequest},
    providers::{
        ApiSnafu, ClientBuildSnafu, DataProvider, InvalidTokenSnafu, ProviderError,
        ProviderInitError, ReqwestSnafu,
        tinvest_rest::{
            params::{GetCandlesBody, validate_request},
            response::{ApiErrorBody, GetCandlesResponse},
        },
    },
};

pub const DEFAULT_BASE_URL: &str = "https://invest-public-api.tinkoff.ru/rest";

const GET_CANDLES_METHOD: &str =
    "tinkoff.public.invest.api.contract.v1.MarketDataService/GetCandles";

pub struct TInvestProvider {
    client: Client,
    base_url: String,
}

impl TInvestProvider {
    /// Creates a provider against the public production gateway.
    ///
    /// The token is handed in by the caller; this type never reads the environment.
    pub fn new(token: &SecretString) -> Result<Self, ProviderInitError> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Same as [`TInvestProvider::new`] against another gateway (sandbox, proxy, test server).
    pub fn with_base_url(
        token: &SecretString,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderInitError> {
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .context(InvalidTokenSnafu)?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, GET_CANDLES_METHOD)
    }
}

#[async_trait]
impl DataProvider for TInvestProvider {
    async fn fetch_candles(&self, request: CandlesRequest) -> Result<Vec<Candle>, ProviderError> {
        // Validate the window before spending a rate-limited call on it.
        validate_request(&request)?;

        let response = self
            .client
            .post(self.endpoint())
            .json(&GetCandlesBody::from(&request))
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.to_string())
                .unwrap_or(text);
            return ApiSnafu {
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        let payload = response
            .json::<GetCandlesResponse>()
            .await
            .context(ReqwestSnafu)?;

        debug!(
            instrument = %request.instrument_id,
            from = %request.from,
            to = %request.to,
            count = payload.candles.len(),
            "fetched candles"
        );

        Ok(payload.candles.into_iter().map(Candle::from).collect())
    }
}
