//! Provider abstraction for market data sources.
//!
//! This module defines the [`DataProvider`] trait, which serves as a unified interface
//! for fetching candles from any brokerage data API (e.g., T-Invest).
//!
//! Each concrete provider implementation should implement [`DataProvider`] to
//! handle vendor-specific API logic and validation.
//!
//! The trait is designed for async usage and supports dynamic dispatch (`dyn DataProvider`)
//! for runtime selection of providers.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::models::{candle::Candle, request_params::CandlesRequest};
//! use market_data_ingestor::providers::{DataProvider, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl DataProvider for MyProvider {
//!     async fn fetch_candles(
//!         &self,
//!         _request: CandlesRequest,
//!     ) -> Result<Vec<Candle>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```
//!

pub mod tinvest_rest;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::{candle::Candle, request_params::CandlesRequest};

/// Trait for fetching candles from a market data provider.
///
/// Implement this trait for each concrete data vendor.
#[async_trait]
pub trait DataProvider {
    /// Fetches the candles of one instrument for the given request window.
    ///
    /// # Arguments
    ///
    /// * `request` - The instrument, interval, and `[from, to)` range.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Candle>)` - Candles in the order the vendor returned them.
    /// * `Err(ProviderError)` - If validation, transport or decoding fails.
    async fn fetch_candles(&self, request: CandlesRequest) -> Result<Vec<Candle>, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API token contains invalid characters.
    #[snafu(display("Invalid API token format: {source}"))]
    InvalidToken {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `DataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider's API answered with a non-success status.
    #[snafu(display("API error (HTTP {status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An internal error occurred while processing data within the provider.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use crate::models::interval::CandleInterval;

    use super::*;

    struct FixedProvider;
    struct FailingProvider;

    #[async_trait]
    impl DataProvider for FixedProvider {
        async fn fetch_candles(&self, request: CandlesRequest) -> Result<Vec<Candle>, ProviderError> {
            Ok(vec![Candle::flat(request.from, Decimal::new(105, 1))])
        }
    }

    #[async_trait]
    impl DataProvider for FailingProvider {
        async fn fetch_candles(&self, _request: CandlesRequest) -> Result<Vec<Candle>, ProviderError> {
            ApiSnafu {
                status: 429u16,
                message: "rate limited",
            }
            .fail()
        }
    }

    // The runtime picks a provider by name; only possible through `Box<dyn DataProvider>`.
    fn get_provider(name: &str) -> Box<dyn DataProvider + Send + Sync> {
        if name == "fixed" {
            Box::new(FixedProvider)
        } else {
            Box::new(FailingProvider)
        }
    }

    fn request() -> CandlesRequest {
        let from = Utc.with_ymd_and_hms(2025, 3, 12, 7, 0, 0).unwrap();
        CandlesRequest {
            instrument_id: "BBG004730N88".to_string(),
            interval: CandleInterval::FiveMinutes,
            from,
            to: from + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn dynamic_provider_returns_candles() {
        let provider = get_provider("fixed");
        let candles = provider.fetch_candles(request()).await.unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, Decimal::new(105, 1));
    }

    #[tokio::test]
    async fn api_error_carries_status() {
        let provider = get_provider("failing");
        let err = provider.fetch_candles(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "API error (HTTP 429): rate limited");
    }
}
