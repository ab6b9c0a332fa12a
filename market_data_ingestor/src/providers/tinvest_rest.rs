//! T-Invest REST gateway (`MarketDataService/GetCandles`).

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{DEFAULT_BASE_URL, TInvestProvider};
