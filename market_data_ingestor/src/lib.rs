//! Vendor-agnostic candle models plus the provider implementations that fill them.
//!
//! - [`models`] holds the canonical [`Candle`](models::candle::Candle), the
//!   [`CandleInterval`](models::interval::CandleInterval) granularity and the
//!   request parameters shared by every provider.
//! - [`providers`] defines the [`DataProvider`](providers::DataProvider) trait and
//!   the T-Invest REST implementation.

pub mod models;
pub mod providers;
