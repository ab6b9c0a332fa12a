pub mod candle;
pub mod interval;
pub mod request_params;
