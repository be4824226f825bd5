//! Per-symbol real-time analytics: one-minute OHLC candles and running VWAP.

mod candle;
mod engine;

pub use candle::Candle;
pub use engine::{Aggregator, EngineStats};
