//! The aggregation engine: owns all per-symbol analytics state.
//!
//! A single `parking_lot::RwLock` guards one consistency domain (candles,
//! VWAP accumulators, last-seen trades): every `process` call is one write
//! critical section, so readers see each trade either fully applied or not at
//! all. Critical sections are map lookups and arithmetic only, no I/O.

use std::collections::{hash_map::Entry, HashMap};

use chrono::DateTime;
use parking_lot::RwLock;
use serde::Serialize;

use super::candle::Candle;
use crate::models::Trade;

/// Running VWAP accumulator for one symbol, over its full trade history.
#[derive(Debug, Clone, Copy, Default)]
struct VwapState {
    total_pv: f64,
    total_volume: f64,
}

#[derive(Default)]
struct EngineState {
    /// symbol -> minute bucket (unix seconds) -> candle
    candles: HashMap<String, HashMap<i64, Candle>>,
    vwaps: HashMap<String, VwapState>,
    /// Most recently processed trade per symbol, kept only for the
    /// immediate-repeat dedup check.
    last_trades: HashMap<String, Trade>,
    trades_processed: u64,
    duplicates_dropped: u64,
}

/// Counters and sizes exposed through the stats endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EngineStats {
    pub symbols: usize,
    pub candles: usize,
    pub trades_processed: u64,
    pub duplicates_dropped: u64,
}

/// Thread-safe holder of the market analytics state.
pub struct Aggregator {
    state: RwLock<EngineState>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
        }
    }

    /// Fold a trade into the analytics. The sole mutator.
    ///
    /// An incoming trade identical to the immediately preceding trade for its
    /// symbol (same timestamp, price, quantity) is dropped without effect.
    /// The dropped trade does not replace the last-seen entry, so a second
    /// consecutive repeat is still recognised as a duplicate of the original.
    /// Duplicates separated by an intervening distinct trade are not caught.
    pub fn process(&self, trade: Trade) {
        let mut guard = self.state.write();
        let state = &mut *guard;

        if let Some(last) = state.last_trades.get(&trade.symbol) {
            if last.timestamp == trade.timestamp
                && last.price == trade.price
                && last.quantity == trade.quantity
            {
                state.duplicates_dropped += 1;
                return;
            }
        }
        state.last_trades.insert(trade.symbol.clone(), trade.clone());

        // Floor the trade timestamp to its minute, e.g. 10:05:32 -> 10:05:00.
        let secs = trade.timestamp.timestamp();
        let bucket_key = secs - secs.rem_euclid(60);

        let by_bucket = state.candles.entry(trade.symbol.clone()).or_default();
        match by_bucket.entry(bucket_key) {
            Entry::Occupied(mut occupied) => occupied.get_mut().apply(&trade),
            Entry::Vacant(vacant) => {
                let bucket_start =
                    DateTime::from_timestamp(bucket_key, 0).expect("valid timestamp");
                vacant.insert(Candle::new(bucket_start, &trade));
            }
        }

        let vwap = state.vwaps.entry(trade.symbol).or_default();
        vwap.total_pv += trade.price * trade.quantity;
        vwap.total_volume += trade.quantity;

        state.trades_processed += 1;
    }

    /// All symbols with at least one candle, in no particular order.
    pub fn symbols(&self) -> Vec<String> {
        self.state.read().candles.keys().cloned().collect()
    }

    /// All candles recorded for a symbol, unordered. Empty for an unknown
    /// symbol, never an error.
    pub fn candles(&self, symbol: &str) -> Vec<Candle> {
        self.state
            .read()
            .candles
            .get(symbol)
            .map(|by_bucket| by_bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Current VWAP for a symbol; 0.0 for an unknown symbol or when no volume
    /// has accumulated.
    pub fn vwap(&self, symbol: &str) -> f64 {
        let state = self.state.read();
        match state.vwaps.get(symbol) {
            Some(v) if v.total_volume != 0.0 => v.total_pv / v.total_volume,
            _ => 0.0,
        }
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.state.read();
        EngineStats {
            symbols: state.candles.len(),
            candles: state.candles.values().map(|m| m.len()).sum(),
            trades_processed: state.trades_processed,
            duplicates_dropped: state.duplicates_dropped,
        }
    }
}
