use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Trade;

/// One-minute OHLC + volume aggregation for a single symbol.
///
/// Trades may arrive out of chronological order, so the candle tracks which
/// trade timestamps currently define its open and close. Those bookkeeping
/// fields are internal and never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct Candle {
    pub symbol: String,
    pub bucket_start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    #[serde(skip)]
    open_ts: DateTime<Utc>,
    #[serde(skip)]
    close_ts: DateTime<Utc>,
}

impl Candle {
    /// Initialise a candle from the first trade seen for its minute bucket.
    pub fn new(bucket_start: DateTime<Utc>, trade: &Trade) -> Self {
        Self {
            symbol: trade.symbol.clone(),
            bucket_start,
            open: trade.price,
            high: trade.price,
            low: trade.price,
            close: trade.price,
            volume: trade.quantity,
            open_ts: trade.timestamp,
            close_ts: trade.timestamp,
        }
    }

    /// Fold a subsequent trade of the same symbol/bucket into the candle.
    ///
    /// Open and close are assigned by trade timestamp, not processing order:
    /// a trade earlier than any seen so far redefines the open, and a trade
    /// at or after the latest seen redefines the close (timestamp ties go to
    /// the most recently processed trade).
    pub fn apply(&mut self, trade: &Trade) {
        self.volume += trade.quantity;

        if trade.price > self.high {
            self.high = trade.price;
        }
        if trade.price < self.low {
            self.low = trade.price;
        }

        if trade.timestamp < self.open_ts {
            self.open = trade.price;
            self.open_ts = trade.timestamp;
        }
        if trade.timestamp >= self.close_ts {
            self.close = trade.price;
            self.close_ts = trade.timestamp;
        }
    }
}
