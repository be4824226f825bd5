use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single executed trade from the input stream.
///
/// Immutable once parsed; produced by the ingestion workers and consumed
/// exactly once by the aggregation engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
}
