//! Fan-out/fan-in pipeline feeding the aggregation engine.
//!
//! One producer reads CSV records sequentially and pushes them onto a bounded
//! record queue. A fixed pool of workers parses records into trades and pushes
//! them onto a bounded trade queue. Exactly one consumer drains the trade
//! queue into `Aggregator::process` - the single consumer fixes the arrival
//! order the engine's duplicate filter depends on, so it must stay single.
//! Bounded queues are the sole backpressure mechanism: a full queue blocks
//! its sender.

use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv_async::{AsyncReaderBuilder, Error as CsvError, ErrorKind, StringRecord, Trim};
use futures_util::StreamExt;
use tokio::{
    fs::File,
    io::BufReader,
    sync::{mpsc, Mutex},
};
use tracing::{debug, info};

use super::CancelToken;
use crate::{aggregate::Aggregator, models::Trade};

/// Pipeline sizing knobs.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Number of parsing workers pulling from the record queue.
    pub workers: usize,
    /// Capacity of both bounded queues.
    pub queue_capacity: usize,
    /// Whether the first row of the source is a header to skip.
    pub has_header: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 100,
            has_header: true,
        }
    }
}

/// Outcome counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestStats {
    /// Trades delivered to the engine (before its duplicate filter).
    pub processed: u64,
    /// Records dropped as malformed.
    pub skipped: u64,
}

/// Stream a CSV trade source through the worker pool into the engine.
///
/// Returns once the consumer has drained every successfully parsed trade, so
/// on return (including after cancellation) all in-flight work has been
/// folded into the engine. A source-level read failure is fatal and
/// propagates after the drain; state folded up to that point stays valid.
pub async fn run(
    path: &Path,
    engine: Arc<Aggregator>,
    config: IngestConfig,
    cancel: CancelToken,
) -> Result<IngestStats> {
    let file = File::open(path)
        .await
        .with_context(|| format!("failed to open trade source {}", path.display()))?;

    let mut reader = AsyncReaderBuilder::new()
        .has_headers(config.has_header)
        .flexible(true)
        .trim(Trim::All)
        .create_reader(BufReader::new(file));

    let (record_tx, record_rx) = mpsc::channel::<StringRecord>(config.queue_capacity);
    let (trade_tx, trade_rx) = mpsc::channel::<Trade>(config.queue_capacity);
    let skipped = Arc::new(AtomicU64::new(0));

    // Worker pool (fan-out). The record receiver sits behind a mutex so each
    // record is claimed by exactly one worker.
    let record_rx = Arc::new(Mutex::new(record_rx));
    let mut workers = Vec::with_capacity(config.workers.max(1));
    for worker_id in 0..config.workers.max(1) {
        let record_rx = record_rx.clone();
        let trade_tx = trade_tx.clone();
        let skipped = skipped.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let record = { record_rx.lock().await.recv().await };
                let Some(record) = record else { break };

                match parse_record(&record) {
                    Some(trade) => {
                        if trade_tx.send(trade).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        debug!(worker = worker_id, record = ?record, "skipping malformed record");
                    }
                }
            }
        }));
    }
    // The consumer sees the trade queue close once every worker has exited.
    drop(trade_tx);

    // Single consumer (fan-in): the only caller of `process`.
    let consumer = tokio::spawn(async move {
        let mut trade_rx = trade_rx;
        let mut processed = 0u64;
        while let Some(trade) = trade_rx.recv().await {
            engine.process(trade);
            processed += 1;
        }
        processed
    });

    // Producer: sequential reads with a cancellation check per iteration.
    let mut source_err: Option<anyhow::Error> = None;
    let mut records = reader.records();
    while !cancel.is_cancelled() {
        match records.next().await {
            Some(Ok(record)) => {
                if record_tx.send(record).await.is_err() {
                    break;
                }
            }
            Some(Err(e)) if is_fatal(&e) => {
                source_err = Some(anyhow::Error::new(e).context("trade source became unreadable"));
                break;
            }
            Some(Err(e)) => {
                skipped.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "skipping unreadable record");
            }
            None => break,
        }
    }
    if cancel.is_cancelled() {
        info!("ingestion cancelled, draining in-flight records");
    }
    drop(record_tx);

    // Termination protocol: wait for every worker before the trade queue can
    // close, then wait for the consumer to drain it.
    for worker in workers {
        let _ = worker.await;
    }
    let processed = consumer.await.unwrap_or(0);

    if let Some(err) = source_err {
        return Err(err);
    }

    let stats = IngestStats {
        processed,
        skipped: skipped.load(Ordering::Relaxed),
    };
    info!(
        processed = stats.processed,
        skipped = stats.skipped,
        "ingestion complete"
    );
    Ok(stats)
}

/// Validate and parse one record: timestamp, symbol, price, quantity.
///
/// Records with fewer than four fields, a timestamp that is not a
/// timezone-qualified RFC 3339 instant, or a non-numeric price/quantity are
/// rejected. No semantic validation beyond that; negative values pass
/// through.
fn parse_record(record: &StringRecord) -> Option<Trade> {
    if record.len() < 4 {
        return None;
    }

    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(record.get(0)?)
        .ok()?
        .with_timezone(&Utc);
    let symbol = record.get(1)?.to_string();
    let price: f64 = record.get(2)?.parse().ok()?;
    let quantity: f64 = record.get(3)?.parse().ok()?;

    Some(Trade {
        timestamp,
        symbol,
        price,
        quantity,
    })
}

/// An I/O failure of the underlying stream is fatal; anything else is a
/// malformed record to skip.
fn is_fatal(err: &CsvError) -> bool {
    matches!(err.kind(), ErrorKind::Io(_))
}
