//! Integration tests for the CSV ingestion pipeline.
//!
//! Each test writes a fixture CSV into a temp directory, runs the full
//! producer/worker/consumer pipeline against a fresh engine, and asserts on
//! the resulting aggregate state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use marketpulse::aggregate::Aggregator;
use marketpulse::ingest::{self, CancelToken, IngestConfig, IngestStats};

const HEADER: &str = "timestamp,symbol,price,quantity\n";

fn write_fixture(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("ticks.csv");
    std::fs::write(&path, contents).expect("write fixture");
    (dir, path)
}

async fn run_default(path: &Path, engine: Arc<Aggregator>) -> IngestStats {
    ingest::run(path, engine, IngestConfig::default(), CancelToken::new())
        .await
        .expect("pipeline run")
}

#[tokio::test]
async fn folds_well_formed_records() {
    let csv = format!(
        "{HEADER}\
         2024-03-01T10:05:10Z,BTCUSD,100.0,2.0\n\
         2024-03-01T10:05:40Z,BTCUSD,110.0,1.0\n\
         2024-03-01T10:06:05Z,ETHUSD,50.0,4.0\n"
    );
    let (_dir, path) = write_fixture(&csv);
    let engine = Arc::new(Aggregator::new());

    let stats = run_default(&path, engine.clone()).await;
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.skipped, 0);

    let mut symbols = engine.symbols();
    symbols.sort();
    assert_eq!(symbols, vec!["BTCUSD", "ETHUSD"]);

    let candles = engine.candles("BTCUSD");
    assert_eq!(candles.len(), 1);
    assert_eq!(candles[0].volume, 3.0);
    assert_eq!(
        candles[0].bucket_start,
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap()
    );

    let expected_vwap = (100.0 * 2.0 + 110.0 * 1.0) / 3.0;
    assert!((engine.vwap("BTCUSD") - expected_vwap).abs() < 1e-9);
}

#[tokio::test]
async fn malformed_records_are_skipped_not_fatal() {
    // A mix of short rows, bad timestamps and non-numeric fields must leave
    // exactly the state of the well-formed subset.
    let csv = format!(
        "{HEADER}\
         2024-03-01T10:05:10Z,BTCUSD,100.0,2.0\n\
         MALFORMED_ROW\n\
         not-a-timestamp,BTCUSD,101.0,1.0\n\
         2024-03-01T10:05:20Z,BTCUSD,abc,1.0\n\
         2024-03-01T10:05:30Z,BTCUSD,102.0,xyz\n\
         2024-03-01T10:05:50Z,BTCUSD,104.0,1.0\n"
    );
    let (_dir, path) = write_fixture(&csv);
    let engine = Arc::new(Aggregator::new());

    let stats = run_default(&path, engine.clone()).await;
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.skipped, 4);

    let candles = engine.candles("BTCUSD");
    assert_eq!(candles.len(), 1);
    assert_eq!(candles[0].volume, 3.0);
    assert_eq!(candles[0].high, 104.0);
    assert_eq!(candles[0].low, 100.0);

    let expected_vwap = (100.0 * 2.0 + 104.0 * 1.0) / 3.0;
    assert!((engine.vwap("BTCUSD") - expected_vwap).abs() < 1e-9);
}

#[tokio::test]
async fn consecutive_duplicate_rows_fold_once() {
    // A single worker preserves source order, so the engine sees the repeats
    // back to back and its immediate-repeat filter drops them.
    let csv = format!(
        "{HEADER}\
         2024-03-01T10:05:10Z,BTCUSD,100.0,2.0\n\
         2024-03-01T10:05:10Z,BTCUSD,100.0,2.0\n\
         2024-03-01T10:05:10Z,BTCUSD,100.0,2.0\n"
    );
    let (_dir, path) = write_fixture(&csv);
    let engine = Arc::new(Aggregator::new());

    let config = IngestConfig {
        workers: 1,
        ..Default::default()
    };
    let stats = ingest::run(&path, engine.clone(), config, CancelToken::new())
        .await
        .expect("pipeline run");

    // All three rows parse and reach the engine; two are dropped there.
    assert_eq!(stats.processed, 3);
    let engine_stats = engine.stats();
    assert_eq!(engine_stats.trades_processed, 1);
    assert_eq!(engine_stats.duplicates_dropped, 2);
    assert_eq!(engine.candles("BTCUSD")[0].volume, 2.0);
}

#[tokio::test]
async fn pre_cancelled_token_reads_nothing() {
    let csv = format!("{HEADER}2024-03-01T10:05:10Z,BTCUSD,100.0,2.0\n");
    let (_dir, path) = write_fixture(&csv);
    let engine = Arc::new(Aggregator::new());

    let cancel = CancelToken::new();
    cancel.cancel();

    let stats = ingest::run(&path, engine.clone(), IngestConfig::default(), cancel)
        .await
        .expect("pipeline run");

    assert_eq!(stats.processed, 0);
    assert!(engine.symbols().is_empty());
}

#[tokio::test]
async fn missing_source_is_an_error() {
    let engine = Arc::new(Aggregator::new());
    let result = ingest::run(
        Path::new("/nonexistent/ticks.csv"),
        engine,
        IngestConfig::default(),
        CancelToken::new(),
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn headerless_source_processes_first_row() {
    let csv = "2024-03-01T10:05:10Z,BTCUSD,100.0,2.0\n";
    let (_dir, path) = write_fixture(csv);
    let engine = Arc::new(Aggregator::new());

    let config = IngestConfig {
        has_header: false,
        ..Default::default()
    };
    let stats = ingest::run(&path, engine.clone(), config, CancelToken::new())
        .await
        .expect("pipeline run");

    assert_eq!(stats.processed, 1);
    assert_eq!(engine.candles("BTCUSD").len(), 1);
}

#[tokio::test]
async fn large_file_respects_backpressure() {
    // Far more rows than the queue capacity; the bounded queues must block
    // the producer rather than grow, and every row must still arrive.
    let mut csv = String::from(HEADER);
    for i in 0..1000 {
        let minute = i / 60;
        let second = i % 60;
        csv.push_str(&format!(
            "2024-03-01T10:{:02}:{:02}Z,BTCUSD,{}.0,1.0\n",
            minute,
            second,
            100 + (i % 40)
        ));
    }
    let (_dir, path) = write_fixture(&csv);
    let engine = Arc::new(Aggregator::new());

    let config = IngestConfig {
        queue_capacity: 8,
        ..Default::default()
    };
    let stats = ingest::run(&path, engine.clone(), config, CancelToken::new())
        .await
        .expect("pipeline run");

    assert_eq!(stats.processed, 1000);
    assert_eq!(stats.skipped, 0);
    let engine_stats = engine.stats();
    assert_eq!(engine_stats.trades_processed, 1000);
    assert_eq!(engine_stats.candles, 17); // 1000 seconds spans 17 minutes
}
