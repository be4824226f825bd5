//! Runtime configuration from CLI flags and environment variables.

use std::path::PathBuf;

use clap::Parser;

use crate::ingest::IngestConfig;

/// Real-time OHLC/VWAP analytics over a CSV trade stream.
#[derive(Debug, Parser)]
#[command(name = "marketpulse", version, about)]
pub struct Config {
    /// Path to the CSV trade source
    #[arg(long, env = "TICKS_CSV_PATH", default_value = "ticks.csv")]
    pub ticks_path: PathBuf,

    /// HTTP listen port
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Number of parsing workers in the ingestion pipeline
    #[arg(long, env = "INGEST_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Capacity of the bounded queues between pipeline stages
    #[arg(long, env = "INGEST_QUEUE_CAPACITY", default_value_t = 100)]
    pub queue_capacity: usize,

    /// Treat the first row of the source as data rather than a header
    #[arg(long, env = "TICKS_NO_HEADER")]
    pub no_header: bool,
}

impl Config {
    /// Parse configuration, letting a local `.env` file supply variables.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::parse()
    }

    pub fn ingest(&self) -> IngestConfig {
        IngestConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            has_header: !self.no_header,
        }
    }
}
