//! Marketpulse Library
//!
//! Exposes the aggregation engine, ingestion pipeline, HTTP API, and
//! configuration for use by the server binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod ingest;
pub mod models;
