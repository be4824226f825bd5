//! CSV trade ingestion: producer -> worker pool -> single consumer.

mod cancel;
mod pipeline;

pub use cancel::CancelToken;
pub use pipeline::{run, IngestConfig, IngestStats};
