//! cbspec-io: Parquet ingestion and run orchestration for cbspec.
//!
//! This crate reads reconstruction result files in batches, extracts the
//! logical event fields for either record layout, drives the streaming
//! aggregation, and writes run logs and spectrum results.
//!

pub mod aggregator;
pub mod columns;
mod error;
pub mod pipeline;
mod reader;
pub mod run_log;
mod writer;

pub use aggregator::{aggregate, Aggregation, FileSummary, StreamingAggregator};
pub use columns::{extract_events, read_column};
pub use error::{Error, Result};
pub use pipeline::{reduce_streams, run_spectrum, run_spectrum_logged, LoggedRun, SpectrumResult};
pub use reader::EventFileReader;
pub use run_log::{RunEvent, RunEvents, RunLogger};
pub use writer::{write_results, SpectrumWriter, WrittenResults, BINS_CSV_NAME, SUMMARY_JSON_NAME};
