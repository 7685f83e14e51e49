//! Run-event logging.
//!
//! The aggregator reports progress through [`RunEvents`]. [`RunLogger`] writes
//! each event twice, as a tab-separated text line in `run.log` and as one JSON
//! object in `run.jsonl`, appending to both. Logging is best effort: a failed
//! write is reported through `log::warn!` and never interrupts a run.

use cbspec_core::schema::SchemaVariant;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Text log file name inside the logs directory.
pub const TEXT_LOG_NAME: &str = "run.log";
/// JSON Lines log file name inside the logs directory.
pub const JSON_LOG_NAME: &str = "run.jsonl";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Progress events emitted during aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    InputFile { file: String, index: usize },
    TreeType { value: SchemaVariant, batch: usize },
    BatchStart { batch: usize, file_index: usize },
    BatchEnd { batch: usize, accepted: usize },
    RunningTotal { file: String, total: usize },
}

impl RunEvent {
    /// Human-readable form used for the text log.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            RunEvent::InputFile { file, .. } => format!("Input File: {file}"),
            RunEvent::TreeType { value, .. } => format!("Detected tree type: {value}"),
            RunEvent::BatchStart { batch, file_index } => {
                format!("Processing batch {batch} for file index {file_index}...")
            }
            RunEvent::BatchEnd { accepted, .. } => {
                format!("Number of accepted events in current loop: {accepted}")
            }
            RunEvent::RunningTotal { file, total } => {
                format!("Total number of accepted events from {file}: {total}")
            }
        }
    }
}

/// Receiver of aggregation progress events.
///
/// Implementations must not fail the run; the methods are infallible.
pub trait RunEvents {
    /// Record one event.
    fn record(&mut self, event: RunEvent);

    fn input_file(&mut self, file: &Path, index: usize) {
        self.record(RunEvent::InputFile {
            file: file.display().to_string(),
            index,
        });
    }

    fn tree_type(&mut self, value: SchemaVariant, batch: usize) {
        self.record(RunEvent::TreeType { value, batch });
    }

    fn batch_start(&mut self, batch: usize, file_index: usize) {
        self.record(RunEvent::BatchStart { batch, file_index });
    }

    fn batch_end(&mut self, batch: usize, accepted: usize) {
        self.record(RunEvent::BatchEnd { batch, accepted });
    }

    fn running_total(&mut self, file: &Path, total: usize) {
        self.record(RunEvent::RunningTotal {
            file: file.display().to_string(),
            total,
        });
    }
}

/// In-memory recorder.
impl RunEvents for Vec<RunEvent> {
    fn record(&mut self, event: RunEvent) {
        self.push(event);
    }
}

#[derive(Serialize)]
struct JsonEntry<'a> {
    time: &'a str,
    #[serde(flatten)]
    event: &'a RunEvent,
}

/// Text + JSON Lines logger for a single run.
///
/// Both files stay open for the logger's lifetime and are flushed on drop, so
/// an early return on a fatal error still leaves complete logs behind.
pub struct RunLogger {
    logs_dir: PathBuf,
    text: BufWriter<File>,
    json: BufWriter<File>,
    failed_writes: usize,
}

impl RunLogger {
    /// Open (or create) the run logs in `logs_dir`.
    ///
    /// # Errors
    /// Returns an error if the directory or files cannot be created.
    pub fn open<P: AsRef<Path>>(logs_dir: P) -> std::io::Result<Self> {
        let logs_dir = logs_dir.as_ref().to_path_buf();
        fs::create_dir_all(&logs_dir)?;
        let append = |name: &str| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(logs_dir.join(name))
                .map(BufWriter::new)
        };
        Ok(Self {
            text: append(TEXT_LOG_NAME)?,
            json: append(JSON_LOG_NAME)?,
            logs_dir,
            failed_writes: 0,
        })
    }

    #[must_use]
    pub fn text_path(&self) -> PathBuf {
        self.logs_dir.join(TEXT_LOG_NAME)
    }

    #[must_use]
    pub fn json_path(&self) -> PathBuf {
        self.logs_dir.join(JSON_LOG_NAME)
    }

    /// Writes that failed since the logger was opened.
    #[must_use]
    pub fn failed_writes(&self) -> usize {
        self.failed_writes
    }

    /// Append a free-form line to the text log.
    pub fn log_text(&mut self, message: &str) {
        let time = timestamp();
        let result = writeln!(self.text, "{time}\t{message}").and_then(|()| self.text.flush());
        self.note(result);
    }

    fn log_json(&mut self, time: &str, event: &RunEvent) {
        let result = serde_json::to_string(&JsonEntry { time, event })
            .map_err(std::io::Error::from)
            .and_then(|line| writeln!(self.json, "{line}"))
            .and_then(|()| self.json.flush());
        self.note(result);
    }

    fn note(&mut self, result: std::io::Result<()>) {
        if let Err(err) = result {
            self.failed_writes += 1;
            log::warn!("run log write failed in {}: {err}", self.logs_dir.display());
        }
    }
}

impl RunEvents for RunLogger {
    fn record(&mut self, event: RunEvent) {
        let time = timestamp();
        let message = event.message();
        log::info!("{message}");
        let result = writeln!(self.text, "{time}\t{message}").and_then(|()| self.text.flush());
        self.note(result);
        self.log_json(&time, &event);
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        if let Err(err) = self.text.flush().and_then(|()| self.json.flush()) {
            log::warn!("failed to flush run logs: {err}");
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
