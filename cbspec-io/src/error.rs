//! I/O error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input file could not be opened.
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parquet decoding error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow conversion error.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A column has a type the reader cannot interpret.
    #[error("column {name} has unsupported type {datatype}")]
    InvalidColumnType { name: String, datatype: String },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] cbspec_core::Error),

    /// A failure while processing one batch of one file.
    #[error("{}: batch {batch}: {source}", file.display())]
    Batch {
        file: PathBuf,
        batch: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach the file and batch a failure occurred in.
    #[must_use]
    pub fn in_batch(self, file: impl Into<PathBuf>, batch: usize) -> Self {
        Error::Batch {
            file: file.into(),
            batch,
            source: Box::new(self),
        }
    }
}
