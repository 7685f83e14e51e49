//! Error types for cbspec-core.

use thiserror::Error;

/// Result type alias for cbspec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for spectrum reduction.
#[derive(Error, Debug)]
pub enum Error {
    /// Neither schema marker column is present in a batch.
    #[error("unknown schema: no `energy` or `energy_s800_p` column among [{}]", columns.join(", "))]
    UnknownSchema { columns: Vec<String> },

    /// A column required by the resolved schema is absent.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Energy bin edges are unusable.
    #[error("invalid energy bin edges: {0}")]
    InvalidBinEdges(String),

    /// Acceptance was requested for a bin with no thrown events.
    #[error("thrown MC count is zero in bin {bin}; bins must be masked before computing aperture")]
    ZeroThrownCount { bin: usize },

    /// Two per-row or per-bin sequences disagree in length.
    #[error("length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}
