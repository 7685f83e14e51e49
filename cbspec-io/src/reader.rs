//! Batched Parquet readers for reconstruction result files.
//!

use crate::columns::extract_events;
use crate::{Error, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use cbspec_core::config::DEFAULT_BATCH_SIZE;
use cbspec_core::schema::{resolve_schema, SchemaVariant};
use cbspec_core::soa::EventBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};

/// A result file opened for batched reading.
///
/// Batches are fetched lazily, so peak memory is bounded by the batch size.
pub struct EventFileReader {
    path: PathBuf,
    schema: SchemaRef,
    num_rows: usize,
    batch_size: usize,
    reader: ParquetRecordBatchReader,
}

impl EventFileReader {
    /// Opens a Parquet file with the default batch size.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not valid Parquet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_batch_size(path, DEFAULT_BATCH_SIZE)
    }

    /// Opens a Parquet file yielding batches of at most `batch_size` rows.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not valid Parquet.
    pub fn open_with_batch_size<P: AsRef<Path>>(path: P, batch_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let num_rows = usize::try_from(builder.metadata().file_metadata().num_rows()).unwrap_or(0);
        let batch_size = batch_size.max(1);
        let reader = builder.with_batch_size(batch_size).build()?;
        log::debug!(
            "opened {} ({} rows, batch size {})",
            path.display(),
            num_rows,
            batch_size
        );
        Ok(Self {
            path,
            schema,
            num_rows,
            batch_size,
            reader,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total rows in the file.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches the file will yield.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.num_rows.div_ceil(self.batch_size)
    }

    /// Column names from the file schema.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }

    /// Layout implied by the file schema.
    ///
    /// # Errors
    /// Returns an error if neither marker column is present.
    pub fn schema_variant(&self) -> Result<SchemaVariant> {
        Ok(resolve_schema(&self.column_names())?)
    }

    /// Iterate over resolved event batches instead of raw record batches.
    pub fn events(self) -> impl Iterator<Item = Result<EventBatch>> {
        self.map(|batch| batch.and_then(|batch| extract_events(&batch)))
    }
}

impl Iterator for EventFileReader {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next().map(|batch| batch.map_err(Error::from))
    }
}
