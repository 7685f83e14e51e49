//! Streaming aggregation over the MC and data result files.
//!
//! Files are processed MC first, then data; batches in file order. With
//! `parallelism > 1`, up to that many batches are fetched and reduced
//! concurrently, then merged and reported in batch order, so streams, counts
//! and the event sequence match a sequential run.

use crate::columns::extract_events;
use crate::reader::EventFileReader;
use crate::run_log::RunEvents;
use crate::Result;
use arrow::record_batch::RecordBatch;
use cbspec_core::config::{ArrayType, QualityCuts, ReadOptions};
use cbspec_core::reduce::{reduce_batch, BatchOutcome};
use cbspec_core::streams::{AccumulatedStreams, FileRole, FinalStreams};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

/// Per-file totals gathered while aggregating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub batches: usize,
    pub rows: usize,
    pub accepted: usize,
    pub non_finite: usize,
    pub non_finite_truth: usize,
}

/// Finalised streams plus per-file totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub streams: FinalStreams,
    pub mc: FileSummary,
    pub data: FileSummary,
}

/// Drives batch reduction and owns the run's accumulated streams.
pub struct StreamingAggregator<'a, E: RunEvents> {
    cuts: &'a QualityCuts,
    array: ArrayType,
    read: ReadOptions,
    events: &'a mut E,
    streams: AccumulatedStreams,
    summaries: [FileSummary; 2],
}

impl<'a, E: RunEvents> StreamingAggregator<'a, E> {
    #[must_use]
    pub fn new(
        cuts: &'a QualityCuts,
        array: ArrayType,
        read: ReadOptions,
        events: &'a mut E,
    ) -> Self {
        Self {
            cuts,
            array,
            read,
            events,
            streams: AccumulatedStreams::new(),
            summaries: [FileSummary::default(), FileSummary::default()],
        }
    }

    /// Open both files, then aggregate them and return the finalised streams.
    ///
    /// Both files are opened before any batch is processed.
    ///
    /// # Errors
    /// Returns the first open, decode or reduction error; no partial streams
    /// are returned.
    pub fn run(self, mc_file: &Path, dt_file: &Path) -> Result<Aggregation> {
        let mc = EventFileReader::open_with_batch_size(mc_file, self.read.batch_size)?;
        let dt = EventFileReader::open_with_batch_size(dt_file, self.read.batch_size)?;
        self.run_readers(mc, dt)
    }

    /// Aggregate two opened readers: `mc` is file index 0, `dt` index 1.
    ///
    /// # Errors
    /// See [`StreamingAggregator::run`].
    pub fn run_readers(
        mut self,
        mc: EventFileReader,
        dt: EventFileReader,
    ) -> Result<Aggregation> {
        for (role, reader) in FileRole::ORDER.into_iter().zip([mc, dt]) {
            self.process_file(role, reader)?;
        }
        let [mc, data] = self.summaries;
        log::info!(
            "aggregation done: MC {} rows / {} accepted, data {} rows / {} accepted",
            mc.rows,
            mc.accepted,
            data.rows,
            data.accepted
        );
        Ok(Aggregation {
            streams: self.streams.finalize(),
            mc,
            data,
        })
    }

    fn process_file(&mut self, role: FileRole, mut reader: EventFileReader) -> Result<()> {
        let path = reader.path().to_path_buf();
        self.events.input_file(&path, role.index());

        let chunk_size = self.read.parallelism.max(1);
        let mut batch_idx = 0usize;
        let mut total = 0usize;
        loop {
            let mut chunk: Vec<RecordBatch> = Vec::new();
            for batch in reader.by_ref().take(chunk_size) {
                match batch {
                    Ok(batch) => chunk.push(batch),
                    Err(err) => return Err(err.in_batch(&path, batch_idx + chunk.len())),
                }
            }
            if chunk.is_empty() {
                break;
            }

            let outcomes = self.reduce_chunk(role, &chunk);
            for (offset, outcome) in outcomes.into_iter().enumerate() {
                let batch = batch_idx + offset;
                self.events.batch_start(batch, role.index());
                let outcome = outcome.map_err(|err| err.in_batch(&path, batch))?;
                self.events.tree_type(outcome.variant, batch);

                outcome.merge_into(&mut self.streams);
                self.record(role, &outcome);
                total += outcome.accepted();

                self.events.batch_end(batch, outcome.accepted());
                self.events.running_total(&path, total);
            }
            batch_idx += chunk.len();
        }
        Ok(())
    }

    fn reduce_chunk(&self, role: FileRole, chunk: &[RecordBatch]) -> Vec<Result<BatchOutcome>> {
        let cuts = self.cuts;
        let array = self.array;
        let reduce = |batch: &RecordBatch| -> Result<BatchOutcome> {
            let events = extract_events(batch)?;
            Ok(reduce_batch(&events, role, array, cuts)?)
        };
        if chunk.len() > 1 {
            chunk.par_iter().map(reduce).collect()
        } else {
            chunk.iter().map(reduce).collect()
        }
    }

    fn record(&mut self, role: FileRole, outcome: &BatchOutcome) {
        let summary = &mut self.summaries[role.index()];
        summary.batches += 1;
        summary.rows += outcome.rows;
        summary.accepted += outcome.accepted();
        summary.non_finite += outcome.non_finite;
        if outcome.non_finite > 0 {
            log::warn!(
                "{} rows with non-finite reconstructed energy in {:?} batch",
                outcome.non_finite,
                role
            );
        }
        summary.non_finite_truth += outcome.non_finite_truth;
        if outcome.non_finite_truth > 0 {
            log::warn!(
                "{} rows with non-finite thrown energy in {:?} batch",
                outcome.non_finite_truth,
                role
            );
        }
    }
}

/// Aggregate one run with the given options.
///
/// # Errors
/// See [`StreamingAggregator::run`].
pub fn aggregate<E: RunEvents>(
    mc_file: &Path,
    dt_file: &Path,
    cuts: &QualityCuts,
    array: ArrayType,
    read: ReadOptions,
    events: &mut E,
) -> Result<Aggregation> {
    StreamingAggregator::new(cuts, array, read, events).run(mc_file, dt_file)
}
