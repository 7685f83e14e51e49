//! Per-batch reduction: derive, cut, and collect the log-energies a batch
//! contributes to each stream.
//!
//! Reduction is a pure function of one batch, so batches can be reduced in
//! any order or in parallel and merged afterwards.

use crate::config::{ArrayType, QualityCuts};
use crate::derived::DerivedEvents;
use crate::error::{Error, Result};
use crate::schema::SchemaVariant;
use crate::soa::EventBatch;
use crate::streams::{AccumulatedStreams, FileRole};

/// Contribution of one batch to the run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub role: FileRole,
    pub variant: SchemaVariant,
    /// Rows in the batch.
    pub rows: usize,
    /// Reconstructed log-energy of accepted rows.
    pub accepted_log_energy: Vec<f64>,
    /// Thrown log-energy of every row; only set for the MC file.
    pub raw_truth_log_energy: Option<Vec<f64>>,
    /// Rows with a non-finite reconstructed log-energy.
    pub non_finite: usize,
    /// MC rows with a non-finite thrown log-energy; always 0 for data.
    pub non_finite_truth: usize,
}

impl BatchOutcome {
    /// Number of rows that passed the cuts.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.accepted_log_energy.len()
    }

    /// Append this batch's contribution to the run streams.
    pub fn merge_into(&self, streams: &mut AccumulatedStreams) {
        if let Some(truth) = &self.raw_truth_log_energy {
            streams.append_raw_truth(truth);
        }
        streams.append_reconstructed(self.role, &self.accepted_log_energy);
    }
}

/// Reduce one batch.
///
/// For the MC file every row's thrown energy is kept before cuts; for either
/// file only rows passing `cuts` contribute a reconstructed energy.
///
/// # Errors
/// Returns [`Error::MissingColumn`] if an MC batch has no thrown energy, or
/// [`Error::LengthMismatch`] if the batch columns are inconsistent.
pub fn reduce_batch(
    batch: &EventBatch,
    role: FileRole,
    array: ArrayType,
    cuts: &QualityCuts,
) -> Result<BatchOutcome> {
    let derived = DerivedEvents::compute(batch, array);
    let selected = cuts.select(batch, &derived)?;
    let non_finite = derived.non_finite_count();
    let non_finite_truth = derived.non_finite_truth_count();
    let DerivedEvents {
        log_energy,
        mc_log_energy,
        ..
    } = derived;

    let (raw_truth_log_energy, non_finite_truth) = match role {
        FileRole::MonteCarlo => (
            Some(mc_log_energy.ok_or_else(|| Error::MissingColumn("mcenergy".to_string()))?),
            non_finite_truth,
        ),
        FileRole::Data => (None, 0),
    };

    let accepted_log_energy = selected.into_iter().map(|i| log_energy[i]).collect();

    Ok(BatchOutcome {
        role,
        variant: batch.variant,
        rows: batch.len(),
        accepted_log_energy,
        raw_truth_log_energy,
        non_finite,
        non_finite_truth,
    })
}
