//! Structure of Arrays (`SoA`) event batches.
//!
//! An [`EventBatch`] holds the logical fields of one fetched input batch,
//! already mapped from the layout-specific columns, as parallel vectors.

use crate::error::{Error, Result};
use crate::schema::SchemaVariant;

/// Logical field values of a single event, used to build batches by hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRow {
    /// Reconstructed energy in EeV before the FD energy-scale correction.
    pub energy: f64,
    /// Thrown energy in EeV before correction (MC only).
    pub mc_energy: f64,
    pub sc: f64,
    pub dsc: f64,
    pub good_sd_count: f64,
    pub border_dist_m: f64,
    pub ldf_chi2: f64,
    pub geom_chi2: f64,
    pub ped_err: f64,
    /// Reconstructed zenith angle in degrees before the array offset.
    pub zenith_deg: f64,
}

impl Default for EventRow {
    /// A 10 EeV event that passes the default cuts on any array.
    fn default() -> Self {
        Self {
            energy: 10.0,
            mc_energy: 10.0,
            sc: 10.0,
            dsc: 1.0,
            good_sd_count: 6.0,
            border_dist_m: 2000.0,
            ldf_chi2: 1.0,
            geom_chi2: 1.0,
            ped_err: 1.0,
            zenith_deg: 20.0,
        }
    }
}

/// A batch of events stored in Structure of Arrays (`SoA`) format.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
    /// Layout the batch was read from.
    pub variant: SchemaVariant,
    pub energy: Vec<f64>,
    /// Thrown energy; absent when the input carries no MC truth.
    pub mc_energy: Option<Vec<f64>>,
    pub sc: Vec<f64>,
    pub dsc: Vec<f64>,
    pub good_sd_count: Vec<f64>,
    pub border_dist_m: Vec<f64>,
    pub ldf_chi2: Vec<f64>,
    pub geom_chi2: Vec<f64>,
    pub ped_err: Vec<f64>,
    pub zenith_deg: Vec<f64>,
}

impl EventBatch {
    /// Creates a new empty batch with specified capacity.
    #[must_use]
    pub fn with_capacity(variant: SchemaVariant, capacity: usize) -> Self {
        Self {
            variant,
            energy: Vec::with_capacity(capacity),
            mc_energy: Some(Vec::with_capacity(capacity)),
            sc: Vec::with_capacity(capacity),
            dsc: Vec::with_capacity(capacity),
            good_sd_count: Vec::with_capacity(capacity),
            border_dist_m: Vec::with_capacity(capacity),
            ldf_chi2: Vec::with_capacity(capacity),
            geom_chi2: Vec::with_capacity(capacity),
            ped_err: Vec::with_capacity(capacity),
            zenith_deg: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of events in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.energy.len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    /// Pushes a single event into the batch.
    pub fn push(&mut self, row: &EventRow) {
        self.energy.push(row.energy);
        if let Some(mc_energy) = self.mc_energy.as_mut() {
            mc_energy.push(row.mc_energy);
        }
        self.sc.push(row.sc);
        self.dsc.push(row.dsc);
        self.good_sd_count.push(row.good_sd_count);
        self.border_dist_m.push(row.border_dist_m);
        self.ldf_chi2.push(row.ldf_chi2);
        self.geom_chi2.push(row.geom_chi2);
        self.ped_err.push(row.ped_err);
        self.zenith_deg.push(row.zenith_deg);
    }

    /// Drops the MC truth column, as for a real-detector batch.
    #[must_use]
    pub fn without_truth(mut self) -> Self {
        self.mc_energy = None;
        self
    }

    /// Checks every column has the same number of rows.
    ///
    /// # Errors
    /// Returns [`Error::LengthMismatch`] naming the first inconsistent column.
    pub fn validate(&self) -> Result<()> {
        let expected = self.len();
        let mut columns = vec![
            ("sc", self.sc.len()),
            ("dsc", self.dsc.len()),
            ("good_sd_count", self.good_sd_count.len()),
            ("border_dist_m", self.border_dist_m.len()),
            ("ldf_chi2", self.ldf_chi2.len()),
            ("geom_chi2", self.geom_chi2.len()),
            ("ped_err", self.ped_err.len()),
            ("zenith_deg", self.zenith_deg.len()),
        ];
        if let Some(mc_energy) = &self.mc_energy {
            columns.push(("mc_energy", mc_energy.len()));
        }
        match columns.into_iter().find(|&(_, len)| len != expected) {
            Some((what, actual)) => Err(Error::LengthMismatch {
                what,
                expected,
                actual,
            }),
            None => Ok(()),
        }
    }
}
